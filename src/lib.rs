//! Epub extraction library
//!
//! A Rust library for turning EPUB eBook files into web-ready fragments.
//!
//! The library opens an EPUB container, locates its package document, and
//! extracts three kinds of artifacts from it: a metadata record (Dublin Core
//! fields, genres and the NCX table of contents), the images of the publication,
//! and its chapters, each content document reduced to a `section` element with
//! numbered paragraphs and intra-book links rewritten to fragments.
//!
//! Extraction is forgiving: a publication with a missing or malformed part still
//! produces every artifact it can, and the problems are reported through the
//! [`log`](https://docs.rs/log) facade.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # use epub_extract::{epub::EpubExtractor, types::ChapterOptions};
//! let mut extractor = EpubExtractor::open("path/to/book.epub");
//!
//! // Get metadata
//! if let Some(info) = extractor.get_epub_info() {
//!     println!("Title: {}", info.title);
//!     println!("Creator: {}", info.creator);
//! }
//!
//! // Extract images and write all chapters to `<title>/<identifier>/output.html`
//! if let Some(chapters) = extractor.get_chapters(&ChapterOptions::default()) {
//!     extractor.write_to_file(&chapters, None);
//! }
//!
//! // Write the metadata record as JSON
//! if let Some(info) = extractor.get_epub_info().cloned() {
//!     extractor.write_to_file(&info, Some("epub_info.json"));
//! }
//! ```
//!
//! ## Feature flags
//!
//! - `cli` (default): Builds the `epub-extract` command line tool, which pulls in
//!   `clap` and `env_logger`. Library users can turn it off with `default-features = false`.

pub(crate) mod html;
pub(crate) mod utils;

pub mod archive;
pub mod chapter;
pub mod epub;
pub mod error;
pub mod output;
pub mod sanitize;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use utils::{DecodeBytes, XmlElement, XmlNode, XmlReader};
