use std::path::PathBuf;

use serde::Serialize;

use crate::sanitize::SanitizeOptions;

/// Descriptive information about a publication, plus the locations of the
/// artifacts written for it
///
/// The six descriptive fields are always present. A field the package document
/// does not declare is an empty string rather than an absent value, so the
/// serialized record always carries the same keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpubInfo {
    pub title: String,
    pub language: String,
    pub creator: String,
    pub date: String,
    pub identifier: String,
    pub description: String,

    /// Labels of the Atom categories declared in `META-INF/metadata.xml`
    pub genres: Vec<String>,

    pub table_of_contents: TableOfContents,

    /// Directory the images were extracted into, with a trailing separator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<PathBuf>,

    /// Path of the extracted cover image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<PathBuf>,

    /// Path of the file the chapters were written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<PathBuf>,

    /// Directory holding every artifact of this publication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_dir: Option<PathBuf>,
}

/// Navigation data read from the NCX document
///
/// `title` and `author` distinguish an element that is absent (`None`) from one
/// that is present but empty (`Some("")`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableOfContents {
    pub title: Option<String>,
    pub author: Option<String>,
    pub navpoints: Vec<NavPoint>,
}

/// A single navigation entry
///
/// Only complete entries are kept: a `navPoint` without an id, a label or a
/// target never becomes a [NavPoint].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavPoint {
    /// The `id` attribute of the `navPoint` element
    pub raw_id: String,

    /// Text of `navLabel/text`
    pub label: String,

    /// The `src` attribute of the `content` element, fragment included
    pub target_reference: String,
}

/// A resource declared in the package manifest
///
/// `href` is kept exactly as written in the package document; it is mapped to
/// an archive entry only when the resource is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: Option<String>,
    pub href: String,
    pub media_type: Option<String>,
}

impl ManifestItem {
    /// Whether the item is a content document that becomes a chapter
    pub fn is_chapter(&self) -> bool {
        self.href.contains(".htm") || self.href.contains(".xml")
    }

    /// Whether the declared media type allows the item to be an image
    ///
    /// Items without a media type are given the benefit of the doubt.
    pub fn may_be_image(&self) -> bool {
        match &self.media_type {
            Some(media_type) => media_type.to_ascii_lowercase().starts_with("image/"),
            None => true,
        }
    }
}

/// The assembled chapters of a publication
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Chapters {
    /// A single `div` element containing every chapter
    Document(String),

    /// One serialized `section` element per chapter
    List(Vec<String>),
}

/// Controls how chapters are assembled
#[derive(Debug, Clone)]
pub struct ChapterOptions {
    /// Extract images before building the chapters
    pub extract_images: bool,

    /// Directory that rewritten image references point to
    ///
    /// Defaults to the images directory of the current run, or `images/`.
    pub images_path: Option<String>,

    /// Return one string per chapter instead of a single document
    pub as_list: bool,

    /// Clean the chapter markup with these options
    pub sanitize: Option<SanitizeOptions>,
}

impl Default for ChapterOptions {
    fn default() -> Self {
        Self {
            extract_images: true,
            images_path: None,
            as_list: false,
            sanitize: None,
        }
    }
}
