//! Assembly and rendering of extraction artifacts
//!
//! Chapters are combined either into one `div` document or into a list of
//! serialized sections. Any artifact can then be rendered as plain text or, for
//! structured destinations, as JSON with sorted keys and four-space indentation.

use std::{fs, path::Path};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::{
    error::EpubError,
    types::{Chapters, EpubInfo},
    utils::{XmlElement, XmlNode},
};

/// Name of the element wrapping all chapters of a combined document
pub const DOCUMENT_ELEMENT: &str = "div";

/// Something that can be written to an output file
pub trait Artifact: Serialize {
    /// Text written when the destination is not structured
    fn to_plain_text(&self) -> String;
}

impl Artifact for str {
    fn to_plain_text(&self) -> String {
        self.to_string()
    }
}

impl Artifact for String {
    fn to_plain_text(&self) -> String {
        self.clone()
    }
}

impl Artifact for [String] {
    fn to_plain_text(&self) -> String {
        self.join("\n")
    }
}

impl Artifact for Vec<String> {
    fn to_plain_text(&self) -> String {
        self.as_slice().to_plain_text()
    }
}

impl Artifact for Chapters {
    fn to_plain_text(&self) -> String {
        match self {
            Chapters::Document(document) => document.clone(),
            Chapters::List(chapters) => chapters.to_plain_text(),
        }
    }
}

impl Artifact for EpubInfo {
    fn to_plain_text(&self) -> String {
        let mut lines = vec![
            format!("title: {}", self.title),
            format!("language: {}", self.language),
            format!("creator: {}", self.creator),
            format!("date: {}", self.date),
            format!("identifier: {}", self.identifier),
            format!("description: {}", self.description),
            format!("genres: {}", self.genres.join(", ")),
        ];

        let paths = [
            ("images", &self.images),
            ("cover", &self.cover),
            ("book", &self.book),
            ("book_dir", &self.book_dir),
        ];
        for (key, path) in paths {
            if let Some(path) = path {
                lines.push(format!("{}: {}", key, path.display()));
            }
        }

        lines.join("\n")
    }
}

/// Whether a destination name asks for structured (JSON) output
pub fn is_structured_target(name: &str) -> bool {
    name.contains(".js")
}

/// Renders an artifact as plain text or as key-sorted JSON
pub fn render<A: Artifact + ?Sized>(artifact: &A, structured: bool) -> Result<String, EpubError> {
    if !structured {
        return Ok(artifact.to_plain_text());
    }

    // Going through `Value` sorts object keys
    let value = serde_json::to_value(artifact)?;

    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;

    Ok(String::from_utf8(buffer)?)
}

/// Renders an artifact and writes it to `path`, replacing any existing file
pub fn write_artifact<A: Artifact + ?Sized>(
    path: &Path,
    artifact: &A,
    structured: bool,
) -> Result<(), EpubError> {
    let content = render(artifact, structured)?;
    fs::write(path, content)?;
    Ok(())
}

/// Combines chapters into a single `div` document
pub fn assemble_document(chapters: Vec<XmlElement>) -> Result<String, EpubError> {
    let mut document = XmlElement::new(DOCUMENT_ELEMENT);
    document.children = chapters.into_iter().map(XmlNode::Element).collect();
    document.to_markup()
}

/// Serializes every chapter on its own
pub fn assemble_list(chapters: &[XmlElement]) -> Result<Vec<String>, EpubError> {
    chapters.iter().map(XmlElement::to_markup).collect()
}
