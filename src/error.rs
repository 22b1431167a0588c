//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while extracting
//! content from an EPUB archive. All errors are uniformly wrapped in the
//! [EpubError] enumeration.
//!
//! Most of these errors never reach the caller of [crate::epub::EpubExtractor]:
//! the extractor logs them and degrades to an empty or absent value, so that a
//! single broken file never aborts the whole extraction.

use thiserror::Error;

/// Types of errors that can occur during EPUB extraction
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when processing the ZIP structure of EPUB files,
    /// such as file corruption, unreadability, etc.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    /// Data Decoding Error - Null data
    ///
    /// This error occurs when trying to decode or parse an empty stream.
    #[error("Decode error: The data is empty.")]
    EmptyDataError,

    /// XML parsing failure error
    ///
    /// The event stream ended without producing a root element, which usually
    /// means the document was truncated or was not markup at all.
    #[error(
        "Failed parsing XML error: Unknown problems occurred during XML parsing, causing parsing failure."
    )]
    FailedParsingXml,

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// JSON serialization error
    #[error("JSON error: {source}")]
    JsonError { source: serde_json::Error },

    /// Missing required attribute error
    ///
    /// Triggered when an XML element lacks an attribute the extractor needs,
    /// such as `full-path` on the container's `rootfile`.
    #[error(
        "Missing required attribute: The \"{attribute}\" attribute is a must attribute for the \"{tag}\" element."
    )]
    MissingRequiredAttribute { tag: String, attribute: String },

    /// Non-canonical file structure error
    ///
    /// This error is triggered when an element the extractor relies on is
    /// missing from a document, e.g. a content document without `<body>`.
    #[error("Non-canonical file: The \"{tag}\" elements was not found.")]
    NonCanonicalFile { tag: String },

    /// Output directory error
    ///
    /// Raised when the book directory cannot be created, for instance because
    /// a file already occupies its path.
    #[error("Output directory unavailable: {reason}")]
    OutputDirUnavailable { reason: String },

    /// Unable to find the resource error
    ///
    /// This error occurs when an attempt is made to get a resource
    /// but it does not exist in the EPUB container.
    #[error("Resource not found: Unable to find resource from \"{resource}\".")]
    ResourceNotFound { resource: String },

    /// Malformed sanitizer toggle error
    ///
    /// A `name=value` toggle whose value is not a boolean.
    #[error("Invalid sanitize option: \"{value}\" is not a valid value for \"{name}\".")]
    InvalidSanitizeValue { name: String, value: String },

    /// Unknown sanitizer toggle error
    #[error("Unknown sanitize option: \"{name}\" is not a sanitizer toggle.")]
    UnknownSanitizeOption { name: String },

    /// UTF-8 decoding error
    ///
    /// This error occurs when serialized markup is not valid UTF-8.
    #[error("Decode error: {source}")]
    Utf8DecodeError { source: std::string::FromUtf8Error },

    /// QuickXml error
    ///
    /// This error occurs when parsing XML data using the QuickXml library.
    #[error("QuickXml error: {source}")]
    QuickXmlError { source: quick_xml::Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<quick_xml::Error> for EpubError {
    fn from(value: quick_xml::Error) -> Self {
        EpubError::QuickXmlError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<serde_json::Error> for EpubError {
    fn from(value: serde_json::Error) -> Self {
        EpubError::JsonError { source: value }
    }
}

impl From<std::string::FromUtf8Error> for EpubError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        EpubError::Utf8DecodeError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::MissingRequiredAttribute {
                    tag: l_tag,
                    attribute: l_attribute,
                },
                Self::MissingRequiredAttribute {
                    tag: r_tag,
                    attribute: r_attribute,
                },
            ) => l_tag == r_tag && l_attribute == r_attribute,
            (Self::NonCanonicalFile { tag: l_tag }, Self::NonCanonicalFile { tag: r_tag }) => {
                l_tag == r_tag
            }
            (
                Self::OutputDirUnavailable { reason: l_reason },
                Self::OutputDirUnavailable { reason: r_reason },
            ) => l_reason == r_reason,
            (
                Self::ResourceNotFound {
                    resource: l_resource,
                },
                Self::ResourceNotFound {
                    resource: r_resource,
                },
            ) => l_resource == r_resource,
            (
                Self::InvalidSanitizeValue {
                    name: l_name,
                    value: l_value,
                },
                Self::InvalidSanitizeValue {
                    name: r_name,
                    value: r_value,
                },
            ) => l_name == r_name && l_value == r_value,
            (
                Self::UnknownSanitizeOption { name: l_name },
                Self::UnknownSanitizeOption { name: r_name },
            ) => l_name == r_name,
            (
                Self::Utf8DecodeError { source: l_source },
                Self::Utf8DecodeError { source: r_source },
            ) => l_source == r_source,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
