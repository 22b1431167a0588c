//! Conversion of content documents into chapter fragments
//!
//! A chapter is the content of a document's `body`, moved into a `section`
//! element that is tagged with the document's manifest reference. On the way
//! paragraphs are numbered, intra-book links are reduced to their fragment and,
//! optionally, the markup is sanitized and image references are redirected.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;

use crate::{
    error::EpubError,
    html::parse_html,
    sanitize::SanitizeOptions,
    utils::{DecodeBytes, XmlElement, XmlNode, file_name, image_relative_path},
};

/// Name of the element every chapter is wrapped in
pub const CHAPTER_ELEMENT: &str = "section";

/// Attribute carrying the zero-based paragraph index
pub const PARAGRAPH_ID_ATTRIBUTE: &str = "data-pid";

/// Attributes whose values are links
pub const LINK_ATTRIBUTES: [&str; 10] = [
    "href",
    "xlink:href",
    "src",
    "action",
    "cite",
    "longdesc",
    "usemap",
    "data",
    "poster",
    "background",
];

/// A link into another document, capturing the fragment
static FRAGMENT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+(#\S+)").expect("valid fragment link pattern"));

/// Reduces a cross-document link to its fragment
///
/// `chapter3.xhtml#sec2` becomes `#sec2`. Links without a fragment, or that are
/// only a fragment, are returned as `None`.
pub fn rewrite_link(link: &str) -> Option<String> {
    FRAGMENT_LINK
        .captures(link)
        .and_then(|captures| captures.get(1))
        .map(|fragment| fragment.as_str().to_string())
}

/// Redirects an image reference into `prefix`
///
/// The part of the reference below its last `images` segment is kept, so
/// `../images/fig/a.png` becomes `<prefix>/fig/a.png`; other references keep
/// only their file name. External references (with a scheme, `data:` URIs and
/// fragments) are not redirected.
pub fn rewrite_asset(reference: &str, prefix: &str) -> Option<String> {
    let reference = reference.trim();
    let lowercase = reference.to_ascii_lowercase();
    if reference.is_empty()
        || reference.starts_with('#')
        || reference.starts_with("//")
        || reference.contains("://")
        || lowercase.starts_with("data:")
        || lowercase.starts_with("mailto:")
    {
        return None;
    }

    let path = image_relative_path(reference).or_else(|| file_name(reference).map(str::to_string))?;
    let prefix = prefix.trim_end_matches('/');

    Some(if prefix.is_empty() {
        path
    } else {
        format!("{}/{}", prefix, path)
    })
}

/// Builds chapter fragments from content documents
///
/// ```rust
/// # use epub_extract::chapter::ChapterBuilder;
/// let markup = br#"<html><body><p>One</p><p><a href="b.xhtml#n2">two</a></p></body></html>"#;
/// let chapter = ChapterBuilder::new().build(markup, "a.xhtml");
/// assert_eq!(
///     chapter.to_markup().unwrap(),
///     r##"<section id="a.xhtml"><p data-pid="0">One</p><p data-pid="1"><a href="#n2">two</a></p></section>"##
/// );
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ChapterBuilder<'a> {
    sanitize: Option<&'a SanitizeOptions>,
    images_path: Option<&'a str>,
}

impl<'a> ChapterBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleans each chapter with `options`
    pub fn sanitize(mut self, options: Option<&'a SanitizeOptions>) -> Self {
        self.sanitize = options;
        self
    }

    /// Redirects image references into `path`
    pub fn images_path(mut self, path: Option<&'a str>) -> Self {
        self.images_path = path;
        self
    }

    /// Builds the chapter for the document `data`, identified by `id`
    ///
    /// Never fails: a document that is blank or has no `body` (a frameset) yields
    /// an empty `section`, still carrying `id`.
    pub fn build(&self, data: &[u8], id: &str) -> XmlElement {
        match self.try_build(data, id) {
            Ok(chapter) => chapter,
            Err(err) => {
                warn!("Unable to build a chapter from \"{}\": {}", id, err);

                let mut chapter = XmlElement::new(CHAPTER_ELEMENT);
                chapter.set_attr("id", id);
                chapter
            }
        }
    }

    /// Builds the chapter, reporting why a document could not be used
    pub fn try_build(&self, data: &[u8], id: &str) -> Result<XmlElement, EpubError> {
        let content = data.decode()?;
        let document = parse_html(&content)?;
        let mut body =
            document
                .into_element_by_name("body")
                .ok_or_else(|| EpubError::NonCanonicalFile {
                    tag: "body".to_string(),
                })?;

        let mut index = 0usize;
        body.for_each_element_mut(&mut |element| {
            if element.is("p") {
                element.set_attr(PARAGRAPH_ID_ATTRIBUTE, &index.to_string());
                index += 1;
            }
        });

        // Text before the first element is dropped; text following an element stays with it
        let mut chapter = XmlElement::new(CHAPTER_ELEMENT);
        chapter.children = body
            .children
            .into_iter()
            .skip_while(|node| matches!(node, XmlNode::Text(_) | XmlNode::CData(_)))
            .collect();

        if let Some(options) = self.sanitize {
            options.sanitize(&mut chapter);
        }

        chapter.for_each_element_mut(&mut |element| {
            for (key, value) in element.attributes.iter_mut() {
                if !LINK_ATTRIBUTES.contains(&key.as_str()) {
                    continue;
                }
                if let Some(fragment) = rewrite_link(value) {
                    *value = fragment;
                }
            }
        });

        if let Some(prefix) = self.images_path {
            chapter.for_each_element_mut(&mut |element| {
                let keys: &[&str] = if element.is("img") {
                    &["src"]
                } else if element.is("image") {
                    &["href", "xlink:href"]
                } else {
                    return;
                };

                for key in keys {
                    if let Some(value) = element.attributes.get_mut(*key) {
                        if let Some(redirected) = rewrite_asset(value, prefix) {
                            *value = redirected;
                        }
                    }
                }
            });
        }

        chapter.set_attr("id", id);
        Ok(chapter)
    }
}
