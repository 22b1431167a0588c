use std::io::{Cursor, Read, Seek};

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use indexmap::IndexMap;
use quick_xml::{
    NsReader, Writer,
    escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with},
    events::{BytesCData, BytesEnd, BytesStart, BytesText, Event},
    name::ResolveResult,
};
use zip::{ZipArchive, result::ZipError};

use crate::error::EpubError;

/// HTML elements that never have content and are never closed explicitly
pub const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// HTML elements whose content is not markup
pub const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Extracts the contents of a specified file from a ZIP archive
///
/// ## Parameters
/// - `zip_file`: A mutable reference to a ZIP archive object
/// - `file_name`: The path to the file to extract (relative to the ZIP archive root directory)
///
/// ## Return
/// - `Ok(Vec<u8>)`: The raw bytes of the entry
/// - `Err(EpubError::ResourceNotFound)`: There is no entry with that name
/// - `Err(EpubError)`: The entry exists but could not be read
pub fn get_file_in_zip_archive<R: Read + Seek>(
    zip_file: &mut ZipArchive<R>,
    file_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let mut buffer = Vec::<u8>::new();
    match zip_file.by_name(file_name) {
        Ok(mut file) => {
            file.read_to_end(&mut buffer)?;
            Ok(buffer)
        }
        Err(ZipError::FileNotFound) => Err(EpubError::ResourceNotFound {
            resource: file_name.to_string(),
        }),
        Err(err) => Err(EpubError::from(err)),
    }
}

/// Returns `true` if `name` is an HTML void element
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS
        .iter()
        .any(|element| element.eq_ignore_ascii_case(name))
}

/// Returns `true` if the content of `name` is written without escaping, as HTML
/// parses `script` and `style` content as raw text
pub fn is_raw_text_element(name: &str) -> bool {
    RAW_TEXT_ELEMENTS
        .iter()
        .any(|element| element.eq_ignore_ascii_case(name))
}

/// Returns the part of a reference that lies below its last `images` segment
///
/// `../Images/fig/1.png#x` yields `fig/1.png`. Empty, `.` and `..` segments are
/// dropped so the result can be joined onto an output directory safely.
/// Returns `None` when the reference has no `images` segment or nothing below it.
pub fn image_relative_path(reference: &str) -> Option<String> {
    let path = strip_query_and_fragment(reference);
    let segments = path.split('/').collect::<Vec<&str>>();
    let position = segments
        .iter()
        .rposition(|segment| segment.eq_ignore_ascii_case("images"))?;

    let rest = segments[position + 1..]
        .iter()
        .filter(|segment| !matches!(**segment, "" | "." | ".."))
        .copied()
        .collect::<Vec<&str>>()
        .join("/");

    (!rest.is_empty()).then_some(rest)
}

/// Returns the last path segment of a reference, ignoring query and fragment
pub fn file_name(reference: &str) -> Option<&str> {
    strip_query_and_fragment(reference)
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

fn strip_query_and_fragment(reference: &str) -> &str {
    match reference.find(['#', '?']) {
        Some(index) => &reference[..index],
        None => reference,
    }
}

/// Resolves a named entity against the XML predefined set and the HTML5 set
fn resolve_named_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
}

/// Resolves the content of a general entity reference (`&name;`, `&#N;`, `&#xN;`)
fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(code) = entity.strip_prefix('#') {
        let code = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };

        return char::from_u32(code).map(String::from);
    }

    resolve_named_entity(entity).map(str::to_string)
}

/// Provides functionality to decode byte data into strings
///
/// A byte order mark decides the encoding when present. Otherwise the data is
/// tried as UTF-8, then in the encoding named by its XML declaration, and
/// finally as Windows-1252, which older publications commonly use.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

impl DecodeBytes for [u8] {
    fn decode(&self) -> Result<String, EpubError> {
        if self.len() < 4 {
            return Err(EpubError::EmptyDataError);
        }

        if let Some((encoding, bom_length)) = Encoding::for_bom(self) {
            let (text, _) = encoding.decode_without_bom_handling(&self[bom_length..]);
            return Ok(text.into_owned());
        }

        let (text, malformed) = UTF_8.decode_without_bom_handling(self);
        if !malformed {
            return Ok(text.into_owned());
        }

        let encoding = xml_encoding(self)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(WINDOWS_1252);
        let (text, _) = encoding.decode_without_bom_handling(self);
        Ok(text.into_owned())
    }
}

/// Reads the `encoding` pseudo-attribute of an XML declaration
///
/// Only the first 100 bytes are inspected.
fn xml_encoding(bytes: &[u8]) -> Option<&str> {
    let prefix = &bytes[..bytes.len().min(100)];
    let declaration = &prefix[prefix.windows(5).position(|w| w == b"<?xml")?..];

    let position = declaration
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let value = &declaration[position + 9..];

    let quote = *value.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let length = value[1..].iter().position(|&b| b == quote)?;
    std::str::from_utf8(&value[1..1 + length]).ok()
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        self.as_slice().decode()
    }
}

/// Collapses every run of whitespace into a single space and trims both ends
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// A node of a parsed markup document
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),

    /// Character data with entities already resolved
    Text(String),

    CData(String),

    Comment(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn into_element(self) -> Option<XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// Represents an element node in an XML or XHTML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element (excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The namespace the element resolved to, if it was bound
    pub namespace: Option<String>,

    /// The attributes of the element in document order
    ///
    /// Keys are the qualified attribute names (`xlink:href`), values are unescaped.
    pub attributes: IndexMap<String, String>,

    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create a new element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            namespace: None,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Get the full tag name of the element
    ///
    /// If the element has a namespace prefix, return "prefix:name" format;
    /// otherwise, return only the element name.
    pub fn tag_name(&self) -> String {
        if let Some(prefix) = &self.prefix {
            format!("{}:{}", prefix, self.name)
        } else {
            self.name.clone()
        }
    }

    /// Case-insensitive comparison of the local name, as HTML tag names compare
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Gets the text content of the element and all its descendants, trimmed
    pub fn text(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, result: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => result.push_str(text),
                XmlNode::Element(element) => element.collect_text(result),
                XmlNode::Comment(_) => {}
            }
        }
    }

    /// Gets the first text run directly inside this element, trimmed
    pub fn own_text(&self) -> Option<String> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Text(text) | XmlNode::CData(text) => Some(text.trim().to_string()),
            _ => None,
        })
    }

    /// Returns the value of the specified attribute
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// Sets an attribute, keeping its position if it already exists
    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    /// Find all elements with the specified name, this element included, in document order
    pub fn find_elements_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        SearchElementsByNameIter::new(self, name)
    }

    /// Find all elements with the specified name among the child elements of the current element
    pub fn find_children_by_name(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children().filter(move |child| child.name == name)
    }

    /// Get child elements, skipping text and comments
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Consumes the tree and returns the first element with the specified name
    pub fn into_element_by_name(self, name: &str) -> Option<XmlElement> {
        if self.name == name {
            return Some(self);
        }

        self.children
            .into_iter()
            .filter_map(XmlNode::into_element)
            .find_map(|child| child.into_element_by_name(name))
    }

    /// Visits this element and every descendant element in document order
    pub fn for_each_element_mut<F: FnMut(&mut XmlElement)>(&mut self, visit: &mut F) {
        visit(self);
        for node in self.children.iter_mut() {
            if let XmlNode::Element(element) = node {
                element.for_each_element_mut(visit);
            }
        }
    }

    /// Appends text, merging it into a preceding text node
    ///
    /// Whitespace-only text that would start a new node is dropped unless
    /// `keep_whitespace` is set.
    pub(crate) fn push_text(&mut self, text: &str, keep_whitespace: bool) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else if keep_whitespace || !text.trim().is_empty() {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Serializes the element and its subtree as markup
    ///
    /// Void HTML elements are written self-closed, every other element gets an
    /// explicit end tag even when empty. Text inside `script` and `style` is
    /// written as is.
    pub fn to_markup(&self) -> Result<String, EpubError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        Self::write_element(&mut writer, self)?;

        Ok(String::from_utf8(writer.into_inner().into_inner())?)
    }

    fn write_element(
        writer: &mut Writer<Cursor<Vec<u8>>>,
        element: &XmlElement,
    ) -> Result<(), EpubError> {
        let tag = element.tag_name();
        let mut start = BytesStart::new(tag.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if is_void_element(&tag) && element.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        let raw_text = is_raw_text_element(&tag);
        writer.write_event(Event::Start(start))?;
        for node in &element.children {
            match node {
                XmlNode::Element(child) => Self::write_element(writer, child)?,
                XmlNode::Text(text) if raw_text => {
                    writer.write_event(Event::Text(BytesText::from_escaped(text.as_str())))?
                }
                XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
                XmlNode::CData(data) => {
                    writer.write_event(Event::CData(BytesCData::new(data.as_str())))?
                }
                XmlNode::Comment(comment) => writer.write_event(Event::Comment(
                    BytesText::from_escaped(comment.as_str()),
                ))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;

        Ok(())
    }
}

struct SearchElementsByNameIter<'a> {
    elements: Vec<&'a XmlElement>,
    current_index: usize,
    target_name: String,
}

impl<'a> SearchElementsByNameIter<'a> {
    fn new(root: &'a XmlElement, name: &str) -> Self {
        let mut elements = Vec::new();
        Self::collect_elements(root, &mut elements);
        Self {
            elements,
            current_index: 0,
            target_name: name.to_string(),
        }
    }

    fn collect_elements(element: &'a XmlElement, collection: &mut Vec<&'a XmlElement>) {
        collection.push(element);
        for child in element.children() {
            Self::collect_elements(child, collection);
        }
    }
}

impl<'a> Iterator for SearchElementsByNameIter<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_index < self.elements.len() {
            let element = self.elements[self.current_index];
            self.current_index += 1;
            if element.name == self.target_name {
                return Some(element);
            }
        }
        None
    }
}

/// XML parser used to parse XML content and build an XML element tree
///
/// Only well-formed documents are accepted; content documents go through
/// [crate::html::parse_html] instead.
pub struct XmlReader {}

impl XmlReader {
    /// Parses a well-formed XML document such as `container.xml`, an OPF or an NCX file
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(EpubError)`: The content is empty or not well-formed
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.trim().is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        let mut reader = NsReader::from_str(content);
        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;

        loop {
            match reader.read_resolved_event_into(&mut buf) {
                Ok((_, Event::Eof)) => break,

                Ok((namespace, Event::Start(e))) => {
                    stack.push(Self::make_element(&e, namespace));
                }

                Ok((namespace, Event::Empty(e))) => {
                    let element = Self::make_element(&e, namespace);
                    Self::attach(&mut stack, &mut root, element);
                }

                Ok((_, Event::End(_))) => {
                    if let Some(element) = stack.pop() {
                        Self::attach(&mut stack, &mut root, element);
                    }
                }

                Ok((_, Event::Text(e))) => {
                    if let Some(element) = stack.last_mut() {
                        let text = String::from_utf8_lossy(e.as_ref());
                        element.push_text(&text, false);
                    }
                }

                Ok((_, Event::GeneralRef(e))) => {
                    if let Some(element) = stack.last_mut() {
                        let entity = String::from_utf8_lossy(e.as_ref());
                        let text = resolve_entity(&entity).unwrap_or_else(|| format!("&{entity};"));
                        element.push_text(&text, true);
                    }
                }

                Ok((_, Event::CData(e))) => {
                    if let Some(element) = stack.last_mut() {
                        let data = String::from_utf8_lossy(e.as_ref()).to_string();
                        element.children.push(XmlNode::CData(data));
                    }
                }

                Err(err) => return Err(err.into()),

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype
                _ => {}
            }

            buf.clear();
        }

        root.ok_or(EpubError::FailedParsingXml)
    }

    /// Decodes bytes and parses them as a well-formed XML document
    pub fn parse_bytes(bytes: &[u8]) -> Result<XmlElement, EpubError> {
        let content = bytes.decode()?;
        Self::parse(&content)
    }

    fn make_element(e: &BytesStart, namespace: ResolveResult) -> XmlElement {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = e.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        if let ResolveResult::Bound(namespace) = namespace {
            element.namespace = Some(String::from_utf8_lossy(namespace.as_ref()).to_string());
        }

        let mut attributes = e.attributes();
        attributes.with_checks(false);

        for attr in attributes.flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let raw = String::from_utf8_lossy(&attr.value).to_string();
            let value = match unescape_with(&raw, resolve_named_entity) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.clone(),
            };

            element.attributes.insert(key, value);
        }

        element
    }

    /// Hands a finished element to its parent, or makes it the root
    ///
    /// Only the first top-level element becomes the root; anything after it is discarded.
    fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(element)),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }
}
