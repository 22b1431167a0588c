//! HTML parsing for content documents
//!
//! Content documents are parsed the way a browser parses them, with
//! [html5ever], and the result is converted into an [XmlElement] tree. Implied
//! end tags, unclosed void elements, raw-text elements such as `script` and
//! stray end tags are all handled by the HTML tree builder.

use std::{borrow::Cow, cell::RefCell};

use html5ever::{
    Attribute, LocalName, Namespace, QualName,
    driver::ParseOpts,
    local_name, ns, parse_document,
    tendril::{StrTendril, TendrilSink},
    tree_builder::{ElemName, ElementFlags, NodeOrText, QuirksMode, TreeSink},
};
use log::trace;

use crate::{
    error::EpubError,
    utils::{XmlElement, XmlNode},
};

/// Index of the document node in the sink's node list
const DOCUMENT: usize = 0;

/// Parses a content document and returns its root (`html`) element
///
/// ## Return
/// - `Ok(XmlElement)`: The root element; `head` and `body` are always present
///   unless the document is a frameset
/// - `Err(EpubError::EmptyDataError)`: The content is blank
pub fn parse_html(content: &str) -> Result<XmlElement, EpubError> {
    if content.trim().is_empty() {
        return Err(EpubError::EmptyDataError);
    }

    let sink = parse_document(DocumentSink::default(), ParseOpts::default())
        .from_utf8()
        .one(content.as_bytes());

    sink.into_root().ok_or(EpubError::FailedParsingXml)
}

enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),

    /// Processing instructions and anything else that is dropped
    Ignored,
}

struct Node {
    data: NodeData,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Element name handed to the tree builder
#[derive(Debug)]
pub struct ElementName(QualName);

impl ElemName for ElementName {
    fn ns(&self) -> &Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

/// Tree sink collecting the parsed document into a flat node list
///
/// Nodes refer to each other by index. The tree builder mutates through `&self`,
/// hence the `RefCell`.
struct DocumentSink {
    nodes: RefCell<Vec<Node>>,
}

impl Default for DocumentSink {
    fn default() -> Self {
        Self {
            nodes: RefCell::new(vec![Node::new(NodeData::Document)]),
        }
    }
}

impl DocumentSink {
    fn push(nodes: &mut Vec<Node>, data: NodeData) -> usize {
        nodes.push(Node::new(data));
        nodes.len() - 1
    }

    fn detach(nodes: &mut [Node], id: usize) {
        let Some(parent) = nodes.get_mut(id).and_then(|node| node.parent.take()) else {
            return;
        };
        nodes[parent].children.retain(|child| *child != id);
    }

    fn append_node(nodes: &mut [Node], parent: usize, child: usize) {
        Self::detach(nodes, child);
        nodes[child].parent = Some(parent);
        nodes[parent].children.push(child);
    }

    /// Appends text, merging it into a preceding text node
    fn append_text(nodes: &mut Vec<Node>, parent: usize, text: &str) {
        if let Some(&last) = nodes[parent].children.last() {
            if let NodeData::Text(existing) = &mut nodes[last].data {
                existing.push_str(text);
                return;
            }
        }

        let id = Self::push(nodes, NodeData::Text(text.to_string()));
        Self::append_node(nodes, parent, id);
    }

    /// Converts the first element below the document node
    fn into_root(self) -> Option<XmlElement> {
        let nodes = self.nodes.into_inner();

        nodes[DOCUMENT]
            .children
            .iter()
            .find_map(|&child| Self::convert(&nodes, child))
    }

    fn convert(nodes: &[Node], id: usize) -> Option<XmlElement> {
        let NodeData::Element { name, attrs } = &nodes[id].data else {
            return None;
        };

        let mut element = XmlElement::new(name.local.to_string());
        if !name.ns.is_empty() {
            element.namespace = Some(name.ns.to_string());
        }

        for attr in attrs {
            let key = match &attr.name.prefix {
                Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                None => attr.name.local.to_string(),
            };
            element.attributes.insert(key, attr.value.to_string());
        }

        for &child in &nodes[id].children {
            match &nodes[child].data {
                NodeData::Element { .. } => {
                    if let Some(child) = Self::convert(nodes, child) {
                        element.children.push(XmlNode::Element(child));
                    }
                }
                NodeData::Text(text) => element.push_text(text, true),
                NodeData::Comment(comment) => element.children.push(XmlNode::Comment(comment.clone())),
                NodeData::Document | NodeData::Ignored => {}
            }
        }

        Some(element)
    }
}

impl TreeSink for DocumentSink {
    type Handle = usize;
    type Output = Self;
    type ElemName<'a>
        = ElementName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!("HTML parse error: {}", msg);
    }

    fn get_document(&self) -> Self::Handle {
        DOCUMENT
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        match self.nodes.borrow().get(*target).map(|node| &node.data) {
            Some(NodeData::Element { name, .. }) => ElementName(name.clone()),
            _ => ElementName(QualName::new(None, ns!(), local_name!(""))),
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        Self::push(&mut self.nodes.borrow_mut(), NodeData::Element { name, attrs })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Self::push(&mut self.nodes.borrow_mut(), NodeData::Comment(text.to_string()))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Self::push(&mut self.nodes.borrow_mut(), NodeData::Ignored)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut nodes = self.nodes.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => Self::append_node(&mut nodes, *parent, node),
            NodeOrText::AppendText(text) => Self::append_text(&mut nodes, *parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self
            .nodes
            .borrow()
            .get(*element)
            .is_some_and(|node| node.parent.is_some());

        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut nodes = self.nodes.borrow_mut();
        let Some(parent) = nodes.get(*sibling).and_then(|node| node.parent) else {
            return;
        };

        let node = match new_node {
            NodeOrText::AppendNode(node) => {
                Self::detach(&mut nodes, node);
                node
            }
            NodeOrText::AppendText(text) => {
                let position = nodes[parent].children.iter().position(|c| c == sibling);
                let previous = position
                    .and_then(|position| position.checked_sub(1))
                    .map(|position| nodes[parent].children[position]);
                if let Some(previous) = previous {
                    if let NodeData::Text(existing) = &mut nodes[previous].data {
                        existing.push_str(&text);
                        return;
                    }
                }

                Self::push(&mut nodes, NodeData::Text(text.to_string()))
            }
        };

        let Some(position) = nodes[parent].children.iter().position(|c| c == sibling) else {
            return;
        };
        nodes[parent].children.insert(position, node);
        nodes[node].parent = Some(parent);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(NodeData::Element {
            attrs: existing, ..
        }) = nodes.get_mut(*target).map(|node| &mut node.data)
        {
            for attr in attrs {
                if !existing.iter().any(|current| current.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        Self::detach(&mut self.nodes.borrow_mut(), *target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut nodes = self.nodes.borrow_mut();
        let children = std::mem::take(&mut nodes[*node].children);
        for child in children {
            nodes[child].parent = Some(*new_parent);
            nodes[*new_parent].children.push(child);
        }
    }
}
