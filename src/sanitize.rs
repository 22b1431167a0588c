//! Markup cleaning for chapter documents
//!
//! [SanitizeOptions] describes which kinds of content to strip from a chapter.
//! Elements are either *killed* (removed together with their content) or
//! *unwrapped* (the tag is removed, its content takes its place).

use serde::{Deserialize, Serialize};

use crate::{
    error::EpubError,
    utils::{XmlElement, XmlNode},
};

const SCRIPT_TAGS: [&str; 2] = ["script", "noscript"];
const EMBEDDED_TAGS: [&str; 4] = ["object", "embed", "applet", "param"];
const FRAME_TAGS: [&str; 4] = ["frame", "frameset", "iframe", "noframes"];
const FORM_CONTROL_TAGS: [&str; 5] = ["input", "button", "select", "textarea", "option"];

/// Attributes whose value is a URL that may carry a `javascript:` scheme
const URL_ATTRIBUTES: [&str; 5] = ["href", "xlink:href", "src", "action", "formaction"];

/// What to strip from chapter markup
///
/// Every field has a default, so a partial JSON object is a valid configuration:
///
/// ```rust
/// # use epub_extract::sanitize::SanitizeOptions;
/// let options = SanitizeOptions::from_json(r#"{ "style": true, "kill_tags": ["aside"] }"#).unwrap();
/// assert!(options.style);
/// assert!(options.scripts);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Remove `script` and `noscript` elements
    pub scripts: bool,

    /// Remove `on*` event handler attributes and `javascript:` links
    pub javascript: bool,

    pub comments: bool,

    /// Remove `style` elements and `style` attributes
    pub style: bool,

    /// Remove `link` elements
    pub links: bool,

    /// Remove `meta` elements
    pub meta: bool,

    /// Remove `object`, `embed`, `applet` and `param` elements
    pub embedded: bool,

    /// Remove `frame`, `frameset`, `iframe` and `noframes` elements
    pub frames: bool,

    /// Remove form controls and unwrap `form` elements
    pub forms: bool,

    /// Elements removed together with their content
    pub kill_tags: Vec<String>,

    /// Elements replaced by their content
    pub remove_tags: Vec<String>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            scripts: true,
            javascript: true,
            comments: true,
            style: false,
            links: true,
            meta: true,
            embedded: true,
            frames: true,
            forms: true,
            kill_tags: Vec::new(),
            remove_tags: Vec::new(),
        }
    }
}

enum Action {
    Keep,
    Kill,
    Unwrap,
}

impl SanitizeOptions {
    /// Names accepted by [SanitizeOptions::set]
    pub const OPTION_NAMES: [&str; 9] = [
        "scripts",
        "javascript",
        "comments",
        "style",
        "links",
        "meta",
        "embedded",
        "frames",
        "forms",
    ];

    /// Loads options from a JSON object; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, EpubError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets a boolean toggle by name
    pub fn set(&mut self, name: &str, value: bool) -> Result<(), EpubError> {
        let toggle = match name {
            "scripts" => &mut self.scripts,
            "javascript" => &mut self.javascript,
            "comments" => &mut self.comments,
            "style" => &mut self.style,
            "links" => &mut self.links,
            "meta" => &mut self.meta,
            "embedded" => &mut self.embedded,
            "frames" => &mut self.frames,
            "forms" => &mut self.forms,
            _ => {
                return Err(EpubError::UnknownSanitizeOption {
                    name: name.to_string(),
                });
            }
        };

        *toggle = value;
        Ok(())
    }

    /// Applies a `name=value` toggle, e.g. `style=true`
    ///
    /// Accepts `true`/`false`, `yes`/`no`, `on`/`off` and `1`/`0`. A bare name
    /// enables the toggle.
    pub fn apply(&mut self, toggle: &str) -> Result<(), EpubError> {
        let (name, value) = match toggle.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (toggle.trim(), "true"),
        };

        let value = match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => {
                return Err(EpubError::InvalidSanitizeValue {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        };

        self.set(name, value)
    }

    /// Cleans `root` in place
    ///
    /// The root element itself is never removed, only its descendants and attributes.
    pub fn sanitize(&self, root: &mut XmlElement) {
        self.clean_attributes(root);

        let children = std::mem::take(&mut root.children);
        root.children = self.clean_nodes(children);
    }

    fn clean_nodes(&self, nodes: Vec<XmlNode>) -> Vec<XmlNode> {
        let mut result = Vec::with_capacity(nodes.len());

        for node in nodes {
            match node {
                XmlNode::Comment(_) if self.comments => {}
                XmlNode::Element(mut element) => match self.action_for(&element) {
                    Action::Kill => {}
                    Action::Unwrap => {
                        result.extend(self.clean_nodes(element.children));
                    }
                    Action::Keep => {
                        self.sanitize(&mut element);
                        result.push(XmlNode::Element(element));
                    }
                },
                node => result.push(node),
            }
        }

        result
    }

    fn action_for(&self, element: &XmlElement) -> Action {
        let name = element.tag_name().to_ascii_lowercase();
        let is_any = |tags: &[&str]| tags.iter().any(|tag| *tag == name);

        if self.kill_tags.iter().any(|tag| tag.eq_ignore_ascii_case(&name)) {
            return Action::Kill;
        }
        if self.remove_tags.iter().any(|tag| tag.eq_ignore_ascii_case(&name)) {
            return Action::Unwrap;
        }

        if (self.scripts && is_any(&SCRIPT_TAGS))
            || (self.style && name == "style")
            || (self.links && name == "link")
            || (self.meta && name == "meta")
            || (self.embedded && is_any(&EMBEDDED_TAGS))
            || (self.frames && is_any(&FRAME_TAGS))
            || (self.forms && is_any(&FORM_CONTROL_TAGS))
        {
            return Action::Kill;
        }

        if self.forms && name == "form" {
            return Action::Unwrap;
        }

        Action::Keep
    }

    fn clean_attributes(&self, element: &mut XmlElement) {
        element.attributes.retain(|key, value| {
            let key = key.to_ascii_lowercase();

            if self.style && key == "style" {
                return false;
            }

            if self.javascript {
                if key.starts_with("on") {
                    return false;
                }
                if URL_ATTRIBUTES.contains(&key.as_str())
                    && value
                        .trim_start()
                        .to_ascii_lowercase()
                        .starts_with("javascript:")
                {
                    return false;
                }
            }

            true
        });
    }
}
