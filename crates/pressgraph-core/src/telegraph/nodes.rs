use std::collections::{BTreeMap, HashMap, HashSet};

use ego_tree::NodeRef;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

/// Tags the publishing API accepts.
const ALLOWED_TAGS: &[&str] = &[
    "a", "aside", "b", "blockquote", "br", "code", "em", "figcaption", "figure", "h3", "h4", "hr",
    "i", "iframe", "img", "li", "ol", "p", "pre", "s", "strong", "u", "ul", "video",
];

/// The single attribute carried through for each tag that has one.
const TAG_ATTRS: &[(&str, &str)] = &[("a", "href"), ("img", "src"), ("iframe", "src"), ("video", "src")];

/// Class names that substitute the element's effective tag.
const CLASS_TAGS: &[(&str, &str)] = &[("wp-caption-text", "figcaption")];

/// Characters left unescaped in attribute URL values, on top of the
/// characters percent-encoding never escapes (`A-Za-z0-9 _ . - ~`).
const ATTR_URL_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/')
    .remove(b':')
    .remove(b'?')
    .remove(b'=')
    .remove(b'&')
    .remove(b'%')
    .remove(b'#')
    .remove(b'@')
    .remove(b'+')
    .remove(b'!')
    .remove(b',')
    .remove(b';');

/// One node of the restricted content tree consumed by the publishing API.
///
/// Text leaves serialize as bare JSON strings, elements as
/// `{"tag": ..., "attrs": {...}?, "children": [...]?}` with the optional
/// fields absent (not empty) when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentNode {
    Text(String),
    Element(NodeElement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeElement {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ContentNode>>,
}

impl ContentNode {
    pub fn text(value: impl Into<String>) -> Self {
        ContentNode::Text(value.into())
    }
}

/// The converter's rule set: allowed tags, per-tag attribute allow-list and
/// class-to-tag remapping. Immutable once built; `Default` carries the
/// publishing API's rules.
#[derive(Debug, Clone)]
pub struct ConvertRules {
    allowed_tags: HashSet<String>,
    tag_attrs: HashMap<String, String>,
    class_tags: HashMap<String, String>,
}

impl Default for ConvertRules {
    fn default() -> Self {
        Self {
            allowed_tags: ALLOWED_TAGS.iter().map(|t| t.to_string()).collect(),
            tag_attrs: TAG_ATTRS
                .iter()
                .map(|(tag, attr)| (tag.to_string(), attr.to_string()))
                .collect(),
            class_tags: CLASS_TAGS
                .iter()
                .map(|(class, tag)| (class.to_string(), tag.to_string()))
                .collect(),
        }
    }
}

impl ConvertRules {
    fn is_allowed(&self, tag: &str) -> bool {
        self.allowed_tags.contains(tag)
    }

    fn attr_for(&self, tag: &str) -> Option<&str> {
        self.tag_attrs.get(tag).map(String::as_str)
    }

    fn remap_class(&self, class: &str) -> Option<&str> {
        self.class_tags.get(class).map(String::as_str)
    }
}

/// Convert an HTML fragment into the flat ordered node sequence the
/// publishing API accepts.
///
/// Grouping `div`s and elements with disallowed tags dissolve: their
/// converted children are spliced into the parent's position, so the result
/// is a sequence, never a single implicit root. Unparseable input degrades
/// to whatever the parser recovers; this function does not fail.
pub fn html_to_nodes(html: &str, rules: &ConvertRules) -> Vec<ContentNode> {
    let fragment = Html::parse_fragment(html);
    let mut out = Vec::new();
    for child in fragment.root_element().children() {
        visit_node(child, rules, &mut out);
    }
    out
}

fn visit_node(node: NodeRef<'_, Node>, rules: &ConvertRules, out: &mut Vec<ContentNode>) {
    match node.value() {
        Node::Text(text) => {
            // Non-breaking spaces count as whitespace; interior ones are
            // normalized to plain spaces.
            let text = text.replace('\u{a0}', " ");
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(ContentNode::text(trimmed));
            }
        }
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, rules, out);
            }
        }
        _ => {}
    }
}

fn visit_element(element: ElementRef<'_>, rules: &ConvertRules, out: &mut Vec<ContentNode>) {
    let name = element.value().name().to_ascii_lowercase();

    // Paragraphs with no visible text (a lone &nbsp; included) are dropped.
    if name == "p" && !has_visible_text(element) {
        return;
    }

    // Grouping divs never become nodes; children splice into the parent.
    if name == "div" {
        visit_children(element, rules, out);
        return;
    }

    // A recognized class substitutes the effective tag before the
    // allow-list check.
    let mut tag = name.as_str();
    for class in element.value().classes() {
        if let Some(mapped) = rules.remap_class(class) {
            tag = mapped;
        }
    }

    // Disallowed tags dissolve the same way divs do. Children were going to
    // be converted anyway, so dissolution cascades naturally.
    if !rules.is_allowed(tag) {
        visit_children(element, rules, out);
        return;
    }

    let attrs = rules.attr_for(tag).and_then(|attr_name| {
        element.value().attr(attr_name).map(|value| {
            let escaped = utf8_percent_encode(value, ATTR_URL_ESCAPE).to_string();
            BTreeMap::from([(attr_name.to_string(), escaped)])
        })
    });

    let mut children = Vec::new();
    visit_children(element, rules, &mut children);

    out.push(ContentNode::Element(NodeElement {
        tag: tag.to_string(),
        attrs,
        children: if children.is_empty() { None } else { Some(children) },
    }));
}

fn visit_children(element: ElementRef<'_>, rules: &ConvertRules, out: &mut Vec<ContentNode>) {
    for child in element.children() {
        visit_node(child, rules, out);
    }
}

fn has_visible_text(element: ElementRef<'_>) -> bool {
    element.text().any(|text| !text.trim().is_empty())
}
