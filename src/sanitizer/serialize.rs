//! Serialization of a parsed fragment with pending edits applied.
//!
//! Cleanup passes never mutate the tree. They record node removals and
//! attribute overrides in [`Edits`], and the tree is written out once,
//! skipping removed subtrees.

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, node::Node};

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are written without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Removals and attribute overrides accumulated by the cleanup passes.
#[derive(Debug, Default)]
pub(crate) struct Edits {
    removed: HashSet<NodeId>,
    attrs: HashMap<NodeId, Vec<(String, String)>>,
}

impl Edits {
    pub(crate) fn remove(&mut self, id: NodeId) {
        self.removed.insert(id);
    }

    pub(crate) fn set_attr(&mut self, id: NodeId, name: &str, value: String) {
        let overrides = self.attrs.entry(id).or_default();
        overrides.retain(|(k, _)| k != name);
        overrides.push((name.to_string(), value));
    }

    /// Returns `true` if the node or any of its ancestors has been removed.
    pub(crate) fn is_removed(&self, node: NodeRef<'_, Node>) -> bool {
        self.removed.contains(&node.id())
            || node.ancestors().any(|a| self.removed.contains(&a.id()))
    }
}

/// Serialize the content of a fragment parsed with [`Html::parse_fragment`],
/// without the synthetic `<html>` wrapper the parser adds.
pub(crate) fn serialize_fragment(document: &Html, edits: &Edits) -> String {
    let mut out = String::new();
    for child in document.root_element().children() {
        serialize_node(child, edits, false, &mut out);
    }
    out
}

/// Serialize a single node (outer HTML) with the current edits applied.
pub(crate) fn serialize_outer(node: NodeRef<'_, Node>, edits: &Edits) -> String {
    let mut out = String::new();
    serialize_node(node, edits, false, &mut out);
    out
}

/// Concatenated text of a node, ignoring removed descendants.
pub(crate) fn text_content(node: NodeRef<'_, Node>, edits: &Edits) -> String {
    let mut out = String::new();
    collect_text(node, edits, &mut out);
    out
}

fn collect_text(node: NodeRef<'_, Node>, edits: &Edits, out: &mut String) {
    for child in node.children() {
        if edits.removed.contains(&child.id()) {
            continue;
        }
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => collect_text(child, edits, out),
            _ => {}
        }
    }
}

fn serialize_node(node: NodeRef<'_, Node>, edits: &Edits, raw_text: bool, out: &mut String) {
    let id = node.id();
    if edits.removed.contains(&id) {
        return;
    }

    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(child, edits, false, out);
            }
        }
        Node::Element(el) => {
            let tag = el.name();
            out.push('<');
            out.push_str(tag);

            let overrides = edits.attrs.get(&id);
            let mut attrs: Vec<(String, &str)> = el
                .attrs
                .iter()
                .map(|(name, value)| {
                    let key = match &name.prefix {
                        Some(prefix) => format!("{prefix}:{}", name.local),
                        None => name.local.to_string(),
                    };
                    let value = overrides
                        .and_then(|o| o.iter().find(|(k, _)| *k == key))
                        .map_or(&**value, |(_, v)| v.as_str());
                    (key, value)
                })
                .collect();
            attrs.sort_by(|a, b| a.0.cmp(&b.0));

            for (k, v) in attrs {
                out.push(' ');
                out.push_str(&k);
                out.push_str("=\"");
                escape_attr(v, out);
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in node.children() {
                serialize_node(child, edits, raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_text(text, out);
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        _ => {}
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

// An ampersand is escaped only where a parser would read a character
// reference, so query strings stay readable (`?x=1&token=T`).
fn escape_attr(value: &str, out: &mut String) {
    for (i, c) in value.char_indices() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' if starts_reference(&value[i + 1..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

/// Returns `true` if the text following an `&` inside an attribute value
/// would be decoded as a character reference.
fn starts_reference(rest: &str) -> bool {
    if rest.starts_with('#') {
        return true;
    }
    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    // `&name=` is never decoded in attribute values.
    name_len > 0 && !rest[name_len..].starts_with('=')
}
