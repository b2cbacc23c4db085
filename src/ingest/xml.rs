// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small recursive-descent helpers over a `roxmltree::Document`.
//!
//! `spec.md` §4.1 describes the parser as handing ingestion a tree of
//! `(tag, value_or_children)` nodes to descend deterministically;
//! `roxmltree` gives us exactly that tree without pulling in a second
//! XML stack, and these helpers are the thin layer that turns "missing
//! child" / "empty text" into a path-annotated `GenError::XmlSyntax`,
//! mirroring the two-level distinction `xtask::config` keeps between a
//! missing TOML section and a malformed value in it.

use roxmltree::{Document, Node};

use crate::error::GenError;

pub fn parse_document<'a>(path: &str, bytes: &'a [u8]) -> Result<Document<'a>, GenError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| GenError::xml(path, format!("not valid UTF-8: {e}")))?;
    Document::parse(text).map_err(|e| GenError::xml(path, format!("malformed XML: {e}")))
}

pub fn root<'a, 'input>(
    path: &str,
    doc: &'a Document<'input>,
    expected_tag: &str,
) -> Result<Node<'a, 'input>, GenError> {
    let root = doc.root_element();
    if root.tag_name().name() != expected_tag {
        return Err(GenError::xml(
            path,
            format!(
                "expected root element <{expected_tag}>, found <{}>",
                root.tag_name().name()
            ),
        ));
    }
    Ok(root)
}

/// The single required child named `tag`, or a "section missing" error.
pub fn require_child<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &str,
) -> Result<Node<'a, 'input>, GenError> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
        .ok_or_else(|| GenError::xml(path, format!("{tag} section is missing")))
}

/// Every element child named `tag`, in document order (used for `Process*`,
/// `Memory*`, `Thread*`, and the other repeated trunks).
pub fn children<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name() == tag)
        .collect()
}

/// All element children regardless of tag, used for raw attribute maps.
pub fn all_children<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    node.children().filter(|c| c.is_element()).collect()
}

/// Trimmed text content of a leaf element, or "value malformed" if empty.
pub fn text(node: Node, path: &str) -> Result<String, GenError> {
    let t = node.text().unwrap_or("").trim();
    if t.is_empty() {
        return Err(GenError::xml(path, "value is empty"));
    }
    Ok(t.to_string())
}

/// Trimmed text content of the required child named `tag`.
pub fn text_child(node: Node, tag: &str, path: &str) -> Result<String, GenError> {
    let child = require_child(node, tag, path)?;
    text(child, &format!("{path}.{tag}"))
}

/// Optional child text; returns `None` if the child is absent, still
/// errors if it's present but empty.
pub fn text_child_opt(node: Node, tag: &str, path: &str) -> Result<Option<String>, GenError> {
    match node
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
    {
        Some(child) => Ok(Some(text(child, &format!("{path}.{tag}"))?)),
        None => Ok(None),
    }
}
