#![forbid(unsafe_code)]

//! Same-document URI references and the XPointer forms used by XML-DSig.
//!
//! Supported shapes:
//! - `#id`: bare-name fragment
//! - `#xpointer(/)`: the whole document, comments kept
//! - `#xpointer(id('id'))`: the element carrying `id`, comments kept

/// An XPointer expression understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPointer<'a> {
    Root,
    Id(&'a str),
}

/// Parse a bare-name same-document reference (`#foo` → `foo`).
///
/// XPointer fragments are not bare names and yield `None`.
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    let fragment = uri.strip_prefix('#')?;
    if fragment.is_empty() || fragment.starts_with("xpointer(") {
        return None;
    }
    Some(fragment)
}

/// True if the URI is a `#xpointer(...)` fragment.
pub fn is_xpointer(uri: &str) -> bool {
    uri.starts_with("#xpointer(")
}

/// Parse `#xpointer(/)` or `#xpointer(id('...'))` (either quote style).
pub fn parse_xpointer(uri: &str) -> Option<XPointer<'_>> {
    let expr = uri.strip_prefix('#')?.trim();
    if expr == "xpointer(/)" {
        return Some(XPointer::Root);
    }
    let inner = expr.strip_prefix("xpointer(id(")?.strip_suffix("))")?;
    let id = inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
    if id.is_empty() {
        None
    } else {
        Some(XPointer::Id(id))
    }
}

/// The id targeted by a URI, whether bare-name or `xpointer(id(..))`.
pub fn target_id(uri: &str) -> Option<&str> {
    match parse_xpointer(uri) {
        Some(XPointer::Id(id)) => Some(id),
        Some(XPointer::Root) => None,
        None => parse_same_document_ref(uri),
    }
}

/// Check if `ancestor` is an ancestor-or-self of `node`.
pub fn is_ancestor_or_self(
    ancestor: roxmltree::Node<'_, '_>,
    node: roxmltree::Node<'_, '_>,
) -> bool {
    node.ancestors().any(|n| n.id() == ancestor.id())
}
