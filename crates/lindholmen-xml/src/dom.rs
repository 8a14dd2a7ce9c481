#![forbid(unsafe_code)]

//! Element lookup helpers over `roxmltree`.

use roxmltree::{Document, Node};

/// True if `node` is an element named `local_name` in namespace `ns`.
pub fn is_element(node: &Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// Find the first descendant element with the given name.
pub fn find_element<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    doc.descendants().find(|n| is_element(n, ns, local_name))
}

/// Find all descendant elements with the given name, in document order.
pub fn find_elements<'a, 'input>(
    doc: &'a Document<'input>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'input>> {
    doc.descendants()
        .filter(|n| is_element(n, ns, local_name))
        .collect()
}

/// Find the first child element with the given name.
pub fn find_child_element<'a, 'input>(
    parent: Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    parent.children().find(|n| is_element(n, ns, local_name))
}

/// Find all child elements with the given name.
pub fn find_child_elements<'a, 'input>(
    parent: Node<'a, 'input>,
    ns: &str,
    local_name: &str,
) -> Vec<Node<'a, 'input>> {
    parent
        .children()
        .filter(|n| is_element(n, ns, local_name))
        .collect()
}

/// Iterate over the child elements of `parent`.
pub fn child_elements<'a, 'input: 'a>(
    parent: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    parent.children().filter(|n| n.is_element())
}

/// The first child element whose local name is `local_name`, whatever its
/// namespace.
pub fn first_child_element_any_ns<'a, 'input>(
    parent: Node<'a, 'input>,
    local_name: &str,
) -> Option<Node<'a, 'input>> {
    parent
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == local_name)
}

/// True if `node` is an element with local name `local_name` in any of `namespaces`.
pub fn local_name_is(node: &Node<'_, '_>, namespaces: &[&str], local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && namespaces.contains(&node.tag_name().namespace().unwrap_or(""))
}

/// Trimmed text content of an element's first text child.
pub fn element_text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or("")
}

/// The qualified name (`prefix:local` or `local`) of an element as written
/// in the source text.
pub fn qualified_name<'a>(node: Node<'a, '_>) -> &'a str {
    let input: &'a str = node.document().input_text();
    let start = node.range().start + 1;
    match input.get(start..) {
        Some(rest) => {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
                .unwrap_or(rest.len());
            &rest[..end]
        }
        None => node.tag_name().name(),
    }
}

/// The prefix of an element as written, `""` for an unprefixed name.
pub fn element_prefix<'a>(node: Node<'a, '_>) -> &'a str {
    match qualified_name(node).split_once(':') {
        Some((prefix, _)) => prefix,
        None => "",
    }
}

/// The source text of an element, start tag through end tag.
pub fn source_text<'a>(node: Node<'a, '_>) -> &'a str {
    let input: &'a str = node.document().input_text();
    input.get(node.range()).unwrap_or("")
}
