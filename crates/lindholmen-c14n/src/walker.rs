#![forbid(unsafe_code)]

//! The canonicalization walker shared by all six variants.
//!
//! The variants differ only in which namespace declarations reach a start
//! tag and in how `xml:*` attributes of omitted ancestors are inherited:
//!
//! | variant   | namespaces emitted                      | `xml:*` inheritance      |
//! |-----------|-----------------------------------------|--------------------------|
//! | C14N 1.0  | every in-scope binding not yet rendered | all `xml:*` attributes   |
//! | C14N 1.1  | every in-scope binding not yet rendered | all except `xml:id`      |
//! | exclusive | visibly utilized bindings + PrefixList  | none                     |

use crate::escape;
use crate::render::{Attr, NsDecl};
use crate::C14nMode;
use lindholmen_core::ns;
use lindholmen_xml::dom;
use lindholmen_xml::NodeSet;
use roxmltree::{Node, NodeType};
use std::collections::{BTreeMap, HashSet};

type Bindings = BTreeMap<String, String>;

pub(crate) struct Walker<'s> {
    mode: C14nMode,
    node_set: Option<&'s NodeSet>,
    inclusive_prefixes: HashSet<String>,
    out: Vec<u8>,
}

impl<'s> Walker<'s> {
    pub(crate) fn new(mode: C14nMode, node_set: Option<&'s NodeSet>, prefixes: &[String]) -> Self {
        let inclusive_prefixes = prefixes
            .iter()
            .map(|p| if p == "#default" { String::new() } else { p.clone() })
            .collect();
        Self {
            mode,
            node_set,
            inclusive_prefixes,
            out: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, start: Node<'_, '_>) -> Vec<u8> {
        self.process(start, &Bindings::new());
        self.out
    }

    fn is_visible(&self, node: &Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |set| set.contains(node))
    }

    fn process(&mut self, node: Node<'_, '_>, rendered: &Bindings) {
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.process(child, rendered);
                }
            }
            NodeType::Element => self.process_element(node, rendered),
            NodeType::Text => {
                if self.is_visible(&node) {
                    escape::write_text(&mut self.out, node.text().unwrap_or(""));
                }
            }
            NodeType::Comment => {
                if self.mode.with_comments() && self.is_visible(&node) {
                    self.top_level_break_before(&node);
                    self.out.extend_from_slice(b"<!--");
                    self.out.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    self.out.extend_from_slice(b"-->");
                    self.top_level_break_after(&node);
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi().filter(|_| self.is_visible(&node)) {
                    self.top_level_break_before(&node);
                    self.out.extend_from_slice(b"<?");
                    self.out.extend_from_slice(pi.target.as_bytes());
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        self.out.push(b' ');
                        escape::write_pi(&mut self.out, value);
                    }
                    self.out.extend_from_slice(b"?>");
                    self.top_level_break_after(&node);
                }
            }
        }
    }

    // Comments and PIs outside the document element are separated from it
    // by a line feed.
    fn top_level_break_before(&mut self, node: &Node<'_, '_>) {
        if is_top_level(node) && node.prev_siblings().any(|s| s.is_element()) {
            self.out.push(b'\n');
        }
    }

    fn top_level_break_after(&mut self, node: &Node<'_, '_>) {
        if is_top_level(node) && node.next_siblings().any(|s| s.is_element()) {
            self.out.push(b'\n');
        }
    }

    fn process_element(&mut self, node: Node<'_, '_>, rendered: &Bindings) {
        if !self.is_visible(&node) {
            for child in node.children() {
                self.process(child, rendered);
            }
            return;
        }

        let in_scope = in_scope_namespaces(&node);
        let mut decls = if self.mode.is_exclusive() {
            self.utilized_declarations(&node, &in_scope, rendered)
        } else {
            inclusive_declarations(&in_scope, rendered)
        };
        decls.sort();

        let mut attrs: Vec<Attr> = node.attributes().map(|a| attribute(&node, &a)).collect();
        if !self.mode.is_exclusive() && self.node_set.is_some() && self.parent_omitted(&node) {
            let inherited = self.inherited_xml_attrs(&node, &attrs);
            attrs.extend(inherited);
        }
        attrs.sort();

        let name = dom::qualified_name(node);
        self.out.push(b'<');
        self.out.extend_from_slice(name.as_bytes());
        for decl in &decls {
            decl.write_into(&mut self.out);
        }
        for attr in &attrs {
            attr.write_into(&mut self.out);
        }
        self.out.push(b'>');

        let mut child_rendered = rendered.clone();
        for decl in decls {
            child_rendered.insert(decl.prefix, decl.uri);
        }
        for child in node.children() {
            self.process(child, &child_rendered);
        }

        self.out.extend_from_slice(b"</");
        self.out.extend_from_slice(name.as_bytes());
        self.out.push(b'>');
    }

    fn utilized_declarations(
        &self,
        node: &Node<'_, '_>,
        in_scope: &Bindings,
        rendered: &Bindings,
    ) -> Vec<NsDecl> {
        let mut utilized: HashSet<String> = self.inclusive_prefixes.clone();
        utilized.insert(dom::element_prefix(*node).to_owned());
        for attr in node.attributes() {
            if let Some(prefix) = attribute_prefix(node, &attr) {
                utilized.insert(prefix.to_owned());
            }
        }

        let mut decls = Vec::new();
        for prefix in utilized {
            if prefix == "xml" {
                continue;
            }
            match in_scope.get(&prefix) {
                Some(uri) if rendered.get(&prefix) != Some(uri) => decls.push(NsDecl {
                    prefix,
                    uri: uri.clone(),
                }),
                None if prefix.is_empty() && default_is_set(rendered) => decls.push(NsDecl {
                    prefix,
                    uri: String::new(),
                }),
                _ => {}
            }
        }
        decls
    }

    fn parent_omitted(&self, node: &Node<'_, '_>) -> bool {
        node.parent()
            .map_or(true, |p| !p.is_element() || !self.is_visible(&p))
    }

    // Nearest ancestor value wins; attributes already on the element stay.
    fn inherited_xml_attrs(&self, node: &Node<'_, '_>, own: &[Attr]) -> Vec<Attr> {
        let mut inherited: BTreeMap<String, String> = BTreeMap::new();
        for ancestor in node.ancestors().skip(1).filter(|n| n.is_element()) {
            for attr in ancestor.attributes() {
                if attr.namespace() != Some(ns::XML) {
                    continue;
                }
                if self.mode.is_version_11() && attr.name() == "id" {
                    continue;
                }
                inherited
                    .entry(attr.name().to_owned())
                    .or_insert_with(|| attr.value().to_owned());
            }
        }
        inherited
            .into_iter()
            .filter(|(name, _)| {
                !own.iter()
                    .any(|a| a.ns_uri == ns::XML && a.local_name == *name)
            })
            .map(|(name, value)| Attr {
                ns_uri: ns::XML.to_owned(),
                qualified_name: format!("xml:{name}"),
                local_name: name,
                value,
            })
            .collect()
    }
}

fn is_top_level(node: &Node<'_, '_>) -> bool {
    node.parent()
        .is_some_and(|p| p.node_type() == NodeType::Root)
}

fn default_is_set(rendered: &Bindings) -> bool {
    rendered.get("").is_some_and(|uri| !uri.is_empty())
}

fn inclusive_declarations(in_scope: &Bindings, rendered: &Bindings) -> Vec<NsDecl> {
    let mut decls: Vec<NsDecl> = in_scope
        .iter()
        .filter(|(prefix, uri)| rendered.get(*prefix) != Some(*uri))
        .map(|(prefix, uri)| NsDecl {
            prefix: prefix.clone(),
            uri: uri.clone(),
        })
        .collect();
    if !in_scope.contains_key("") && default_is_set(rendered) {
        decls.push(NsDecl {
            prefix: String::new(),
            uri: String::new(),
        });
    }
    decls
}

/// In-scope namespace bindings of an element, `xml` excluded, default as `""`.
fn in_scope_namespaces(node: &Node<'_, '_>) -> Bindings {
    node.namespaces()
        .filter(|ns| !ns.uri().is_empty() && ns.name() != Some("xml"))
        .map(|ns| (ns.name().unwrap_or("").to_owned(), ns.uri().to_owned()))
        .collect()
}

fn attribute_prefix<'a>(node: &Node<'a, '_>, attr: &roxmltree::Attribute<'a, '_>) -> Option<&'a str> {
    let uri = attr.namespace()?;
    if uri == ns::XML {
        return Some("xml");
    }
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name())
}

fn attribute(node: &Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> Attr {
    let local_name = attr.name().to_owned();
    let qualified_name = match attribute_prefix(node, attr) {
        Some(prefix) => format!("{prefix}:{local_name}"),
        None => local_name.clone(),
    };
    Attr {
        ns_uri: attr.namespace().unwrap_or("").to_owned(),
        local_name,
        qualified_name,
        value: attr.value().to_owned(),
    }
}
