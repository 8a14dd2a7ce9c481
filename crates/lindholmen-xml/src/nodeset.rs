#![forbid(unsafe_code)]

//! Node sets for document-subset canonicalization.
//!
//! A [`NodeSet`] names the nodes of one parsed document that take part in a
//! canonicalization. Attributes and namespace declarations are not nodes in
//! `roxmltree`; they follow their element.

use roxmltree::{Node, NodeId, NodeType};
use std::collections::HashSet;

/// A set of nodes of a single document, identified by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// An empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, the root included.
    ///
    /// `URI=""` selects the document without comments.
    pub fn document(doc: &roxmltree::Document<'_>, with_comments: bool) -> Self {
        Self::tree(doc.root(), with_comments)
    }

    /// `node` and all of its descendants.
    pub fn tree(node: Node<'_, '_>, with_comments: bool) -> Self {
        let nodes = node
            .descendants()
            .filter(|n| with_comments || n.node_type() != NodeType::Comment)
            .map(|n| n.id())
            .collect();
        Self { nodes }
    }

    /// Remove `node` and its descendants from the set.
    pub fn without_subtree(mut self, node: Node<'_, '_>) -> Self {
        for n in node.descendants() {
            self.nodes.remove(&n.id());
        }
        self
    }

    /// Add a single node.
    pub fn insert(&mut self, node: Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    pub fn contains(&self, node: &Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<r><!-- c --><a><b/></a><s><t/></s></r>"#;

    #[test]
    fn test_document_comment_policy() {
        let doc = roxmltree::Document::parse(XML).unwrap();
        let with = NodeSet::document(&doc, true);
        let without = NodeSet::document(&doc, false);
        assert_eq!(with.len(), without.len() + 1);
        let comment = doc
            .descendants()
            .find(|n| n.node_type() == NodeType::Comment)
            .unwrap();
        assert!(with.contains(&comment));
        assert!(!without.contains(&comment));
    }

    #[test]
    fn test_tree_and_subtract() {
        let doc = roxmltree::Document::parse(XML).unwrap();
        let s = doc.descendants().find(|n| n.has_tag_name("s")).unwrap();
        let t = doc.descendants().find(|n| n.has_tag_name("t")).unwrap();
        let tree = NodeSet::tree(s, false);
        assert_eq!(tree.len(), 2);
        assert!(tree.contains(&t));

        let enveloped = NodeSet::document(&doc, false).without_subtree(s);
        assert!(!enveloped.contains(&s));
        assert!(!enveloped.contains(&t));
        assert!(enveloped.contains(&doc.root_element()));
    }
}
