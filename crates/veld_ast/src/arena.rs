//! Arena storage for AST nodes.

use crate::kind::AstKind;
use crate::node::AstNode;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use veld_common::{Ident, LogicVec};
use veld_source::Span;

/// Index of an [`AstNode`] within an [`AstArena`].
///
/// All structural references (child lists, resolved declarations, the
/// rewrite driver's cursors) are `NodeId`s. IDs are stable for the
/// lifetime of the arena; nodes unlinked from their parent simply
/// become unreachable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a `NodeId` from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Dense storage for one design's AST nodes.
///
/// Nodes are only ever appended; rewrites that "delete" a node unlink
/// it from its parent, and rewrites that replace a node in place
/// overwrite its slot via [`replace_with`](Self::replace_with) so that
/// every incoming `NodeId` keeps pointing at the updated node.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Allocates a node and returns its ID.
    pub fn alloc(&mut self, node: AstNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Returns the number of nodes ever allocated (including unlinked
    /// ones).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the arena contains no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a bare node of the given kind.
    pub fn node(&mut self, kind: AstKind, span: Span) -> NodeId {
        self.alloc(AstNode::new(kind, span))
    }

    /// Allocates a node with the given children.
    pub fn with_children(&mut self, kind: AstKind, span: Span, children: Vec<NodeId>) -> NodeId {
        let mut node = AstNode::new(kind, span);
        node.children = children;
        self.alloc(node)
    }

    /// Allocates an identifier node referencing `name`.
    pub fn ident(&mut self, name: Ident, span: Span) -> NodeId {
        let mut node = AstNode::new(AstKind::Identifier, span);
        node.name = Some(name);
        self.alloc(node)
    }

    /// Allocates an integer constant of the given width.
    pub fn const_int(&mut self, value: i64, signed: bool, width: u32, span: Span) -> NodeId {
        let mut node = AstNode::new(AstKind::Constant, span);
        node.bits = LogicVec::from_i64(value, width);
        node.integer = value;
        node.is_signed = signed;
        self.alloc(node)
    }

    /// Allocates a bit-precise constant.
    pub fn const_bits(&mut self, bits: LogicVec, signed: bool, span: Span) -> NodeId {
        let mut node = AstNode::new(AstKind::Constant, span);
        node.integer = bits.to_i64(signed).unwrap_or(0);
        node.bits = bits;
        node.is_signed = signed;
        self.alloc(node)
    }

    /// Allocates a string constant; the text is packed 8 bits per
    /// character, first character most significant.
    pub fn const_str(&mut self, text: &str, span: Span) -> NodeId {
        let id = self.const_bits(LogicVec::from_str_bytes(text), false, span);
        self[id].is_string = true;
        id
    }

    /// Allocates a string constant from an already-packed payload.
    pub fn const_str_bits(&mut self, bits: LogicVec, span: Span) -> NodeId {
        let id = self.const_bits(bits, false, span);
        self[id].is_string = true;
        id
    }

    /// Allocates a real-valued constant.
    pub fn real_value(&mut self, value: f64, span: Span) -> NodeId {
        let mut node = AstNode::new(AstKind::RealValue, span);
        node.real = value;
        self.alloc(node)
    }

    /// Deep-copies the subtree rooted at `root`, including attributes.
    ///
    /// Resolved-declaration references are copied as-is: a clone of a
    /// reference still points at the original declaration, exactly like
    /// the tree it was copied from.
    pub fn clone_subtree(&mut self, root: NodeId) -> NodeId {
        let mut copy = self[root].clone();
        copy.children = self[root]
            .children
            .clone()
            .into_iter()
            .map(|c| self.clone_subtree(c))
            .collect();
        copy.attributes = self[root]
            .attributes
            .clone()
            .into_iter()
            .map(|(k, v)| (k, self.clone_subtree(v)))
            .collect();
        self.alloc(copy)
    }

    /// Overwrites the node at `target` with the contents of
    /// `replacement`, keeping `target`'s ID and span.
    ///
    /// This is how a rewrite replaces a node "in place": the new subtree
    /// is built detached, then moved over the old slot so that the
    /// parent's child list and any other incoming references see the
    /// new node without being touched.
    pub fn replace_with(&mut self, target: NodeId, replacement: NodeId) {
        let span = self[target].span;
        let mut node = self[replacement].clone();
        node.span = span;
        self.nodes[target.0 as usize] = node;
    }

    /// Clears the fixed-point memo on the whole subtree rooted at `id`.
    pub fn clear_basic_prep(&mut self, id: NodeId) {
        self[id].basic_prep = false;
        for child in self[id].children.clone() {
            self.clear_basic_prep(child);
        }
    }

    /// Tests whether `needle` occurs in the subtree rooted at
    /// `haystack` (including the root itself).
    pub fn contains(&self, haystack: NodeId, needle: NodeId) -> bool {
        if haystack == needle {
            return true;
        }
        self[haystack]
            .children
            .iter()
            .any(|&c| self.contains(c, needle))
    }
}

impl Index<NodeId> for AstArena {
    type Output = AstNode;

    fn index(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }
}

impl IndexMut<NodeId> for AstArena {
    fn index_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_common::Interner;

    #[test]
    fn alloc_and_index() {
        let mut arena = AstArena::new();
        let id = arena.node(AstKind::Module, Span::DUMMY);
        assert_eq!(arena[id].kind, AstKind::Module);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn const_int_payload() {
        let mut arena = AstArena::new();
        let id = arena.const_int(10, true, 8, Span::DUMMY);
        assert_eq!(arena[id].integer, 10);
        assert_eq!(arena[id].bits.width(), 8);
        assert!(arena[id].is_signed);
        assert_eq!(format!("{}", arena[id].bits), "00001010");
    }

    #[test]
    fn const_str_payload() {
        let mut arena = AstArena::new();
        let id = arena.const_str("ok", Span::DUMMY);
        assert!(arena[id].is_string);
        assert_eq!(arena[id].bits.width(), 16);
    }

    #[test]
    fn clone_subtree_is_deep() {
        let mut arena = AstArena::new();
        let leaf = arena.const_int(1, false, 1, Span::DUMMY);
        let root = arena.with_children(AstKind::Range, Span::DUMMY, vec![leaf]);

        let copy = arena.clone_subtree(root);
        assert_ne!(copy, root);
        let copy_leaf = arena[copy].children[0];
        assert_ne!(copy_leaf, leaf);
        assert_eq!(arena[copy_leaf].integer, 1);

        // mutating the copy leaves the original alone
        arena[copy_leaf].integer = 99;
        assert_eq!(arena[leaf].integer, 1);
    }

    #[test]
    fn clone_subtree_copies_attributes() {
        let interner = Interner::new();
        let key = interner.intern("keep");
        let mut arena = AstArena::new();
        let value = arena.const_int(1, false, 1, Span::DUMMY);
        let root = arena.node(AstKind::Wire, Span::DUMMY);
        arena[root].attributes.insert(key, value);

        let copy = arena.clone_subtree(root);
        let copied_value = arena[copy].attributes[&key];
        assert_ne!(copied_value, value);
        assert_eq!(arena[copied_value].integer, 1);
    }

    #[test]
    fn replace_with_keeps_id_and_span() {
        let mut arena = AstArena::new();
        let file = veld_source::FileId::from_raw(0);
        let target = arena.node(AstKind::Add, Span::new(file, 5, 9));
        let replacement = arena.const_int(42, false, 32, Span::DUMMY);

        arena.replace_with(target, replacement);
        assert_eq!(arena[target].kind, AstKind::Constant);
        assert_eq!(arena[target].integer, 42);
        // span of the replaced node is retained
        assert_eq!(arena[target].span, Span::new(file, 5, 9));
    }

    #[test]
    fn contains_finds_descendants() {
        let mut arena = AstArena::new();
        let leaf = arena.node(AstKind::Identifier, Span::DUMMY);
        let mid = arena.with_children(AstKind::Range, Span::DUMMY, vec![leaf]);
        let root = arena.with_children(AstKind::Wire, Span::DUMMY, vec![mid]);
        let other = arena.node(AstKind::Wire, Span::DUMMY);

        assert!(arena.contains(root, leaf));
        assert!(arena.contains(root, root));
        assert!(!arena.contains(root, other));
    }

    #[test]
    fn clear_basic_prep_recurses() {
        let mut arena = AstArena::new();
        let leaf = arena.node(AstKind::Identifier, Span::DUMMY);
        let root = arena.with_children(AstKind::Block, Span::DUMMY, vec![leaf]);
        arena[leaf].basic_prep = true;
        arena[root].basic_prep = true;

        arena.clear_basic_prep(root);
        assert!(!arena[root].basic_prep);
        assert!(!arena[leaf].basic_prep);
    }

    #[test]
    fn serde_roundtrip() {
        let mut arena = AstArena::new();
        let c = arena.const_int(7, false, 4, Span::DUMMY);
        arena.with_children(AstKind::Range, Span::DUMMY, vec![c]);

        let json = serde_json::to_string(&arena).unwrap();
        let back: AstArena = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[c].integer, 7);
    }
}
