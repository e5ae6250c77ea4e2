//! The AST node struct and its payload accessors.

use crate::arena::NodeId;
use crate::kind::AstKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use veld_common::{const_ops, Ident, LogicVec};
use veld_source::Span;

/// A node of the design AST.
///
/// All constructs share this one struct; [`kind`](Self::kind)
/// discriminates and the remaining fields are payload, most of them
/// meaningful only for some kinds. Children are ordered and
/// position-significant (see [`AstKind`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AstNode {
    /// The node tag.
    pub kind: AstKind,
    /// Ordered child nodes, owned by this node.
    pub children: Vec<NodeId>,
    /// Attributes attached to the node, keyed by attribute name; the
    /// values are nodes (constants most commonly).
    pub attributes: BTreeMap<Ident, NodeId>,
    /// The node's textual identifier: signal name, function name,
    /// system call name (with `$` prefix), cell type.
    pub name: Option<Ident>,
    /// Integer view of a `Constant` payload (low 64 bits of `bits`).
    pub integer: i64,
    /// Bit-precise payload of a `Constant`.
    pub bits: LogicVec,
    /// Payload of a `RealValue`.
    pub real: f64,
    /// Signedness of a constant or declaration.
    pub is_signed: bool,
    /// Marks a constant that originated as a string literal.
    pub is_string: bool,
    /// Marks a `Wire` declared as a register.
    pub is_reg: bool,
    /// Marks a `Wire` declared as an input port.
    pub is_input: bool,
    /// Marks a `Wire` declared as an output port.
    pub is_output: bool,
    /// 1-based port position of a port wire, 0 for non-ports.
    pub port_id: u32,
    /// Set once the node's range children have folded to constants.
    pub range_valid: bool,
    /// Left (MSB) bound of a folded range.
    pub range_left: i64,
    /// Right (LSB) bound of a folded range.
    pub range_right: i64,
    /// Local fixed-point memo: set when a visit made no progress, and
    /// cleared by any structural mutation of the subtree.
    pub basic_prep: bool,
    /// The declaration this node resolved to by name lookup.
    pub decl: Option<NodeId>,
    /// Source origin for diagnostics and synthesized names.
    pub span: Span,
}

impl AstNode {
    /// Creates a bare node of the given kind.
    pub fn new(kind: AstKind, span: Span) -> Self {
        Self {
            kind,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            name: None,
            integer: 0,
            bits: LogicVec::new(0),
            real: 0.0,
            is_signed: false,
            is_string: false,
            is_reg: false,
            is_input: false,
            is_output: false,
            port_id: 0,
            range_valid: false,
            range_left: -1,
            range_right: 0,
            basic_prep: false,
            decl: None,
            span,
        }
    }

    /// Returns `true` for `Constant` and `RealValue` nodes.
    pub fn is_const(&self) -> bool {
        self.kind.is_const()
    }

    /// The width of the node's folded range, if valid.
    pub fn range_width(&self) -> Option<u32> {
        if self.range_valid {
            Some((self.range_left - self.range_right).unsigned_abs() as u32 + 1)
        } else {
            None
        }
    }

    /// The constant payload resized to `width`, extending with the
    /// constant's own signedness.
    pub fn bits_as_const(&self, width: u32) -> LogicVec {
        self.bits.extended(width, self.is_signed)
    }

    /// The value of a `Constant` or `RealValue` as a float.
    ///
    /// Constants are interpreted with the given signedness; undefined
    /// bits read as zero.
    pub fn as_real(&self, signed: bool) -> f64 {
        match self.kind {
            AstKind::RealValue => self.real,
            _ => const_ops::to_f64(&self.bits, signed),
        }
    }

    /// The truth value of a constant: any driven one bit, or a nonzero
    /// real.
    pub fn as_bool(&self) -> bool {
        match self.kind {
            AstKind::RealValue => self.real != 0.0,
            _ => self.bits.is_true(),
        }
    }

    /// Reads a boolean attribute: present and true.
    pub fn has_attribute(&self, name: Ident) -> bool {
        self.attributes.contains_key(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_common::Logic;

    #[test]
    fn new_node_defaults() {
        let n = AstNode::new(AstKind::Wire, Span::DUMMY);
        assert_eq!(n.kind, AstKind::Wire);
        assert!(n.children.is_empty());
        assert!(!n.range_valid);
        assert!(n.decl.is_none());
        assert_eq!(n.port_id, 0);
    }

    #[test]
    fn range_width() {
        let mut n = AstNode::new(AstKind::Wire, Span::DUMMY);
        assert_eq!(n.range_width(), None);
        n.range_valid = true;
        n.range_left = 7;
        n.range_right = 0;
        assert_eq!(n.range_width(), Some(8));
        n.range_left = 0;
        n.range_right = 0;
        assert_eq!(n.range_width(), Some(1));
    }

    #[test]
    fn as_real_constant() {
        let mut n = AstNode::new(AstKind::Constant, Span::DUMMY);
        n.bits = LogicVec::from_i64(-3, 8);
        n.is_signed = true;
        assert_eq!(n.as_real(true), -3.0);
        assert_eq!(n.as_real(false), 253.0);
    }

    #[test]
    fn as_real_realvalue() {
        let mut n = AstNode::new(AstKind::RealValue, Span::DUMMY);
        n.real = 2.5;
        assert_eq!(n.as_real(true), 2.5);
    }

    #[test]
    fn as_bool() {
        let mut n = AstNode::new(AstKind::Constant, Span::DUMMY);
        n.bits = LogicVec::from_binary_str("0x0").unwrap();
        assert!(!n.as_bool());
        n.bits.set(1, Logic::One);
        assert!(n.as_bool());
    }
}
