//! Uniform tagged AST node model for the Veld HDL elaborator.
//!
//! Every construct of the source language is an [`AstNode`]: a tag from
//! the closed [`AstKind`] set, an ordered child list, an attribute map,
//! and a handful of payload fields. Nodes live in an [`AstArena`] and
//! reference each other by [`NodeId`], so non-owning back-references
//! (resolved declarations, block cursors) are plain indices that stay
//! valid across in-place rewrites.

#![warn(missing_docs)]

pub mod arena;
pub mod kind;
pub mod node;

pub use arena::{AstArena, NodeId};
pub use kind::AstKind;
pub use node::AstNode;
