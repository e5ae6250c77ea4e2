//! Shared foundational types for the Veld HDL elaborator.
//!
//! This crate provides interned identifiers, 4-state logic values, packed
//! logic vectors, the constant-operation library used by the constant
//! folder, and the common internal-error result type.

#![warn(missing_docs)]

pub mod const_ops;
pub mod ident;
pub mod logic;
pub mod logic_vec;
pub mod result;

pub use ident::{Ident, Interner};
pub use logic::Logic;
pub use logic_vec::LogicVec;
pub use result::{InternalError, VeldResult};
