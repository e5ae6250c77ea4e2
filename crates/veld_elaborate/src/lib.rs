//! Elaboration and simplification core of the Veld HDL frontend.
//!
//! The entry point is [`Elaborator::elaborate_module`], which takes a
//! freshly parsed module AST and rewrites it in place into a canonical,
//! fully-elaborated form: parameters folded, generate constructs
//! unrolled, functions and tasks inlined, memories either lowered to
//! register arrays or given explicit read/write ports, dynamic
//! bit-select lvalues case-expanded, and assertions lowered to their
//! two-wire form.
//!
//! The rewrite itself is [`simplify`](simplify::simplify): a recursive
//! pass over the shared AST, driven to a fixed point at each of three
//! stages. See the module docs of [`simplify`] for the orchestration.

#![warn(missing_docs)]

pub mod const_func;
pub mod context;
pub mod errors;
pub mod fold;
pub mod generate;
pub mod inline;
pub mod lower;
pub mod mem2reg;
pub mod scope;
pub mod simplify;
pub mod width;

pub use context::{ElabContext, ElabOptions, Elaborator};
pub use errors::{ElabError, ElabResult};
pub use simplify::{simplify, SimplifyArgs, Stage};
