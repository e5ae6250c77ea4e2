//! Interned identifiers for cheap cloning and O(1) equality comparison.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// A unique identifier for any named entity in a design.
///
/// Identifiers are interned strings represented as a `u32` index into a
/// string interner, giving O(1) equality comparison and O(1) cloning.
/// Synthesized names (`$genblock$…`, `$func$…`) are interned like any
/// other identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// Intended for deserialization and tests; normal code should go
    /// through [`Interner::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit
// and 64-bit platforms. `try_from_usize` rejects values that don't fit.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// String interner backed by [`lasso::ThreadedRodeo`].
///
/// All signal, parameter, function, cell, and attribute names are
/// interned here, including the names the elaborator synthesizes while
/// rewriting.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns a string, returning its [`Ident`].
    pub fn intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Interns the concatenation of an existing identifier and a suffix.
    ///
    /// Used by the renaming passes to build names like `mem[3]` or
    /// `blk[0].w` without allocating intermediate owned strings at every
    /// call site.
    pub fn suffixed(&self, base: Ident, suffix: &str) -> Ident {
        let joined = format!("{}{}", self.resolve(base), suffix);
        self.rodeo.get_or_intern(&joined)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_resolve_roundtrip() {
        let interner = Interner::new();
        let id = interner.intern("clk");
        assert_eq!(interner.resolve(id), "clk");
    }

    #[test]
    fn same_string_same_ident() {
        let interner = Interner::new();
        assert_eq!(interner.intern("data"), interner.intern("data"));
    }

    #[test]
    fn different_strings_different_idents() {
        let interner = Interner::new();
        assert_ne!(interner.intern("a"), interner.intern("b"));
    }

    #[test]
    fn suffixed_builds_joined_name() {
        let interner = Interner::new();
        let mem = interner.intern("mem");
        let elem = interner.suffixed(mem, "[3]");
        assert_eq!(interner.resolve(elem), "mem[3]");
        assert_eq!(elem, interner.intern("mem[3]"));
    }

    #[test]
    fn serde_roundtrip() {
        let id = Ident::from_raw(17);
        let json = serde_json::to_string(&id).unwrap();
        let back: Ident = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
