//! Elaborator entry point and per-module rewrite state.

use std::collections::HashMap;

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, Interner};
use veld_diagnostics::DiagnosticSink;
use veld_source::{SourceDb, Span};

use crate::errors::{self, ElabResult};
use crate::mem2reg;
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// Global switches affecting elaboration.
#[derive(Clone, Copy, Default)]
pub struct ElabOptions {
    /// Demote every memory to registers, as if every memory carried the
    /// `mem2reg` attribute.
    pub mem2reg_all: bool,
    /// Never demote memories, overriding all triggers.
    pub no_mem2reg: bool,
}

/// The elaboration driver.
///
/// One `Elaborator` serves a whole run; the unique-name counter it
/// carries increases monotonically across all modules it elaborates, so
/// synthesized names never collide between modules.
pub struct Elaborator<'a> {
    interner: &'a Interner,
    source_db: &'a SourceDb,
    sink: &'a DiagnosticSink,
    options: ElabOptions,
    autoidx: u32,
}

impl<'a> Elaborator<'a> {
    /// Creates an elaborator with default options.
    pub fn new(interner: &'a Interner, source_db: &'a SourceDb, sink: &'a DiagnosticSink) -> Self {
        Self::with_options(interner, source_db, sink, ElabOptions::default())
    }

    /// Creates an elaborator with the given options.
    pub fn with_options(
        interner: &'a Interner,
        source_db: &'a SourceDb,
        sink: &'a DiagnosticSink,
        options: ElabOptions,
    ) -> Self {
        Self {
            interner,
            source_db,
            sink,
            options,
            autoidx: 0,
        }
    }

    /// Elaborates one module in place.
    ///
    /// Drives the stage-one rewrite to a fixed point, applies the
    /// mem2reg decision and lowering, then drives stage two to a fixed
    /// point. On error the diagnostic has already been constructed;
    /// callers emit it into the sink and abandon the module.
    pub fn elaborate_module(&mut self, arena: &mut AstArena, module: NodeId) -> ElabResult<()> {
        if arena[module].kind != AstKind::Module {
            return Err(errors::internal(
                "elaborate_module called on a non-module node",
                arena[module].span,
            ));
        }

        let mut ctx = ElabContext::new(
            self.interner,
            self.source_db,
            self.sink,
            self.options,
            module,
            self.autoidx,
        );
        let result = run_stages(&mut ctx, arena, module);
        // the counter survives errors so later modules keep fresh names
        self.autoidx = ctx.autoidx;
        result
    }
}

fn run_stages(ctx: &mut ElabContext<'_>, arena: &mut AstArena, module: NodeId) -> ElabResult<()> {
    while simplify(ctx, arena, module, SimplifyArgs::new(Stage::One))? {}

    if !ctx.options.no_mem2reg && !arena[module].has_attribute(ctx.attr_nomem2reg) {
        mem2reg::apply(ctx, arena, module)?;
    }

    while simplify(ctx, arena, module, SimplifyArgs::new(Stage::Two))? {}
    Ok(())
}

/// Mutable state carried through one module's rewrite.
///
/// Holds the ambient name scope, the block cursors that statement-level
/// rewrites use to insert synthesized statements next to the statement
/// being rewritten, and the unique-name counter.
pub struct ElabContext<'a> {
    /// The string interner shared with the parser.
    pub interner: &'a Interner,
    /// The source database, for resolving spans in names and warnings.
    pub source_db: &'a SourceDb,
    /// The diagnostic sink for warnings and notes.
    pub sink: &'a DiagnosticSink,
    /// Global elaboration switches.
    pub options: ElabOptions,
    /// The module being elaborated.
    pub module: NodeId,
    /// The ambient scope: visible name → declaration.
    pub scope: HashMap<Ident, NodeId>,
    /// The innermost statement block currently being descended.
    pub current_block: Option<NodeId>,
    /// The child of [`current_block`](Self::current_block) currently
    /// being visited; synthesized statements are inserted before it.
    pub current_block_child: Option<NodeId>,
    /// The body block of the enclosing `always`/`initial` process.
    pub current_top_block: Option<NodeId>,
    /// Monotone counter for unique synthesized names.
    pub autoidx: u32,
    /// Interned `mem2reg` attribute name.
    pub attr_mem2reg: Ident,
    /// Interned `nomem2reg` attribute name.
    pub attr_nomem2reg: Ident,
    /// Interned `nosync` attribute name.
    pub attr_nosync: Ident,
}

impl<'a> ElabContext<'a> {
    /// Creates the context for one module.
    pub fn new(
        interner: &'a Interner,
        source_db: &'a SourceDb,
        sink: &'a DiagnosticSink,
        options: ElabOptions,
        module: NodeId,
        autoidx: u32,
    ) -> Self {
        Self {
            interner,
            source_db,
            sink,
            options,
            module,
            scope: HashMap::new(),
            current_block: None,
            current_block_child: None,
            current_top_block: None,
            autoidx,
            attr_mem2reg: interner.intern("mem2reg"),
            attr_nomem2reg: interner.intern("nomem2reg"),
            attr_nosync: interner.intern("nosync"),
        }
    }

    /// Returns the next value of the unique-name counter.
    pub fn next_index(&mut self) -> u32 {
        let index = self.autoidx;
        self.autoidx += 1;
        index
    }

    /// Renders a span as the `file:line` text used in synthesized names.
    pub fn location(&self, span: Span) -> String {
        self.source_db.location(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Interner, SourceDb, DiagnosticSink) {
        (Interner::new(), SourceDb::new(), DiagnosticSink::new())
    }

    #[test]
    fn next_index_is_monotone() {
        let (interner, db, sink) = session();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = ElabContext::new(&interner, &db, &sink, ElabOptions::default(), module, 5);
        assert_eq!(ctx.next_index(), 5);
        assert_eq!(ctx.next_index(), 6);
        assert_eq!(ctx.next_index(), 7);
    }

    #[test]
    fn counter_survives_across_modules() {
        let (interner, db, sink) = session();
        let mut arena = AstArena::new();
        let m1 = arena.node(AstKind::Module, Span::DUMMY);
        let m2 = arena.node(AstKind::Module, Span::DUMMY);

        let mut elab = Elaborator::new(&interner, &db, &sink);
        elab.elaborate_module(&mut arena, m1).unwrap();
        let after_first = elab.autoidx;
        elab.elaborate_module(&mut arena, m2).unwrap();
        assert!(elab.autoidx >= after_first);
    }

    #[test]
    fn non_module_is_internal_error() {
        let (interner, db, sink) = session();
        let mut arena = AstArena::new();
        let wire = arena.node(AstKind::Wire, Span::DUMMY);

        let mut elab = Elaborator::new(&interner, &db, &sink);
        let err = elab.elaborate_module(&mut arena, wire).unwrap_err();
        assert_eq!(err.0.code, crate::errors::E399);
    }

    #[test]
    fn empty_module_elaborates() {
        let (interner, db, sink) = session();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);

        let mut elab = Elaborator::new(&interner, &db, &sink);
        elab.elaborate_module(&mut arena, module).unwrap();
        assert!(!sink.has_errors());
    }
}
