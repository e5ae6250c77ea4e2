//! Conformance test helpers for the Veld elaboration core.
//!
//! Provides a [`Session`] bundling the interner, source database, and
//! diagnostic sink, a set of builders for constructing module ASTs the
//! way the parser would, an [`elaborate`] helper running the full
//! three-stage pipeline, and tree queries for asserting on the
//! elaborated result.

#![warn(missing_docs)]

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, Interner};
use veld_diagnostics::{Diagnostic, DiagnosticSink, Severity};
use veld_elaborate::Elaborator;
use veld_source::{SourceDb, Span};

/// The shared state of one test compilation session.
pub struct Session {
    /// The string interner.
    pub interner: Interner,
    /// The source database (tests usually leave it empty and get
    /// `<unknown>` locations in synthesized names).
    pub source_db: SourceDb,
    /// The diagnostic sink.
    pub sink: DiagnosticSink,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            source_db: SourceDb::new(),
            sink: DiagnosticSink::new(),
        }
    }

    /// Interns a name.
    pub fn id(&self, name: &str) -> Ident {
        self.interner.intern(name)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of running a module through the elaborator.
pub struct Outcome {
    /// Whether elaboration completed without a fatal error.
    pub ok: bool,
    /// All diagnostics, including the fatal one if elaboration failed.
    pub diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    /// The warning-severity diagnostics.
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect()
    }
}

/// Runs the full three-stage elaboration on one module.
pub fn elaborate(session: &Session, arena: &mut AstArena, module: NodeId) -> Outcome {
    let mut elaborator = Elaborator::new(&session.interner, &session.source_db, &session.sink);
    let result = elaborator.elaborate_module(arena, module);
    let ok = match result {
        Ok(()) => true,
        Err(err) => {
            session.sink.emit(err.into());
            false
        }
    };
    Outcome {
        ok,
        diagnostics: session.sink.diagnostics(),
    }
}

// ---------------------------------------------------------------------------
// builders
// ---------------------------------------------------------------------------

/// A 32-bit signed integer constant, as the parser makes bare literals.
pub fn int_const(arena: &mut AstArena, value: i64) -> NodeId {
    arena.const_int(value, true, 32, Span::DUMMY)
}

/// An unsigned sized constant like `4'd3`.
pub fn sized_const(arena: &mut AstArena, value: i64, width: u32) -> NodeId {
    arena.const_int(value, false, width, Span::DUMMY)
}

/// A `[msb:lsb]` range with constant bounds.
pub fn range(arena: &mut AstArena, msb: i64, lsb: i64) -> NodeId {
    let left = int_const(arena, msb);
    let right = int_const(arena, lsb);
    arena.with_children(AstKind::Range, Span::DUMMY, vec![left, right])
}

/// An identifier reference.
pub fn ident(session: &Session, arena: &mut AstArena, name: &str) -> NodeId {
    arena.ident(session.id(name), Span::DUMMY)
}

/// An identifier with a single-expression word/bit select.
pub fn select(session: &Session, arena: &mut AstArena, name: &str, index: NodeId) -> NodeId {
    let word = arena.with_children(AstKind::Range, Span::DUMMY, vec![index]);
    let id = arena.with_children(AstKind::Identifier, Span::DUMMY, vec![word]);
    arena[id].name = Some(session.id(name));
    id
}

/// A `wire` declaration, 1-bit if `bounds` is `None`.
pub fn wire_decl(
    session: &Session,
    arena: &mut AstArena,
    name: &str,
    bounds: Option<(i64, i64)>,
) -> NodeId {
    let children = match bounds {
        Some((msb, lsb)) => vec![range(arena, msb, lsb)],
        None => Vec::new(),
    };
    let wire = arena.with_children(AstKind::Wire, Span::DUMMY, children);
    arena[wire].name = Some(session.id(name));
    wire
}

/// A `reg` declaration.
pub fn reg_decl(
    session: &Session,
    arena: &mut AstArena,
    name: &str,
    bounds: Option<(i64, i64)>,
) -> NodeId {
    let wire = wire_decl(session, arena, name, bounds);
    arena[wire].is_reg = true;
    wire
}

/// A memory declaration `reg [dm:dl] name [am:al];`.
pub fn memory_decl(
    session: &Session,
    arena: &mut AstArena,
    name: &str,
    data: (i64, i64),
    addr: (i64, i64),
) -> NodeId {
    let data_range = range(arena, data.0, data.1);
    let addr_range = range(arena, addr.0, addr.1);
    let mem = arena.with_children(AstKind::Memory, Span::DUMMY, vec![data_range, addr_range]);
    arena[mem].name = Some(session.id(name));
    arena[mem].is_reg = true;
    mem
}

/// A `parameter`/`localparam` declaration with an optional range.
pub fn param_decl(
    session: &Session,
    arena: &mut AstArena,
    name: &str,
    bounds: Option<(i64, i64)>,
    value: NodeId,
) -> NodeId {
    let mut children = vec![value];
    if let Some((msb, lsb)) = bounds {
        children.push(range(arena, msb, lsb));
    }
    let param = arena.with_children(AstKind::Parameter, Span::DUMMY, children);
    arena[param].name = Some(session.id(name));
    param
}

/// An assignment of the given kind.
pub fn assign(arena: &mut AstArena, kind: AstKind, lhs: NodeId, rhs: NodeId) -> NodeId {
    arena.with_children(kind, Span::DUMMY, vec![lhs, rhs])
}

/// An `always @*` process around the given statements.
pub fn always_star(arena: &mut AstArena, stmts: Vec<NodeId>) -> NodeId {
    let block = arena.with_children(AstKind::Block, Span::DUMMY, stmts);
    arena.with_children(AstKind::Always, Span::DUMMY, vec![block])
}

/// An `always @(posedge clk)` process around the given statements.
pub fn always_posedge(
    session: &Session,
    arena: &mut AstArena,
    clk: &str,
    stmts: Vec<NodeId>,
) -> NodeId {
    let clk_ref = ident(session, arena, clk);
    let edge = arena.with_children(AstKind::Posedge, Span::DUMMY, vec![clk_ref]);
    let block = arena.with_children(AstKind::Block, Span::DUMMY, stmts);
    arena.with_children(AstKind::Always, Span::DUMMY, vec![edge, block])
}

/// An `initial` process around the given statements.
pub fn initial_block(arena: &mut AstArena, stmts: Vec<NodeId>) -> NodeId {
    let block = arena.with_children(AstKind::Block, Span::DUMMY, stmts);
    arena.with_children(AstKind::Initial, Span::DUMMY, vec![block])
}

/// A module with the given items.
pub fn module(session: &Session, arena: &mut AstArena, name: &str, items: Vec<NodeId>) -> NodeId {
    let m = arena.with_children(AstKind::Module, Span::DUMMY, items);
    arena[m].name = Some(session.id(name));
    m
}

// ---------------------------------------------------------------------------
// queries
// ---------------------------------------------------------------------------

/// Finds a module child of the given kind and name.
pub fn find_decl(
    session: &Session,
    arena: &AstArena,
    module: NodeId,
    kind: AstKind,
    name: &str,
) -> Option<NodeId> {
    let wanted = session.id(name);
    arena[module]
        .children
        .iter()
        .copied()
        .find(|&c| arena[c].kind == kind && arena[c].name == Some(wanted))
}

/// Counts nodes of a kind in the subtree.
pub fn count_kind(arena: &AstArena, root: NodeId, kind: AstKind) -> usize {
    let mut count = usize::from(arena[root].kind == kind);
    for &child in &arena[root].children {
        count += count_kind(arena, child, kind);
    }
    count
}

/// The names of all module-level declarations of a kind.
pub fn decl_names(
    session: &Session,
    arena: &AstArena,
    module: NodeId,
    kind: AstKind,
) -> Vec<String> {
    arena[module]
        .children
        .iter()
        .filter(|&&c| arena[c].kind == kind)
        .filter_map(|&c| arena[c].name)
        .map(|n| session.interner.resolve(n).to_string())
        .collect()
}

/// Checks that no generate-time construct survives in the tree.
pub fn generate_free(arena: &AstArena, root: NodeId) -> bool {
    let banned = [
        AstKind::GenFor,
        AstKind::GenIf,
        AstKind::GenCase,
        AstKind::GenBlock,
        AstKind::CellArray,
        AstKind::Primitive,
        AstKind::DefParam,
        AstKind::Prefix,
    ];
    banned.iter().all(|&k| count_kind(arena, root, k) == 0)
}

/// Checks that every resolved identifier reachable outside of
/// function/task declarations points back into the module.
pub fn scope_closed(arena: &AstArena, module: NodeId) -> bool {
    fn walk(arena: &AstArena, module: NodeId, node: NodeId) -> bool {
        if matches!(arena[node].kind, AstKind::Function | AstKind::Task) {
            return true;
        }
        if arena[node].kind == AstKind::Identifier {
            match arena[node].decl {
                Some(decl) => {
                    if !arena.contains(module, decl) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        arena[node]
            .children
            .iter()
            .all(|&child| walk(arena, module, child))
    }
    walk(arena, module, module)
}
