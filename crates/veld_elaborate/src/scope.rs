//! Ambient scope construction and identifier resolution.
//!
//! On every visit of the module root the scope is rebuilt from the
//! module's declarations: duplicate wire declarations are merged under
//! the compatibility rule, `defparam`s are converted into cell
//! parameter overrides, and the declarations themselves are run through
//! a constant-folding pre-pass so their ranges settle before anything
//! references them.

use std::collections::HashMap;

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::Ident;

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// Rebuilds the ambient scope from the module's declarations.
///
/// Returns `true` if anything changed (a wire merge, a defparam
/// conversion, or progress in the declaration pre-pass).
pub fn build_module_scope(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    stage: Stage,
) -> ElabResult<bool> {
    let module = ctx.module;
    ctx.scope.clear();
    let mut did_something = false;
    let mut this_wire_scope: HashMap<Ident, NodeId> = HashMap::new();

    let mut i = 0;
    while i < arena[module].children.len() {
        let child = arena[module].children[i];
        let kind = arena[child].kind;

        if kind == AstKind::Wire {
            if let Some(name) = arena[child].name {
                if let Some(&first) = this_wire_scope.get(&name) {
                    if wires_compatible(arena, first, child) {
                        merge_wires(arena, first, child);
                        arena[module].children.remove(i);
                        did_something = true;
                        continue;
                    }
                    if stage.is_final() {
                        return Err(errors::error_incompatible_redecl(
                            ctx.interner.resolve(name),
                            arena[child].span,
                            arena[first].span,
                        ));
                    }
                    i += 1;
                    continue;
                }
                this_wire_scope.insert(name, child);
            }
        }

        if kind.names_scope_object() {
            if let Some(name) = arena[child].name {
                ctx.scope.insert(name, child);
            }
        }
        i += 1;
    }

    // defparams resolve against the completed scope
    let mut i = 0;
    while i < arena[module].children.len() {
        let child = arena[module].children[i];
        if arena[child].kind == AstKind::DefParam {
            if let Some(target) = arena[child].name {
                convert_defparam(ctx, arena, child, target)?;
                arena[module].children.remove(i);
                did_something = true;
                continue;
            }
        }
        i += 1;
    }

    // settle declarations before anything references them
    let mut i = 0;
    while i < arena[module].children.len() {
        let child = arena[module].children[i];
        let kind = arena[child].kind;
        if matches!(
            kind,
            AstKind::Parameter | AstKind::LocalParam | AstKind::Wire | AstKind::AutoWire
        ) {
            let args = SimplifyArgs {
                const_fold: true,
                in_param: matches!(kind, AstKind::Parameter | AstKind::LocalParam),
                ..SimplifyArgs::new(Stage::One)
            };
            while simplify(ctx, arena, child, args)? {
                did_something = true;
            }
        }
        i += 1;
    }

    Ok(did_something)
}

/// Resolves an identifier against the ambient scope, synthesizing an
/// implicit wire when the name is not declared anywhere in the module.
///
/// Returns `true` when the resolved declaration changed.
pub fn resolve_identifier(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<bool> {
    let Some(name) = arena[node].name else {
        return Ok(false);
    };
    let mut did_something = false;

    if !ctx.scope.contains_key(&name) {
        let module = ctx.module;
        for child in arena[module].children.clone() {
            let kind = arena[child].kind;
            let declares = matches!(
                kind,
                AstKind::Parameter
                    | AstKind::LocalParam
                    | AstKind::Wire
                    | AstKind::AutoWire
                    | AstKind::GenVar
                    | AstKind::Memory
                    | AstKind::Function
                    | AstKind::Task
            );
            if declares && arena[child].name == Some(name) {
                ctx.scope.insert(name, child);
                break;
            }
        }
    }

    if !ctx.scope.contains_key(&name) {
        let span = arena[node].span;
        let auto_wire = arena.node(AstKind::AutoWire, span);
        arena[auto_wire].name = Some(name);
        let module = ctx.module;
        arena[module].children.push(auto_wire);
        ctx.scope.insert(name, auto_wire);
        ctx.sink
            .emit(errors::warn_implicit_wire(ctx.interner.resolve(name), span));
        did_something = true;
    }

    let binding = ctx.scope[&name];
    if arena[node].decl != Some(binding) {
        arena[node].decl = Some(binding);
        did_something = true;
    }
    Ok(did_something)
}

/// Converts a dotted `defparam cell.param = value` into a `ParaSet`
/// child of the named cell.
fn convert_defparam(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    target: Ident,
) -> ElabResult<()> {
    let span = arena[node].span;
    let text = ctx.interner.resolve(target).to_string();
    let Some(dot) = text.rfind('.') else {
        return Err(errors::error_invalid_shape(
            &format!("defparam `{text}` has no module/parameter separator"),
            span,
        ));
    };
    let cell_name = ctx.interner.intern(&text[..dot]);
    let param_name = ctx.interner.intern(&text[dot + 1..]);

    let cell = ctx.scope.get(&cell_name).copied();
    let Some(cell) = cell.filter(|&c| arena[c].kind == AstKind::Cell) else {
        return Err(errors::error_unresolved(
            "cell for defparam",
            &text[..dot],
            span,
        ));
    };

    let paraset = arena.clone_subtree(node);
    arena[paraset].kind = AstKind::ParaSet;
    arena[paraset].name = Some(param_name);
    arena[cell].children.insert(1, paraset);
    Ok(())
}

/// The wire merge compatibility rule.
fn wires_compatible(arena: &AstArena, first: NodeId, second: NodeId) -> bool {
    // "output foo; reg foo;" style: a bare reg re-declaration merges
    if !arena[second].is_input
        && !arena[second].is_output
        && arena[second].is_reg
        && arena[second].children.is_empty()
    {
        return true;
    }
    if arena[first].children.len() != arena[second].children.len() {
        return false;
    }
    for (&a, &b) in arena[first]
        .children
        .iter()
        .zip(arena[second].children.iter())
    {
        let both_folded_ranges = arena[a].kind == AstKind::Range
            && arena[b].kind == AstKind::Range
            && arena[a].range_valid
            && arena[b].range_valid;
        if both_folded_ranges {
            if arena[a].range_left != arena[b].range_left
                || arena[a].range_right != arena[b].range_right
            {
                return false;
            }
        } else if !subtree_equal(arena, a, b) {
            return false;
        }
    }
    if arena[first].range_left != arena[second].range_left
        || arena[first].range_right != arena[second].range_right
    {
        return false;
    }
    // a later port declaration cannot upgrade a wire that was never a port
    if arena[first].port_id == 0 && (arena[second].is_input || arena[second].is_output) {
        return false;
    }
    true
}

/// Folds the second declaration's flags and attributes into the first.
fn merge_wires(arena: &mut AstArena, first: NodeId, second: NodeId) {
    arena[first].is_input |= arena[second].is_input;
    arena[first].is_output |= arena[second].is_output;
    arena[first].is_reg |= arena[second].is_reg;
    arena[first].is_signed |= arena[second].is_signed;
    for (key, value) in arena[second].attributes.clone() {
        let copied = arena.clone_subtree(value);
        arena[first].attributes.insert(key, copied);
    }
}

/// Structural equality of two subtrees, ignoring spans and memo flags.
fn subtree_equal(arena: &AstArena, a: NodeId, b: NodeId) -> bool {
    let (na, nb) = (&arena[a], &arena[b]);
    if na.kind != nb.kind
        || na.name != nb.name
        || na.integer != nb.integer
        || na.bits != nb.bits
        || na.real != nb.real
        || na.is_signed != nb.is_signed
        || na.is_reg != nb.is_reg
        || na.is_input != nb.is_input
        || na.is_output != nb.is_output
        || na.children.len() != nb.children.len()
    {
        return false;
    }
    na.children
        .iter()
        .zip(nb.children.iter())
        .all(|(&ca, &cb)| subtree_equal(arena, ca, cb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElabOptions;
    use veld_common::Interner;
    use veld_diagnostics::DiagnosticSink;
    use veld_source::{SourceDb, Span};

    struct Fixture {
        interner: Interner,
        source_db: SourceDb,
        sink: DiagnosticSink,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                interner: Interner::new(),
                source_db: SourceDb::new(),
                sink: DiagnosticSink::new(),
            }
        }

        fn ctx(&self, module: NodeId) -> ElabContext<'_> {
            ElabContext::new(
                &self.interner,
                &self.source_db,
                &self.sink,
                ElabOptions::default(),
                module,
                0,
            )
        }
    }

    fn wire(arena: &mut AstArena, name: Ident) -> NodeId {
        let w = arena.node(AstKind::Wire, Span::DUMMY);
        arena[w].name = Some(name);
        w
    }

    #[test]
    fn scope_contains_declarations() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("a");
        let w = wire(&mut arena, name);
        arena[module].children.push(w);

        let mut ctx = fx.ctx(module);
        build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap();
        assert_eq!(ctx.scope.get(&name), Some(&w));
    }

    #[test]
    fn bare_reg_redeclaration_merges() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("q");

        let port = wire(&mut arena, name);
        arena[port].is_output = true;
        arena[port].port_id = 1;
        let reg = wire(&mut arena, name);
        arena[reg].is_reg = true;
        arena[module].children.push(port);
        arena[module].children.push(reg);

        let mut ctx = fx.ctx(module);
        let did = build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap();
        assert!(did);
        assert_eq!(arena[module].children.len(), 1);
        assert!(arena[port].is_output);
        assert!(arena[port].is_reg);
    }

    #[test]
    fn port_upgrade_of_plain_wire_is_incompatible() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("w");

        let plain = wire(&mut arena, name);
        let port = wire(&mut arena, name);
        arena[port].is_input = true;
        arena[module].children.push(plain);
        arena[module].children.push(port);

        // tolerated in the pre-pass stage
        let mut ctx = fx.ctx(module);
        build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap();
        assert_eq!(arena[module].children.len(), 2);

        // fatal once rewrites have settled
        let err = build_module_scope(&mut ctx, &mut arena, Stage::Two).unwrap_err();
        assert_eq!(err.0.code, errors::E301);
    }

    #[test]
    fn later_attributes_win_on_merge() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("q");
        let attr = fx.interner.intern("keep");

        let first = wire(&mut arena, name);
        arena[first].is_output = true;
        arena[first].port_id = 1;
        let old_val = arena.const_int(1, false, 32, Span::DUMMY);
        arena[first].attributes.insert(attr, old_val);

        let second = wire(&mut arena, name);
        arena[second].is_reg = true;
        let new_val = arena.const_int(2, false, 32, Span::DUMMY);
        arena[second].attributes.insert(attr, new_val);

        arena[module].children.push(first);
        arena[module].children.push(second);

        let mut ctx = fx.ctx(module);
        build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap();
        let merged = arena[first].attributes[&attr];
        assert_eq!(arena[merged].integer, 2);
    }

    #[test]
    fn unresolved_identifier_creates_autowire() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("ghost");
        let id = arena.ident(name, Span::DUMMY);
        arena[module].children.push(id);

        let mut ctx = fx.ctx(module);
        let did = resolve_identifier(&mut ctx, &mut arena, id).unwrap();
        assert!(did);

        let decl = arena[id].decl.unwrap();
        assert_eq!(arena[decl].kind, AstKind::AutoWire);
        assert!(arena[module].children.contains(&decl));
        assert_eq!(fx.sink.diagnostics().len(), 1);
    }

    #[test]
    fn resolution_is_idempotent() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let name = fx.interner.intern("a");
        let w = wire(&mut arena, name);
        arena[module].children.push(w);
        let id = arena.ident(name, Span::DUMMY);
        arena[module].children.push(id);

        let mut ctx = fx.ctx(module);
        ctx.scope.insert(name, w);
        assert!(resolve_identifier(&mut ctx, &mut arena, id).unwrap());
        assert!(!resolve_identifier(&mut ctx, &mut arena, id).unwrap());
        assert_eq!(arena[id].decl, Some(w));
    }

    #[test]
    fn defparam_becomes_paraset_on_cell() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);

        let cell_name = fx.interner.intern("u1");
        let cell_type = arena.node(AstKind::CellType, Span::DUMMY);
        let cell = arena.with_children(AstKind::Cell, Span::DUMMY, vec![cell_type]);
        arena[cell].name = Some(cell_name);

        let dp_name = fx.interner.intern("u1.WIDTH");
        let value = arena.const_int(16, false, 32, Span::DUMMY);
        let dp = arena.with_children(AstKind::DefParam, Span::DUMMY, vec![value]);
        arena[dp].name = Some(dp_name);

        arena[module].children.push(cell);
        arena[module].children.push(dp);

        let mut ctx = fx.ctx(module);
        let did = build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap();
        assert!(did);

        // defparam removed from the module
        assert!(!arena[module].children.contains(&dp));
        // paraset inserted right after the cell type
        let paraset = arena[cell].children[1];
        assert_eq!(arena[paraset].kind, AstKind::ParaSet);
        assert_eq!(
            fx.interner.resolve(arena[paraset].name.unwrap()),
            "WIDTH"
        );
    }

    #[test]
    fn defparam_without_dot_is_invalid() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let dp_name = fx.interner.intern("WIDTH");
        let value = arena.const_int(16, false, 32, Span::DUMMY);
        let dp = arena.with_children(AstKind::DefParam, Span::DUMMY, vec![value]);
        arena[dp].name = Some(dp_name);
        arena[module].children.push(dp);

        let mut ctx = fx.ctx(module);
        let err = build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap_err();
        assert_eq!(err.0.code, errors::E304);
    }

    #[test]
    fn defparam_to_unknown_cell_is_unresolved() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let dp_name = fx.interner.intern("nope.WIDTH");
        let value = arena.const_int(16, false, 32, Span::DUMMY);
        let dp = arena.with_children(AstKind::DefParam, Span::DUMMY, vec![value]);
        arena[dp].name = Some(dp_name);
        arena[module].children.push(dp);

        let mut ctx = fx.ctx(module);
        let err = build_module_scope(&mut ctx, &mut arena, Stage::One).unwrap_err();
        assert_eq!(err.0.code, errors::E302);
    }
}
