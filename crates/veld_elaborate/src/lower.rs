//! Stage-two lowerings: dynamic-range lvalues, memory read/write ports,
//! and assertions.
//!
//! These rewrites run only after all structural passes have settled, so
//! the shapes they match on (resolved declarations, folded ranges,
//! surviving memories) are final.

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, Logic, LogicVec};
use veld_source::Span;

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::mem2reg::meminfo;
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// Expands an assignment to a dynamically-selected slice of a wire into
/// a `case` over every legal start bit.
///
/// Returns the detached replacement `Case`, or `None` when the
/// assignment does not match the shape (constant range, non-wire
/// target, no range at all).
pub fn dynamic_range_lvalue(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<Option<NodeId>> {
    let span = arena[node].span;
    let lhs = arena[node].children[0];
    if arena[lhs].kind != AstKind::Identifier || arena[lhs].children.is_empty() {
        return Ok(None);
    }
    let range = arena[lhs].children[0];
    if arena[range].kind != AstKind::Range || arena[range].range_valid {
        return Ok(None);
    }
    let Some(decl) = arena[lhs].decl.filter(|&d| arena[d].kind == AstKind::Wire) else {
        return Ok(None);
    };
    if !arena[decl].range_valid {
        return Ok(None);
    }

    let source_width = arena[decl].range_width().unwrap_or(1) as i64;
    let mut result_width = 1i64;
    let shift_expr;
    if arena[range].children.len() == 1 {
        shift_expr = arena.clone_subtree(arena[range].children[0]);
    } else {
        shift_expr = arena.clone_subtree(arena[range].children[1]);
        let left_at_zero = arena.clone_subtree(arena[range].children[0]);
        let right_at_zero = arena.clone_subtree(arena[range].children[1]);
        let zero_args = SimplifyArgs {
            const_fold: true,
            at_zero: true,
            ..SimplifyArgs::new(args.stage)
        };
        while simplify(ctx, arena, left_at_zero, zero_args)? {}
        while simplify(ctx, arena, right_at_zero, zero_args)? {}
        if arena[left_at_zero].kind != AstKind::Constant
            || arena[right_at_zero].kind != AstKind::Constant
        {
            let name = arena[lhs]
                .name
                .map(|n| ctx.interner.resolve(n).to_string())
                .unwrap_or_default();
            return Err(errors::error_unsupported(
                &format!("unsupported expression in dynamic range select on signal `{name}`"),
                span,
            ));
        }
        result_width = arena[left_at_zero].integer - arena[right_at_zero].integer + 1;
    }

    let assign_kind = arena[node].kind;
    let rhs = arena[node].children[1];
    let case_node = arena.with_children(AstKind::Case, span, vec![shift_expr]);
    for i in 0..=(source_width - result_width) {
        let start_bit = arena[decl].range_right + i;
        let match_value = arena.const_int(start_bit, true, 32, span);
        let lvalue = arena.clone_subtree(lhs);
        arena[lvalue].children.clear();
        let left = arena.const_int(start_bit + result_width - 1, true, 32, span);
        let right = arena.const_int(start_bit, true, 32, span);
        let bit_range = arena.with_children(AstKind::Range, span, vec![left, right]);
        arena[lvalue].children.push(bit_range);
        let value = arena.clone_subtree(rhs);
        let assign = arena.with_children(assign_kind, span, vec![lvalue, value]);
        let body = arena.with_children(AstKind::Block, span, vec![assign]);
        let cond = arena.with_children(AstKind::Cond, span, vec![match_value, body]);
        arena[case_node].children.push(cond);
    }
    Ok(Some(case_node))
}

/// Replaces a word read of a surviving memory by an explicit read port.
///
/// Returns the detached replacement `MemRd` node.
pub fn lower_memrd(arena: &mut AstArena, node: NodeId) -> NodeId {
    let span = arena[node].span;
    let addr = arena.clone_subtree(arena[arena[node].children[0]].children[0]);
    let memrd = arena.with_children(AstKind::MemRd, span, vec![addr]);
    arena[memrd].name = arena[node].name;
    arena[memrd].decl = arena[node].decl;
    memrd
}

fn synth_wire(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    name: Ident,
    msb: i64,
    span: Span,
) -> ElabResult<NodeId> {
    let left = arena.const_int(msb, true, 32, span);
    let right = arena.const_int(0, true, 32, span);
    let range = arena.with_children(AstKind::Range, span, vec![left, right]);
    let wire = arena.with_children(AstKind::Wire, span, vec![range]);
    arena[wire].name = Some(name);
    let module = ctx.module;
    arena[module].children.push(wire);
    ctx.scope.insert(name, wire);
    let args = SimplifyArgs {
        const_fold: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, wire, args)? {}
    Ok(wire)
}

/// Rewrites an assignment whose target is a surviving memory into a
/// write port: address/data/enable wires with all-x/zero defaults at
/// the top of the process, driven at the assignment site, plus a
/// module-level `MemWr` node.
///
/// Returns the detached replacement block for the assignment.
pub fn lower_memwrite(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let lhs = arena[node].children[0];
    let mem = arena[lhs]
        .decl
        .ok_or_else(|| errors::internal("unresolved memory write", span))?;
    let lhs_name = arena[lhs]
        .name
        .ok_or_else(|| errors::internal("memory write without a name", span))?;

    if arena[node].kind == AstKind::AssignEq {
        ctx.sink.emit(errors::warn_blocking_memwr(span));
    }

    let (width, _, addr_bits) = meminfo(arena, mem)?;
    let base = format!(
        "$memwr${}${}${}",
        ctx.interner.resolve(lhs_name),
        ctx.location(span),
        ctx.next_index()
    );
    let id_addr = ctx.interner.intern(&format!("{base}_ADDR"));
    let id_data = ctx.interner.intern(&format!("{base}_DATA"));
    let id_en = ctx.interner.intern(&format!("{base}_EN"));

    synth_wire(ctx, arena, id_addr, addr_bits as i64 - 1, span)?;
    synth_wire(ctx, arena, id_data, width as i64 - 1, span)?;
    synth_wire(ctx, arena, id_en, width as i64 - 1, span)?;

    // defaults at the top of the enclosing process body
    let top = ctx
        .current_top_block
        .ok_or_else(|| errors::internal("memory write outside a process", span))?;
    let addr_lhs = arena.ident(id_addr, span);
    let addr_x = arena.const_bits(LogicVec::all_x(addr_bits), false, span);
    let default_addr = arena.with_children(AstKind::AssignLe, span, vec![addr_lhs, addr_x]);
    let data_lhs = arena.ident(id_data, span);
    let data_x = arena.const_bits(LogicVec::all_x(width), false, span);
    let default_data = arena.with_children(AstKind::AssignLe, span, vec![data_lhs, data_x]);
    let en_lhs = arena.ident(id_en, span);
    let en_zero = arena.const_int(0, false, width, span);
    let default_en = arena.with_children(AstKind::AssignLe, span, vec![en_lhs, en_zero]);
    let defaults = arena.with_children(
        AstKind::Block,
        span,
        vec![default_addr, default_data, default_en],
    );
    arena[top].children.insert(0, defaults);

    // drive the port at the assignment site
    let addr_lhs = arena.ident(id_addr, span);
    let addr_value = arena.clone_subtree(arena[arena[lhs].children[0]].children[0]);
    let assign_addr = arena.with_children(AstKind::AssignLe, span, vec![addr_lhs, addr_value]);
    let data_lhs = arena.ident(id_data, span);
    let data_value = arena.clone_subtree(arena[node].children[1]);
    let assign_data = arena.with_children(AstKind::AssignLe, span, vec![data_lhs, data_value]);
    let en_lhs = arena.ident(id_en, span);
    let en_ones = arena.const_bits(LogicVec::all_one(width), false, span);
    let assign_en = arena.with_children(AstKind::AssignLe, span, vec![en_lhs, en_ones]);
    let replacement = arena.with_children(
        AstKind::Block,
        span,
        vec![assign_addr, assign_data, assign_en],
    );

    // the module-level write port
    let port_addr = arena.ident(id_addr, span);
    let port_data = arena.ident(id_data, span);
    let port_en = arena.ident(id_en, span);
    let memwr = arena.with_children(AstKind::MemWr, span, vec![port_addr, port_data, port_en]);
    arena[memwr].name = Some(lhs_name);
    let module = ctx.module;
    arena[module].children.push(memwr);

    Ok(replacement)
}

/// Lowers an assertion inside a process to the two-wire form.
///
/// Returns the detached replacement block for the assertion site.
pub fn lower_assert(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let base = format!("$assert${}${}", ctx.location(span), ctx.next_index());
    let id_check = ctx.interner.intern(&format!("{base}_CHECK"));
    let id_en = ctx.interner.intern(&format!("{base}_EN"));
    let module = ctx.module;

    let wire_check = arena.node(AstKind::Wire, span);
    arena[wire_check].name = Some(id_check);
    arena[module].children.push(wire_check);
    ctx.scope.insert(id_check, wire_check);
    let wire_args = SimplifyArgs {
        const_fold: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, wire_check, wire_args)? {}

    let wire_en = arena.node(AstKind::Wire, span);
    arena[wire_en].name = Some(id_en);
    arena[module].children.push(wire_en);
    // the enable starts out deasserted
    let en_lhs = arena.ident(id_en, span);
    let zero = arena.const_int(0, false, 1, span);
    let init_assign = arena.with_children(AstKind::AssignLe, span, vec![en_lhs, zero]);
    let init_body = arena.with_children(AstKind::Block, span, vec![init_assign]);
    let initial = arena.with_children(AstKind::Initial, span, vec![init_body]);
    arena[module].children.push(initial);
    ctx.scope.insert(id_en, wire_en);
    while simplify(ctx, arena, wire_en, wire_args)? {}

    // defaults at the top of the process body
    let top = ctx
        .current_top_block
        .ok_or_else(|| errors::internal("assertion outside a process body", span))?;
    let check_lhs = arena.ident(id_check, span);
    let x_bit = arena.const_bits(LogicVec::from_logic(Logic::X), false, span);
    let default_check = arena.with_children(AstKind::AssignLe, span, vec![check_lhs, x_bit]);
    let en_lhs = arena.ident(id_en, span);
    let zero = arena.const_int(0, false, 1, span);
    let default_en = arena.with_children(AstKind::AssignLe, span, vec![en_lhs, zero]);
    let defaults = arena.with_children(AstKind::Block, span, vec![default_check, default_en]);
    arena[top].children.insert(0, defaults);

    // at the assertion site: CHECK <= |cond; EN <= 1
    let cond = arena.clone_subtree(arena[node].children[0]);
    let reduced = arena.with_children(AstKind::ReduceBool, span, vec![cond]);
    let check_lhs = arena.ident(id_check, span);
    let assign_check = arena.with_children(AstKind::AssignLe, span, vec![check_lhs, reduced]);
    let en_lhs = arena.ident(id_en, span);
    let one = arena.const_int(1, false, 1, span);
    let assign_en = arena.with_children(AstKind::AssignLe, span, vec![en_lhs, one]);
    let replacement =
        arena.with_children(AstKind::Block, span, vec![assign_check, assign_en]);

    // the module-level assertion cell keeps the original attributes
    let check_ref = arena.ident(id_check, span);
    let en_ref = arena.ident(id_en, span);
    let assert_node = arena.with_children(AstKind::Assert, span, vec![check_ref, en_ref]);
    arena[assert_node].attributes = std::mem::take(&mut arena[node].attributes);
    arena[module].children.push(assert_node);

    Ok(replacement)
}

/// Lifts a single-argument assertion outside any process into the
/// `assert(reduce_bool(cond), 1)` form, in place.
pub fn lower_assert_outside(arena: &mut AstArena, node: NodeId) -> bool {
    let span = arena[node].span;
    let cond = arena.clone_subtree(arena[node].children[0]);
    let reduced = arena.with_children(AstKind::ReduceBool, span, vec![cond]);
    arena[node].children[0] = reduced;
    let one = arena.const_int(1, false, 1, span);
    arena[node].children.push(one);
    true
}
