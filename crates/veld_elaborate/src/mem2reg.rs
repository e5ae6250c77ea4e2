//! Demotion of memories to register arrays.
//!
//! Pass 1 walks the module collecting per-memory trigger flags; the
//! decision demotes a memory when any trigger fired (or demotion was
//! forced) and `nomem2reg` is absent. Pass 2 synthesizes one register
//! wire per word and rewrites every access: constant indices become
//! plain references to `<mem>[<i>]`, variable indices go through
//! address/data scratch wires and an address-dispatch `case`.

use std::collections::{BTreeSet, HashMap, HashSet};

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::LogicVec;

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// Why a memory must be demoted.
#[derive(Default, Clone, Copy)]
struct MemFlags {
    /// Written from an `initial` process.
    set_init: bool,
    /// Written outside `initial` processes.
    set_else: bool,
    /// Written inside an `always` without exactly one edge event.
    set_async: bool,
    /// Appears as a subexpression of an assignment target.
    cmplx_lhs: bool,
    /// Read after a blocking write in the same process.
    eq2: bool,
    /// Demotion requested by attribute, option, or a non-`reg`
    /// declaration.
    forced: bool,
}

impl MemFlags {
    fn triggered(&self) -> bool {
        self.eq2 || self.set_async || (self.set_init && self.set_else) || self.cmplx_lhs
    }
}

/// Ambient facts during the analysis walk.
#[derive(Default, Clone, Copy)]
struct WalkFlags {
    in_async: bool,
    in_init: bool,
    force_all: bool,
}

/// Derives `(width, size, addr_bits)` of a memory from its two range
/// children.
pub fn meminfo(arena: &AstArena, mem: NodeId) -> ElabResult<(u32, i64, u32)> {
    let span = arena[mem].span;
    let data = arena[mem].children[0];
    let addr = arena[mem].children[1];
    if !arena[data].range_valid || !arena[addr].range_valid {
        return Err(errors::error_not_constant("memory dimensions", span));
    }
    let width = arena[data].range_width().unwrap_or(1);
    let (left, right) = (arena[addr].range_left, arena[addr].range_right);
    let size = (left - right).abs() + left.min(right) + 1;
    let mut addr_bits = 1u32;
    while (1i64 << addr_bits) < size {
        addr_bits += 1;
    }
    Ok((width, size, addr_bits))
}

/// Runs the full mem2reg step on the module between stages one and two.
pub fn apply(ctx: &mut ElabContext<'_>, arena: &mut AstArena, module: NodeId) -> ElabResult<()> {
    let mut candidates: HashMap<NodeId, MemFlags> = HashMap::new();
    let mut places: HashMap<NodeId, BTreeSet<String>> = HashMap::new();
    let mut proc_flags: HashMap<NodeId, bool> = HashMap::new();

    let flags = WalkFlags {
        force_all: ctx.options.mem2reg_all,
        ..WalkFlags::default()
    };
    analyze(
        ctx,
        arena,
        module,
        flags,
        &mut proc_flags,
        &mut candidates,
        &mut places,
    );

    let mut ordered: Vec<(NodeId, MemFlags)> = candidates.into_iter().collect();
    ordered.sort_by_key(|(mem, _)| mem.as_raw());

    let mut demoted: Vec<NodeId> = Vec::new();
    for (mem, flags) in ordered {
        if arena[mem].has_attribute(ctx.attr_nomem2reg) {
            continue;
        }
        if flags.forced {
            demoted.push(mem);
            continue;
        }
        if flags.triggered() {
            let mem_name = arena[mem]
                .name
                .map(|n| ctx.interner.resolve(n).to_string())
                .unwrap_or_default();
            let where_seen: Vec<String> =
                places.remove(&mem).unwrap_or_default().into_iter().collect();
            ctx.sink
                .emit(errors::warn_mem2reg(&mem_name, &where_seen, arena[mem].span));
            demoted.push(mem);
        }
    }

    // one register wire per word
    for &mem in &demoted {
        let (width, size, _) = meminfo(arena, mem)?;
        let span = arena[mem].span;
        let mem_name = arena[mem]
            .name
            .ok_or_else(|| errors::internal("memory without a name", span))?;
        for i in 0..size {
            let left = arena.const_int(width as i64 - 1, true, 32, span);
            let right = arena.const_int(0, true, 32, span);
            let range = arena.with_children(AstKind::Range, span, vec![left, right]);
            let reg = arena.with_children(AstKind::Wire, span, vec![range]);
            arena[reg].name = Some(ctx.interner.suffixed(mem_name, &format!("[{i}]")));
            arena[reg].is_reg = true;
            arena[reg].is_signed = arena[mem].is_signed;
            arena[module].children.push(reg);
            let args = SimplifyArgs {
                const_fold: true,
                ..SimplifyArgs::new(Stage::One)
            };
            while simplify(ctx, arena, reg, args)? {}
        }
    }

    let set: HashSet<NodeId> = demoted.iter().copied().collect();
    if !set.is_empty() {
        rewrite_accesses(ctx, arena, module, None, &set)?;
        let mut children = std::mem::take(&mut arena[module].children);
        children.retain(|c| !set.contains(c));
        arena[module].children = children;
    }
    Ok(())
}

fn add_place(
    ctx: &ElabContext<'_>,
    places: &mut HashMap<NodeId, BTreeSet<String>>,
    mem: NodeId,
    span: veld_source::Span,
) {
    places.entry(mem).or_default().insert(ctx.location(span));
}

/// Flags memories used below the top level of an assignment target.
fn mark_lhs_complex(
    ctx: &ElabContext<'_>,
    arena: &AstArena,
    node: NodeId,
    candidates: &mut HashMap<NodeId, MemFlags>,
    places: &mut HashMap<NodeId, BTreeSet<String>>,
) {
    for &child in &arena[node].children {
        mark_lhs_complex(ctx, arena, child, candidates, places);
    }
    if arena[node].kind == AstKind::Identifier {
        if let Some(mem) = arena[node].decl.filter(|&d| arena[d].kind == AstKind::Memory) {
            let entry = candidates.entry(mem).or_default();
            if !entry.cmplx_lhs {
                add_place(ctx, places, mem, arena[node].span);
            }
            entry.cmplx_lhs = true;
        }
    }
}

fn analyze(
    ctx: &ElabContext<'_>,
    arena: &AstArena,
    node: NodeId,
    mut flags: WalkFlags,
    proc_flags: &mut HashMap<NodeId, bool>,
    candidates: &mut HashMap<NodeId, MemFlags>,
    places: &mut HashMap<NodeId, BTreeSet<String>>,
) {
    let span = arena[node].span;
    let kind = arena[node].kind;
    let mut skip_first_child = false;

    if kind.is_assign() {
        let lhs = arena[node].children[0];
        for &child in &arena[lhs].children {
            mark_lhs_complex(ctx, arena, child, candidates, places);
        }

        if arena[lhs].kind == AstKind::Identifier {
            if let Some(mem) = arena[lhs].decl.filter(|&d| arena[d].kind == AstKind::Memory) {
                if flags.in_async {
                    let entry = candidates.entry(mem).or_default();
                    if !entry.set_async {
                        add_place(ctx, places, mem, span);
                    }
                    entry.set_async = true;
                }
                if kind == AstKind::AssignEq {
                    let seen = proc_flags.entry(mem).or_insert(false);
                    if !*seen {
                        add_place(ctx, places, mem, span);
                    }
                    *seen = true;
                }
                let entry = candidates.entry(mem).or_default();
                if flags.in_init {
                    if !entry.set_init {
                        add_place(ctx, places, mem, span);
                    }
                    entry.set_init = true;
                } else {
                    if !entry.set_else {
                        add_place(ctx, places, mem, span);
                    }
                    entry.set_else = true;
                }
            }
        }
        skip_first_child = true;
    }

    if kind == AstKind::Identifier {
        if let Some(mem) = arena[node].decl.filter(|&d| arena[d].kind == AstKind::Memory) {
            let blocking_write_seen = proc_flags.get(&mem).copied().unwrap_or(false);
            let entry = candidates.entry(mem).or_default();
            if blocking_write_seen && !entry.eq2 {
                add_place(ctx, places, mem, span);
                entry.eq2 = true;
            }
        }
    }

    if kind == AstKind::Memory
        && (arena[node].has_attribute(ctx.attr_mem2reg) || flags.force_all || !arena[node].is_reg)
    {
        candidates.entry(node).or_default().forced = true;
    }

    if kind == AstKind::Module && arena[node].has_attribute(ctx.attr_mem2reg) {
        flags.force_all = true;
    }

    let mut fresh_proc_flags: Option<HashMap<NodeId, bool>> = None;
    if kind == AstKind::Always {
        let edge_events = arena[node]
            .children
            .iter()
            .filter(|&&c| matches!(arena[c].kind, AstKind::Posedge | AstKind::Negedge))
            .count();
        if edge_events != 1 {
            flags.in_async = true;
        }
        fresh_proc_flags = Some(HashMap::new());
    }
    if kind == AstKind::Initial {
        flags.in_init = true;
        fresh_proc_flags = Some(HashMap::new());
    }

    let proc = match fresh_proc_flags.as_mut() {
        Some(fresh) => fresh,
        None => proc_flags,
    };
    for (i, &child) in arena[node].children.iter().enumerate() {
        if skip_first_child && i == 0 {
            continue;
        }
        analyze(ctx, arena, child, flags, proc, candidates, places);
    }
}

fn rewrite_accesses(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    enclosing_block: Option<NodeId>,
    set: &HashSet<NodeId>,
) -> ElabResult<()> {
    let mut block = enclosing_block;
    if arena[node].kind == AstKind::Block {
        block = Some(node);
    }

    if arena[node].kind.is_proc_assign() {
        if let Some(b) = block {
            rewrite_write(ctx, arena, node, b, set)?;
        }
    }

    if arena[node].kind == AstKind::Identifier {
        if let Some(mem) = arena[node].decl.filter(|d| set.contains(d)) {
            rewrite_read(ctx, arena, node, mem, block)?;
        }
    }

    for child in arena[node].children.clone() {
        rewrite_accesses(ctx, arena, child, block, set)?;
    }
    Ok(())
}

/// Synthesizes a `nosync`-marked register scratch wire, returning its
/// node and interned name.
fn scratch_wire(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    name: &str,
    msb: i64,
    span: veld_source::Span,
    nosync: bool,
) -> ElabResult<(NodeId, veld_common::Ident)> {
    let left = arena.const_int(msb, true, 32, span);
    let right = arena.const_int(0, true, 32, span);
    let range = arena.with_children(AstKind::Range, span, vec![left, right]);
    let wire = arena.with_children(AstKind::Wire, span, vec![range]);
    let wire_name = ctx.interner.intern(name);
    arena[wire].name = Some(wire_name);
    arena[wire].is_reg = true;
    if nosync {
        let one = arena.const_int(1, false, 32, span);
        arena[wire].attributes.insert(ctx.attr_nosync, one);
    }
    let module = ctx.module;
    arena[module].children.push(wire);
    let args = SimplifyArgs {
        const_fold: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, wire, args)? {}
    Ok((wire, wire_name))
}

/// Rewrites a variable-index write to a demoted memory.
fn rewrite_write(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    block: NodeId,
    set: &HashSet<NodeId>,
) -> ElabResult<()> {
    let lhs = arena[node].children[0];
    let Some(mem) = arena[lhs].decl.filter(|d| set.contains(d)) else {
        return Ok(());
    };
    let Some(&word_range) = arena[lhs].children.first() else {
        return Ok(());
    };
    let index_expr = arena[word_range].children[0];
    if arena[index_expr].kind == AstKind::Constant {
        // handled as a plain rename by the read path
        return Ok(());
    }

    let span = arena[node].span;
    let lhs_name = arena[lhs]
        .name
        .ok_or_else(|| errors::internal("memory write without a name", span))?;
    let mem_name = arena[mem]
        .name
        .ok_or_else(|| errors::internal("memory without a name", span))?;
    let (width, size, addr_bits) = meminfo(arena, mem)?;

    let base = format!(
        "$mem2reg_wr${}${}${}",
        ctx.interner.resolve(lhs_name),
        ctx.location(span),
        ctx.next_index()
    );
    let (_, id_addr) =
        scratch_wire(ctx, arena, &format!("{base}_ADDR"), addr_bits as i64 - 1, span, true)?;
    let (_, id_data) =
        scratch_wire(ctx, arena, &format!("{base}_DATA"), width as i64 - 1, span, true)?;

    let assign_idx = arena[block]
        .children
        .iter()
        .position(|&c| c == node)
        .ok_or_else(|| errors::internal("assignment not found in its block", span))?;

    let addr_lhs = arena.ident(id_addr, span);
    let addr_rhs = arena.clone_subtree(index_expr);
    let assign_addr = arena.with_children(AstKind::AssignEq, span, vec![addr_lhs, addr_rhs]);

    let case_sel = arena.ident(id_addr, span);
    let case_node = arena.with_children(AstKind::Case, span, vec![case_sel]);
    let assign_kind = arena[node].kind;
    for i in 0..size {
        let match_value = arena.const_int(i, false, addr_bits, span);
        let word_name = ctx.interner.suffixed(mem_name, &format!("[{i}]"));
        let word = arena.ident(word_name, span);
        let data_ref = arena.ident(id_data, span);
        let assign_word = arena.with_children(assign_kind, span, vec![word, data_ref]);
        let body = arena.with_children(AstKind::Block, span, vec![assign_word]);
        let cond = arena.with_children(AstKind::Cond, span, vec![match_value, body]);
        arena[case_node].children.push(cond);
    }

    arena[block].children.insert(assign_idx + 1, assign_addr);
    arena[block].children.insert(assign_idx + 2, case_node);

    // the original assignment becomes a blocking write of the data wire
    arena[lhs].children.clear();
    arena[lhs].range_valid = false;
    arena[lhs].decl = None;
    arena[lhs].name = Some(id_data);
    arena[node].kind = AstKind::AssignEq;
    arena.clear_basic_prep(node);
    Ok(())
}

/// Rewrites a read of a demoted memory (or the target of a rewritten
/// constant-index write, which takes the same shape).
fn rewrite_read(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    mem: NodeId,
    block: Option<NodeId>,
) -> ElabResult<()> {
    let span = arena[node].span;
    let Some(&word_range) = arena[node].children.first() else {
        return Ok(());
    };
    let index_expr = arena[word_range].children[0];
    let name = arena[node]
        .name
        .ok_or_else(|| errors::internal("memory access without a name", span))?;

    if arena[index_expr].kind == AstKind::Constant {
        let index = arena[index_expr].integer;
        arena[node].name = Some(ctx.interner.suffixed(name, &format!("[{index}]")));
        arena[node].children.clear();
        arena[node].range_valid = false;
        arena[node].decl = None;
        arena.clear_basic_prep(node);
        return Ok(());
    }

    let (width, size, addr_bits) = meminfo(arena, mem)?;
    let base = format!(
        "$mem2reg_rd${}${}${}",
        ctx.interner.resolve(name),
        ctx.location(span),
        ctx.next_index()
    );
    let (_, id_addr) = scratch_wire(
        ctx,
        arena,
        &format!("{base}_ADDR"),
        addr_bits as i64 - 1,
        span,
        block.is_some(),
    )?;
    let (_, id_data) = scratch_wire(
        ctx,
        arena,
        &format!("{base}_DATA"),
        width as i64 - 1,
        span,
        block.is_some(),
    )?;

    let addr_lhs = arena.ident(id_addr, span);
    let addr_rhs = arena.clone_subtree(index_expr);
    let addr_kind = if block.is_some() {
        AstKind::AssignEq
    } else {
        AstKind::Assign
    };
    let assign_addr = arena.with_children(addr_kind, span, vec![addr_lhs, addr_rhs]);

    let case_sel = arena.ident(id_addr, span);
    let case_node = arena.with_children(AstKind::Case, span, vec![case_sel]);
    for i in 0..size {
        let match_value = arena.const_int(i, false, addr_bits, span);
        let data_ref = arena.ident(id_data, span);
        let word_name = ctx.interner.suffixed(name, &format!("[{i}]"));
        let word = arena.ident(word_name, span);
        let assign_word = arena.with_children(AstKind::AssignEq, span, vec![data_ref, word]);
        let body = arena.with_children(AstKind::Block, span, vec![assign_word]);
        let cond = arena.with_children(AstKind::Cond, span, vec![match_value, body]);
        arena[case_node].children.push(cond);
    }
    // reading a word that no write selected yields x
    let default_marker = arena.node(AstKind::Default, span);
    let data_ref = arena.ident(id_data, span);
    let x_value = arena.const_bits(LogicVec::all_x(width), false, span);
    let assign_x = arena.with_children(AstKind::AssignEq, span, vec![data_ref, x_value]);
    let body = arena.with_children(AstKind::Block, span, vec![assign_x]);
    let default_cond = arena.with_children(AstKind::Cond, span, vec![default_marker, body]);
    arena[case_node].children.push(default_cond);

    match block {
        Some(block) => {
            let assign_idx = arena[block]
                .children
                .iter()
                .position(|&c| arena.contains(c, node))
                .ok_or_else(|| errors::internal("memory read not found in its block", span))?;
            arena[block].children.insert(assign_idx, case_node);
            arena[block].children.insert(assign_idx, assign_addr);
        }
        None => {
            let body = arena.with_children(AstKind::Block, span, vec![case_node]);
            let proc = arena.with_children(AstKind::Always, span, vec![body]);
            let module = ctx.module;
            arena[module].children.push(proc);
            arena[module].children.push(assign_addr);
        }
    }

    arena[node].children.clear();
    arena[node].range_valid = false;
    arena[node].decl = None;
    arena[node].name = Some(id_data);
    arena.clear_basic_prep(node);
    Ok(())
}

/// Splits a bit-select on a memory word into a scratch-wire read
/// followed by a bit-select on the scratch wire.
///
/// Returns the detached replacement identifier.
pub fn expand_mem_bitselect(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    in_lvalue: bool,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let word_range = arena[node].children[0];
    let mem = arena[node].decl.filter(|&d| arena[d].kind == AstKind::Memory);
    let Some(mem) = mem else {
        return Err(errors::error_invalid_shape("invalid bit-select", span));
    };
    if arena[word_range].children.len() != 1 || in_lvalue {
        return Err(errors::error_invalid_shape(
            "invalid bit-select on memory access",
            span,
        ));
    }

    let name = arena[node]
        .name
        .ok_or_else(|| errors::internal("memory access without a name", span))?;
    let (width, _, _) = meminfo(arena, mem)?;

    let wire_id = format!(
        "$mem2bits${}${}${}",
        ctx.interner.resolve(name),
        ctx.location(span),
        ctx.next_index()
    );
    let left = arena.const_int(width as i64 - 1, true, 32, span);
    let right = arena.const_int(0, true, 32, span);
    let range = arena.with_children(AstKind::Range, span, vec![left, right]);
    let wire = arena.with_children(AstKind::Wire, span, vec![range]);
    let wire_name = ctx.interner.intern(&wire_id);
    arena[wire].name = Some(wire_name);
    if ctx.current_block.is_some() {
        let one = arena.const_int(1, false, 32, span);
        arena[wire].attributes.insert(ctx.attr_nosync, one);
    }
    let module = ctx.module;
    arena[module].children.push(wire);
    let args = SimplifyArgs {
        const_fold: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, wire, args)? {}

    // the word read, without the trailing bit select
    let data = arena.clone_subtree(node);
    arena[data].children.pop();

    let lvalue = arena.ident(wire_name, span);
    let assign = arena.with_children(AstKind::AssignEq, span, vec![lvalue, data]);

    if let Some(block) = ctx.current_block {
        let position = ctx
            .current_block_child
            .and_then(|target| arena[block].children.iter().position(|&c| c == target))
            .unwrap_or(arena[block].children.len());
        arena[block].children.insert(position, assign);
        arena[wire].is_reg = true;
    } else {
        let body = arena.with_children(AstKind::Block, span, vec![assign]);
        let proc = arena.with_children(AstKind::Always, span, vec![body]);
        arena[module].children.push(proc);
    }

    let bit_range = arena.clone_subtree(arena[node].children[1]);
    let replacement = arena.with_children(AstKind::Identifier, span, vec![bit_range]);
    arena[replacement].name = Some(wire_name);
    arena[replacement].decl = Some(wire);
    Ok(replacement)
}
