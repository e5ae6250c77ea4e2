//! Expansion of generate constructs, loops, named blocks, cell arrays,
//! and gate primitives.
//!
//! Generate loops are unrolled by cloning the body once per iteration
//! with the loop index bound to a shadowing local parameter; every
//! declaration inside the clone is renamed with a `<block>[<index>].`
//! prefix and every reference to it is rewritten to match. The spent
//! construct is left childless for the driver to unlink.

use std::collections::HashMap;

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, Logic, LogicVec};

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::simplify::{simplify, SimplifyArgs};

/// Folds a detached subtree to a fixed point with constant folding on.
fn fold_to_fixpoint(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<()> {
    let fold_args = SimplifyArgs {
        const_fold: true,
        width: args.width,
        sign: args.sign,
        ..SimplifyArgs::new(args.stage)
    };
    while simplify(ctx, arena, node, fold_args)? {}
    Ok(())
}

/// Builds the renamed form of `old` under a generate prefix: the prefix
/// is inserted after the last hierarchical separator, so a name that is
/// already `outer.inner` becomes `outer.<prefix>inner`.
fn prefixed_name(ctx: &ElabContext<'_>, old: Ident, prefix: &str) -> Ident {
    let text = ctx.interner.resolve(old);
    let pos = text.rfind('.').map(|p| p + 1).unwrap_or(0);
    ctx.interner
        .intern(&format!("{}{}{}", &text[..pos], prefix, &text[pos..]))
}

/// Renames every node in the subtree whose name is `from` to `to`.
///
/// Used for functions, whose result wire shares the function's own
/// name and must follow it through the rename.
fn rename_in_subtree(arena: &mut AstArena, node: NodeId, from: Ident, to: Ident) {
    for child in arena[node].children.clone() {
        rename_in_subtree(arena, child, from, to);
    }
    if arena[node].name == Some(from) {
        arena[node].name = Some(to);
    }
}

/// Annotates the names of all declarations in a generate block and
/// rewrites the references to them.
///
/// When `index_var` is given, identifiers naming it are replaced by the
/// current value of the shadowing loop parameter found in the ambient
/// scope.
pub fn expand_genblock(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    index_var: Option<Ident>,
    prefix: &str,
    name_map: &mut HashMap<Ident, Ident>,
) {
    if let Some(iv) = index_var {
        if arena[node].kind == AstKind::Identifier && arena[node].name == Some(iv) {
            if let Some(&varbuf) = ctx.scope.get(&iv) {
                let value = arena[varbuf].children[0];
                let clone = arena.clone_subtree(value);
                arena.replace_with(node, clone);
            }
            return;
        }
    }

    if matches!(
        arena[node].kind,
        AstKind::Identifier | AstKind::FCall | AstKind::TCall
    ) {
        if let Some(name) = arena[node].name {
            if let Some(&renamed) = name_map.get(&name) {
                arena[node].name = Some(renamed);
            }
        }
    }

    let mut backup_name_map: Option<HashMap<Ident, Ident>> = None;

    for child in arena[node].children.clone() {
        if !arena[child].kind.renamed_in_genblock() {
            continue;
        }
        let Some(old) = arena[child].name else {
            continue;
        };
        if backup_name_map.is_none() {
            backup_name_map = Some(name_map.clone());
        }
        let renamed = prefixed_name(ctx, old, prefix);
        name_map.insert(old, renamed);
        if arena[child].kind == AstKind::Function {
            rename_in_subtree(arena, child, old, renamed);
        } else {
            arena[child].name = Some(renamed);
        }
        ctx.scope.insert(renamed, child);
    }

    for child in arena[node].children.clone() {
        if !matches!(
            arena[child].kind,
            AstKind::Function | AstKind::Task | AstKind::Prefix
        ) {
            expand_genblock(ctx, arena, child, index_var, prefix, name_map);
        }
    }

    if let Some(backup) = backup_name_map {
        *name_map = backup;
    }
}

/// Unrolls a `genfor` or procedural `for` loop.
///
/// The iterations of a `genfor` are spliced into the module; those of a
/// `for` are spliced into the enclosing block at the loop's position.
/// Returns `false` when the node has no children left to process.
pub fn unroll_loop(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    if arena[node].children.is_empty() {
        return Ok(false);
    }
    let span = arena[node].span;
    let is_genfor = arena[node].kind == AstKind::GenFor;

    let init = arena[node].children[0];
    let cond = arena[node].children[1];
    let step = arena[node].children[2];
    let mut body = arena[node].children[3];

    // collapse nested anonymous single-child generate blocks
    while arena[body].kind == AstKind::GenBlock
        && arena[body].name.is_none()
        && arena[body].children.len() == 1
        && arena[arena[body].children[0]].kind == AstKind::GenBlock
    {
        body = arena[body].children[0];
    }

    if arena[init].kind != AstKind::AssignEq {
        return Err(errors::error_invalid_shape(
            "unsupported initialization in for-loop",
            arena[init].span,
        ));
    }
    if arena[step].kind != AstKind::AssignEq {
        return Err(errors::error_invalid_shape(
            "unsupported increment in for-loop",
            arena[step].span,
        ));
    }

    let init_lhs = arena[init].children[0];
    let step_lhs = arena[step].children[0];
    let expected = if is_genfor {
        AstKind::GenVar
    } else {
        AstKind::Wire
    };
    for &lhs in [init_lhs, step_lhs].iter() {
        let ok = arena[lhs]
            .decl
            .is_some_and(|d| arena[d].kind == expected);
        if !ok {
            let what = if is_genfor {
                "left-hand side of a generate for-loop is not a genvar"
            } else {
                "left-hand side of a for-loop is not a register"
            };
            return Err(errors::error_invalid_shape(what, arena[lhs].span));
        }
    }
    if arena[init_lhs].decl != arena[step_lhs].decl {
        return Err(errors::error_invalid_shape(
            "for-loop initialization and increment target different variables",
            span,
        ));
    }

    let init_value = arena[init].children[1];
    let varbuf_value = arena.clone_subtree(init_value);
    fold_to_fixpoint(ctx, arena, varbuf_value, args)?;
    if arena[varbuf_value].kind != AstKind::Constant {
        return Err(errors::error_not_constant(
            "for-loop initial value",
            arena[init_value].span,
        ));
    }

    let index_name = arena[init_lhs]
        .name
        .ok_or_else(|| errors::internal("loop variable has no name", span))?;
    let varbuf = arena.with_children(AstKind::LocalParam, span, vec![varbuf_value]);
    arena[varbuf].name = Some(index_name);

    let shadowed = ctx.scope.insert(index_name, varbuf);
    let result = unroll_iterations(
        ctx, arena, node, args, is_genfor, cond, step, body, varbuf, index_name,
    );
    match shadowed {
        Some(old) => {
            ctx.scope.insert(index_name, old);
        }
        None => {
            ctx.scope.remove(&index_name);
        }
    }
    result?;

    arena[node].children.clear();
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn unroll_iterations(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
    is_genfor: bool,
    cond: NodeId,
    step: NodeId,
    body: NodeId,
    varbuf: NodeId,
    index_name: Ident,
) -> ElabResult<()> {
    let span = arena[node].span;

    let mut insert_idx = 0;
    let for_block = if is_genfor {
        None
    } else {
        let block = ctx
            .current_block
            .ok_or_else(|| errors::internal("for-loop outside a block", span))?;
        while insert_idx < arena[block].children.len()
            && Some(arena[block].children[insert_idx]) != ctx.current_block_child
        {
            insert_idx += 1;
        }
        Some(block)
    };

    loop {
        let cond_clone = arena.clone_subtree(cond);
        fold_to_fixpoint(ctx, arena, cond_clone, args)?;
        if arena[cond_clone].kind != AstKind::Constant {
            return Err(errors::error_not_constant(
                "for-loop condition",
                arena[cond].span,
            ));
        }
        if !arena[cond_clone].as_bool() {
            break;
        }

        let index = arena[arena[varbuf].children[0]].integer;

        let buf = if arena[body].kind == AstKind::GenBlock {
            arena.clone_subtree(body)
        } else {
            let cloned = arena.clone_subtree(body);
            arena.with_children(AstKind::GenBlock, span, vec![cloned])
        };
        let block_name = match arena[buf].name {
            Some(existing) => existing,
            None => {
                let fresh = format!("$genblock${}${}", ctx.location(span), ctx.next_index());
                let fresh = ctx.interner.intern(&fresh);
                arena[buf].name = Some(fresh);
                fresh
            }
        };
        let prefix = format!("{}[{index}].", ctx.interner.resolve(block_name));

        let mut name_map = HashMap::new();
        expand_genblock(ctx, arena, buf, Some(index_name), &prefix, &mut name_map);

        let spliced = std::mem::take(&mut arena[buf].children);
        match for_block {
            None => {
                let module = ctx.module;
                for child in spliced {
                    simplify(ctx, arena, child, SimplifyArgs::new(args.stage))?;
                    arena[module].children.push(child);
                }
            }
            Some(block) => {
                for child in spliced {
                    arena[block].children.insert(insert_idx, child);
                    insert_idx += 1;
                }
            }
        }

        let step_value = arena.clone_subtree(arena[step].children[1]);
        fold_to_fixpoint(ctx, arena, step_value, args)?;
        if arena[step_value].kind != AstKind::Constant {
            return Err(errors::error_not_constant(
                "for-loop increment",
                arena[step].span,
            ));
        }
        arena[varbuf].children[0] = step_value;
    }
    Ok(())
}

/// Lifts the wires of a named block to the module under the block's
/// name prefix and drops the name.
pub fn expand_named_block(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    let Some(name) = arena[node].name else {
        return Ok(false);
    };
    let prefix = format!("{}.", ctx.interner.resolve(name));
    let mut name_map = HashMap::new();
    expand_genblock(ctx, arena, node, None, &prefix, &mut name_map);

    let children = std::mem::take(&mut arena[node].children);
    let mut kept = Vec::with_capacity(children.len());
    let module = ctx.module;
    for child in children {
        if arena[child].kind == AstKind::Wire {
            simplify(ctx, arena, child, SimplifyArgs::new(args.stage))?;
            arena[module].children.push(child);
        } else {
            kept.push(child);
        }
    }
    arena[node].children = kept;
    arena[node].name = None;
    Ok(true)
}

/// Splices an unconditional generate block into the module.
pub fn splice_genblock(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    if arena[node].children.is_empty() {
        return Ok(false);
    }
    if let Some(name) = arena[node].name {
        let prefix = format!("{}.", ctx.interner.resolve(name));
        let mut name_map = HashMap::new();
        expand_genblock(ctx, arena, node, None, &prefix, &mut name_map);
    }
    let children = std::mem::take(&mut arena[node].children);
    let module = ctx.module;
    for child in children {
        simplify(ctx, arena, child, SimplifyArgs::new(args.stage))?;
        arena[module].children.push(child);
    }
    Ok(true)
}

/// Selects and splices the taken branch of a `generate if`.
pub fn select_genif(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    if arena[node].children.len() < 2 {
        return Ok(false);
    }
    let span = arena[node].span;
    let cond_clone = arena.clone_subtree(arena[node].children[0]);
    fold_to_fixpoint(ctx, arena, cond_clone, args)?;
    if arena[cond_clone].kind != AstKind::Constant {
        return Err(errors::error_not_constant("generate if condition", span));
    }

    let chosen = if arena[cond_clone].as_bool() {
        Some(arena[node].children[1])
    } else {
        arena[node].children.get(2).copied()
    };

    if let Some(branch) = chosen {
        let buf = arena.clone_subtree(branch);
        let buf = if arena[buf].kind == AstKind::GenBlock {
            buf
        } else {
            arena.with_children(AstKind::GenBlock, span, vec![buf])
        };
        expand_and_splice(ctx, arena, buf, args)?;
    }

    arena[node].children.clear();
    Ok(true)
}

/// Selects and splices the matching arm of a `generate case`.
pub fn select_gencase(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    if arena[node].children.is_empty() {
        return Ok(false);
    }
    let span = arena[node].span;
    let disc = arena.clone_subtree(arena[node].children[0]);
    fold_to_fixpoint(ctx, arena, disc, args)?;
    if arena[disc].kind != AstKind::Constant {
        return Err(errors::error_not_constant("generate case discriminant", span));
    }
    let ref_signed = arena[disc].is_signed;
    let ref_bits = arena[disc].bits.clone();

    let mut selected: Option<NodeId> = None;
    'arms: for arm in arena[node].children.clone().into_iter().skip(1) {
        if arena[arm].kind != AstKind::Cond {
            return Err(errors::internal("generate case arm is not a case item", span));
        }
        let mut arm_block: Option<NodeId> = None;
        for child in arena[arm].children.clone() {
            if arena[child].kind == AstKind::GenBlock {
                if arm_block.is_some() {
                    return Err(errors::internal(
                        "generate case arm has several blocks",
                        span,
                    ));
                }
                arm_block = Some(child);
            }
        }
        for child in arena[arm].children.clone() {
            match arena[child].kind {
                AstKind::Default => {
                    if selected.is_none() {
                        selected = arm_block;
                    }
                }
                AstKind::GenBlock => {}
                _ => {
                    let value = arena.clone_subtree(child);
                    fold_to_fixpoint(ctx, arena, value, args)?;
                    if arena[value].kind != AstKind::Constant {
                        return Err(errors::error_not_constant(
                            "generate case item",
                            arena[child].span,
                        ));
                    }
                    let both_signed = ref_signed && arena[value].is_signed;
                    let arm_bits = arena[value].bits.clone();
                    let matched = veld_common::const_ops::eq(
                        &ref_bits,
                        &arm_bits,
                        both_signed,
                        both_signed,
                        Some(1),
                    );
                    if matched.is_true() {
                        selected = arm_block;
                        break 'arms;
                    }
                }
            }
        }
    }

    if let Some(block) = selected {
        let buf = arena.clone_subtree(block);
        expand_and_splice(ctx, arena, buf, args)?;
    }

    arena[node].children.clear();
    Ok(true)
}

/// Expands a detached generate block (renaming if it is named) and
/// splices its children into the module.
fn expand_and_splice(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    buf: NodeId,
    args: SimplifyArgs,
) -> ElabResult<()> {
    if let Some(name) = arena[buf].name {
        let prefix = format!("{}.", ctx.interner.resolve(name));
        let mut name_map = HashMap::new();
        expand_genblock(ctx, arena, buf, None, &prefix, &mut name_map);
    }
    let children = std::mem::take(&mut arena[buf].children);
    let module = ctx.module;
    for child in children {
        simplify(ctx, arena, child, SimplifyArgs::new(args.stage))?;
        arena[module].children.push(child);
    }
    Ok(())
}

/// Unrolls a cell array into a generate block of decorated cells.
///
/// Returns the detached replacement block.
pub fn unroll_cellarray(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let range = arena[node].children[0];
    if !arena[range].range_valid {
        return Err(errors::error_not_constant("cell array range", span));
    }
    let (left, right) = (arena[range].range_left, arena[range].range_right);
    let num = (left - right).abs() + 1;

    let genblock = arena.node(AstKind::GenBlock, span);
    for i in 0..num {
        let idx = if left > right { right + i } else { right - i };
        let template = arena[node].children[1];
        let new_cell = arena.clone_subtree(template);
        if arena[new_cell].kind == AstKind::Primitive {
            return Err(errors::error_unsupported(
                "cell arrays of primitives are not supported",
                span,
            ));
        }
        let suffix = format!("[{idx}]");
        arena[new_cell].name = Some(match arena[new_cell].name {
            Some(old) => ctx.interner.suffixed(old, &suffix),
            None => ctx.interner.intern(&suffix),
        });

        let cell_type = arena[new_cell].children[0];
        if arena[cell_type].kind != AstKind::CellType {
            return Err(errors::internal("cell without a cell type", span));
        }
        let old_type = arena[cell_type]
            .name
            .ok_or_else(|| errors::internal("cell type without a name", span))?;
        let decorated = format!("$array:{}:{}:{}", i, num, ctx.interner.resolve(old_type));
        arena[cell_type].name = Some(ctx.interner.intern(&decorated));

        arena[genblock].children.push(new_cell);
    }
    Ok(genblock)
}

/// Rewrites a gate primitive instantiation into a continuous
/// assignment over the corresponding bit operators.
pub fn rewrite_primitive(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<bool> {
    let span = arena[node].span;
    let Some(name) = arena[node].name else {
        return Ok(false);
    };
    let gate = ctx.interner.resolve(name).to_string();

    if arena[node].children.len() < 2 {
        return Err(errors::error_invalid_shape(
            &format!("insufficient number of arguments for primitive `{gate}`"),
            span,
        ));
    }
    let mut ports = Vec::new();
    for child in arena[node].children.clone() {
        if arena[child].kind != AstKind::Argument || arena[child].children.len() != 1 {
            return Err(errors::internal("malformed primitive argument", span));
        }
        ports.push(arena[child].children[0]);
    }
    arena[node].children.clear();

    if matches!(gate.as_str(), "bufif0" | "bufif1" | "notif0" | "notif1") {
        if ports.len() != 3 {
            return Err(errors::error_invalid_shape(
                &format!("invalid number of arguments for primitive `{gate}`"),
                span,
            ));
        }
        let z_const = arena.const_bits(LogicVec::from_logic(Logic::Z), false, span);
        let mut input = ports[1];
        if gate.starts_with("notif") {
            input = arena.with_children(AstKind::BitNot, span, vec![input]);
        }
        let branches = if gate == "bufif0" {
            vec![ports[2], z_const, input]
        } else {
            vec![ports[2], input, z_const]
        };
        let ternary = arena.with_children(AstKind::Ternary, span, branches);
        arena[node].kind = AstKind::Assign;
        arena[node].name = None;
        arena[node].children = vec![ports[0], ternary];
        return Ok(true);
    }

    let (op, invert) = match gate.as_str() {
        "and" => (AstKind::BitAnd, false),
        "nand" => (AstKind::BitAnd, true),
        "or" => (AstKind::BitOr, false),
        "nor" => (AstKind::BitOr, true),
        "xor" => (AstKind::BitXor, false),
        "xnor" => (AstKind::BitXor, true),
        "buf" => (AstKind::Pos, false),
        "not" => (AstKind::Pos, true),
        _ => {
            return Err(errors::error_unsupported(
                &format!("unsupported primitive `{gate}`"),
                span,
            ));
        }
    };

    let mut expr = ports[1];
    if op != AstKind::Pos {
        for &port in &ports[2..] {
            expr = arena.with_children(op, span, vec![expr, port]);
        }
    }
    if invert {
        expr = arena.with_children(AstKind::BitNot, span, vec![expr]);
    }

    arena[node].kind = AstKind::Assign;
    arena[node].name = None;
    arena[node].children = vec![ports[0], expr];
    Ok(true)
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

    #[test]
    fn prefixed_name_plain() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let ctx = fx.ctx(module);

        let w = fx.interner.intern("w");
        let renamed = prefixed_name(&ctx, w, "blk[0].");
        assert_eq!(fx.interner.resolve(renamed), "blk[0].w");
    }

    #[test]
    fn prefixed_name_nested_inserts_after_dot() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let ctx = fx.ctx(module);

        let w = fx.interner.intern("outer.w");
        let renamed = prefixed_name(&ctx, w, "blk[2].");
        assert_eq!(fx.interner.resolve(renamed), "outer.blk[2].w");
    }

    #[test]
    fn expand_renames_declarations_and_references() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let w = fx.interner.intern("w");
        let wire = arena.node(AstKind::Wire, Span::DUMMY);
        arena[wire].name = Some(w);
        let reference = arena.ident(w, Span::DUMMY);
        let block = arena.with_children(AstKind::GenBlock, Span::DUMMY, vec![wire, reference]);

        let mut map = HashMap::new();
        expand_genblock(&mut ctx, &mut arena, block, None, "g[1].", &mut map);

        assert_eq!(fx.interner.resolve(arena[wire].name.unwrap()), "g[1].w");
        assert_eq!(
            fx.interner.resolve(arena[reference].name.unwrap()),
            "g[1].w"
        );
        // the renamed wire is now in scope
        assert!(ctx.scope.contains_key(&fx.interner.intern("g[1].w")));
    }

    #[test]
    fn expand_substitutes_loop_index() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let i = fx.interner.intern("i");
        let value = arena.const_int(3, true, 32, Span::DUMMY);
        let varbuf = arena.with_children(AstKind::LocalParam, Span::DUMMY, vec![value]);
        arena[varbuf].name = Some(i);
        ctx.scope.insert(i, varbuf);

        let use_of_i = arena.ident(i, Span::DUMMY);
        let block = arena.with_children(AstKind::GenBlock, Span::DUMMY, vec![use_of_i]);

        let mut map = HashMap::new();
        expand_genblock(&mut ctx, &mut arena, block, Some(i), "g[3].", &mut map);

        assert_eq!(arena[use_of_i].kind, AstKind::Constant);
        assert_eq!(arena[use_of_i].integer, 3);
    }

    #[test]
    fn cellarray_unrolls_and_decorates() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let range = arena.node(AstKind::Range, Span::DUMMY);
        arena[range].range_valid = true;
        arena[range].range_left = 2;
        arena[range].range_right = 0;

        let cell_type = arena.node(AstKind::CellType, Span::DUMMY);
        arena[cell_type].name = Some(fx.interner.intern("adder"));
        let cell = arena.with_children(AstKind::Cell, Span::DUMMY, vec![cell_type]);
        arena[cell].name = Some(fx.interner.intern("u"));

        let array = arena.with_children(AstKind::CellArray, Span::DUMMY, vec![range, cell]);
        let replacement = unroll_cellarray(&mut ctx, &mut arena, array).unwrap();

        assert_eq!(arena[replacement].kind, AstKind::GenBlock);
        assert_eq!(arena[replacement].children.len(), 3);
        let first = arena[replacement].children[0];
        assert_eq!(fx.interner.resolve(arena[first].name.unwrap()), "u[0]");
        let first_type = arena[first].children[0];
        assert_eq!(
            fx.interner.resolve(arena[first_type].name.unwrap()),
            "$array:0:3:adder"
        );
    }

    #[test]
    fn primitive_nand_becomes_inverted_and() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let out = arena.ident(fx.interner.intern("y"), Span::DUMMY);
        let a = arena.ident(fx.interner.intern("a"), Span::DUMMY);
        let b = arena.ident(fx.interner.intern("b"), Span::DUMMY);
        let args: Vec<NodeId> = [out, a, b]
            .iter()
            .map(|&p| arena.with_children(AstKind::Argument, Span::DUMMY, vec![p]))
            .collect();
        let prim = arena.with_children(AstKind::Primitive, Span::DUMMY, args);
        arena[prim].name = Some(fx.interner.intern("nand"));

        assert!(rewrite_primitive(&mut ctx, &mut arena, prim).unwrap());
        assert_eq!(arena[prim].kind, AstKind::Assign);
        assert_eq!(arena[prim].children[0], out);
        let expr = arena[prim].children[1];
        assert_eq!(arena[expr].kind, AstKind::BitNot);
        assert_eq!(arena[arena[expr].children[0]].kind, AstKind::BitAnd);
    }

    #[test]
    fn primitive_bufif1_becomes_tristate_ternary() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let out = arena.ident(fx.interner.intern("y"), Span::DUMMY);
        let input = arena.ident(fx.interner.intern("a"), Span::DUMMY);
        let enable = arena.ident(fx.interner.intern("en"), Span::DUMMY);
        let args: Vec<NodeId> = [out, input, enable]
            .iter()
            .map(|&p| arena.with_children(AstKind::Argument, Span::DUMMY, vec![p]))
            .collect();
        let prim = arena.with_children(AstKind::Primitive, Span::DUMMY, args);
        arena[prim].name = Some(fx.interner.intern("bufif1"));

        assert!(rewrite_primitive(&mut ctx, &mut arena, prim).unwrap());
        let ternary = arena[prim].children[1];
        assert_eq!(arena[ternary].kind, AstKind::Ternary);
        assert_eq!(arena[ternary].children[0], enable);
        assert_eq!(arena[ternary].children[1], input);
        let z_branch = arena[ternary].children[2];
        assert_eq!(arena[z_branch].bits.get(0), Logic::Z);
    }

    #[test]
    fn primitive_with_too_few_args_errors() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let out = arena.ident(fx.interner.intern("y"), Span::DUMMY);
        let arg = arena.with_children(AstKind::Argument, Span::DUMMY, vec![out]);
        let prim = arena.with_children(AstKind::Primitive, Span::DUMMY, vec![arg]);
        arena[prim].name = Some(fx.interner.intern("and"));

        let err = rewrite_primitive(&mut ctx, &mut arena, prim).unwrap_err();
        assert_eq!(err.0.code, errors::E304);
    }
}
