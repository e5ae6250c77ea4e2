//! Interpretation of constant function calls.
//!
//! A cloned workspace of the function declaration is executed over a
//! statement work list: the head statement is taken, variables in it
//! are substituted by their current values, and the statement either
//! stores into a local variable slot or expands into more work-list
//! entries (loop bodies, selected case arms, spliced blocks). The
//! function body itself is never shared with the module tree, so the
//! interpretation cannot disturb other call sites.

use std::collections::HashMap;

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, LogicVec};

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// The value slot of one local variable of the function.
struct VarInfo {
    value: LogicVec,
    offset: i64,
    is_signed: bool,
}

fn fold_args() -> SimplifyArgs {
    SimplifyArgs {
        const_fold: true,
        in_param: true,
        ..SimplifyArgs::new(Stage::One)
    }
}

/// Evaluates a constant function call.
///
/// `func` is a private clone of the function declaration; `fcall` is
/// the call site whose children are the (already folded, all-constant)
/// actual arguments. Returns a detached constant node with the result.
pub fn eval_const_function(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    func: NodeId,
    fcall: NodeId,
) -> ElabResult<NodeId> {
    let mut variables: HashMap<Ident, VarInfo> = HashMap::new();
    let mut backup_scope: HashMap<Ident, Option<NodeId>> = HashMap::new();

    let result = run(ctx, arena, func, fcall, &mut variables, &mut backup_scope);

    for (name, shadowed) in backup_scope {
        match shadowed {
            Some(old) => {
                ctx.scope.insert(name, old);
            }
            None => {
                ctx.scope.remove(&name);
            }
        }
    }
    result
}

fn run(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    func: NodeId,
    fcall: NodeId,
    variables: &mut HashMap<Ident, VarInfo>,
    backup_scope: &mut HashMap<Ident, Option<NodeId>>,
) -> ElabResult<NodeId> {
    let call_span = arena[fcall].span;
    let call_loc = ctx.location(call_span);
    let fname = arena[func]
        .name
        .ok_or_else(|| errors::internal("constant function has no name", call_span))?;

    let mut block: Option<NodeId> = None;
    let mut block_is_temp = false;
    let mut argidx = 0usize;

    for child in arena[func].children.clone() {
        match arena[child].kind {
            AstKind::Block => {
                if block.is_some() {
                    return Err(errors::internal(
                        "constant function has several body blocks",
                        call_span,
                    ));
                }
                block = Some(child);
            }
            AstKind::Wire => {
                while simplify(ctx, arena, child, fold_args())? {}
                let span = arena[child].span;
                let Some(name) = arena[child].name else {
                    return Err(errors::internal("unnamed function variable", span));
                };
                if !arena[child].range_valid {
                    return Err(errors::error_not_constant(
                        &format!(
                            "size of variable `{}` in constant function (called from {call_loc})",
                            ctx.interner.resolve(name)
                        ),
                        span,
                    ));
                }
                let width = arena[child].range_width().unwrap_or(1);
                let mut info = VarInfo {
                    value: LogicVec::all_x(width),
                    offset: arena[child].range_left.min(arena[child].range_right),
                    is_signed: arena[child].is_signed,
                };
                if arena[child].is_input && argidx < arena[fcall].children.len() {
                    let actual = arena[fcall].children[argidx];
                    info.value = arena[actual].bits_as_const(width);
                    argidx += 1;
                }
                let shadowed = ctx.scope.insert(name, child);
                backup_scope.entry(name).or_insert(shadowed);
                variables.insert(name, info);
            }
            _ => {
                let stmt = arena.clone_subtree(child);
                match block {
                    None => {
                        block = Some(arena.with_children(AstKind::Block, call_span, vec![stmt]));
                        block_is_temp = true;
                    }
                    Some(b) if block_is_temp => arena[b].children.push(stmt),
                    Some(_) => {
                        return Err(errors::internal(
                            "statement outside the function body block",
                            arena[child].span,
                        ));
                    }
                }
            }
        }
    }

    let block = block
        .ok_or_else(|| errors::internal("constant function has no body", call_span))?;
    if !variables.contains_key(&fname) {
        return Err(errors::internal(
            "constant function has no result variable",
            call_span,
        ));
    }

    while !arena[block].children.is_empty() {
        let stmt = arena[block].children[0];
        let span = arena[stmt].span;
        match arena[stmt].kind {
            AstKind::AssignEq => {
                let rhs = arena[stmt].children[1];
                replace_variables(ctx, arena, rhs, variables, fcall)?;
                while simplify(ctx, arena, stmt, fold_args())? {}
                if arena[stmt].kind != AstKind::AssignEq {
                    continue;
                }

                let rhs = arena[stmt].children[1];
                if arena[rhs].kind != AstKind::Constant {
                    return Err(errors::error_not_constant(
                        &format!("expression in constant function (called from {call_loc})"),
                        span,
                    ));
                }
                let lhs = arena[stmt].children[0];
                if arena[lhs].kind != AstKind::Identifier {
                    return Err(errors::error_unsupported(
                        "composite left hand side in constant function",
                        span,
                    ));
                }
                let lname = arena[lhs]
                    .name
                    .ok_or_else(|| errors::internal("unnamed lvalue", span))?;
                if !variables.contains_key(&lname) {
                    return Err(errors::error_unsupported(
                        "assignment to non-local variable in constant function",
                        span,
                    ));
                }

                if arena[lhs].children.is_empty() {
                    let width = variables[&lname].value.width();
                    let bits = arena[rhs].bits_as_const(width);
                    variables.get_mut(&lname).unwrap().value = bits;
                } else {
                    let range = arena[lhs].children[0];
                    if !arena[range].range_valid {
                        return Err(errors::error_not_constant(
                            &format!("range in constant function (called from {call_loc})"),
                            span,
                        ));
                    }
                    let sel_offset =
                        arena[range].range_left.min(arena[range].range_right);
                    let var = variables.get_mut(&lname).unwrap();
                    let width = arena[range]
                        .range_width()
                        .unwrap_or(1)
                        .min(var.value.width());
                    let position = sel_offset - var.offset;
                    if position < 0 || position as u32 + width > var.value.width() {
                        return Err(errors::error_invalid_shape(
                            "range select out of bounds in constant function",
                            span,
                        ));
                    }
                    let bits = arena[rhs].bits_as_const(width);
                    variables
                        .get_mut(&lname)
                        .unwrap()
                        .value
                        .assign_range(position as u32, &bits);
                }
                arena[block].children.remove(0);
            }

            AstKind::For => {
                // rewrite into {init; while (cond) { body; step }}
                let init = arena[stmt].children[0];
                let cond = arena[stmt].children[1];
                let step = arena[stmt].children[2];
                let body = arena[stmt].children[3];
                arena[body].children.push(step);
                arena[stmt].children = vec![cond, body];
                arena[stmt].kind = AstKind::While;
                arena[block].children.insert(0, init);
            }

            AstKind::While => {
                let cond = arena.clone_subtree(arena[stmt].children[0]);
                replace_variables(ctx, arena, cond, variables, fcall)?;
                while simplify(ctx, arena, cond, fold_args())? {}
                if arena[cond].kind != AstKind::Constant {
                    return Err(errors::error_not_constant(
                        &format!("while condition in constant function (called from {call_loc})"),
                        span,
                    ));
                }
                if arena[cond].as_bool() {
                    let body = arena.clone_subtree(arena[stmt].children[1]);
                    arena[block].children.insert(0, body);
                } else {
                    arena[block].children.remove(0);
                }
            }

            AstKind::Repeat => {
                let count = arena.clone_subtree(arena[stmt].children[0]);
                replace_variables(ctx, arena, count, variables, fcall)?;
                while simplify(ctx, arena, count, fold_args())? {}
                if arena[count].kind != AstKind::Constant {
                    return Err(errors::error_not_constant(
                        &format!("repeat count in constant function (called from {call_loc})"),
                        span,
                    ));
                }
                let n = arena[count].integer.max(0);
                let body = arena[stmt].children[1];
                arena[block].children.remove(0);
                for _ in 0..n {
                    let copy = arena.clone_subtree(body);
                    arena[block].children.insert(0, copy);
                }
            }

            AstKind::Case => {
                let disc = arena.clone_subtree(arena[stmt].children[0]);
                replace_variables(ctx, arena, disc, variables, fcall)?;
                while simplify(ctx, arena, disc, fold_args())? {}

                let mut selected: Option<NodeId> = None;
                'arms: for arm in arena[stmt].children.clone().into_iter().skip(1) {
                    if arena[arm].kind != AstKind::Cond {
                        return Err(errors::internal("case arm is not a case item", span));
                    }
                    let arm_children = arena[arm].children.clone();
                    let Some((&body, patterns)) = arm_children.split_last() else {
                        return Err(errors::internal("empty case arm", span));
                    };
                    if patterns
                        .first()
                        .is_some_and(|&p| arena[p].kind == AstKind::Default)
                    {
                        selected = Some(body);
                        continue;
                    }
                    for &pattern in patterns {
                        let value = arena.clone_subtree(pattern);
                        replace_variables(ctx, arena, value, variables, fcall)?;
                        let disc_copy = arena.clone_subtree(disc);
                        let test =
                            arena.with_children(AstKind::Eq, span, vec![disc_copy, value]);
                        while simplify(ctx, arena, test, fold_args())? {}
                        if arena[test].kind != AstKind::Constant {
                            return Err(errors::error_not_constant(
                                &format!(
                                    "case item in constant function (called from {call_loc})"
                                ),
                                span,
                            ));
                        }
                        if arena[test].as_bool() {
                            selected = Some(body);
                            break 'arms;
                        }
                    }
                }

                arena[block].children.remove(0);
                if let Some(body) = selected {
                    let copy = arena.clone_subtree(body);
                    arena[block].children.insert(0, copy);
                }
            }

            AstKind::Block => {
                let inner = std::mem::take(&mut arena[stmt].children);
                arena[block].children.remove(0);
                for (i, child) in inner.into_iter().enumerate() {
                    arena[block].children.insert(i, child);
                }
            }

            _ => {
                return Err(errors::error_unsupported(
                    "unsupported language construct in constant function",
                    span,
                ));
            }
        }
    }

    let info = &variables[&fname];
    Ok(arena.const_bits(info.value.clone(), info.is_signed, call_span))
}

/// Substitutes references to function-local variables by their current
/// constant values, applying bit/part selects on the spot.
fn replace_variables(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    variables: &HashMap<Ident, VarInfo>,
    fcall: NodeId,
) -> ElabResult<()> {
    let span = arena[node].span;
    if arena[node].kind == AstKind::Identifier {
        if let Some(name) = arena[node].name {
            if variables.contains_key(&name) {
                let (var_offset, var_width, is_signed) = {
                    let var = &variables[&name];
                    (var.offset, var.value.width(), var.is_signed)
                };
                let mut offset = 0i64;
                let mut width = var_width;

                if !arena[node].children.is_empty() {
                    if arena[node].children.len() != 1
                        || arena[arena[node].children[0]].kind != AstKind::Range
                    {
                        return Err(errors::error_unsupported(
                            "memory access in constant function",
                            span,
                        ));
                    }
                    let range = arena[node].children[0];
                    replace_variables(ctx, arena, range, variables, fcall)?;
                    while simplify(ctx, arena, node, fold_args())? {}
                    let range = arena[node].children[0];
                    if !arena[range].range_valid {
                        return Err(errors::error_not_constant(
                            "range in constant function",
                            span,
                        ));
                    }
                    let sel_offset = arena[range].range_left.min(arena[range].range_right);
                    width = arena[range].range_width().unwrap_or(1).min(width);
                    offset = sel_offset - var_offset;
                }

                if offset < 0 || offset as u32 + width > var_width {
                    return Err(errors::error_invalid_shape(
                        "range select out of bounds in constant function",
                        span,
                    ));
                }
                let bits = variables[&name].value.slice(offset as u32, width);
                let replacement = arena.const_bits(bits, is_signed, span);
                arena.replace_with(node, replacement);
                return Ok(());
            }
        }
    }

    for child in arena[node].children.clone() {
        replace_variables(ctx, arena, child, variables, fcall)?;
    }
    Ok(())
}
