//! Folding of system function calls and inlining of user functions and
//! tasks.
//!
//! A call whose callee needs constant evaluation (or that appears in a
//! constant context) is interpreted by [`const_func`](crate::const_func)
//! when all arguments fold. Every other call is inlined: the callee's
//! wires are cloned into the module under a unique `$func$…` prefix,
//! input-port assignments and the renamed body statements are inserted
//! before the calling statement, and the call site becomes a reference
//! to the renamed result wire.

use std::collections::HashMap;

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{Ident, Logic};

use crate::const_func;
use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::simplify::{simplify, SimplifyArgs, Stage};
use crate::width::detect_sign_width;

/// What [`simplify_call`] did with the call node.
#[derive(Debug)]
pub enum CallOutcome {
    /// The call folds to this detached replacement node.
    Replaced(NodeId),
    /// The call was rewritten in place (inlined or consumed).
    Inlined,
}

const REAL_FUNCTIONS: &[&str] = &[
    "$ln", "$log10", "$exp", "$sqrt", "$pow", "$floor", "$ceil", "$sin", "$cos", "$tan", "$asin",
    "$acos", "$atan", "$atan2", "$hypot", "$sinh", "$cosh", "$tanh", "$asinh", "$acosh", "$atanh",
];

/// Scans a callee for constructs that only the constant-function
/// interpreter can execute.
///
/// A `for` loop makes constant evaluation advisable; `while` and
/// `repeat` make it mandatory. Calls inside the body are scanned
/// transitively.
pub fn has_const_only_constructs(
    ctx: &ElabContext<'_>,
    arena: &AstArena,
    node: NodeId,
    recommend: &mut bool,
) -> bool {
    match arena[node].kind {
        AstKind::For => *recommend = true,
        AstKind::While | AstKind::Repeat => return true,
        AstKind::FCall => {
            if let Some(name) = arena[node].name {
                if let Some(&decl) = ctx.scope.get(&name) {
                    if has_const_only_constructs(ctx, arena, decl, recommend) {
                        return true;
                    }
                }
            }
        }
        _ => {}
    }
    arena[node]
        .children
        .iter()
        .any(|&child| has_const_only_constructs(ctx, arena, child, recommend))
}

/// Handles an `FCall`/`TCall` node with a non-empty name.
pub fn simplify_call(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<CallOutcome> {
    let span = arena[node].span;
    let kind = arena[node].kind;
    let name = arena[node]
        .name
        .ok_or_else(|| errors::internal("call without a name", span))?;
    let text = ctx.interner.resolve(name).to_string();

    let decl = if kind == AstKind::FCall {
        if text == "$clog2" {
            return fold_clog2(ctx, arena, node, args).map(CallOutcome::Replaced);
        }
        if REAL_FUNCTIONS.contains(&text.as_str()) {
            return fold_real_function(ctx, arena, node, args, &text).map(CallOutcome::Replaced);
        }
        let decl = ctx.scope.get(&name).copied();
        decl.filter(|&d| arena[d].kind == AstKind::Function)
            .ok_or_else(|| errors::error_unresolved("function", &text, span))?
    } else {
        let decl = ctx.scope.get(&name).copied();
        decl.filter(|&d| arena[d].kind == AstKind::Task)
            .ok_or_else(|| errors::error_unresolved("task", &text, span))?
    };

    let mut recommend_const_eval = false;
    let require_const_eval = if args.in_param {
        false
    } else {
        has_const_only_constructs(ctx, arena, decl, &mut recommend_const_eval)
    };

    if args.in_param || recommend_const_eval || require_const_eval {
        let mut all_args_const = true;
        for child in arena[node].children.clone() {
            let fold_args = SimplifyArgs {
                const_fold: true,
                in_param: true,
                ..SimplifyArgs::new(Stage::One)
            };
            while simplify(ctx, arena, child, fold_args)? {}
            if arena[child].kind != AstKind::Constant {
                all_args_const = false;
            }
        }
        if all_args_const {
            let workspace = arena.clone_subtree(decl);
            let result = const_func::eval_const_function(ctx, arena, workspace, node)?;
            return Ok(CallOutcome::Replaced(result));
        }
        if args.in_param {
            return Err(errors::error_not_constant(
                "function call in constant expression",
                span,
            ));
        }
        if require_const_eval {
            return Err(errors::error_unsupported(
                &format!("function `{text}` can only be called with constant arguments"),
                span,
            ));
        }
    }

    let prefix = format!("$func${}${}${}$", text, ctx.location(span), ctx.next_index());

    if ctx.current_block.is_none() {
        inline_outside_block(ctx, arena, node, decl, name, &prefix, &text)?;
        return Ok(CallOutcome::Inlined);
    }

    let mut replace_rules: HashMap<Ident, Ident> = HashMap::new();
    let mut arg_count = 0usize;

    for child in arena[decl].children.clone() {
        if arena[child].kind == AstKind::Wire {
            let old = arena[child]
                .name
                .ok_or_else(|| errors::internal("unnamed wire in function", span))?;
            let renamed = ctx
                .interner
                .intern(&format!("{prefix}{}", ctx.interner.resolve(old)));
            let wire = arena.clone_subtree(child);
            arena[wire].name = Some(renamed);
            arena[wire].port_id = 0;
            arena[wire].is_input = false;
            arena[wire].is_output = false;
            let module = ctx.module;
            arena[module].children.push(wire);
            let wire_args = SimplifyArgs {
                const_fold: true,
                ..SimplifyArgs::new(Stage::One)
            };
            while simplify(ctx, arena, wire, wire_args)? {}

            replace_rules.insert(old, renamed);

            if arena[child].is_input && arg_count < arena[node].children.len() {
                let actual = arena[node].children[arg_count];
                arg_count += 1;
                let actual = arena.clone_subtree(actual);
                let formal = arena.ident(renamed, span);
                let assign =
                    arena.with_children(AstKind::AssignEq, span, vec![formal, actual]);
                insert_before_current(ctx, arena, assign)?;
            }
        } else {
            let stmt = arena.clone_subtree(child);
            replace_ids(arena, stmt, &replace_rules);
            insert_before_current(ctx, arena, stmt)?;
        }
    }

    if kind == AstKind::FCall {
        let result_name = ctx.interner.intern(&format!("{prefix}{text}"));
        arena[node].children.clear();
        arena[node].kind = AstKind::Identifier;
        arena[node].name = Some(result_name);
        arena[node].decl = None;
    } else {
        arena[node].children.clear();
        arena[node].name = None;
    }
    Ok(CallOutcome::Inlined)
}

/// Rewrites a function call in a continuous context (outside any block)
/// into a synthesized `always` block assigning the call result to a
/// fresh wire, and turns the call site into a reference to that wire.
fn inline_outside_block(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    decl: NodeId,
    name: Ident,
    prefix: &str,
    text: &str,
) -> ElabResult<()> {
    let span = arena[node].span;
    if arena[node].kind != AstKind::FCall {
        return Err(errors::internal("task call outside a block", span));
    }

    let mut result_wire = None;
    for child in arena[decl].children.clone() {
        if arena[child].kind == AstKind::Wire && arena[child].name == Some(name) {
            result_wire = Some(child);
        }
    }
    let result_wire =
        result_wire.ok_or_else(|| errors::internal("function has no result wire", span))?;

    let renamed = ctx.interner.intern(&format!("{prefix}{text}"));
    let wire = arena.clone_subtree(result_wire);
    arena[wire].name = Some(renamed);
    arena[wire].port_id = 0;
    arena[wire].is_input = false;
    arena[wire].is_output = false;
    let module = ctx.module;
    arena[module].children.push(wire);
    let wire_args = SimplifyArgs {
        const_fold: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, wire, wire_args)? {}

    let lvalue = arena.ident(renamed, span);
    let call_copy = arena.clone_subtree(node);
    let assign = arena.with_children(AstKind::AssignEq, span, vec![lvalue, call_copy]);
    let block = arena.with_children(AstKind::Block, span, vec![assign]);
    let always = arena.with_children(AstKind::Always, span, vec![block]);
    arena[module].children.push(always);

    arena[node].children.clear();
    arena[node].kind = AstKind::Identifier;
    arena[node].name = Some(renamed);
    arena[node].decl = None;
    Ok(())
}

/// `$clog2(x)`: the 0-based index of the highest set bit of `x`.
fn fold_clog2(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    if arena[node].children.len() != 1 {
        return Err(errors::error_invalid_shape(
            &format!(
                "system function $clog2 got {} arguments, expected 1",
                arena[node].children.len()
            ),
            span,
        ));
    }
    let arg = arena.clone_subtree(arena[node].children[0]);
    let fold_args = SimplifyArgs {
        const_fold: true,
        width: args.width,
        sign: args.sign,
        ..SimplifyArgs::new(args.stage)
    };
    while simplify(ctx, arena, arg, fold_args)? {}
    if arena[arg].kind != AstKind::Constant {
        return Err(errors::error_not_constant("argument of $clog2", span));
    }
    let mut result = 0i64;
    for (i, bit) in arena[arg].bits.clone().iter().enumerate() {
        if bit == Logic::One {
            result = i as i64;
        }
    }
    Ok(arena.const_int(result, false, 32, span))
}

/// Folds the real-valued system functions (`$ln`, `$sqrt`, `$floor`, …).
fn fold_real_function(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
    text: &str,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let two_arguments = matches!(text, "$pow" | "$atan2" | "$hypot");
    let expected = if two_arguments { 2 } else { 1 };
    if arena[node].children.len() != expected {
        return Err(errors::error_invalid_shape(
            &format!(
                "system function {text} got {} arguments, expected {expected}",
                arena[node].children.len()
            ),
            span,
        ));
    }

    let mut operands = [0.0f64; 2];
    for (slot, child) in arena[node].children.clone().into_iter().enumerate() {
        let fold_args = SimplifyArgs {
            const_fold: true,
            width: args.width,
            sign: args.sign,
            ..SimplifyArgs::new(args.stage)
        };
        while simplify(ctx, arena, child, fold_args)? {}
        if !arena[child].is_const() {
            return Err(errors::error_not_constant(
                &format!("argument of system function {text}"),
                span,
            ));
        }
        let sw = detect_sign_width(ctx, arena, child)?;
        operands[slot] = arena[child].as_real(sw.signed);
    }
    let (x, y) = (operands[0], operands[1]);

    let value = match text {
        "$ln" => x.ln(),
        "$log10" => x.log10(),
        "$exp" => x.exp(),
        "$sqrt" => x.sqrt(),
        "$pow" => x.powf(y),
        "$floor" => x.floor(),
        "$ceil" => x.ceil(),
        "$sin" => x.sin(),
        "$cos" => x.cos(),
        "$tan" => x.tan(),
        "$asin" => x.asin(),
        "$acos" => x.acos(),
        "$atan" => x.atan(),
        "$atan2" => x.atan2(y),
        "$hypot" => x.hypot(y),
        "$sinh" => x.sinh(),
        "$cosh" => x.cosh(),
        "$tanh" => x.tanh(),
        "$asinh" => x.asinh(),
        "$acosh" => x.acosh(),
        "$atanh" => x.atanh(),
        _ => return Err(errors::internal("unhandled real function", span)),
    };
    Ok(arena.real_value(value, span))
}

/// Inserts a synthesized statement into the current block, immediately
/// before the statement being rewritten.
fn insert_before_current(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    stmt: NodeId,
) -> ElabResult<()> {
    let span = arena[stmt].span;
    let block = ctx
        .current_block
        .ok_or_else(|| errors::internal("no current block for insertion", span))?;
    let position = ctx
        .current_block_child
        .and_then(|target| arena[block].children.iter().position(|&c| c == target))
        .unwrap_or(arena[block].children.len());
    arena[block].children.insert(position, stmt);
    Ok(())
}

/// Renames identifier references according to the inlining rename map.
fn replace_ids(arena: &mut AstArena, node: NodeId, rules: &HashMap<Ident, Ident>) {
    if arena[node].kind == AstKind::Identifier {
        if let Some(name) = arena[node].name {
            if let Some(&renamed) = rules.get(&name) {
                arena[node].name = Some(renamed);
            }
        }
    }
    for child in arena[node].children.clone() {
        replace_ids(arena, child, rules);
    }
}
