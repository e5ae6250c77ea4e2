//! The recursive rewrite driver.
//!
//! `simplify` visits one node: it derives the width/sign hints its
//! children should see, descends, and then applies the per-kind rewrite
//! rules in sequence. A rule either mutates the node in place or builds
//! a detached replacement subtree, which is installed over the node's
//! slot at the end of the visit so that every incoming reference sees
//! the new node. The return value reports whether anything changed;
//! callers loop until quiescence.
//!
//! [`Elaborator::elaborate_module`](crate::Elaborator::elaborate_module)
//! drives the three-stage fixed point: stage one to quiescence, the
//! mem2reg decision and lowering, then stage two to quiescence. Stage
//! two additionally activates the memory-port and assertion lowerings,
//! which must observe the settled module shape.

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::LogicVec;

use crate::context::ElabContext;
use crate::errors::{self, ElabResult};
use crate::inline::CallOutcome;
use crate::width::{detect_sign_width, detect_sign_width_worker, SignWidth};
use crate::{fold, generate, inline, lower, mem2reg, scope};

/// The rewrite stage currently being driven to a fixed point.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stage {
    /// The general structural pass: name resolution, constant folding,
    /// generate expansion, inlining, dynamic-range expansion.
    One,
    /// The final pass, which additionally lowers memory ports and
    /// assertions.
    Two,
}

impl Stage {
    /// Whether this is the final (lowering) stage.
    pub fn is_final(self) -> bool {
        self == Stage::Two
    }
}

/// The context a node is simplified under.
#[derive(Clone, Copy)]
pub struct SimplifyArgs {
    /// Fold constant subtrees into constant nodes.
    pub const_fold: bool,
    /// Substitute unresolved wires by zero (used to compute the fixed
    /// result width of a dynamic range select).
    pub at_zero: bool,
    /// The node is an assignment target.
    pub in_lvalue: bool,
    /// The current rewrite stage.
    pub stage: Stage,
    /// Context-determined width, or `None` for self-determined.
    pub width: Option<u32>,
    /// Context-determined signedness.
    pub sign: bool,
    /// The node is inside a constant-expression position.
    pub in_param: bool,
}

impl SimplifyArgs {
    /// The default statement-level context for a stage.
    pub fn new(stage: Stage) -> Self {
        Self {
            const_fold: false,
            at_zero: false,
            in_lvalue: false,
            stage,
            width: None,
            sign: false,
            in_param: false,
        }
    }
}

/// Simplifies one node, returning whether anything changed.
pub fn simplify(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    let mut args = args;
    let mut did_something = false;
    let kind = arena[node].kind;

    // function and task declarations are only entered through their
    // call sites
    if matches!(kind, AstKind::Function | AstKind::Task) {
        return Ok(false);
    }

    // deactivate calls to non-synthesis system tasks
    if matches!(kind, AstKind::FCall | AstKind::TCall) {
        if let Some(name) = arena[node].name {
            if matches!(
                ctx.interner.resolve(name),
                "$display" | "$stop" | "$finish"
            ) {
                arena[node].children.clear();
                arena[node].name = None;
            }
        }
    }

    // positions that must evaluate statically force constant folding
    if matches!(
        kind,
        AstKind::Wire
            | AstKind::Parameter
            | AstKind::LocalParam
            | AstKind::DefParam
            | AstKind::ParaSet
            | AstKind::Range
            | AstKind::Prefix
    ) {
        args.const_fold = true;
    }
    if kind == AstKind::Identifier {
        if let Some(name) = arena[node].name {
            if let Some(&decl) = ctx.scope.get(&name) {
                if matches!(
                    arena[decl].kind,
                    AstKind::Parameter | AstKind::LocalParam
                ) {
                    args.const_fold = true;
                }
            }
        }
    }
    if matches!(
        kind,
        AstKind::Parameter
            | AstKind::LocalParam
            | AstKind::DefParam
            | AstKind::ParaSet
            | AstKind::Prefix
    ) {
        args.in_param = true;
    }

    if kind == AstKind::Module {
        did_something |= scope::build_module_scope(ctx, arena, args.stage)?;
    }

    let backup_block = ctx.current_block;
    let backup_block_child = ctx.current_block_child;
    let backup_top_block = ctx.current_top_block;

    let result = visit(ctx, arena, node, args);

    ctx.current_block = backup_block;
    ctx.current_block_child = backup_block_child;
    ctx.current_top_block = backup_top_block;
    if kind == AstKind::Module {
        ctx.scope.clear();
    }

    Ok(result? || did_something)
}

/// Per-child hint overrides derived from the parent's kind.
#[derive(Default, Clone, Copy)]
struct SelfDetermined {
    child0: bool,
    child1: bool,
    child2: bool,
    all: bool,
}

fn visit(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    mut args: SimplifyArgs,
) -> ElabResult<bool> {
    let mut did_something = false;
    let span = arena[node].span;
    let kind = arena[node].kind;

    let backup_width = args.width;
    let backup_sign = args.sign;
    let mut detect_width_simple = false;
    let mut self_det = SelfDetermined::default();
    let mut reset_width_after_children = false;

    // derive the hints to push into children
    match kind {
        AstKind::Assign | AstKind::AssignEq | AstKind::AssignLe => {
            let lhs = arena[node].children[0];
            let rhs = arena[node].children[1];
            let lhs_args = SimplifyArgs {
                in_lvalue: true,
                width: None,
                sign: false,
                const_fold: false,
                at_zero: false,
                stage: args.stage,
                in_param: args.in_param,
            };
            while !arena[lhs].basic_prep && simplify(ctx, arena, lhs, lhs_args)? {
                did_something = true;
            }
            let rhs_args = SimplifyArgs {
                in_lvalue: false,
                ..lhs_args
            };
            while !arena[rhs].basic_prep && simplify(ctx, arena, rhs, rhs_args)? {
                did_something = true;
            }
            let lhs_sw = detect_sign_width(ctx, arena, lhs)?;
            let rhs_sw = detect_sign_width(ctx, arena, rhs)?;
            args.width = Some(lhs_sw.width.max(rhs_sw.width));
            args.sign = rhs_sw.signed;
            self_det.child0 = true;
        }

        AstKind::Parameter | AstKind::LocalParam => {
            let value = arena[node].children[0];
            let value_args = SimplifyArgs {
                in_param: true,
                width: None,
                sign: false,
                const_fold: false,
                at_zero: false,
                in_lvalue: false,
                stage: args.stage,
            };
            while !arena[value].basic_prep && simplify(ctx, arena, value, value_args)? {
                did_something = true;
            }
            let sw = detect_sign_width(ctx, arena, value)?;
            args.width = Some(sw.width);
            args.sign = sw.signed;
            let range = arena[node].children.get(1).copied();
            if let Some(range) = range.filter(|&r| arena[r].kind == AstKind::Range) {
                while !arena[range].basic_prep && simplify(ctx, arena, range, value_args)? {
                    did_something = true;
                }
                if !arena[range].range_valid {
                    return Err(errors::error_not_constant(
                        "width range on parameter declaration",
                        span,
                    ));
                }
                let declared = arena[range].range_width().unwrap_or(1);
                args.width = Some(args.width.unwrap_or(0).max(declared));
            }
        }

        AstKind::ToBits
        | AstKind::ToSigned
        | AstKind::ToUnsigned
        | AstKind::Concat
        | AstKind::Replicate
        | AstKind::ReduceAnd
        | AstKind::ReduceOr
        | AstKind::ReduceXor
        | AstKind::ReduceXnor
        | AstKind::ReduceBool => {
            detect_width_simple = true;
            self_det.all = true;
        }

        AstKind::Neg
        | AstKind::BitNot
        | AstKind::Pos
        | AstKind::BitAnd
        | AstKind::BitOr
        | AstKind::BitXor
        | AstKind::BitXnor
        | AstKind::Add
        | AstKind::Sub
        | AstKind::Mul
        | AstKind::Div
        | AstKind::Mod => {
            detect_width_simple = true;
        }

        AstKind::ShiftLeft
        | AstKind::ShiftRight
        | AstKind::ShiftSLeft
        | AstKind::ShiftSRight
        | AstKind::Pow => {
            detect_width_simple = true;
            self_det.child1 = true;
        }

        AstKind::Lt
        | AstKind::Le
        | AstKind::Eq
        | AstKind::Ne
        | AstKind::Eqx
        | AstKind::Nex
        | AstKind::Ge
        | AstKind::Gt => {
            // children are self-determined among themselves but share
            // the widest operand width and the conjunction of signs
            let mut acc = SignWidth {
                width: 0,
                signed: true,
                is_real: false,
            };
            for child in arena[node].children.clone() {
                let child_args = SimplifyArgs {
                    width: None,
                    sign: false,
                    const_fold: false,
                    at_zero: false,
                    in_lvalue: args.in_lvalue,
                    stage: args.stage,
                    in_param: args.in_param,
                };
                while !arena[child].basic_prep && simplify(ctx, arena, child, child_args)? {
                    did_something = true;
                }
                detect_sign_width_worker(ctx, arena, child, &mut acc)?;
            }
            args.width = Some(acc.width);
            args.sign = acc.signed;
            reset_width_after_children = true;
        }

        AstKind::LogicAnd | AstKind::LogicOr | AstKind::LogicNot => {
            detect_width_simple = true;
            self_det.all = true;
        }

        AstKind::Ternary => {
            detect_width_simple = true;
            self_det.child0 = true;
        }

        AstKind::MemRd => {
            detect_width_simple = true;
            self_det.all = true;
        }

        _ => {
            args.width = None;
            args.sign = false;
        }
    }

    if detect_width_simple && args.width.is_none() {
        if kind == AstKind::Replicate {
            let count = arena[node].children[0];
            let count_args = SimplifyArgs {
                const_fold: true,
                in_param: true,
                width: None,
                sign: false,
                at_zero: false,
                in_lvalue: args.in_lvalue,
                stage: args.stage,
            };
            while simplify(ctx, arena, count, count_args)? {
                did_something = true;
            }
        }
        for child in arena[node].children.clone() {
            let child_args = SimplifyArgs {
                width: None,
                sign: false,
                const_fold: false,
                at_zero: false,
                in_lvalue: args.in_lvalue,
                stage: args.stage,
                in_param: args.in_param,
            };
            while !arena[child].basic_prep && simplify(ctx, arena, child, child_args)? {
                did_something = true;
            }
        }
        let sw = detect_sign_width(ctx, arena, node)?;
        args.width = Some(sw.width);
        args.sign = sw.signed;
    }

    // a real branch makes both ternary branches self-determined
    if kind == AstKind::Ternary && arena[node].children.len() == 3 {
        let then_sw = detect_sign_width(ctx, arena, arena[node].children[1])?;
        let else_sw = detect_sign_width(ctx, arena, arena[node].children[2])?;
        if then_sw.is_real || else_sw.is_real {
            self_det.child1 = true;
            self_det.child2 = true;
        }
    }

    // descend, re-reading the child list every step because rewrites
    // insert and remove siblings
    let mut i = 0;
    while i < arena[node].children.len() {
        if matches!(kind, AstKind::GenFor | AstKind::For) && i >= 3 {
            break;
        }
        if matches!(kind, AstKind::GenIf | AstKind::GenCase) && i >= 1 {
            break;
        }
        if kind == AstKind::GenBlock {
            break;
        }
        if kind == AstKind::Block && arena[node].name.is_some() {
            break;
        }
        if kind == AstKind::Prefix && i >= 1 {
            break;
        }

        let mut did_something_here = true;
        while did_something_here && i < arena[node].children.len() {
            let child = arena[node].children[i];
            let mut child_args = args;
            if i == 0 && matches!(kind, AstKind::Replicate | AstKind::Wire) {
                child_args.const_fold = true;
                child_args.in_param = true;
            }
            if matches!(kind, AstKind::Parameter | AstKind::LocalParam) {
                child_args.const_fold = true;
            }
            if i == 0
                && matches!(
                    kind,
                    AstKind::Assign | AstKind::AssignEq | AstKind::AssignLe
                )
            {
                child_args.in_lvalue = true;
            }
            if kind == AstKind::Block {
                ctx.current_block = Some(node);
                ctx.current_block_child = Some(child);
            }
            if matches!(kind, AstKind::Always | AstKind::Initial)
                && arena[child].kind == AstKind::Block
            {
                ctx.current_top_block = Some(child);
            }
            if (i == 0 && self_det.child0)
                || (i == 1 && self_det.child1)
                || (i == 2 && self_det.child2)
                || self_det.all
            {
                child_args.width = None;
                child_args.sign = false;
            }
            did_something_here = simplify(ctx, arena, child, child_args)?;
            if did_something_here {
                did_something = true;
            }
        }

        if i < arena[node].children.len() {
            let child = arena[node].children[i];
            // processes belong at module level once rewrites settle
            if args.stage.is_final()
                && arena[child].kind == AstKind::Initial
                && node != ctx.module
            {
                arena[node].children.remove(i);
                let module = ctx.module;
                arena[module].children.push(child);
                did_something = true;
                continue;
            }
            if is_spent_husk(arena, child) {
                arena[node].children.remove(i);
                did_something = true;
                continue;
            }
        }
        i += 1;
    }

    // attributes always evaluate statically
    for value in arena[node].attributes.clone().into_values() {
        let attr_args = SimplifyArgs {
            const_fold: true,
            in_param: true,
            width: None,
            sign: false,
            at_zero: false,
            in_lvalue: false,
            stage: args.stage,
        };
        while simplify(ctx, arena, value, attr_args)? {
            did_something = true;
        }
    }

    if reset_width_after_children {
        args.width = backup_width;
        args.sign = backup_sign;
        if args.width.is_none() {
            let sw = detect_sign_width(ctx, arena, node)?;
            args.width = Some(sw.width);
            args.sign = sw.signed;
        }
    }

    // ------------------------------------------------------------------
    // per-kind rewrites; the first one to produce a replacement wins
    // ------------------------------------------------------------------
    let mut replacement: Option<NodeId> = None;

    if arena[node].kind == AstKind::Prefix {
        replacement = Some(resolve_prefix(ctx, arena, node)?);
    }

    if replacement.is_none() && arena[node].kind == AstKind::ToBits {
        replacement = Some(evaluate_to_bits(arena, node)?);
    }

    if arena[node].kind == AstKind::Range {
        did_something |= annotate_range(arena, node)?;
    }

    if matches!(arena[node].kind, AstKind::Wire | AstKind::AutoWire) {
        did_something |= annotate_wire(arena, node);
    }

    if matches!(arena[node].kind, AstKind::Parameter | AstKind::LocalParam) {
        did_something |= trim_parameter(ctx, arena, node, args)?;
    }

    if arena[node].kind == AstKind::Identifier {
        did_something |= scope::resolve_identifier(ctx, arena, node)?;
    }

    // a bit-select on a memory word goes through a scratch wire
    if replacement.is_none()
        && arena[node].kind == AstKind::Identifier
        && arena[node].children.len() == 2
        && arena[arena[node].children[0]].kind == AstKind::Range
        && arena[arena[node].children[1]].kind == AstKind::Range
    {
        replacement = Some(mem2reg::expand_mem_bitselect(
            ctx,
            arena,
            node,
            args.in_lvalue,
        )?);
    }

    if arena[node].kind == AstKind::While {
        return Err(errors::error_unsupported(
            "while loops are only allowed in constant functions",
            span,
        ));
    }
    if arena[node].kind == AstKind::Repeat {
        return Err(errors::error_unsupported(
            "repeat loops are only allowed in constant functions",
            span,
        ));
    }

    if matches!(arena[node].kind, AstKind::GenFor | AstKind::For) {
        did_something |= generate::unroll_loop(ctx, arena, node, args)?;
    }

    if arena[node].kind == AstKind::Block && arena[node].name.is_some() {
        did_something |= generate::expand_named_block(ctx, arena, node, args)?;
    }

    if arena[node].kind == AstKind::GenBlock {
        did_something |= generate::splice_genblock(ctx, arena, node, args)?;
    }

    if arena[node].kind == AstKind::GenIf {
        did_something |= generate::select_genif(ctx, arena, node, args)?;
    }

    if arena[node].kind == AstKind::GenCase {
        did_something |= generate::select_gencase(ctx, arena, node, args)?;
    }

    if replacement.is_none() && arena[node].kind == AstKind::CellArray {
        replacement = Some(generate::unroll_cellarray(ctx, arena, node)?);
    }

    if arena[node].kind == AstKind::Primitive {
        did_something |= generate::rewrite_primitive(ctx, arena, node)?;
    }

    // dynamic-range assignment targets expand once the visit is
    // otherwise quiescent
    if replacement.is_none()
        && matches!(arena[node].kind, AstKind::AssignEq | AstKind::AssignLe)
        && !did_something
    {
        replacement = lower::dynamic_range_lvalue(ctx, arena, node, args)?;
    }

    if args.stage.is_final() {
        if replacement.is_none()
            && arena[node].kind == AstKind::Assert
            && ctx.current_block.is_some()
        {
            replacement = Some(lower::lower_assert(ctx, arena, node)?);
        }
        if replacement.is_none()
            && arena[node].kind == AstKind::Assert
            && arena[node].children.len() == 1
        {
            did_something |= lower::lower_assert_outside(arena, node);
        }

        if replacement.is_none()
            && arena[node].kind == AstKind::Identifier
            && !args.in_lvalue
            && !arena[node].children.is_empty()
        {
            let is_memory = arena[node]
                .decl
                .is_some_and(|d| arena[d].kind == AstKind::Memory);
            let word_range = arena[node].children[0];
            if is_memory
                && arena[word_range].kind == AstKind::Range
                && arena[word_range].children.len() == 1
            {
                replacement = Some(lower::lower_memrd(arena, node));
            }
        }

        if replacement.is_none()
            && matches!(arena[node].kind, AstKind::AssignEq | AstKind::AssignLe)
        {
            let lhs = arena[node].children[0];
            let mem = arena[lhs]
                .decl
                .filter(|&d| arena[d].kind == AstKind::Memory);
            if let Some(mem) = mem {
                if arena[lhs].kind == AstKind::Identifier
                    && arena[lhs].children.len() == 1
                    && arena[mem].children.len() >= 2
                    && arena[arena[mem].children[0]].range_valid
                    && arena[arena[mem].children[1]].range_valid
                {
                    replacement = Some(lower::lower_memwrite(ctx, arena, node)?);
                }
            }
        }
    }

    if replacement.is_none()
        && matches!(arena[node].kind, AstKind::FCall | AstKind::TCall)
        && arena[node].name.is_some()
    {
        match inline::simplify_call(ctx, arena, node, args)? {
            CallOutcome::Replaced(repl) => replacement = Some(repl),
            CallOutcome::Inlined => did_something = true,
        }
    }

    if args.const_fold && replacement.is_none() {
        replacement = fold::const_fold_node(ctx, arena, node, args)?;
    }

    if let Some(repl) = replacement {
        arena.replace_with(node, repl);
        did_something = true;
    }

    if !did_something {
        arena[node].basic_prep = true;
    }
    Ok(did_something)
}

/// A construct that has been fully expanded and only its empty shell
/// remains in the parent's child list.
fn is_spent_husk(arena: &AstArena, id: NodeId) -> bool {
    let node = &arena[id];
    if node.kind.is_gen_construct() || node.kind == AstKind::For {
        return node.children.is_empty();
    }
    matches!(node.kind, AstKind::FCall | AstKind::TCall | AstKind::DefParam)
        && node.children.is_empty()
        && node.name.is_none()
}

/// Rewrites `prefix[index].member` into a plain identifier reference.
fn resolve_prefix(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let index = arena[node].children[0];
    if arena[index].kind != AstKind::Constant {
        return Err(errors::error_not_constant(
            "index in generate block prefix",
            span,
        ));
    }
    let member = arena[node].children[1];
    if arena[member].kind != AstKind::Identifier {
        return Err(errors::internal("prefix member is not an identifier", span));
    }
    let prefix_name = arena[node]
        .name
        .ok_or_else(|| errors::internal("prefix without a name", span))?;
    let member_name = arena[member]
        .name
        .ok_or_else(|| errors::internal("prefix member without a name", span))?;

    let combined = format!(
        "{}[{}].{}",
        ctx.interner.resolve(prefix_name),
        arena[index].integer,
        ctx.interner.resolve(member_name)
    );
    let combined = ctx.interner.intern(&combined);
    let replacement = arena.clone_subtree(member);
    arena[replacement].name = Some(combined);
    arena[replacement].decl = None;
    Ok(replacement)
}

/// Evaluates a bit-width cast of a constant.
fn evaluate_to_bits(arena: &mut AstArena, node: NodeId) -> ElabResult<NodeId> {
    let span = arena[node].span;
    let width_node = arena[node].children[0];
    let value_node = arena[node].children[1];
    if arena[width_node].kind != AstKind::Constant {
        return Err(errors::error_not_constant("width of bit-width cast", span));
    }
    if arena[value_node].kind != AstKind::Constant {
        return Err(errors::error_not_constant("value of bit-width cast", span));
    }
    let width = arena[width_node].integer.max(0) as u32;
    let bits = arena[value_node].bits_as_const(width);
    let signed = arena[value_node].is_signed;
    Ok(arena.const_bits(bits, signed, span))
}

/// Annotates a range whose bound children have folded, normalizing
/// swapped non-negative bounds.
fn annotate_range(arena: &mut AstArena, node: NodeId) -> ElabResult<bool> {
    let span = arena[node].span;
    let old_valid = arena[node].range_valid;
    arena[node].range_valid = false;
    arena[node].range_left = -1;
    arena[node].range_right = 0;
    if arena[node].children.is_empty() {
        return Err(errors::internal("range without bounds", span));
    }
    let left = arena[node].children[0];
    if arena[left].kind == AstKind::Constant {
        arena[node].range_valid = true;
        arena[node].range_left = arena[left].integer;
        if arena[node].children.len() == 1 {
            arena[node].range_right = arena[node].range_left;
        }
    }
    if arena[node].children.len() >= 2 {
        let right = arena[node].children[1];
        if arena[right].kind == AstKind::Constant {
            arena[node].range_right = arena[right].integer;
        } else {
            arena[node].range_valid = false;
        }
    }
    let did_something = old_valid != arena[node].range_valid;
    if arena[node].range_valid
        && arena[node].range_left >= 0
        && arena[node].range_right > arena[node].range_left
    {
        let tmp = arena[node].range_right;
        arena[node].range_right = arena[node].range_left;
        arena[node].range_left = tmp;
    }
    Ok(did_something)
}

/// Copies a folded range onto its wire; a rangeless wire is one bit.
fn annotate_wire(arena: &mut AstArena, node: NodeId) -> bool {
    let mut did_something = false;
    match arena[node].children.first().copied() {
        Some(range) if arena[range].kind == AstKind::Range => {
            if arena[range].range_valid {
                if !arena[node].range_valid {
                    did_something = true;
                }
                arena[node].range_valid = true;
                arena[node].range_left = arena[range].range_left;
                arena[node].range_right = arena[range].range_right;
            }
        }
        _ => {
            if !arena[node].range_valid {
                did_something = true;
            }
            arena[node].range_valid = true;
            arena[node].range_left = 0;
            arena[node].range_right = 0;
        }
    }
    did_something
}

/// Clamps a parameter's initializer to its declared range, coercing
/// real values to binary with a warning.
fn trim_parameter(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<bool> {
    let span = arena[node].span;
    let mut did_something = false;
    let value = arena[node].children[0];
    let second = arena[node].children.get(1).copied();

    if let Some(range) = second.filter(|&r| arena[r].kind == AstKind::Range) {
        if !arena[range].range_valid {
            return Err(errors::error_not_constant(
                "width range on parameter declaration",
                span,
            ));
        }
        let width = arena[range].range_width().unwrap_or(1);
        if arena[value].kind == AstKind::RealValue {
            let real = arena[value].real;
            ctx.sink.emit(errors::warn_real_coerced(real, span));
            let rounded = real.round() as i64;
            let coerced =
                arena.const_bits(LogicVec::from_i64(rounded, width), args.sign, span);
            arena[node].children[0] = coerced;
            did_something = true;
        }
        let value = arena[node].children[0];
        if arena[value].kind == AstKind::Constant {
            if arena[value].bits.width() != width {
                let resized = arena[value].bits_as_const(width);
                let signed = arena[value].is_signed;
                let resized = arena.const_bits(resized, signed, span);
                arena[node].children[0] = resized;
            }
            let is_signed = arena[node].is_signed;
            let value = arena[node].children[0];
            arena[value].is_signed = is_signed;
        }
    } else if second.is_some_and(|r| arena[r].kind == AstKind::RealValue) {
        if arena[value].kind == AstKind::Constant {
            let as_real = arena[value].as_real(args.sign);
            let converted = arena.real_value(as_real, span);
            arena[node].children[0] = converted;
            did_something = true;
        }
    }
    Ok(did_something)
}
