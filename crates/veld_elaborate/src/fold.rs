//! Constant folding of expression nodes.
//!
//! [`const_fold_node`] is invoked by the driver once a node's children
//! have settled; when the operands are constant it builds a detached
//! replacement constant and hands it back for the driver to install
//! over the original node. Bit-precise folding delegates to
//! [`veld_common::const_ops`]; when real-valued operands are involved
//! the operators fall back to their floating-point equivalents.

use veld_ast::{AstArena, AstKind, NodeId};
use veld_common::{const_ops, Logic, LogicVec};

use crate::context::ElabContext;
use crate::errors::ElabResult;
use crate::simplify::SimplifyArgs;
use crate::width::detect_sign_width;

/// Attempts to fold `node` into a constant.
///
/// Returns the detached replacement node, or `None` when the operands
/// are not (yet) constant.
pub fn const_fold_node(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<Option<NodeId>> {
    let span = arena[node].span;
    let kind = arena[node].kind;
    let width = args.width;
    let sign = args.sign;

    let replacement = match kind {
        AstKind::Identifier => fold_identifier(ctx, arena, node, args),

        AstKind::BitNot => {
            let a = arena[node].children[0];
            if arena[a].kind == AstKind::Constant {
                let bits = operand(arena, a, width, sign);
                let y = const_ops::not(&bits, sign, width);
                Some(arena.const_bits(y, sign, span))
            } else {
                None
            }
        }

        AstKind::ToSigned | AstKind::ToUnsigned => {
            let a = arena[node].children[0];
            if arena[a].kind == AstKind::Constant {
                let bits = operand(arena, a, width, sign);
                Some(arena.const_bits(bits, kind == AstKind::ToSigned, span))
            } else {
                None
            }
        }

        AstKind::BitAnd | AstKind::BitOr | AstKind::BitXor | AstKind::BitXnor => {
            let (a, b) = (arena[node].children[0], arena[node].children[1]);
            if both_bit_const(arena, a, b) {
                let av = operand(arena, a, width, sign);
                let bv = operand(arena, b, width, sign);
                let y = match kind {
                    AstKind::BitAnd => const_ops::and(&av, &bv, sign, sign, width),
                    AstKind::BitOr => const_ops::or(&av, &bv, sign, sign, width),
                    AstKind::BitXor => const_ops::xor(&av, &bv, sign, sign, width),
                    _ => const_ops::xnor(&av, &bv, sign, sign, width),
                };
                Some(arena.const_bits(y, sign, span))
            } else {
                None
            }
        }

        AstKind::ReduceAnd
        | AstKind::ReduceOr
        | AstKind::ReduceXor
        | AstKind::ReduceXnor
        | AstKind::ReduceBool => {
            let a = arena[node].children[0];
            if arena[a].kind == AstKind::Constant {
                let bits = arena[a].bits.clone();
                let y = match kind {
                    AstKind::ReduceAnd => const_ops::reduce_and(&bits, None),
                    AstKind::ReduceOr => const_ops::reduce_or(&bits, None),
                    AstKind::ReduceXor => const_ops::reduce_xor(&bits, None),
                    AstKind::ReduceXnor => const_ops::reduce_xnor(&bits, None),
                    _ => const_ops::reduce_bool(&bits, None),
                };
                Some(arena.const_bits(y, false, span))
            } else {
                None
            }
        }

        AstKind::LogicNot => {
            let a = arena[node].children[0];
            if arena[a].kind == AstKind::Constant {
                let y = const_ops::logic_not(&arena[a].bits.clone(), None);
                Some(arena.const_bits(y, false, span))
            } else if arena[a].is_const() {
                let value = arena[a].as_real(sign) == 0.0;
                Some(arena.const_int(value as i64, false, 1, span))
            } else {
                None
            }
        }

        AstKind::LogicAnd | AstKind::LogicOr => {
            let (a, b) = (arena[node].children[0], arena[node].children[1]);
            if both_bit_const(arena, a, b) {
                let av = arena[a].bits.clone();
                let bv = arena[b].bits.clone();
                let y = if kind == AstKind::LogicAnd {
                    const_ops::logic_and(&av, &bv, None)
                } else {
                    const_ops::logic_or(&av, &bv, None)
                };
                Some(arena.const_bits(y, false, span))
            } else if both_const(arena, a, b) {
                let (x, y) = (arena[a].as_real(sign) != 0.0, arena[b].as_real(sign) != 0.0);
                let value = if kind == AstKind::LogicAnd { x && y } else { x || y };
                Some(arena.const_int(value as i64, false, 1, span))
            } else {
                None
            }
        }

        AstKind::ShiftLeft
        | AstKind::ShiftRight
        | AstKind::ShiftSLeft
        | AstKind::ShiftSRight
        | AstKind::Pow => {
            let (a, b) = (arena[node].children[0], arena[node].children[1]);
            if both_bit_const(arena, a, b) {
                let av = operand(arena, a, width, sign);
                let bv = arena[b].bits.clone();
                let y = match kind {
                    AstKind::ShiftLeft => const_ops::shl(&av, &bv, sign, width),
                    AstKind::ShiftRight => const_ops::shr(&av, &bv, sign, width),
                    AstKind::ShiftSLeft => const_ops::sshl(&av, &bv, sign, width),
                    AstKind::ShiftSRight => const_ops::sshr(&av, &bv, sign, width),
                    _ => {
                        let b_signed = arena[b].is_signed;
                        const_ops::pow(&av, &bv, sign, b_signed, width)
                    }
                };
                Some(arena.const_bits(y, sign, span))
            } else if kind == AstKind::Pow && both_const(arena, a, b) {
                let value = arena[a].as_real(sign).powf(arena[b].as_real(sign));
                Some(arena.real_value(value, span))
            } else {
                None
            }
        }

        AstKind::Lt
        | AstKind::Le
        | AstKind::Eq
        | AstKind::Ne
        | AstKind::Eqx
        | AstKind::Nex
        | AstKind::Ge
        | AstKind::Gt => fold_comparison(arena, node, kind),

        AstKind::Add | AstKind::Sub | AstKind::Mul | AstKind::Div | AstKind::Mod => {
            let (a, b) = (arena[node].children[0], arena[node].children[1]);
            if both_bit_const(arena, a, b) {
                let av = operand(arena, a, width, sign);
                let bv = operand(arena, b, width, sign);
                let y = match kind {
                    AstKind::Add => const_ops::add(&av, &bv, sign, sign, width),
                    AstKind::Sub => const_ops::sub(&av, &bv, sign, sign, width),
                    AstKind::Mul => const_ops::mul(&av, &bv, sign, sign, width),
                    AstKind::Div => const_ops::div(&av, &bv, sign, sign, width),
                    _ => const_ops::modulo(&av, &bv, sign, sign, width),
                };
                Some(arena.const_bits(y, sign, span))
            } else if both_const(arena, a, b) {
                let (x, y) = (arena[a].as_real(sign), arena[b].as_real(sign));
                let value = match kind {
                    AstKind::Add => x + y,
                    AstKind::Sub => x - y,
                    AstKind::Mul => x * y,
                    AstKind::Div => x / y,
                    _ => x % y,
                };
                Some(arena.real_value(value, span))
            } else {
                None
            }
        }

        AstKind::Pos | AstKind::Neg => {
            let a = arena[node].children[0];
            if arena[a].kind == AstKind::Constant {
                let av = operand(arena, a, width, sign);
                let y = if kind == AstKind::Pos {
                    const_ops::pos(&av, sign, width)
                } else {
                    const_ops::neg(&av, sign, width)
                };
                Some(arena.const_bits(y, sign, span))
            } else if arena[a].is_const() {
                let value = arena[a].as_real(sign);
                Some(arena.real_value(if kind == AstKind::Pos { value } else { -value }, span))
            } else {
                None
            }
        }

        AstKind::Ternary => fold_ternary(ctx, arena, node, args)?,

        AstKind::Concat => {
            let children = arena[node].children.clone();
            if children.iter().all(|&c| arena[c].kind == AstKind::Constant) {
                let string_op =
                    !children.is_empty() && children.iter().all(|&c| arena[c].is_string);
                let mut bits = LogicVec::new(0);
                for &child in &children {
                    bits.append(&arena[child].bits.clone());
                }
                Some(if string_op {
                    arena.const_str_bits(bits, span)
                } else {
                    arena.const_bits(bits, false, span)
                })
            } else {
                None
            }
        }

        AstKind::Replicate => {
            let (count, value) = (arena[node].children[0], arena[node].children[1]);
            if both_bit_const(arena, count, value) {
                let n = arena[count].bits.to_i64(false).unwrap_or(0).max(0);
                let mut bits = LogicVec::new(0);
                for _ in 0..n {
                    bits.append(&arena[value].bits.clone());
                }
                Some(if arena[value].is_string {
                    arena.const_str_bits(bits, span)
                } else {
                    arena.const_bits(bits, false, span)
                })
            } else {
                None
            }
        }

        _ => None,
    };

    Ok(replacement)
}

/// The operand bits, extended to the context width with the context
/// signedness when a width hint is present.
fn operand(arena: &AstArena, id: NodeId, width: Option<u32>, sign: bool) -> LogicVec {
    match width {
        Some(w) => arena[id].bits.extended(w, sign),
        None => arena[id].bits.clone(),
    }
}

fn both_bit_const(arena: &AstArena, a: NodeId, b: NodeId) -> bool {
    arena[a].kind == AstKind::Constant && arena[b].kind == AstKind::Constant
}

fn both_const(arena: &AstArena, a: NodeId, b: NodeId) -> bool {
    arena[a].is_const() && arena[b].is_const()
}

fn fold_identifier(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> Option<NodeId> {
    let span = arena[node].span;
    let name = arena[node].name?;
    let decl = ctx.scope.get(&name).copied()?;

    match arena[decl].kind {
        AstKind::Parameter | AstKind::LocalParam => {
            let value = arena[decl].children[0];
            if arena[value].kind == AstKind::Constant {
                let select = arena[node].children.first().copied();
                if let Some(range) =
                    select.filter(|&r| arena[r].kind == AstKind::Range && arena[r].range_valid)
                {
                    let (left, right) = (arena[range].range_left, arena[range].range_right);
                    let source = arena[value].bits.clone();
                    let mut data = LogicVec::new((left - right + 1).max(0) as u32);
                    for (out, i) in (right..=left).enumerate() {
                        let bit = if i >= 0 && (i as u32) < source.width() {
                            source.get(i as u32)
                        } else {
                            Logic::X
                        };
                        data.set(out as u32, bit);
                    }
                    Some(arena.const_bits(data, false, span))
                } else if arena[node].children.is_empty() {
                    Some(arena.clone_subtree(value))
                } else {
                    None
                }
            } else if arena[value].is_const() {
                Some(arena.clone_subtree(value))
            } else {
                None
            }
        }
        AstKind::Wire | AstKind::AutoWire if args.at_zero => {
            Some(arena.const_int(0, args.sign, args.width.unwrap_or(0), span))
        }
        _ => None,
    }
}

fn fold_comparison(arena: &mut AstArena, node: NodeId, kind: AstKind) -> Option<NodeId> {
    let span = arena[node].span;
    let (a, b) = (arena[node].children[0], arena[node].children[1]);
    if both_bit_const(arena, a, b) {
        let cmp_width = arena[a].bits.width().max(arena[b].bits.width());
        let cmp_signed = arena[a].is_signed && arena[b].is_signed;
        let av = arena[a].bits_as_const(cmp_width);
        let bv = arena[b].bits_as_const(cmp_width);
        let y = match kind {
            AstKind::Lt => const_ops::lt(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Le => const_ops::le(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Eq => const_ops::eq(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Ne => const_ops::ne(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Eqx => const_ops::eqx(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Nex => const_ops::nex(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            AstKind::Ge => const_ops::ge(&av, &bv, cmp_signed, cmp_signed, Some(1)),
            _ => const_ops::gt(&av, &bv, cmp_signed, cmp_signed, Some(1)),
        };
        Some(arena.const_bits(y, false, span))
    } else if both_const(arena, a, b) {
        let a_signed = arena[a].kind == AstKind::RealValue || arena[a].is_signed;
        let b_signed = arena[b].kind == AstKind::RealValue || arena[b].is_signed;
        let cmp_signed = a_signed && b_signed;
        let (x, y) = (arena[a].as_real(cmp_signed), arena[b].as_real(cmp_signed));
        let value = match kind {
            AstKind::Lt => x < y,
            AstKind::Le => x <= y,
            AstKind::Eq | AstKind::Eqx => x == y,
            AstKind::Ne | AstKind::Nex => x != y,
            AstKind::Ge => x >= y,
            _ => x > y,
        };
        Some(arena.const_int(value as i64, false, 1, span))
    } else {
        None
    }
}

fn fold_ternary(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    args: SimplifyArgs,
) -> ElabResult<Option<NodeId>> {
    let span = arena[node].span;
    let cond = arena[node].children[0];
    if !arena[cond].is_const() {
        return Ok(None);
    }
    let width = args.width;
    let sign = args.sign;
    let (then_id, else_id) = (arena[node].children[1], arena[node].children[2]);

    let mut found_sure_true = false;
    let mut found_maybe_true = false;
    if arena[cond].kind == AstKind::Constant {
        for bit in arena[cond].bits.iter() {
            match bit {
                Logic::One => found_sure_true = true,
                Logic::X | Logic::Z => found_maybe_true = true,
                Logic::Zero => {}
            }
        }
    } else {
        found_sure_true = arena[cond].real != 0.0;
    }

    let (choice, not_choice) = if found_sure_true {
        (Some(then_id), else_id)
    } else if !found_maybe_true {
        (Some(else_id), then_id)
    } else {
        (None, then_id)
    };

    if let Some(choice) = choice {
        if arena[choice].kind == AstKind::Constant {
            let other = detect_sign_width(ctx, arena, not_choice)?;
            if other.is_real {
                let value = arena[choice].as_real(sign);
                return Ok(Some(arena.real_value(value, span)));
            }
            let w = width.unwrap_or_else(|| arena[choice].bits.width());
            let y = arena[choice].bits.extended(w, arena[choice].is_signed);
            if arena[choice].is_string && y.width() % 8 == 0 && !sign {
                return Ok(Some(arena.const_str_bits(y, span)));
            }
            return Ok(Some(arena.const_bits(y, sign, span)));
        }
        if arena[choice].is_const() {
            return Ok(Some(arena.clone_subtree(choice)));
        }
        return Ok(None);
    }

    // undetermined condition: merge the branches bit by bit
    if both_bit_const(arena, then_id, else_id) {
        let w = width
            .unwrap_or_else(|| arena[then_id].bits.width().max(arena[else_id].bits.width()));
        let a = arena[then_id].bits.extended(w, sign);
        let b = arena[else_id].bits.extended(w, sign);
        let mut merged = a.clone();
        for i in 0..w {
            if a.get(i) != b.get(i) {
                merged.set(i, Logic::X);
            }
        }
        return Ok(Some(arena.const_bits(merged, sign, span)));
    }
    if both_const(arena, then_id, else_id) {
        let (x, y) = (arena[then_id].as_real(sign), arena[else_id].as_real(sign));
        // an ambiguous choice between distinct reals resolves to 0.0
        let value = if x == y { x } else { 0.0 };
        return Ok(Some(arena.real_value(value, span)));
    }
    Ok(None)
}
