//! Width and sign inference over expression trees.
//!
//! Expressions carry no intrinsic width; the driver derives, per
//! context, a width hint and a sign hint that it pushes into children
//! (see the dispatch table in [`simplify`](crate::simplify)).
//! [`detect_sign_width`] computes the self-determined width and
//! signedness of a subtree: the maximum of the leaf widths along
//! context-determined paths, with signedness the conjunction of the
//! leaf signednesses.

use veld_ast::{AstArena, AstKind, NodeId};
use veld_diagnostics::Diagnostic;
use veld_source::Span;

use crate::context::ElabContext;
use crate::errors::{self, ElabError, ElabResult};
use crate::simplify::{simplify, SimplifyArgs, Stage};

/// The inferred width and signedness of a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignWidth {
    /// Inferred width in bits.
    pub width: u32,
    /// Whether every contributing leaf is signed.
    pub signed: bool,
    /// Whether a real-valued leaf occurs in the subtree.
    pub is_real: bool,
}

impl SignWidth {
    fn start() -> Self {
        Self {
            width: 0,
            signed: true,
            is_real: false,
        }
    }
}

fn error_no_width(what: &str, span: Span) -> ElabError {
    ElabError(Diagnostic::error(
        errors::E300,
        format!("cannot determine the width of {what}"),
        span,
    ))
}

/// Computes the self-determined width and signedness of `node`.
pub fn detect_sign_width(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
) -> ElabResult<SignWidth> {
    let mut acc = SignWidth::start();
    detect_sign_width_worker(ctx, arena, node, &mut acc)?;
    Ok(acc)
}

/// Accumulates the width/sign contribution of `node` into `acc`.
///
/// `acc.width` only grows and `acc.signed` only falls, so the driver
/// can run this over several siblings to get the shared width of a
/// comparison.
pub fn detect_sign_width_worker(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    acc: &mut SignWidth,
) -> ElabResult<()> {
    let span = arena[node].span;
    match arena[node].kind {
        AstKind::Constant => {
            acc.width = acc.width.max(arena[node].bits.width());
            acc.signed &= arena[node].is_signed;
        }
        AstKind::RealValue => {
            acc.is_real = true;
        }
        AstKind::Identifier => detect_identifier(ctx, arena, node, acc)?,
        AstKind::ToBits => {
            let width_node = arena[node].children[0];
            if arena[width_node].kind != AstKind::Constant {
                return Err(errors::error_not_constant("bit-width cast size", span));
            }
            let mut sub = SignWidth::start();
            detect_sign_width_worker(ctx, arena, arena[node].children[1], &mut sub)?;
            acc.width = acc.width.max(arena[width_node].integer.max(0) as u32);
            acc.signed &= sub.signed;
        }
        AstKind::ToSigned => {
            let mut sub = SignWidth::start();
            detect_sign_width_worker(ctx, arena, arena[node].children[0], &mut sub)?;
            acc.width = acc.width.max(sub.width);
            acc.is_real |= sub.is_real;
        }
        AstKind::ToUnsigned => {
            let mut sub = SignWidth::start();
            detect_sign_width_worker(ctx, arena, arena[node].children[0], &mut sub)?;
            acc.width = acc.width.max(sub.width);
            acc.is_real |= sub.is_real;
            acc.signed = false;
        }
        AstKind::Concat => {
            let mut total = 0u32;
            for child in arena[node].children.clone() {
                let mut sub = SignWidth::start();
                detect_sign_width_worker(ctx, arena, child, &mut sub)?;
                total += sub.width;
            }
            acc.width = acc.width.max(total);
            acc.signed = false;
        }
        AstKind::Replicate => {
            let count_node = arena[node].children[0];
            if arena[count_node].kind != AstKind::Constant {
                return Err(errors::error_not_constant("replication count", span));
            }
            let count = arena[count_node].integer.max(0) as u32;
            let mut sub = SignWidth::start();
            detect_sign_width_worker(ctx, arena, arena[node].children[1], &mut sub)?;
            acc.width = acc.width.max(count * sub.width);
            acc.signed = false;
        }
        AstKind::Neg | AstKind::Pos | AstKind::BitNot => {
            detect_sign_width_worker(ctx, arena, arena[node].children[0], acc)?;
        }
        AstKind::BitAnd
        | AstKind::BitOr
        | AstKind::BitXor
        | AstKind::BitXnor
        | AstKind::Add
        | AstKind::Sub
        | AstKind::Mul
        | AstKind::Div
        | AstKind::Mod => {
            detect_sign_width_worker(ctx, arena, arena[node].children[0], acc)?;
            detect_sign_width_worker(ctx, arena, arena[node].children[1], acc)?;
        }
        AstKind::ShiftLeft
        | AstKind::ShiftRight
        | AstKind::ShiftSLeft
        | AstKind::ShiftSRight
        | AstKind::Pow => {
            detect_sign_width_worker(ctx, arena, arena[node].children[0], acc)?;
        }
        AstKind::ReduceAnd
        | AstKind::ReduceOr
        | AstKind::ReduceXor
        | AstKind::ReduceXnor
        | AstKind::ReduceBool
        | AstKind::LogicAnd
        | AstKind::LogicOr
        | AstKind::LogicNot
        | AstKind::Lt
        | AstKind::Le
        | AstKind::Eq
        | AstKind::Ne
        | AstKind::Eqx
        | AstKind::Nex
        | AstKind::Ge
        | AstKind::Gt => {
            acc.width = acc.width.max(1);
            acc.signed = false;
        }
        AstKind::Ternary => {
            detect_sign_width_worker(ctx, arena, arena[node].children[1], acc)?;
            detect_sign_width_worker(ctx, arena, arena[node].children[2], acc)?;
        }
        AstKind::MemRd => {
            let Some(mem) = arena[node].decl else {
                return Err(error_no_width("an unresolved memory read", span));
            };
            let data_range = arena[mem].children[0];
            match arena[data_range].range_width() {
                Some(w) => acc.width = acc.width.max(w),
                None => return Err(error_no_width("a memory read", span)),
            }
            acc.signed &= arena[mem].is_signed;
        }
        kind => {
            return Err(error_no_width(&format!("a {kind:?} expression"), span));
        }
    }
    Ok(())
}

fn detect_identifier(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    node: NodeId,
    acc: &mut SignWidth,
) -> ElabResult<()> {
    let span = arena[node].span;
    let name = arena[node].name;
    let decl = arena[node].decl.or_else(|| {
        name.and_then(|n| ctx.scope.get(&n).copied())
    });
    let Some(decl) = decl else {
        let text = name.map(|n| ctx.interner.resolve(n).to_string());
        return Err(error_no_width(
            &format!("unresolved identifier `{}`", text.unwrap_or_default()),
            span,
        ));
    };

    match arena[decl].kind {
        AstKind::Parameter | AstKind::LocalParam => {
            let value = arena[decl].children[0];
            let range = arena[decl].children.get(1).copied();
            let range_width = range.and_then(|r| {
                (arena[r].kind == AstKind::Range)
                    .then(|| arena[r].range_width())
                    .flatten()
            });
            if let Some(w) = range_width {
                acc.width = acc.width.max(w);
            } else if arena[value].kind == AstKind::Constant {
                acc.width = acc.width.max(arena[value].bits.width());
            } else if arena[value].kind == AstKind::RealValue {
                acc.is_real = true;
            } else {
                return Err(error_no_width("an unfolded parameter", span));
            }
            acc.signed &= arena[decl].is_signed || arena[value].is_signed;
        }
        AstKind::Wire | AstKind::AutoWire => {
            let mut width = match arena[decl].range_width() {
                Some(w) => w,
                None if arena[decl].kind == AstKind::AutoWire => 1,
                None => {
                    return Err(error_no_width("a wire without a folded range", span));
                }
            };
            let select = arena[node].children.first().copied();
            if let Some(range) = select.filter(|&r| arena[r].kind == AstKind::Range) {
                if arena[range].children.len() == 1 {
                    width = 1;
                } else if arena[range].range_valid {
                    width = arena[range].range_width().unwrap_or(1);
                } else {
                    width = dynamic_select_width(ctx, arena, range)?;
                }
                acc.signed = false;
            } else {
                acc.signed &= arena[decl].is_signed;
            }
            acc.width = acc.width.max(width);
        }
        AstKind::GenVar => {
            acc.width = acc.width.max(32);
        }
        AstKind::Memory => {
            let data_range = arena[decl].children[0];
            match arena[data_range].range_width() {
                Some(w) => acc.width = acc.width.max(w),
                None => return Err(error_no_width("a memory access", span)),
            }
            acc.signed &= arena[decl].is_signed;
        }
        _ => {
            return Err(error_no_width("a reference to this declaration", span));
        }
    }
    Ok(())
}

/// Computes the fixed width of a dynamic two-expression range select by
/// folding clones of both bounds with the select variable held at zero.
fn dynamic_select_width(
    ctx: &mut ElabContext<'_>,
    arena: &mut AstArena,
    range: NodeId,
) -> ElabResult<u32> {
    let span = arena[range].span;
    let left = arena.clone_subtree(arena[range].children[0]);
    let right = arena.clone_subtree(arena[range].children[1]);
    let args = SimplifyArgs {
        const_fold: true,
        at_zero: true,
        ..SimplifyArgs::new(Stage::One)
    };
    while simplify(ctx, arena, left, args)? {}
    while simplify(ctx, arena, right, args)? {}
    if arena[left].kind != AstKind::Constant || arena[right].kind != AstKind::Constant {
        return Err(errors::error_unsupported(
            "unsupported expression in dynamic range select",
            span,
        ));
    }
    let width = arena[left].integer - arena[right].integer + 1;
    Ok(width.max(0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ElabOptions;
    use veld_common::{Interner, LogicVec};
    use veld_diagnostics::DiagnosticSink;
    use veld_source::SourceDb;

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

        fn ctx<'a>(&'a self, module: NodeId) -> ElabContext<'a> {
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
    fn constant_width_and_sign() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let c = arena.const_int(5, true, 8, Span::DUMMY);
        let sw = detect_sign_width(&mut ctx, &mut arena, c).unwrap();
        assert_eq!(sw.width, 8);
        assert!(sw.signed);
        assert!(!sw.is_real);
    }

    #[test]
    fn add_takes_max_width_and_ands_sign() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let a = arena.const_int(1, true, 4, Span::DUMMY);
        let b = arena.const_int(2, false, 9, Span::DUMMY);
        let add = arena.with_children(AstKind::Add, Span::DUMMY, vec![a, b]);
        let sw = detect_sign_width(&mut ctx, &mut arena, add).unwrap();
        assert_eq!(sw.width, 9);
        assert!(!sw.signed);
    }

    #[test]
    fn shift_ignores_rhs_width() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let a = arena.const_int(1, false, 4, Span::DUMMY);
        let b = arena.const_int(2, false, 32, Span::DUMMY);
        let shl = arena.with_children(AstKind::ShiftLeft, Span::DUMMY, vec![a, b]);
        let sw = detect_sign_width(&mut ctx, &mut arena, shl).unwrap();
        assert_eq!(sw.width, 4);
    }

    #[test]
    fn concat_sums_and_is_unsigned() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let a = arena.const_int(1, true, 4, Span::DUMMY);
        let b = arena.const_int(2, true, 3, Span::DUMMY);
        let cat = arena.with_children(AstKind::Concat, Span::DUMMY, vec![a, b]);
        let sw = detect_sign_width(&mut ctx, &mut arena, cat).unwrap();
        assert_eq!(sw.width, 7);
        assert!(!sw.signed);
    }

    #[test]
    fn replicate_multiplies() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let count = arena.const_int(3, false, 32, Span::DUMMY);
        let value = arena.const_bits(LogicVec::from_i64(1, 2), false, Span::DUMMY);
        let rep = arena.with_children(AstKind::Replicate, Span::DUMMY, vec![count, value]);
        let sw = detect_sign_width(&mut ctx, &mut arena, rep).unwrap();
        assert_eq!(sw.width, 6);
    }

    #[test]
    fn comparison_is_single_unsigned_bit() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let a = arena.const_int(1, true, 8, Span::DUMMY);
        let b = arena.const_int(2, true, 8, Span::DUMMY);
        let lt = arena.with_children(AstKind::Lt, Span::DUMMY, vec![a, b]);
        let sw = detect_sign_width(&mut ctx, &mut arena, lt).unwrap();
        assert_eq!(sw.width, 1);
        assert!(!sw.signed);
    }

    #[test]
    fn identifier_uses_wire_range() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let wire = arena.node(AstKind::Wire, Span::DUMMY);
        arena[wire].range_valid = true;
        arena[wire].range_left = 7;
        arena[wire].range_right = 0;
        arena[wire].is_signed = true;

        let id = arena.node(AstKind::Identifier, Span::DUMMY);
        arena[id].decl = Some(wire);
        let sw = detect_sign_width(&mut ctx, &mut arena, id).unwrap();
        assert_eq!(sw.width, 8);
        assert!(sw.signed);
    }

    #[test]
    fn bit_select_is_one_unsigned_bit() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let wire = arena.node(AstKind::Wire, Span::DUMMY);
        arena[wire].range_valid = true;
        arena[wire].range_left = 7;
        arena[wire].range_right = 0;
        arena[wire].is_signed = true;

        let index = arena.const_int(3, false, 32, Span::DUMMY);
        let select = arena.with_children(AstKind::Range, Span::DUMMY, vec![index]);
        let id = arena.with_children(AstKind::Identifier, Span::DUMMY, vec![select]);
        arena[id].decl = Some(wire);

        let sw = detect_sign_width(&mut ctx, &mut arena, id).unwrap();
        assert_eq!(sw.width, 1);
        assert!(!sw.signed);
    }

    #[test]
    fn real_leaf_is_flagged() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let r = arena.real_value(1.5, Span::DUMMY);
        let c = arena.const_int(1, false, 4, Span::DUMMY);
        let add = arena.with_children(AstKind::Add, Span::DUMMY, vec![r, c]);
        let sw = detect_sign_width(&mut ctx, &mut arena, add).unwrap();
        assert!(sw.is_real);
    }

    #[test]
    fn unresolved_identifier_errors() {
        let fx = Fixture::new();
        let mut arena = AstArena::new();
        let module = arena.node(AstKind::Module, Span::DUMMY);
        let mut ctx = fx.ctx(module);

        let name = fx.interner.intern("ghost");
        let id = arena.ident(name, Span::DUMMY);
        assert!(detect_sign_width(&mut ctx, &mut arena, id).is_err());
    }
}
