//! Constant operations over [`LogicVec`] operands.
//!
//! These are the total functions the constant folder delegates to: one
//! per operator of the expression language, each taking its operands
//! together with their signedness and an optional result width. The
//! conventions are uniform:
//!
//! - `result_len: None` means "natural width" (self-determined).
//! - Bitwise operations extend each operand to the result width with its
//!   own signedness and apply the 4-state truth tables bit by bit.
//! - Arithmetic operations interpret fully-defined operands as integers
//!   (arbitrary precision), compute exactly, and truncate the result to
//!   the result width in two's complement. Any `x` or `z` bit in an
//!   operand makes the result all-`x`.
//! - Relational operations produce a single bit (`0`, `1`, or `x`),
//!   zero-extended to the result width if one is given.

use crate::logic::Logic;
use crate::logic_vec::LogicVec;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Interprets a fully-defined vector as an arbitrary-precision integer.
///
/// Returns `None` if any bit is `x` or `z`.
pub fn to_bigint(v: &LogicVec, signed: bool) -> Option<BigInt> {
    if !v.is_fully_defined() {
        return None;
    }
    let width = v.width();
    let mut digits = vec![0u32; width.div_ceil(32) as usize];
    for i in 0..width {
        if v.get(i) == Logic::One {
            digits[(i / 32) as usize] |= 1 << (i % 32);
        }
    }
    let magnitude = BigUint::new(digits);
    let mut value = BigInt::from(magnitude);
    if signed && width > 0 && v.get(width - 1) == Logic::One {
        value -= BigInt::one() << width;
    }
    Some(value)
}

/// Truncates an arbitrary-precision integer to `width` bits in two's
/// complement.
pub fn from_bigint(value: &BigInt, width: u32) -> LogicVec {
    let modulus = BigInt::one() << width;
    let mut residue = value % &modulus;
    if residue.is_negative() {
        residue += &modulus;
    }
    let digits = residue
        .to_biguint()
        .expect("residue is non-negative")
        .to_u32_digits();
    let mut v = LogicVec::new(width);
    for i in 0..width {
        let digit = digits.get((i / 32) as usize).copied().unwrap_or(0);
        if digit & (1 << (i % 32)) != 0 {
            v.set(i, Logic::One);
        }
    }
    v
}

/// Interprets a vector as a float, reading undefined bits as zero.
///
/// Used where a bit-precise constant meets real arithmetic.
pub fn to_f64(v: &LogicVec, signed: bool) -> f64 {
    let mut defined = LogicVec::new(v.width());
    for (i, bit) in v.iter().enumerate() {
        if bit == Logic::One {
            defined.set(i as u32, bit);
        }
    }
    to_bigint(&defined, signed)
        .and_then(|n| n.to_f64())
        .unwrap_or(0.0)
}

fn natural_len(a: &LogicVec, b: &LogicVec, result_len: Option<u32>) -> u32 {
    result_len.unwrap_or_else(|| a.width().max(b.width()))
}

fn widen_single_bit(bit: Logic, result_len: Option<u32>) -> LogicVec {
    let v = LogicVec::from_logic(bit);
    match result_len {
        Some(len) if len != 1 => v.extended(len, false),
        _ => v,
    }
}

// ---------------------------------------------------------------------------
// Bitwise
// ---------------------------------------------------------------------------

/// Bitwise NOT.
pub fn not(a: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    let len = result_len.unwrap_or(a.width());
    !&a.extended(len, signed_a)
}

/// Bitwise AND.
pub fn and(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
) -> LogicVec {
    let len = natural_len(a, b, result_len);
    &a.extended(len, signed_a) & &b.extended(len, signed_b)
}

/// Bitwise OR.
pub fn or(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
) -> LogicVec {
    let len = natural_len(a, b, result_len);
    &a.extended(len, signed_a) | &b.extended(len, signed_b)
}

/// Bitwise XOR.
pub fn xor(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
) -> LogicVec {
    let len = natural_len(a, b, result_len);
    &a.extended(len, signed_a) ^ &b.extended(len, signed_b)
}

/// Bitwise XNOR.
pub fn xnor(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
) -> LogicVec {
    !&xor(a, b, signed_a, signed_b, result_len)
}

// ---------------------------------------------------------------------------
// Reductions
// ---------------------------------------------------------------------------

/// Reduction AND: `1` if all bits are one, `0` if any bit is zero, else `x`.
pub fn reduce_and(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    let mut acc = Logic::One;
    for bit in a.iter() {
        acc = acc & bit;
    }
    widen_single_bit(acc, result_len)
}

/// Reduction OR: `1` if any bit is one, `0` if all bits are zero, else `x`.
pub fn reduce_or(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    widen_single_bit(a.reduce_bool(), result_len)
}

/// Reduction XOR: parity of the bits, `x` if any bit is undefined.
pub fn reduce_xor(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    let mut acc = Logic::Zero;
    for bit in a.iter() {
        acc = acc ^ bit;
    }
    widen_single_bit(acc, result_len)
}

/// Reduction XNOR: inverted parity.
pub fn reduce_xnor(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    let mut acc = Logic::Zero;
    for bit in a.iter() {
        acc = acc ^ bit;
    }
    widen_single_bit(!acc, result_len)
}

/// Boolean reduction, identical to [`reduce_or`].
pub fn reduce_bool(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    reduce_or(a, result_len)
}

// ---------------------------------------------------------------------------
// Logical
// ---------------------------------------------------------------------------

/// Logical NOT of the boolean reduction.
pub fn logic_not(a: &LogicVec, result_len: Option<u32>) -> LogicVec {
    widen_single_bit(!a.reduce_bool(), result_len)
}

/// Logical AND of the boolean reductions.
pub fn logic_and(a: &LogicVec, b: &LogicVec, result_len: Option<u32>) -> LogicVec {
    widen_single_bit(a.reduce_bool() & b.reduce_bool(), result_len)
}

/// Logical OR of the boolean reductions.
pub fn logic_or(a: &LogicVec, b: &LogicVec, result_len: Option<u32>) -> LogicVec {
    widen_single_bit(a.reduce_bool() | b.reduce_bool(), result_len)
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

fn shift(a: &LogicVec, b: &LogicVec, signed_a: bool, result_len: Option<u32>, fill: bool) -> LogicVec {
    let len = result_len.unwrap_or(a.width());
    let Some(amount) = b.to_u64() else {
        return LogicVec::all_x(len);
    };
    let widened = a.extended(len, signed_a);
    let pad = if fill && signed_a && len > 0 {
        widened.get(len - 1)
    } else {
        Logic::Zero
    };
    let mut result = LogicVec::new(len);
    for i in 0..len {
        // fill=false: left shift, fill=true: right shift
        let src = if fill {
            (i as u64).checked_add(amount)
        } else {
            (i as u64).checked_sub(amount)
        };
        let bit = match src {
            Some(s) if s < len as u64 => widened.get(s as u32),
            Some(_) => pad,
            None => Logic::Zero,
        };
        result.set(i, bit);
    }
    result
}

/// Logical shift left; vacated bits are zero.
pub fn shl(a: &LogicVec, b: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    shift(a, b, signed_a, result_len, false)
}

/// Logical shift right; vacated bits are zero.
pub fn shr(a: &LogicVec, b: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    let len = result_len.unwrap_or(a.width());
    let Some(amount) = b.to_u64() else {
        return LogicVec::all_x(len);
    };
    let widened = a.extended(len, signed_a);
    let mut result = LogicVec::new(len);
    for i in 0..len {
        if let Some(s) = (i as u64).checked_add(amount) {
            if s < len as u64 {
                result.set(i, widened.get(s as u32));
            }
        }
    }
    result
}

/// Arithmetic shift left, identical to [`shl`].
pub fn sshl(a: &LogicVec, b: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    shl(a, b, signed_a, result_len)
}

/// Arithmetic shift right; vacated bits replicate the sign bit when the
/// left operand is signed.
pub fn sshr(a: &LogicVec, b: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    shift(a, b, signed_a, result_len, true)
}

// ---------------------------------------------------------------------------
// Relational
// ---------------------------------------------------------------------------

fn compare_ints(
    a: &LogicVec,
    b: &LogicVec,
    signed: bool,
) -> Option<std::cmp::Ordering> {
    let lhs = to_bigint(a, signed)?;
    let rhs = to_bigint(b, signed)?;
    Some(lhs.cmp(&rhs))
}

fn relational(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
    accept: fn(std::cmp::Ordering) -> bool,
) -> LogicVec {
    let bit = match compare_ints(a, b, signed_a && signed_b) {
        Some(ord) => {
            if accept(ord) {
                Logic::One
            } else {
                Logic::Zero
            }
        }
        None => Logic::X,
    };
    widen_single_bit(bit, result_len)
}

/// Less-than comparison.
pub fn lt(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    relational(a, b, sa, sb, len, std::cmp::Ordering::is_lt)
}

/// Less-or-equal comparison.
pub fn le(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    relational(a, b, sa, sb, len, std::cmp::Ordering::is_le)
}

/// Greater-or-equal comparison.
pub fn ge(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    relational(a, b, sa, sb, len, std::cmp::Ordering::is_ge)
}

/// Greater-than comparison.
pub fn gt(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    relational(a, b, sa, sb, len, std::cmp::Ordering::is_gt)
}

/// Equality: `x` if any bit of either operand is undefined.
pub fn eq(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    let width = a.width().max(b.width());
    let lhs = a.extended(width, sa && sb);
    let rhs = b.extended(width, sa && sb);
    let mut bit = Logic::One;
    for i in 0..width {
        let (x, y) = (lhs.get(i), rhs.get(i));
        if !x.is_definite() || !y.is_definite() {
            bit = Logic::X;
        } else if x != y {
            bit = Logic::Zero;
            break;
        }
    }
    widen_single_bit(bit, len)
}

/// Inequality: logical inverse of [`eq`].
pub fn ne(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    let r = eq(a, b, sa, sb, None);
    widen_single_bit(!r.get(0), len)
}

/// Case equality: exact 4-state match, including `x` and `z` bits.
pub fn eqx(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    let width = a.width().max(b.width());
    let lhs = a.extended(width, sa && sb);
    let rhs = b.extended(width, sa && sb);
    let equal = (0..width).all(|i| lhs.get(i) == rhs.get(i));
    widen_single_bit(if equal { Logic::One } else { Logic::Zero }, len)
}

/// Case inequality: inverse of [`eqx`].
pub fn nex(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    let r = eqx(a, b, sa, sb, None);
    widen_single_bit(!r.get(0), len)
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn arith2(
    a: &LogicVec,
    b: &LogicVec,
    signed_a: bool,
    signed_b: bool,
    result_len: Option<u32>,
    op: impl FnOnce(BigInt, BigInt) -> Option<BigInt>,
) -> LogicVec {
    let len = natural_len(a, b, result_len);
    match (to_bigint(a, signed_a), to_bigint(b, signed_b)) {
        (Some(x), Some(y)) => match op(x, y) {
            Some(value) => from_bigint(&value, len),
            None => LogicVec::all_x(len),
        },
        _ => LogicVec::all_x(len),
    }
}

/// Addition.
pub fn add(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |x, y| Some(x + y))
}

/// Subtraction.
pub fn sub(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |x, y| Some(x - y))
}

/// Multiplication.
pub fn mul(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |x, y| Some(x * y))
}

/// Division, truncating toward zero; division by zero yields all-`x`.
pub fn div(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |x, y| {
        if y.is_zero() {
            None
        } else {
            Some(x / y)
        }
    })
}

/// Remainder with the sign of the dividend; modulo zero yields all-`x`.
pub fn modulo(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |x, y| {
        if y.is_zero() {
            None
        } else {
            Some(x % y)
        }
    })
}

/// Exponentiation. A negative exponent yields 0 unless the base is
/// `1` or `-1`, which alternate by exponent parity.
pub fn pow(a: &LogicVec, b: &LogicVec, sa: bool, sb: bool, len: Option<u32>) -> LogicVec {
    arith2(a, b, sa, sb, len, |base, exp| {
        if exp.is_negative() {
            let value = if base == BigInt::one() {
                BigInt::one()
            } else if base == -BigInt::one() {
                if (&exp % 2) == BigInt::zero() {
                    BigInt::one()
                } else {
                    -BigInt::one()
                }
            } else {
                BigInt::zero()
            };
            return Some(value);
        }
        let Some(e) = exp.to_u64() else {
            return None;
        };
        let mut acc = BigInt::one();
        let mut base = base;
        let mut e = e;
        while e > 0 {
            if e & 1 == 1 {
                acc *= &base;
            }
            e >>= 1;
            if e > 0 {
                base = &base * &base;
            }
        }
        Some(acc)
    })
}

/// Unary plus: extension to the result width.
pub fn pos(a: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    let len = result_len.unwrap_or(a.width());
    if !a.is_fully_defined() {
        return LogicVec::all_x(len);
    }
    a.extended(len, signed_a)
}

/// Unary minus.
pub fn neg(a: &LogicVec, signed_a: bool, result_len: Option<u32>) -> LogicVec {
    let len = result_len.unwrap_or(a.width());
    match to_bigint(a, signed_a) {
        Some(x) => from_bigint(&(-x), len),
        None => LogicVec::all_x(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> LogicVec {
        LogicVec::from_binary_str(s).unwrap()
    }

    #[test]
    fn bigint_roundtrip_unsigned() {
        let v = LogicVec::from_i64(200, 8);
        let n = to_bigint(&v, false).unwrap();
        assert_eq!(n, BigInt::from(200));
        assert_eq!(from_bigint(&n, 8), v);
    }

    #[test]
    fn bigint_roundtrip_signed() {
        let v = LogicVec::from_i64(-5, 8);
        assert_eq!(to_bigint(&v, true).unwrap(), BigInt::from(-5));
        assert_eq!(to_bigint(&v, false).unwrap(), BigInt::from(251));
    }

    #[test]
    fn bigint_undefined_is_none() {
        assert!(to_bigint(&bits("1x"), false).is_none());
    }

    #[test]
    fn add_basic_and_truncation() {
        let r = add(&bits("0011"), &bits("0001"), false, false, Some(4));
        assert_eq!(format!("{r}"), "0100");
        // 15 + 1 wraps at 4 bits
        let r = add(&bits("1111"), &bits("0001"), false, false, Some(4));
        assert_eq!(format!("{r}"), "0000");
    }

    #[test]
    fn add_undef_propagates() {
        let r = add(&bits("1x"), &bits("01"), false, false, Some(2));
        assert_eq!(format!("{r}"), "xx");
    }

    #[test]
    fn sub_signed() {
        let r = sub(&bits("0001"), &bits("0010"), true, true, Some(4));
        assert_eq!(r.to_i64(true), Some(-1));
    }

    #[test]
    fn mul_widens() {
        let r = mul(&bits("0101"), &bits("0011"), false, false, Some(8));
        assert_eq!(r.to_u64(), Some(15));
    }

    #[test]
    fn div_and_mod() {
        let seven = LogicVec::from_i64(7, 8);
        let three = LogicVec::from_i64(3, 8);
        assert_eq!(div(&seven, &three, false, false, Some(8)).to_u64(), Some(2));
        assert_eq!(
            modulo(&seven, &three, false, false, Some(8)).to_u64(),
            Some(1)
        );
        // sign of the dividend
        let neg7 = LogicVec::from_i64(-7, 8);
        assert_eq!(
            modulo(&neg7, &three, true, true, Some(8)).to_i64(true),
            Some(-1)
        );
    }

    #[test]
    fn div_by_zero_is_x() {
        let r = div(&bits("0100"), &bits("0000"), false, false, Some(4));
        assert_eq!(format!("{r}"), "xxxx");
    }

    #[test]
    fn pow_cases() {
        let two = LogicVec::from_i64(2, 8);
        let ten = LogicVec::from_i64(10, 8);
        assert_eq!(pow(&two, &ten, false, false, Some(16)).to_u64(), Some(1024));
        let neg1 = LogicVec::from_i64(-1, 8);
        let neg3 = LogicVec::from_i64(-3, 8);
        assert_eq!(
            pow(&neg1, &neg3, true, true, Some(8)).to_i64(true),
            Some(-1)
        );
        assert_eq!(pow(&two, &neg3, true, true, Some(8)).to_u64(), Some(0));
    }

    #[test]
    fn neg_pos() {
        let five = LogicVec::from_i64(5, 8);
        assert_eq!(neg(&five, false, Some(8)).to_i64(true), Some(-5));
        assert_eq!(pos(&five, false, Some(16)).to_u64(), Some(5));
    }

    #[test]
    fn bitwise_with_extension() {
        // "10" zero-extends, "1" sign-extends over 4 bits
        let r = and(&bits("0110"), &bits("1"), false, true, Some(4));
        assert_eq!(format!("{r}"), "0110");
        let r = or(&bits("0001"), &bits("10"), false, false, Some(4));
        assert_eq!(format!("{r}"), "0011");
        let r = not(&bits("10"), false, Some(4));
        assert_eq!(format!("{r}"), "1101");
        let r = xnor(&bits("01"), &bits("01"), false, false, None);
        assert_eq!(format!("{r}"), "11");
    }

    #[test]
    fn reductions() {
        assert_eq!(format!("{}", reduce_and(&bits("111"), None)), "1");
        assert_eq!(format!("{}", reduce_and(&bits("101"), None)), "0");
        assert_eq!(format!("{}", reduce_and(&bits("1x1"), None)), "x");
        assert_eq!(format!("{}", reduce_or(&bits("000"), None)), "0");
        assert_eq!(format!("{}", reduce_or(&bits("0x0"), None)), "x");
        assert_eq!(format!("{}", reduce_xor(&bits("110"), None)), "0");
        assert_eq!(format!("{}", reduce_xor(&bits("010"), None)), "1");
        assert_eq!(format!("{}", reduce_xnor(&bits("010"), None)), "0");
        assert_eq!(format!("{}", reduce_bool(&bits("0100"), None)), "1");
    }

    #[test]
    fn logical_ops() {
        assert_eq!(format!("{}", logic_not(&bits("00"), None)), "1");
        assert_eq!(format!("{}", logic_not(&bits("01"), None)), "0");
        assert_eq!(
            format!("{}", logic_and(&bits("01"), &bits("10"), None)),
            "1"
        );
        assert_eq!(
            format!("{}", logic_or(&bits("00"), &bits("00"), None)),
            "0"
        );
        assert_eq!(
            format!("{}", logic_and(&bits("0x"), &bits("01"), None)),
            "x"
        );
    }

    #[test]
    fn shifts() {
        let one = LogicVec::from_i64(1, 4);
        let two = LogicVec::from_i64(2, 4);
        assert_eq!(shl(&one, &two, false, Some(4)).to_u64(), Some(4));
        assert_eq!(shr(&bits("1100"), &two, false, Some(4)).to_u64(), Some(3));
        // sshr on a signed value shifts in the sign bit
        let minus4 = LogicVec::from_i64(-4, 4);
        assert_eq!(sshr(&minus4, &one, true, Some(4)).to_i64(true), Some(-2));
        // shr is always logical
        assert_eq!(shr(&minus4, &one, true, Some(4)).to_u64(), Some(6));
        // undefined shift amount
        assert_eq!(format!("{}", shl(&one, &bits("x"), false, Some(4))), "xxxx");
    }

    #[test]
    fn relational() {
        let a = LogicVec::from_i64(3, 4);
        let b = LogicVec::from_i64(-2, 4);
        // signed compare: 3 > -2
        assert_eq!(format!("{}", gt(&a, &b, true, true, None)), "1");
        // unsigned compare: 3 < 14
        assert_eq!(format!("{}", lt(&a, &b, false, true, None)), "1");
        assert_eq!(format!("{}", le(&a, &a, true, true, None)), "1");
        assert_eq!(format!("{}", ge(&b, &a, true, true, None)), "0");
    }

    #[test]
    fn equality_family() {
        assert_eq!(format!("{}", eq(&bits("0101"), &bits("0101"), false, false, None)), "1");
        assert_eq!(format!("{}", eq(&bits("0101"), &bits("0100"), false, false, None)), "0");
        assert_eq!(format!("{}", eq(&bits("010x"), &bits("0100"), false, false, None)), "x");
        // a defined mismatch wins over an undefined bit
        assert_eq!(format!("{}", eq(&bits("110x"), &bits("0100"), false, false, None)), "0");
        assert_eq!(format!("{}", ne(&bits("01"), &bits("10"), false, false, None)), "1");
        assert_eq!(format!("{}", eqx(&bits("x1"), &bits("x1"), false, false, None)), "1");
        assert_eq!(format!("{}", eqx(&bits("x1"), &bits("01"), false, false, None)), "0");
        assert_eq!(format!("{}", nex(&bits("x1"), &bits("01"), false, false, None)), "1");
    }

    #[test]
    fn relational_widens_to_result_len() {
        let r = eq(&bits("1"), &bits("1"), false, false, Some(8));
        assert_eq!(r.width(), 8);
        assert_eq!(r.to_u64(), Some(1));
    }
}
