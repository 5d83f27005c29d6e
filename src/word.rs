//! 256-bit word helpers.
//!
//! `U256` carries the unsigned wrapping semantics directly; this module adds
//! the two's-complement views the instruction set needs (SDIV, SMOD, SLT,
//! SGT, SAR, SIGNEXTEND), byte extraction, and the saturating narrowings
//! used to turn stack words into offsets and gas quantities.
//!
//! Every function here is total: division and modulo by zero yield zero,
//! shifts of 256 or more yield zero (or the sign fill for SAR), nothing
//! panics for any input pair.

use alloy_primitives::U256;

const SIGN_BIT: usize = 255;

/// Low 64 bits, saturating to `u64::MAX` when the word does not fit.
pub fn as_u64_saturated(w: U256) -> u64 {
    let limbs = w.as_limbs();
    if limbs[1] == 0 && limbs[2] == 0 && limbs[3] == 0 {
        limbs[0]
    } else {
        u64::MAX
    }
}

/// Low 64 bits, or `None` when the word does not fit. Offsets and lengths
/// that overflow a u64 always exhaust gas before they could be used, so
/// `None` maps to a gas overflow at the call sites.
pub fn as_u64_checked(w: U256) -> Option<u64> {
    let limbs = w.as_limbs();
    if limbs[1] == 0 && limbs[2] == 0 && limbs[3] == 0 {
        Some(limbs[0])
    } else {
        None
    }
}

pub fn as_usize_saturated(w: U256) -> usize {
    usize::try_from(as_u64_saturated(w)).unwrap_or(usize::MAX)
}

fn is_negative(w: U256) -> bool {
    w.bit(SIGN_BIT)
}

/// Two's-complement negation (wrapping).
fn neg(w: U256) -> U256 {
    (!w).wrapping_add(U256::from(1))
}

pub fn div(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or(U256::ZERO)
}

pub fn rem(a: U256, b: U256) -> U256 {
    a.checked_rem(b).unwrap_or(U256::ZERO)
}

/// Signed division. MIN / -1 wraps back to MIN; x / 0 is 0.
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let (abs_a, neg_a) = if is_negative(a) { (neg(a), true) } else { (a, false) };
    let (abs_b, neg_b) = if is_negative(b) { (neg(b), true) } else { (b, false) };
    let q = div(abs_a, abs_b);
    if neg_a != neg_b {
        neg(q)
    } else {
        q
    }
}

/// Signed modulo; the result takes the sign of the dividend.
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::ZERO;
    }
    let (abs_a, neg_a) = if is_negative(a) { (neg(a), true) } else { (a, false) };
    let abs_b = if is_negative(b) { neg(b) } else { b };
    let r = rem(abs_a, abs_b);
    if neg_a {
        neg(r)
    } else {
        r
    }
}

pub fn slt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}

/// Arithmetic shift right: fills with the sign bit.
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    match as_u64_checked(shift) {
        Some(s) if s < 256 => {
            let shifted = value.wrapping_shr(s as usize);
            if negative {
                // Fill vacated high bits with ones.
                shifted | (U256::MAX.wrapping_shl(256 - s as usize))
            } else {
                shifted
            }
        }
        _ => {
            if negative {
                U256::MAX
            } else {
                U256::ZERO
            }
        }
    }
}

/// SIGNEXTEND: extend the sign of the value held in the low `ext + 1` bytes.
/// `ext >= 31` is the identity.
pub fn signextend(ext: U256, value: U256) -> U256 {
    if ext >= U256::from(31) {
        return value;
    }
    let ext = as_u64_saturated(ext) as usize;
    let bit_index = 8 * ext + 7;
    let mask = U256::MAX.wrapping_shr(255 - bit_index);
    if value.bit(bit_index) {
        value | !mask
    } else {
        value & mask
    }
}

/// BYTE: the `i`-th byte of the word counting from the big end; zero when
/// `i >= 32`.
pub fn byte(index: U256, value: U256) -> U256 {
    match as_u64_checked(index) {
        Some(i) if i < 32 => U256::from(value.byte(31 - i as usize)),
        _ => U256::ZERO,
    }
}

/// Byte length of the exponent, for EXP gas (zero exponent costs no
/// per-byte gas).
pub fn byte_len(w: U256) -> u64 {
    ((256 - w.leading_zeros() as u64) + 7) / 8
}

pub fn bool_to_word(v: bool) -> U256 {
    if v {
        U256::from(1)
    } else {
        U256::ZERO
    }
}
