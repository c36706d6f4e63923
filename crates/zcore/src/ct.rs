//! Constant-time comparison and selection.
//!
//! Spec §9 forbids secret-dependent branches in the Montgomery-ladder
//! conditional swap, the Poly1305 final reduction, and AEAD tag
//! verification. This module centralizes the bitmask arithmetic those call
//! sites need, built on [`subtle`] the way the rest of the Rust ecosystem
//! implements branch-free crypto comparisons.

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Compares two equal-length byte slices without branching on their
/// contents. Unequal lengths compare unequal; the length check itself is
/// not secret-dependent (lengths are public in every call site here).
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}

/// Branch-free select: returns `a` if `choice` is true, `b` otherwise, with
/// a runtime independent of which branch was taken.
#[inline]
pub fn select_u8(choice: bool, a: u8, b: u8) -> u8 {
    u8::conditional_select(&b, &a, Choice::from(choice as u8))
}

/// Branch-free conditional swap of two equal-length byte buffers, used by
/// the Montgomery ladder (spec §4.2) to swap `(x2, z2)` and `(x3, z3)`
/// without revealing the current scalar bit through memory-access pattern
/// or control flow.
#[inline]
pub fn cswap_bytes(swap: bool, a: &mut [u8], b: &mut [u8]) {
    debug_assert_eq!(a.len(), b.len());
    let choice = Choice::from(swap as u8);
    for (x, y) in a.iter_mut().zip(b.iter_mut()) {
        u8::conditional_swap(x, y, choice);
    }
}

/// Branch-free conditional swap over `i64` limbs, used by the field-element
/// ladder step where limbs are signed accumulators rather than raw bytes.
#[inline]
pub fn cswap_i64(swap: bool, a: &mut [i64], b: &mut [i64]) {
    debug_assert_eq!(a.len(), b.len());
    let mask: i64 = -(swap as i64);
    for (x, y) in a.iter_mut().zip(b.iter_mut()) {
        let t = mask & (*x ^ *y);
        *x ^= t;
        *y ^= t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_same_slices() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
    }

    #[test]
    fn eq_different_slices() {
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
    }

    #[test]
    fn eq_different_lengths() {
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2]));
    }

    #[test]
    fn eq_empty_slices() {
        let empty: [u8; 0] = [];
        assert!(constant_time_eq(&empty, &empty));
    }

    #[test]
    fn cswap_swaps_when_true() {
        let mut a = [1u8, 2, 3];
        let mut b = [4u8, 5, 6];
        cswap_bytes(true, &mut a, &mut b);
        assert_eq!(a, [4, 5, 6]);
        assert_eq!(b, [1, 2, 3]);
    }

    #[test]
    fn cswap_noop_when_false() {
        let mut a = [1u8, 2, 3];
        let mut b = [4u8, 5, 6];
        cswap_bytes(false, &mut a, &mut b);
        assert_eq!(a, [1, 2, 3]);
        assert_eq!(b, [4, 5, 6]);
    }

    #[test]
    fn cswap_i64_swaps_when_true() {
        let mut a = [10i64, -20, 30];
        let mut b = [1i64, 2, 3];
        cswap_i64(true, &mut a, &mut b);
        assert_eq!(a, [1, 2, 3]);
        assert_eq!(b, [10, -20, 30]);
    }
}
