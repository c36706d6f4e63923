// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Prime-field arithmetic modulo p = 2^255 - 19, per spec §4.1.
//!
//! A field element is 10 signed 64-bit limbs in mixed radix 2^25.5: even
//! limbs carry 26 bits, odd limbs carry 25 bits, so limb `i` has weight
//! `2^ceil(25.5*i)`. All operations are constant-time: carries propagate
//! unconditionally and no branch or memory access depends on limb values.

/// Bit width of limb `i`: 26 for even `i`, 25 for odd `i`.
const BITS: [u32; 10] = [26, 25, 26, 25, 26, 25, 26, 25, 26, 25];

/// Prime p = 2^255 - 19, in the same 10-limb layout, used by `to_bytes` to
/// produce the unique fully-reduced representative.
const P: [i64; 10] = [
    0x3ff_ffed,
    0x1ff_ffff,
    0x3ff_ffff,
    0x1ff_ffff,
    0x3ff_ffff,
    0x1ff_ffff,
    0x3ff_ffff,
    0x1ff_ffff,
    0x3ff_ffff,
    0x1ff_ffff,
];

/// A field element mod p, represented as 10 limbs of mixed radix 2^25.5.
#[derive(Clone, Copy, Debug)]
pub struct FieldElement(pub(crate) [i64; 10]);

impl FieldElement {
    /// The additive identity.
    pub const ZERO: FieldElement = FieldElement([0; 10]);

    /// The multiplicative identity.
    pub const ONE: FieldElement = FieldElement([1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

    /// Parses the 32-byte little-endian encoding. Bit 255 (the top bit of
    /// the last byte) is ignored per X25519 convention (spec §4.1).
    pub fn from_bytes(bytes: &[u8; 32]) -> FieldElement {
        let mut limbs = [0i64; 10];
        let mut bit_pos: u32 = 0;
        for (i, width) in BITS.iter().enumerate() {
            let mut value: u64 = 0;
            for b in 0..*width {
                let global_bit = bit_pos + b;
                if global_bit >= 255 {
                    break;
                }
                let byte = bytes[(global_bit / 8) as usize];
                let bit = (byte >> (global_bit % 8)) & 1;
                value |= (bit as u64) << b;
            }
            limbs[i] = value as i64;
            bit_pos += width;
        }
        FieldElement(limbs)
    }

    /// Serialises the unique fully-reduced representative in `[0, p)` as a
    /// 32-byte little-endian array.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut t = *self;
        t.reduce();
        t.reduce();

        // Constant-time conditional subtraction of p: compute t - p with
        // explicit borrow propagation; if the final borrow is clear, t >= p
        // and the difference is the reduced value, otherwise t was already
        // in range and is kept.
        let mut diff = [0i64; 10];
        let mut borrow: i64 = 0;
        for i in 0..10 {
            let width = BITS[i] as i64;
            let v = t.0[i] - P[i] - borrow;
            let carry = v >> width; // 0, or -1 if this limb underflowed
            diff[i] = v - (carry << width);
            borrow = -carry;
        }
        // borrow == 0 means t >= p, so diff is the reduced value; the mask
        // is all-ones or all-zeros, never a data-dependent branch.
        let keep_diff: i64 = -((borrow == 0) as i64);
        for i in 0..10 {
            t.0[i] = (diff[i] & keep_diff) | (t.0[i] & !keep_diff);
        }

        let mut bytes = [0u8; 32];
        let mut bit_pos: u32 = 0;
        for (i, width) in BITS.iter().enumerate() {
            let value = t.0[i] as u64;
            for b in 0..*width {
                let global_bit = bit_pos + b;
                if global_bit >= 256 {
                    break;
                }
                if (value >> b) & 1 == 1 {
                    bytes[(global_bit / 8) as usize] |= 1 << (global_bit % 8);
                }
            }
            bit_pos += width;
        }
        bytes
    }

    /// Weak carry propagation: normalises limb magnitudes to their
    /// nominal bit widths, folding the overflow out of limb 9 back in via
    /// `2^255 ≡ 19 (mod p)`. Does not guarantee a value below `p` — callers
    /// that need the canonical representative must call this twice and
    /// then conditionally subtract `p` (see [`to_bytes`](Self::to_bytes)).
    fn reduce(&mut self) {
        for _ in 0..2 {
            let mut carry: i64 = 0;
            for i in 0..10 {
                let width = BITS[i] as i64;
                let v = self.0[i] + carry;
                carry = v >> width;
                self.0[i] = v - (carry << width);
                if i == 9 {
                    self.0[0] += carry * 19;
                    carry = 0;
                }
            }
        }
    }

    /// Field addition.
    pub fn add(&self, other: &FieldElement) -> FieldElement {
        let mut out = [0i64; 10];
        for i in 0..10 {
            out[i] = self.0[i] + other.0[i];
        }
        let mut fe = FieldElement(out);
        fe.reduce();
        fe
    }

    /// Field subtraction.
    pub fn sub(&self, other: &FieldElement) -> FieldElement {
        let mut out = [0i64; 10];
        for i in 0..10 {
            out[i] = self.0[i] - other.0[i];
        }
        let mut fe = FieldElement(out);
        fe.reduce();
        fe
    }

    /// Field multiplication: full 10x10 schoolbook product into 128-bit
    /// accumulators, folding terms with combined index `>= 10` back via
    /// `2^255 ≡ 19 (mod p)`, then carry-propagating down to 64-bit limbs.
    pub fn mul(&self, other: &FieldElement) -> FieldElement {
        let mut acc = [0i128; 10];
        for i in 0..10 {
            let ai = self.0[i] as i128;
            for j in 0..10 {
                let product = ai * other.0[j] as i128;
                let k = i + j;
                if k < 10 {
                    acc[k] += product;
                } else {
                    acc[k - 10] += product * 19;
                }
            }
        }

        let mut out = [0i64; 10];
        let mut carry: i128 = 0;
        for i in 0..10 {
            let width = BITS[i] as u32;
            let v = acc[i] + carry;
            carry = v >> width;
            out[i] = (v - (carry << width)) as i64;
        }
        out[0] += (carry * 19) as i64;

        let mut fe = FieldElement(out);
        fe.reduce();
        fe
    }

    /// Multiplies by a small public constant (used for the ladder step's
    /// `a24 * E` term, spec §4.2). `scalar` is not secret, so no
    /// constant-time concern applies beyond the usual carry discipline.
    pub fn mul_small(&self, scalar: i64) -> FieldElement {
        let mut acc = [0i128; 10];
        for i in 0..10 {
            acc[i] = self.0[i] as i128 * scalar as i128;
        }
        let mut out = [0i64; 10];
        let mut carry: i128 = 0;
        for i in 0..10 {
            let width = BITS[i] as u32;
            let v = acc[i] + carry;
            carry = v >> width;
            out[i] = (v - (carry << width)) as i64;
        }
        out[0] += (carry * 19) as i64;
        let mut fe = FieldElement(out);
        fe.reduce();
        fe
    }

    /// Field squaring. Implemented via [`mul`](Self::mul) applied to two
    /// copies: correctness over the doubled-cross-term micro-optimisation,
    /// matching this port's correctness-first posture (spec §2 budget
    /// note).
    pub fn square(&self) -> FieldElement {
        self.mul(self)
    }

    /// Modular inverse via `z^(p-2)`, using the fixed addition chain
    /// `p - 2 = 2^255 - 21`: binary digits of `2^255 - 1` (all ones) with
    /// bits 2 and 4 cleared (since `21 = 0b10101`). 254 squarings, skipping
    /// the conditional multiply exactly at those two bit positions.
    pub fn invert(&self) -> FieldElement {
        let mut c = *self;
        for a in (0..=253).rev() {
            c = c.square();
            if a != 2 && a != 4 {
                c = c.mul(self);
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(bytes: &[u8; 32]) -> FieldElement {
        FieldElement::from_bytes(bytes)
    }

    #[test]
    fn zero_roundtrip() {
        let z = FieldElement::ZERO;
        assert_eq!(z.to_bytes(), [0u8; 32]);
    }

    #[test]
    fn one_roundtrip() {
        let mut expected = [0u8; 32];
        expected[0] = 1;
        assert_eq!(FieldElement::ONE.to_bytes(), expected);
    }

    #[test]
    fn from_bytes_ignores_top_bit() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[31] = 0x80;
        b[31] = 0x00;
        assert_eq!(fe(&a).to_bytes(), fe(&b).to_bytes());
    }

    #[test]
    fn add_sub_inverse() {
        let mut a = [0u8; 32];
        a[0] = 5;
        let mut b = [0u8; 32];
        b[0] = 3;
        let x = fe(&a);
        let y = fe(&b);
        let sum = x.add(&y);
        let back = sum.sub(&y);
        assert_eq!(back.to_bytes(), x.to_bytes());
    }

    #[test]
    fn mul_by_one_is_identity() {
        let mut a = [0u8; 32];
        a[0] = 42;
        a[5] = 7;
        let x = fe(&a);
        let product = x.mul(&FieldElement::ONE);
        assert_eq!(product.to_bytes(), x.to_bytes());
    }

    #[test]
    fn square_matches_self_mul() {
        let mut a = [0u8; 32];
        a[3] = 200;
        let x = fe(&a);
        assert_eq!(x.square().to_bytes(), x.mul(&x).to_bytes());
    }

    #[test]
    fn invert_then_mul_is_one() {
        let mut a = [0u8; 32];
        a[0] = 9;
        let x = fe(&a);
        let inv = x.invert();
        let product = x.mul(&inv);
        assert_eq!(product.to_bytes(), FieldElement::ONE.to_bytes());
    }

    #[test]
    fn reduces_values_past_p() {
        // p itself reduces to zero.
        let mut p_bytes = [0xffu8; 32];
        p_bytes[0] = 0xed;
        p_bytes[31] = 0x7f;
        assert_eq!(fe(&p_bytes).to_bytes(), [0u8; 32]);
    }
}
