// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! X25519 Diffie-Hellman, per spec §4.2 and RFC 7748.

use crate::field::FieldElement;
use crate::rand::EntropySource;

/// The X25519 base point `u = 9`.
pub const BASEPOINT: [u8; 32] = {
    let mut b = [0u8; 32];
    b[0] = 9;
    b
};

/// `a24` from the Montgomery ladder step, `(486662 - 2) / 4`.
const A24: i64 = 121665;

/// Clears bits 0-2 of byte 0, clears bit 7 of byte 31, sets bit 6 of byte
/// 31 (spec §3, "mandatory clamping").
pub fn clamp(scalar: &mut [u8; 32]) {
    scalar[0] &= 0xf8;
    scalar[31] &= 0x7f;
    scalar[31] |= 0x40;
}

/// Montgomery-ladder scalar multiplication. Clamps a copy of `scalar`
/// (the input is never mutated) and walks bit 254 down to bit 0,
/// conditionally swapping `(x2, z2)`/`(x3, z3)` via a constant-time mask
/// derived from the running `swap` flag (spec §4.2).
pub fn scalarmult(scalar: &[u8; 32], u: &[u8; 32]) -> [u8; 32] {
    let mut clamped = *scalar;
    clamp(&mut clamped);

    let x1 = FieldElement::from_bytes(u);
    let mut x2 = FieldElement::ONE;
    let mut z2 = FieldElement::ZERO;
    let mut x3 = x1;
    let mut z3 = FieldElement::ONE;
    let mut swap = false;

    for pos in (0..255).rev() {
        let bit = ((clamped[pos / 8] >> (pos % 8)) & 1) == 1;
        swap ^= bit;
        cswap(swap, &mut x2, &mut x3);
        cswap(swap, &mut z2, &mut z3);
        swap = bit;

        let a = x2.add(&z2);
        let aa = a.square();
        let b = x2.sub(&z2);
        let bb = b.square();
        let e = aa.sub(&bb);
        let c = x3.add(&z3);
        let d = x3.sub(&z3);
        let da = d.mul(&a);
        let cb = c.mul(&b);
        let x3_new = da.add(&cb).square();
        let z3_new = x1.mul(&da.sub(&cb).square());
        let x2_new = aa.mul(&bb);
        let z2_new = e.mul(&aa.add(&e.mul_small(A24)));

        x3 = x3_new;
        z3 = z3_new;
        x2 = x2_new;
        z2 = z2_new;
    }

    cswap(swap, &mut x2, &mut x3);
    cswap(swap, &mut z2, &mut z3);

    let z2_inv = z2.invert();
    x2.mul(&z2_inv).to_bytes()
}

/// Constant-time conditional swap of two field elements.
fn cswap(swap: bool, a: &mut FieldElement, b: &mut FieldElement) {
    zcore::cswap_i64(swap, &mut a.0, &mut b.0);
}

/// Generates an X25519 keypair: `priv` is filled with 32 bytes from
/// `entropy`, clamped, and `pub = scalarmult(priv, basepoint)` (spec §4.2;
/// resolves the reference source's deterministic-placeholder open question
/// by mandating a real entropy source at every call site).
pub fn keygen<E: EntropySource>(
    entropy: &mut E,
    public: &mut [u8; 32],
    private: &mut [u8; 32],
) -> Result<(), crate::error::Error> {
    entropy
        .fill_bytes(private)
        .map_err(|_| crate::error::Error::EntropyUnavailable)?;
    clamp(private);
    *public = scalarmult(private, &BASEPOINT);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).unwrap();
        }
        out
    }

    #[test]
    fn rfc7748_section_6_1_vector() {
        let alice_priv = hex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let bob_priv = hex("5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb");
        let alice_pub = scalarmult(&alice_priv, &BASEPOINT);
        let bob_pub = scalarmult(&bob_priv, &BASEPOINT);
        let expected_alice_pub =
            hex("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a");
        let expected_bob_pub =
            hex("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");
        assert_eq!(alice_pub, expected_alice_pub);
        assert_eq!(bob_pub, expected_bob_pub);

        let shared_from_alice = scalarmult(&alice_priv, &bob_pub);
        let shared_from_bob = scalarmult(&bob_priv, &alice_pub);
        let expected_shared =
            hex("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742");
        assert_eq!(shared_from_alice, expected_shared);
        assert_eq!(shared_from_bob, expected_shared);
    }

    #[test]
    fn ecdh_agreement_is_symmetric() {
        use crate::rand::test_utils::CountingEntropySource;
        let mut entropy_a = CountingEntropySource::new(1);
        let mut entropy_b = CountingEntropySource::new(2);
        let (mut a_pub, mut a_priv) = ([0u8; 32], [0u8; 32]);
        let (mut b_pub, mut b_priv) = ([0u8; 32], [0u8; 32]);
        keygen(&mut entropy_a, &mut a_pub, &mut a_priv).unwrap();
        keygen(&mut entropy_b, &mut b_pub, &mut b_priv).unwrap();

        let shared_a = scalarmult(&a_priv, &b_pub);
        let shared_b = scalarmult(&b_priv, &a_pub);
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn clamp_sets_and_clears_expected_bits() {
        let mut s = [0xffu8; 32];
        clamp(&mut s);
        assert_eq!(s[0] & 0x07, 0);
        assert_eq!(s[31] & 0x80, 0);
        assert_eq!(s[31] & 0x40, 0x40);
    }
}
