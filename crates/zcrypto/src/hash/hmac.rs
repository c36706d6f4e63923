// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! HMAC-SHA256 per RFC 2104.

use super::sha256::Sha256State;
use super::{BLOCK_LEN, HASH_LEN};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Computes `HMAC-SHA256(key, message)` into `out`.
///
/// Keys longer than the block size are hashed down first, per RFC 2104
/// Section 2; the padded key blocks are zeroized before returning.
pub fn hmac_sha256(key: &[u8], message: &[u8], out: &mut [u8; HASH_LEN]) {
    hmac_sha256_multi(key, &[message], out);
}

/// Like [`hmac_sha256`], but absorbs `parts` in sequence as the message,
/// without concatenating them into a single buffer first. Lets callers
/// (e.g. HKDF's `expand`) stream an unbounded message through a
/// fixed-size accumulator.
pub fn hmac_sha256_multi(key: &[u8], parts: &[&[u8]], out: &mut [u8; HASH_LEN]) {
    let mut block_key = [0u8; BLOCK_LEN];
    if key.len() > BLOCK_LEN {
        let mut hashed = [0u8; HASH_LEN];
        super::sha256(key, &mut hashed);
        block_key[..HASH_LEN].copy_from_slice(&hashed);
        unsafe { core::ptr::write_volatile(&mut hashed, [0u8; HASH_LEN]) };
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut ipad_key = [0u8; BLOCK_LEN];
    let mut opad_key = [0u8; BLOCK_LEN];
    for i in 0..BLOCK_LEN {
        ipad_key[i] = block_key[i] ^ IPAD;
        opad_key[i] = block_key[i] ^ OPAD;
    }

    let mut inner = Sha256State::new();
    inner.update(&ipad_key);
    for part in parts {
        inner.update(part);
    }
    let mut inner_hash = [0u8; HASH_LEN];
    inner.finalize(&mut inner_hash);

    let mut outer = Sha256State::new();
    outer.update(&opad_key);
    outer.update(&inner_hash);
    outer.finalize(out);

    for buf in [&mut block_key[..], &mut ipad_key[..], &mut opad_key[..], &mut inner_hash[..]] {
        for byte in buf.iter_mut() {
            unsafe { core::ptr::write_volatile(byte, 0) };
        }
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4231 test case 1.
    #[test]
    fn rfc4231_case_1() {
        let key = [0x0bu8; 20];
        let data = b"Hi There";
        let mut out = [0u8; 32];
        hmac_sha256(&key, data, &mut out);
        let expected: [u8; 32] = [
            0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b,
            0xf1, 0x2b, 0x88, 0x1d, 0xc2, 0x00, 0xc9, 0x83, 0x3d, 0xa7, 0x26, 0xe9, 0x37, 0x6c,
            0x2e, 0x32, 0xcf, 0xf7,
        ];
        assert_eq!(out, expected);
    }

    /// RFC 4231 test case 6: key longer than the block size.
    #[test]
    fn rfc4231_case_6_long_key() {
        let key = [0xaau8; 131];
        let data = b"Test Using Larger Than Block-Size Key - Hash Key First";
        let mut out = [0u8; 32];
        hmac_sha256(&key, data, &mut out);
        let expected: [u8; 32] = [
            0x60, 0xe4, 0x31, 0x59, 0x1e, 0xe0, 0xb6, 0x7f, 0x0d, 0x8a, 0x26, 0xaa, 0xcb, 0xf5,
            0xb7, 0x7f, 0x8e, 0x0b, 0xc6, 0x21, 0x37, 0x28, 0xc5, 0x14, 0x05, 0x46, 0x04, 0x0f,
            0x0e, 0xe3, 0x7f, 0x54,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn multi_part_matches_concatenated_message() {
        let key = [0x0bu8; 20];
        let mut concatenated = [0u8; 32];
        hmac_sha256(&key, b"HiThere", &mut concatenated);

        let mut streamed = [0u8; 32];
        hmac_sha256_multi(&key, &[b"Hi", b"There"], &mut streamed);

        assert_eq!(concatenated, streamed);
    }
}
