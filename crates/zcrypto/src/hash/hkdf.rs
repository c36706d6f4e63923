// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! HKDF-SHA256 per RFC 5869.

use super::hmac::{hmac_sha256, hmac_sha256_multi};
use super::{HASH_LEN, MAX_OUTPUT_LEN};
use crate::error::Error;

/// Derives `okm.len()` bytes of output key material from `ikm`, `salt` and
/// `info` via HKDF-SHA256 (extract-then-expand, RFC 5869 Sections 2.2-2.3).
///
/// `salt` may be empty (replaced by a zero-filled block, per the RFC).
/// Fails if `okm.len()` exceeds `255 * HASH_LEN`.
pub fn hkdf(ikm: &[u8], salt: &[u8], info: &[u8], okm: &mut [u8]) -> Result<(), Error> {
    if okm.len() > MAX_OUTPUT_LEN {
        return Err(Error::OutputTooLong {
            requested: okm.len(),
            max: MAX_OUTPUT_LEN,
        });
    }

    let zero_salt = [0u8; HASH_LEN];
    let salt = if salt.is_empty() { &zero_salt[..] } else { salt };

    let mut prk = [0u8; HASH_LEN];
    hmac_sha256(salt, ikm, &mut prk);

    expand(&prk, info, okm);

    for byte in prk.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0) };
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);

    Ok(())
}

/// RFC 5869 Section 2.3, the expand step: `T(n) = HMAC(prk, T(n-1) | info | n)`.
///
/// Streams `T(n-1)`, `info` and the block counter through
/// [`hmac_sha256_multi`] instead of concatenating them into one buffer, so
/// neither `info`'s length nor the 255-block maximum can overflow a fixed
/// scratch buffer or the counter itself.
fn expand(prk: &[u8; HASH_LEN], info: &[u8], okm: &mut [u8]) {
    let mut t_prev = [0u8; HASH_LEN];
    let mut t_prev_len = 0usize;
    let mut t_cur = [0u8; HASH_LEN];
    let mut counter: u8 = 1;
    let mut written = 0usize;

    while written < okm.len() {
        let counter_byte = [counter];
        hmac_sha256_multi(prk, &[&t_prev[..t_prev_len], info, &counter_byte], &mut t_cur);

        let take = core::cmp::min(HASH_LEN, okm.len() - written);
        okm[written..written + take].copy_from_slice(&t_cur[..take]);
        written += take;

        t_prev = t_cur;
        t_prev_len = HASH_LEN;

        // RFC 5869 caps the expand step at 255 blocks (`MAX_OUTPUT_LEN`
        // enforces this at the top of `hkdf`); stop advancing the counter
        // once the last block has been produced so it never wraps past
        // `u8::MAX`.
        if written < okm.len() {
            counter += 1;
        }
    }

    for byte in t_prev.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0) };
    }
    for byte in t_cur.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0) };
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}
