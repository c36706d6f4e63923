// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Flat C ABI surface (spec §6). No panics cross this boundary: every
//! fallible path here returns an integer status instead of propagating a
//! Rust `Error`, per spec §7's "no exceptions, no panics" policy.

use crate::aead;
use crate::hash::hkdf;
use crate::rand::SystemEntropySource;
use crate::x25519;

/// Generates an X25519 keypair into `pub_out`/`priv_out` (32 bytes each).
///
/// Returns `0` on success, `-1` if the system entropy source is
/// unavailable.
///
/// # Safety
///
/// `pub_out` and `priv_out` must each point to at least 32 writable bytes.
#[no_mangle]
pub unsafe extern "C" fn x25519_keygen(pub_out: *mut u8, priv_out: *mut u8) -> i32 {
    if pub_out.is_null() || priv_out.is_null() {
        return -1;
    }
    let mut public = [0u8; 32];
    let mut private = [0u8; 32];
    let mut entropy = SystemEntropySource::new();
    if x25519::keygen(&mut entropy, &mut public, &mut private).is_err() {
        return -1;
    }

    unsafe {
        core::ptr::copy_nonoverlapping(public.as_ptr(), pub_out, 32);
        core::ptr::copy_nonoverlapping(private.as_ptr(), priv_out, 32);
    }
    0
}

/// Computes the X25519 shared secret `scalarmult(priv, peer_pub)` into
/// `out` (32 bytes).
///
/// # Safety
///
/// `out`, `priv_key` and `peer_pub` must each point to at least 32 bytes,
/// with `out` writable.
#[no_mangle]
pub unsafe extern "C" fn x25519_shared_secret(
    out: *mut u8,
    priv_key: *const u8,
    peer_pub: *const u8,
) -> i32 {
    if out.is_null() || priv_key.is_null() || peer_pub.is_null() {
        return -1;
    }
    let priv_key = unsafe { core::slice::from_raw_parts(priv_key, 32) };
    let peer_pub = unsafe { core::slice::from_raw_parts(peer_pub, 32) };
    let priv_key: [u8; 32] = priv_key.try_into().unwrap();
    let peer_pub: [u8; 32] = peer_pub.try_into().unwrap();

    let shared = x25519::scalarmult(&priv_key, &peer_pub);
    unsafe { core::ptr::copy_nonoverlapping(shared.as_ptr(), out, 32) };
    0
}

/// Encrypts `pt_len` bytes from `pt` into `ct`, writing the 16-byte tag to
/// `tag`. `key` is 32 bytes, `nonce` is 12 bytes.
///
/// # Safety
///
/// `ct` and `pt` must each point to `pt_len` bytes (`ct` writable); `tag`
/// must point to 16 writable bytes; `key`/`nonce`/`aad` must point to
/// 32/12/`aad_len` bytes respectively.
#[no_mangle]
pub unsafe extern "C" fn chacha20_poly1305_encrypt(
    ct: *mut u8,
    tag: *mut u8,
    pt: *const u8,
    pt_len: usize,
    key: *const u8,
    nonce: *const u8,
    aad: *const u8,
    aad_len: usize,
) -> i32 {
    if ct.is_null() || tag.is_null() || (pt.is_null() && pt_len > 0) || key.is_null() || nonce.is_null() {
        return -1;
    }
    let key: [u8; 32] = unsafe { core::slice::from_raw_parts(key, 32) }.try_into().unwrap();
    let nonce: [u8; 12] = unsafe { core::slice::from_raw_parts(nonce, 12) }.try_into().unwrap();
    let aad = if aad.is_null() || aad_len == 0 {
        &[][..]
    } else {
        unsafe { core::slice::from_raw_parts(aad, aad_len) }
    };

    if pt_len > 0 {
        unsafe { core::ptr::copy_nonoverlapping(pt, ct, pt_len) };
    }
    let data = unsafe { core::slice::from_raw_parts_mut(ct, pt_len) };
    let computed_tag = aead::seal(&key, &nonce, aad, data);
    unsafe { core::ptr::copy_nonoverlapping(computed_tag.as_ptr(), tag, 16) };
    0
}

/// Verifies `tag` and decrypts `ct_len` bytes from `ct` into `pt`.
///
/// Returns `0` on success, `-1` on authentication failure — per spec §7,
/// `pt`'s contents are then undefined and MUST NOT be trusted by the
/// caller.
///
/// # Safety
///
/// `pt` and `ct` must each point to `ct_len` bytes (`pt` writable); `tag`
/// must point to 16 bytes; `key`/`nonce`/`aad` must point to
/// 32/12/`aad_len` bytes respectively.
#[no_mangle]
pub unsafe extern "C" fn chacha20_poly1305_decrypt(
    pt: *mut u8,
    ct: *const u8,
    ct_len: usize,
    tag: *const u8,
    key: *const u8,
    nonce: *const u8,
    aad: *const u8,
    aad_len: usize,
) -> i32 {
    if pt.is_null() || (ct.is_null() && ct_len > 0) || tag.is_null() || key.is_null() || nonce.is_null() {
        return -1;
    }
    let key: [u8; 32] = unsafe { core::slice::from_raw_parts(key, 32) }.try_into().unwrap();
    let nonce: [u8; 12] = unsafe { core::slice::from_raw_parts(nonce, 12) }.try_into().unwrap();
    let tag: [u8; 16] = unsafe { core::slice::from_raw_parts(tag, 16) }.try_into().unwrap();
    let aad = if aad.is_null() || aad_len == 0 {
        &[][..]
    } else {
        unsafe { core::slice::from_raw_parts(aad, aad_len) }
    };

    if ct_len > 0 {
        unsafe { core::ptr::copy_nonoverlapping(ct, pt, ct_len) };
    }
    let data = unsafe { core::slice::from_raw_parts_mut(pt, ct_len) };
    match aead::open(&key, &nonce, aad, data, &tag) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Derives `out_len` bytes of output key material via HKDF-SHA256.
///
/// Returns `0` on success, `-1` if `out_len` exceeds HKDF-SHA256's maximum
/// (`255 * 32` bytes).
///
/// # Safety
///
/// `out` must point to `out_len` writable bytes; `ikm`/`salt`/`info` must
/// point to `ikm_len`/`salt_len`/`info_len` bytes respectively (or be
/// null with a zero length).
#[no_mangle]
pub unsafe extern "C" fn hkdf_sha256(
    out: *mut u8,
    out_len: usize,
    ikm: *const u8,
    ikm_len: usize,
    salt: *const u8,
    salt_len: usize,
    info: *const u8,
    info_len: usize,
) -> i32 {
    if out.is_null() || (ikm.is_null() && ikm_len > 0) {
        return -1;
    }
    let ikm = if ikm.is_null() || ikm_len == 0 {
        &[][..]
    } else {
        unsafe { core::slice::from_raw_parts(ikm, ikm_len) }
    };
    let salt = if salt.is_null() || salt_len == 0 {
        &[][..]
    } else {
        unsafe { core::slice::from_raw_parts(salt, salt_len) }
    };
    let info = if info.is_null() || info_len == 0 {
        &[][..]
    } else {
        unsafe { core::slice::from_raw_parts(info, info_len) }
    };
    let out_buf = unsafe { core::slice::from_raw_parts_mut(out, out_len) };

    match hkdf(ikm, salt, info, out_buf) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Constant-time comparison of `len` bytes at `a` and `b`.
///
/// Returns `0` if equal, nonzero otherwise. Runtime does not depend on the
/// position of the first differing byte.
///
/// # Safety
///
/// `a` and `b` must each point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn memcmp(a: *const u8, b: *const u8, len: usize) -> i32 {
    if a.is_null() || b.is_null() {
        return if len == 0 { 0 } else { -1 };
    }
    let a = unsafe { core::slice::from_raw_parts(a, len) };
    let b = unsafe { core::slice::from_raw_parts(b, len) };
    if zcore::constant_time_eq(a, b) {
        0
    } else {
        1
    }
}

/// Zeroizes `len` bytes starting at `ptr`.
///
/// # Safety
///
/// `ptr` must point to at least `len` writable bytes, or be null with
/// `len == 0`.
#[no_mangle]
pub unsafe extern "C" fn memzero(ptr: *mut u8, len: usize) {
    if ptr.is_null() || len == 0 {
        return;
    }
    let buf = unsafe { core::slice::from_raw_parts_mut(ptr, len) };
    zcore::FastZeroizable::fast_zeroize(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memcmp_equal_buffers_are_zero() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 2, 3, 4];
        let result = unsafe { memcmp(a.as_ptr(), b.as_ptr(), 4) };
        assert_eq!(result, 0);
    }

    #[test]
    fn memcmp_differing_buffers_are_nonzero() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 2, 3, 5];
        let result = unsafe { memcmp(a.as_ptr(), b.as_ptr(), 4) };
        assert_ne!(result, 0);
    }

    #[test]
    fn memzero_clears_buffer() {
        let mut buf = [7u8; 8];
        unsafe { memzero(buf.as_mut_ptr(), buf.len()) };
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn ffi_roundtrip_encrypt_decrypt() {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 12];
        let pt = b"hello from the ffi boundary";
        let aad = b"aad";
        let mut ct = vec![0u8; pt.len()];
        let mut tag = [0u8; 16];

        let rc = unsafe {
            chacha20_poly1305_encrypt(
                ct.as_mut_ptr(),
                tag.as_mut_ptr(),
                pt.as_ptr(),
                pt.len(),
                key.as_ptr(),
                nonce.as_ptr(),
                aad.as_ptr(),
                aad.len(),
            )
        };
        assert_eq!(rc, 0);

        let mut decrypted = vec![0u8; ct.len()];
        let rc = unsafe {
            chacha20_poly1305_decrypt(
                decrypted.as_mut_ptr(),
                ct.as_ptr(),
                ct.len(),
                tag.as_ptr(),
                key.as_ptr(),
                nonce.as_ptr(),
                aad.as_ptr(),
                aad.len(),
            )
        };
        assert_eq!(rc, 0);
        assert_eq!(decrypted, pt);
    }

    #[test]
    fn ffi_decrypt_rejects_tampered_tag() {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 12];
        let pt = b"payload";
        let mut ct = vec![0u8; pt.len()];
        let mut tag = [0u8; 16];

        unsafe {
            chacha20_poly1305_encrypt(
                ct.as_mut_ptr(),
                tag.as_mut_ptr(),
                pt.as_ptr(),
                pt.len(),
                key.as_ptr(),
                nonce.as_ptr(),
                core::ptr::null(),
                0,
            )
        };
        tag[0] ^= 1;

        let mut decrypted = vec![0u8; ct.len()];
        let rc = unsafe {
            chacha20_poly1305_decrypt(
                decrypted.as_mut_ptr(),
                ct.as_ptr(),
                ct.len(),
                tag.as_ptr(),
                key.as_ptr(),
                nonce.as_ptr(),
                core::ptr::null(),
                0,
            )
        };
        assert_eq!(rc, -1);
    }

    #[test]
    fn ffi_keygen_and_shared_secret_agree() {
        let mut a_pub = [0u8; 32];
        let mut a_priv = [0u8; 32];
        let mut b_pub = [0u8; 32];
        let mut b_priv = [0u8; 32];
        unsafe {
            assert_eq!(x25519_keygen(a_pub.as_mut_ptr(), a_priv.as_mut_ptr()), 0);
            assert_eq!(x25519_keygen(b_pub.as_mut_ptr(), b_priv.as_mut_ptr()), 0);
        }

        let mut shared_a = [0u8; 32];
        let mut shared_b = [0u8; 32];
        unsafe {
            x25519_shared_secret(shared_a.as_mut_ptr(), a_priv.as_ptr(), b_pub.as_ptr());
            x25519_shared_secret(shared_b.as_mut_ptr(), b_priv.as_ptr(), a_pub.as_ptr());
        }
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn ffi_hkdf_matches_library_function() {
        let ikm = [0x0bu8; 22];
        let mut out = [0u8; 32];
        let rc = unsafe {
            hkdf_sha256(
                out.as_mut_ptr(),
                out.len(),
                ikm.as_ptr(),
                ikm.len(),
                core::ptr::null(),
                0,
                core::ptr::null(),
                0,
            )
        };
        assert_eq!(rc, 0);
        assert_ne!(out, [0u8; 32]);
    }
}
