// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! ChaCha20-Poly1305 AEAD per RFC 8439 Section 2.8 (spec §4.4-§4.6).

mod chacha20;
mod poly1305;

use chacha20::ChaCha20;
use poly1305::Poly1305;
use zcore::{constant_time_eq, FastZeroizable};

use crate::error::Error;

/// Key size in bytes.
pub const KEY_LEN: usize = 32;
/// Nonce size in bytes.
pub const NONCE_LEN: usize = 12;
/// Authentication tag size in bytes.
pub const TAG_LEN: usize = 16;

/// Derives the one-time Poly1305 key from `key`/`nonce` at block counter 0,
/// per RFC 8439 Section 2.6.
fn poly1305_key(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> [u8; KEY_LEN] {
    let mut block = [0u8; KEY_LEN];
    let mut cipher = ChaCha20::default();
    cipher.crypt(key, nonce, 0, &mut block);
    block
}

/// Builds the Poly1305 input per RFC 8439 Section 2.8: `aad || pad16(aad)
/// || ciphertext || pad16(ciphertext) || len(aad) || len(ciphertext)`, both
/// lengths as 8-byte little-endian integers.
fn compute_tag(mac_key: &[u8; KEY_LEN], aad: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = Poly1305::default();
    mac.init(mac_key);
    mac.update_padded(aad);
    mac.update_padded(ciphertext);

    let mut lengths = [0u8; 16];
    lengths[0..8].copy_from_slice(&(aad.len() as u64).to_le_bytes());
    lengths[8..16].copy_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    mac.update(&lengths);

    let mut tag = [0u8; TAG_LEN];
    mac.finalize(&mut tag);
    tag
}

/// Encrypts `data` in place and returns the authentication tag (spec §4.4).
///
/// `data` is the plaintext on entry and the ciphertext on return. `aad` is
/// authenticated but not encrypted.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], aad: &[u8], data: &mut [u8]) -> [u8; TAG_LEN] {
    let mut mac_key = poly1305_key(key, nonce);
    let mut cipher = ChaCha20::default();
    cipher.crypt(key, nonce, 1, data);
    let tag = compute_tag(&mac_key, aad, data);
    mac_key.fast_zeroize();
    tag
}

/// Verifies `tag` and decrypts `data` in place if it matches (spec §4.4).
///
/// On tag mismatch, `data` is left untouched and [`Error::AuthenticationFailed`]
/// is returned — callers must not act on unauthenticated plaintext.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<(), Error> {
    let mut mac_key = poly1305_key(key, nonce);
    let expected = compute_tag(&mac_key, aad, data);
    mac_key.fast_zeroize();

    if !constant_time_eq(&expected, tag) {
        return Err(Error::AuthenticationFailed);
    }

    let mut cipher = ChaCha20::default();
    cipher.crypt(key, nonce, 1, data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 8439 Section 2.8.2 test vector.
    #[test]
    fn rfc8439_section_2_8_2_vector() {
        let key: [u8; 32] = [
            0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x8d,
            0x8e, 0x8f, 0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0x9b,
            0x9c, 0x9d, 0x9e, 0x9f,
        ];
        let nonce: [u8; 12] = [0x07, 0x00, 0x00, 0x00, 0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47];
        let aad: [u8; 12] = [0x50, 0x51, 0x52, 0x53, 0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7];
        let plaintext = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

        let mut data = plaintext.to_vec();
        let tag = seal(&key, &nonce, &aad, &mut data);

        let expected_ct: [u8; 114] = [
            0xd3, 0x1a, 0x8d, 0x34, 0x64, 0x8e, 0x60, 0xdb, 0x7b, 0x86, 0xaf, 0xbc, 0x53, 0xef,
            0x7e, 0xc2, 0xa4, 0xad, 0xed, 0x51, 0x29, 0x6e, 0x08, 0xfe, 0xa9, 0xe2, 0xb5, 0xa7,
            0x36, 0xee, 0x62, 0xd6, 0x3d, 0xbe, 0xa4, 0x5e, 0x8c, 0xa9, 0x67, 0x12, 0x82, 0xfa,
            0xfb, 0x69, 0xda, 0x92, 0x72, 0x8b, 0x1a, 0x71, 0xde, 0x0a, 0x9e, 0x06, 0x0b, 0x29,
            0x05, 0xd6, 0xa5, 0xb6, 0x7e, 0xcd, 0x3b, 0x36, 0x92, 0xdd, 0xbd, 0x7f, 0x2d, 0x77,
            0x8b, 0x8c, 0x98, 0x03, 0xae, 0xe3, 0x28, 0x09, 0x1b, 0x58, 0xfa, 0xb3, 0x24, 0xe4,
            0xfa, 0xd6, 0x75, 0x94, 0x55, 0x85, 0x80, 0x8b, 0x48, 0x31, 0xd7, 0xbc, 0x3f, 0xf4,
            0xde, 0xf0, 0x8e, 0x4b, 0x7a, 0x9d, 0xe5, 0x76, 0xd2, 0x65, 0x86, 0xce, 0xc6, 0x4b,
            0x61, 0x16,
        ];
        let expected_tag: [u8; 16] = [
            0x1a, 0xe1, 0x0b, 0x59, 0x4f, 0x09, 0xe2, 0x6a, 0x7e, 0x90, 0x2e, 0xcb, 0xd0, 0x60,
            0x06, 0x91,
        ];

        assert_eq!(data.as_slice(), &expected_ct[..]);
        assert_eq!(tag, expected_tag);

        open(&key, &nonce, &aad, &mut data, &tag).unwrap();
        assert_eq!(data.as_slice(), &plaintext[..]);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 12];
        let aad = b"header";
        let mut data = b"secret payload".to_vec();

        let tag = seal(&key, &nonce, aad, &mut data);
        data[0] ^= 1;

        let err = open(&key, &nonce, aad, &mut data, &tag).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailed);
    }

    #[test]
    fn tampered_aad_fails_to_open() {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 12];
        let mut data = b"secret payload".to_vec();

        let tag = seal(&key, &nonce, b"header-a", &mut data);
        let err = open(&key, &nonce, b"header-b", &mut data, &tag).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailed);
    }

    #[test]
    fn failed_open_leaves_data_untouched() {
        let key = [0x33u8; 32];
        let nonce = [0x44u8; 12];
        let mut data = b"do not leak me".to_vec();

        let mut tag = seal(&key, &nonce, b"aad", &mut data);
        let ciphertext = data.clone();
        tag[0] ^= 1;

        let err = open(&key, &nonce, b"aad", &mut data, &tag).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailed);
        assert_eq!(data, ciphertext);
    }
}
