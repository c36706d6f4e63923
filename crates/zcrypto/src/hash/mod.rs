// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! SHA-256, HMAC-SHA256 and HKDF-SHA256, per RFC 6234, RFC 2104 and
//! RFC 5869 (spec §4.3).

mod hkdf;
mod hmac;
mod sha256;

pub use hkdf::hkdf;
pub use hmac::hmac_sha256;
pub use sha256::{sha256, Sha256State};

/// SHA-256 output size in bytes.
pub const HASH_LEN: usize = 32;

/// SHA-256 block size in bytes.
pub const BLOCK_LEN: usize = 64;

/// Maximum HKDF-SHA256 output length: `255 * HASH_LEN`.
pub const MAX_OUTPUT_LEN: usize = 255 * HASH_LEN;
