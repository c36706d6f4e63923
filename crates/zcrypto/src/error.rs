// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Error types returned by `zcrypto` operations (spec §7).
//!
//! None of these carry secret material — the FFI boundary flattens them to
//! integer codes (spec §6), so variants stay coarse-grained on purpose.

use thiserror::Error;

/// Errors produced by `zcrypto`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The system entropy source failed or is unavailable.
    #[error("entropy source unavailable")]
    EntropyUnavailable,

    /// AEAD authentication failed: the tag did not match.
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// An HKDF `expand` was asked for more output than RFC 5869 permits
    /// (`255 * hash_len` bytes).
    #[error("requested output length {requested} exceeds HKDF's maximum {max}")]
    OutputTooLong {
        /// The length the caller requested.
        requested: usize,
        /// The maximum HKDF-SHA256 can produce.
        max: usize,
    },
}
