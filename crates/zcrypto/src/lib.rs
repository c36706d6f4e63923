// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! ChaCha20-Poly1305 AEAD, X25519 and HKDF-SHA256, built from scratch with
//! constant-time and zeroization discipline throughout.
//!
//! `zcrypto` carries no logging dependency: nothing in this crate's call
//! graph is more than a few stack frames from key material, so nothing
//! here is instrumented. `znet` carries `tracing` for exactly that reason.
//!
//! ## Modules
//!
//! - [`x25519`]: Elliptic-curve Diffie-Hellman key agreement (RFC 7748).
//! - [`aead`]: ChaCha20-Poly1305 authenticated encryption (RFC 8439).
//! - [`hash`]: SHA-256, HMAC-SHA256 and HKDF-SHA256 (RFC 6234, 2104, 5869).
//! - [`rand`]: entropy sources for key generation.
//! - [`ffi`]: the C ABI surface described in the system design (flat
//!   handles, integer error codes, no panics across the boundary).

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

mod field;

pub mod aead;
pub mod error;
pub mod ffi;
pub mod hash;
pub mod rand;
pub mod x25519;

pub use error::Error;
