// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Zeroization and constant-time primitives shared by `zcrypto` and `znet`.
//!
//! Split out of both crates because the discipline they encode — wipe
//! secrets before returning, never branch on secret bytes — applies
//! equally to the cryptographic core and to the throttler/pool state that
//! `znet` keeps (rate counters and file descriptors aren't secret, but the
//! same `FastZeroizable` scaffolding is reused for scratch buffers there).

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "std")]
extern crate std;

mod ct;
mod zero;

pub use ct::{constant_time_eq, cswap_bytes, cswap_i64, select_u8};
pub use zero::{FastZeroizable, ZeroizeOnDropSentinel, ZeroizingGuard};
