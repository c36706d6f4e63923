// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Error types for `znet`.

use thiserror::Error;

/// Errors from the UDP engine, throttler, and TCP pool.
#[derive(Debug, Error)]
pub enum Error {
    /// A syscall failed; `errno` is the raw OS error captured via
    /// `std::io::Error::last_os_error()`.
    #[error("{context}: {source}")]
    Syscall {
        /// What the engine was attempting when the syscall failed.
        context: &'static str,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A connection attempt exceeded its timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The connection pool has no leasable entry and no free slot.
    #[error("connection pool exhausted")]
    PoolExhausted,
}

impl Error {
    /// Wraps the current `errno` with a static description of the failing
    /// step.
    pub(crate) fn syscall(context: &'static str) -> Self {
        Self::Syscall {
            context,
            source: std::io::Error::last_os_error(),
        }
    }
}
