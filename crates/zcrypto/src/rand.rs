// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Entropy sources for key generation (spec §4.2, §9 "Open Questions").
//!
//! The reference source generated X25519 keys from a fixed placeholder
//! scalar; this port resolves that open question by requiring every keygen
//! call site to supply a real [`EntropySource`], backed in production by
//! [`SystemEntropySource`]'s OS CSPRNG.

use crate::error::Error;

/// A source of cryptographically secure random bytes.
pub trait EntropySource {
    /// Fills `dest` with random bytes, or fails if the source is
    /// unavailable.
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error>;
}

/// OS-level CSPRNG, backed by `getrandom`.
#[derive(Default)]
pub struct SystemEntropySource {
    _private: (),
}

impl SystemEntropySource {
    /// Creates a new system entropy source.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl EntropySource for SystemEntropySource {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        getrandom::fill(dest).map_err(|_| Error::EntropyUnavailable)
    }
}

/// Test-only entropy sources: deterministic and failure-injecting, for
/// exercising keygen call sites without relying on the real CSPRNG.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Fills buffers with a counting byte sequence seeded from `seed`, so
    /// distinct instances never produce identical output.
    pub struct CountingEntropySource {
        next: u8,
    }

    impl CountingEntropySource {
        /// Creates a source whose first output byte is `seed`.
        pub fn new(seed: u8) -> Self {
            Self { next: seed }
        }
    }

    impl EntropySource for CountingEntropySource {
        fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
            for byte in dest.iter_mut() {
                *byte = self.next;
                self.next = self.next.wrapping_add(1);
            }
            Ok(())
        }
    }

    /// Always fails, for exercising `keygen`'s error path.
    pub struct FailingEntropySource;

    impl EntropySource for FailingEntropySource {
        fn fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), Error> {
            Err(Error::EntropyUnavailable)
        }
    }
}
