// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Nanosecond token-bucket rate limiter (spec §4.8).
//!
//! The API is split into [`Throttle::consume`] and [`Throttle::wait`]
//! deliberately: `consume` only records demand and computes a wait, so a
//! caller can interleave other work before actually sleeping.

use crate::timing::{now_ns, sleep_ns};
#[cfg(target_arch = "x86_64")]
use crate::timing::{pause, rdtsc};

/// A 1µs busy-wait/sleep threshold: below it, busy-waiting on the cycle
/// counter is cheaper and more precise than handing control to the
/// scheduler.
const BUSY_WAIT_THRESHOLD_NS: u64 = 1_000;

/// Approximates 1ns at 3GHz for platforms with a cycle counter.
const CYCLES_PER_NS: u64 = 3;

/// A token-bucket rate limiter, in bytes per second.
pub struct Throttle {
    rate_bps: u64,
    tokens: u64,
    max_tokens: u64,
    last_refill: u64,
    wait_ns: u64,
}

impl Throttle {
    /// Creates a throttle capped at `rate_bps` bytes/second. `rate_bps ==
    /// 0` makes the throttle a no-op: [`consume`](Self::consume) always
    /// succeeds immediately.
    pub fn new(rate_bps: u64) -> Self {
        Self {
            rate_bps,
            tokens: rate_bps,
            max_tokens: rate_bps,
            last_refill: now_ns(),
            wait_ns: 0,
        }
    }

    fn refill(&mut self) {
        if self.rate_bps == 0 {
            return;
        }

        let now = now_ns();
        let elapsed = now.saturating_sub(self.last_refill);
        // Microsecond-quantised arithmetic keeps the intermediate product
        // bounded for rates up into the multi-GiB/s range.
        let added = (elapsed / 1_000) * self.rate_bps / 1_000_000;
        self.tokens = (self.tokens + added).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Records a demand of `bytes`. Returns `true` if the caller must wait
    /// before the bytes are actually available — the wait duration is
    /// recorded internally and consumed by the next [`wait`](Self::wait)
    /// call. Debits `tokens` only when no wait is needed.
    pub fn consume(&mut self, bytes: u64) -> bool {
        if self.rate_bps == 0 {
            return false;
        }

        self.refill();

        if self.tokens >= bytes {
            self.tokens -= bytes;
            false
        } else {
            self.wait_ns = (bytes - self.tokens) * 1_000_000_000 / self.rate_bps;
            true
        }
    }

    /// Sleeps for the wait computed by the prior [`consume`](Self::consume)
    /// call, then refills and clears it. Sub-µs waits busy-wait on the
    /// cycle counter (or a 1µs floor sleep where unavailable) rather than
    /// risk a scheduler overshoot.
    pub fn wait(&mut self) {
        if self.wait_ns == 0 {
            return;
        }

        if self.wait_ns < BUSY_WAIT_THRESHOLD_NS {
            self.busy_wait(self.wait_ns);
        } else {
            sleep_ns(self.wait_ns);
        }

        self.refill();
        self.wait_ns = 0;
    }

    #[cfg(target_arch = "x86_64")]
    fn busy_wait(&self, ns: u64) {
        let cycles = ns.saturating_mul(CYCLES_PER_NS);
        let start = rdtsc();
        while rdtsc().saturating_sub(start) < cycles {
            pause();
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn busy_wait(&self, _ns: u64) {
        sleep_ns(BUSY_WAIT_THRESHOLD_NS);
    }

    /// Current configured rate, in bytes/second.
    pub fn rate_bps(&self) -> u64 {
        self.rate_bps
    }

    /// Updates the rate and burst cap, truncating current tokens if they
    /// now exceed the new cap.
    pub fn set_rate(&mut self, rate_bps: u64) {
        self.rate_bps = rate_bps;
        self.max_tokens = rate_bps;
        self.tokens = self.tokens.min(self.max_tokens);
    }
}
