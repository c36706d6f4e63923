// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Monotonic clock access and cycle-counter accelerants (spec §4.10).
//!
//! `now_ns`/`sleep_ns` are the only contract; the `x86_64` cycle counter
//! and pause hint are advisory, used by [`crate::throttle`] for sub-µs
//! waits where a real sleep would overshoot.

use std::time::Duration;

/// Returns a monotonic nanosecond timestamp. Not comparable across
/// processes or reboots, only within this process's lifetime.
pub fn now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // Safety: `ts` is a valid, correctly-sized out-pointer.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    debug_assert_eq!(rc, 0, "CLOCK_MONOTONIC is always available");
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Blocks the calling thread for at least `ns` nanoseconds.
pub fn sleep_ns(ns: u64) {
    std::thread::sleep(Duration::from_nanos(ns));
}

/// Reads the CPU's timestamp counter, where available.
///
/// Advisory only: not synchronized across cores and not available on all
/// microarchitectures. [`crate::throttle::Throttle::wait`] falls back to
/// [`sleep_ns`] when this isn't compiled in.
#[cfg(target_arch = "x86_64")]
pub fn rdtsc() -> u64 {
    // Safety: RDTSC is unprivileged and always available on x86_64.
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// CPU pause hint for busy-wait loops: reduces power draw and avoids
/// memory-order violation penalties on hyperthreaded siblings.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn pause() {
    // Safety: PAUSE is unprivileged and always available on x86_64.
    unsafe { core::arch::x86_64::_mm_pause() }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
pub fn pause() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ns_is_monotonic_nondecreasing() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn sleep_ns_blocks_for_roughly_the_requested_duration() {
        let start = now_ns();
        sleep_ns(1_000_000);
        let elapsed = now_ns() - start;
        assert!(elapsed >= 1_000_000);
    }
}
