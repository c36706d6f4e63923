//! Zeroization primitives shared by `zcrypto` and `znet`.
//!
//! Every struct in this workspace that carries key material, MAC state, or
//! scratch buffers implements [`FastZeroizable`] by hand and wipes itself
//! before returning from any routine that touches secrets (spec §9,
//! "Zeroization on scope exit").

use core::cell::Cell;

/// Types that can wipe their own sensitive contents in place.
///
/// Implementations must leave every byte of the zeroized representation
/// equal to zero and must not be optimized away by the compiler — callers
/// rely on this running even when the zeroized value is never read again.
pub trait FastZeroizable {
    /// Overwrites `self` with its zero representation.
    fn fast_zeroize(&mut self);
}

macro_rules! impl_fast_zeroizable_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl FastZeroizable for $t {
                #[inline(always)]
                fn fast_zeroize(&mut self) {
                    unsafe { core::ptr::write_volatile(self, 0) };
                    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
                }
            }
        )*
    };
}

impl_fast_zeroizable_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, usize);

impl<T: FastZeroizable, const N: usize> FastZeroizable for [T; N] {
    #[inline(always)]
    fn fast_zeroize(&mut self) {
        for item in self.iter_mut() {
            item.fast_zeroize();
        }
    }
}

impl FastZeroizable for [u8] {
    #[inline(always)]
    fn fast_zeroize(&mut self) {
        for byte in self.iter_mut() {
            unsafe { core::ptr::write_volatile(byte, 0) };
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(feature = "std")]
impl FastZeroizable for std::vec::Vec<u8> {
    #[inline(always)]
    fn fast_zeroize(&mut self) {
        self.as_mut_slice().fast_zeroize();
    }
}

/// Marker that asserts, in debug builds, that `fast_zeroize` ran before
/// drop. A no-op in release builds — it exists to catch missed
/// zeroization paths in tests.
#[derive(Clone)]
pub struct ZeroizeOnDropSentinel {
    #[cfg(debug_assertions)]
    zeroized: Cell<bool>,
}

impl Default for ZeroizeOnDropSentinel {
    fn default() -> Self {
        Self {
            #[cfg(debug_assertions)]
            zeroized: Cell::new(false),
        }
    }
}

impl ZeroizeOnDropSentinel {
    /// Resets the sentinel to "not zeroized", for test harnesses that reuse
    /// a single sentinel across multiple assertions.
    pub fn reset(&mut self) {
        #[cfg(debug_assertions)]
        self.zeroized.set(false);
    }

    /// Returns whether `fast_zeroize` has been observed.
    pub fn is_zeroized(&self) -> bool {
        #[cfg(debug_assertions)]
        {
            self.zeroized.get()
        }
        #[cfg(not(debug_assertions))]
        {
            true
        }
    }
}

impl FastZeroizable for ZeroizeOnDropSentinel {
    fn fast_zeroize(&mut self) {
        #[cfg(debug_assertions)]
        self.zeroized.set(true);
    }
}

/// RAII guard that swaps a caller's value out of place (zeroizing the
/// source) and zeroizes its own copy on drop.
///
/// Used by `zcrypto::rand` key-generation helpers to ensure intermediate
/// entropy buffers never outlive the scope that produced them.
pub struct ZeroizingGuard<T: FastZeroizable + Default> {
    inner: T,
}

impl<T: FastZeroizable + Default> ZeroizingGuard<T> {
    /// Moves `value` out of the source location (leaving it zeroized) and
    /// into a guard that will zeroize its own copy on drop.
    pub fn from_mut(value: &mut T) -> Self {
        let inner = core::mem::take(value);
        value.fast_zeroize();
        Self { inner }
    }
}

impl<T: FastZeroizable + Default> core::ops::Deref for ZeroizingGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: FastZeroizable + Default> core::ops::DerefMut for ZeroizingGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: FastZeroizable + Default> Drop for ZeroizingGuard<T> {
    fn drop(&mut self) {
        self.inner.fast_zeroize();
    }
}
