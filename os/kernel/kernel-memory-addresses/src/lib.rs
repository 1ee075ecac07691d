//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 64-bit addresses used by the AArch64
//! translation table code.
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] | Input address of a stage 1 translation (what `TTBR0` translates). |
//! | [`PhysicalAddress`] | Output address of a descriptor, or the location of a table. |
//!
//! Both are `#[repr(transparent)]` over `u64`, so they cost nothing at runtime
//! and only exist to keep the two address kinds from being mixed up.
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0000_4020_1234);
//! assert_eq!(va.align_down(0x20_0000).as_u64(), 0x4020_0000);
//!
//! let pa = PhysicalAddress::new(0x8000_1000);
//! assert!(pa.is_aligned(4096));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod virtual_address;

pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Size of the smallest translation granule (4 KiB).
pub const GRANULE_SIZE: u64 = 4096;

/// Mask selecting the in-granule offset bits.
pub const GRANULE_MASK: u64 = GRANULE_SIZE - 1;

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0,      4096), 0);
/// assert_eq!(align_down(4095,   4096), 0);
/// assert_eq!(align_down(8191,   4096), 4096);
/// assert_eq!(align_down(0x12345,   16), 0x12340);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + a - 1` must not overflow.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(1,    4096), 4096);
/// assert_eq!(align_up(4096, 4096), 4096);
/// assert_eq!(align_up(4097, 4096), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    (x + a - 1) & !(a - 1)
}
