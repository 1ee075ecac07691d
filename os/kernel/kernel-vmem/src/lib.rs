//! # Virtual Memory Support
//!
//! Read-only helpers for `AArch64` stage 1 translation tables (4 KiB granule,
//! up to 48-bit input addresses), as used by firmware that needs to report
//! the attributes of the live mapping to a higher-level memory-space manager.
//!
//! ## What you get
//! - [`TranslationLevel`] and [`RootTable`]: per-level address decomposition and
//!   the root level / entry count implied by `TCR_ELx.T0SZ`.
//! - [`TranslationEntry`] with typed [`TableDescriptor`] / [`BlockDescriptor`] views
//!   and the comparable [`DescriptorAttributes`] field.
//! - A [`TableMapper`] abstraction for reaching tables by physical address
//!   ([`IdentityMapper`] on target, [`TableArena`] for synthetic tables).
//! - The walkers: [`first_leaf_attributes`], [`coalesce_table`] and the
//!   single-address lookup behind [`AddressSpace::get_memory_region`].
//!
//! ## `AArch64` Virtual Address → Physical Address Walk
//!
//! With a 4 KiB granule, a 48-bit input address is divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |   L0  |   L1  |   L2  |   L3  | Offset |
//! ```
//!
//! Each level indexes a table of 512 (2⁹) descriptors of 8 bytes each.
//!
//! | Level | Block/page size | Descriptor kinds |
//! |:------|:----------------|:-----------------|
//! | 0 | 512 GiB | invalid, table, (block) |
//! | 1 | 1 GiB | invalid, table, block |
//! | 2 | 2 MiB | invalid, table, block |
//! | 3 | 4 KiB | invalid, page |
//!
//! A larger `T0SZ` shrinks the input range; the walk then starts at a deeper
//! level whose root table may hold fewer than 512 entries:
//!
//! ```text
//! root level  = (T0SZ - 16) / 9
//! root entries = 512 >> ((T0SZ - 16) % 9)
//! ```
//!
//! ## Regions
//!
//! A region is a maximal run of block/page descriptors, contiguous in input
//! address order, that carry an identical [`DescriptorAttributes`] field. Runs
//! cross table boundaries in both directions: a sub-table is visited in place
//! of its parent entry before the parent scan continues.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod address_space;
mod arena;
mod coalesce;
pub mod descriptor;
mod level;
mod region;
mod walk;

pub use crate::address_space::AddressSpace;
pub use crate::arena::{TableArena, TranslationTable};
pub use crate::coalesce::{CoalescingState, OpenRegion, RegionSink, coalesce_table};
pub use crate::descriptor::{
    AccessPermissions, BlockDescriptor, Descriptor, DescriptorAttributes, MemoryType,
    PageDescriptor, Shareability, TableDescriptor, TranslationEntry,
};
pub use crate::level::{RootTable, TranslationError, TranslationLevel};
pub use crate::region::{MemoryRegion, RegionLookupError, lookup_region, lookup_region_in_table};
pub use crate::walk::first_leaf_attributes;

pub use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Smallest `T0SZ` supported with a 4 KiB granule (48-bit input range, root at L0).
pub const MIN_T0SZ: u8 = 16;

/// Largest `T0SZ` for which the root still lies at level 3 or above.
pub const MAX_T0SZ: u8 = 48;

/// Input address bits resolved by one table level.
pub const BITS_PER_LEVEL: u32 = 9;

/// Descriptors in a full (non-root) table.
pub const ENTRIES_PER_TABLE: usize = 1 << BITS_PER_LEVEL;

/// Gives the walkers read access to translation tables by physical address.
///
/// Firmware usually runs identity mapped and can use [`IdentityMapper`];
/// host tests build tables in a [`TableArena`].
pub trait TableMapper {
    /// Borrow the first `entry_count` descriptors of the table located at `table`.
    ///
    /// `entry_count` never exceeds [`ENTRIES_PER_TABLE`]; it is smaller only
    /// for a root table (see [`RootTable::entry_count`]).
    fn entries(&self, table: PhysicalAddress, entry_count: usize) -> &[TranslationEntry];
}

impl<T: TableMapper + ?Sized> TableMapper for &T {
    #[inline]
    fn entries(&self, table: PhysicalAddress, entry_count: usize) -> &[TranslationEntry] {
        (**self).entries(table, entry_count)
    }
}

/// Reads tables at their physical address.
pub struct IdentityMapper {
    _private: (),
}

impl IdentityMapper {
    /// # Safety
    /// Every table reachable from the roots walked through this mapper must be
    /// readable at `VA == PA` for as long as the mapper is used, and must not
    /// be modified concurrently.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl TableMapper for IdentityMapper {
    #[allow(clippy::cast_possible_truncation)]
    fn entries(&self, table: PhysicalAddress, entry_count: usize) -> &[TranslationEntry] {
        debug_assert!(entry_count <= ENTRIES_PER_TABLE);
        let ptr = table.as_u64() as usize as *const TranslationEntry;
        // SAFETY: guaranteed by the contract of `IdentityMapper::new`.
        unsafe { core::slice::from_raw_parts(ptr, entry_count) }
    }
}
