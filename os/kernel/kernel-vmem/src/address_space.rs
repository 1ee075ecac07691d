//! # Address Space (`TTBR0`-rooted)
//!
//! Read-only view of one stage 1 translation regime: a root table, the
//! geometry implied by `T0SZ` and a [`TableMapper`] to reach the tables.
//!
//! ## Highlights
//!
//! - [`AddressSpace::from_registers`] to view the regime described by
//!   `TTBR0_ELx` / `TCR_ELx`.
//! - [`AddressSpace::coalesce`] to enumerate every region of the space.
//! - [`AddressSpace::get_memory_region`] to find the region around one address.
//!
//! ## Safety
//!
//! Walks assume the tables are not modified while they run. Callers that
//! share the address space must hold whatever lock guards its mappings.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_registers::SystemRegisters;

use crate::coalesce::{CoalescingState, RegionSink, coalesce_table};
use crate::region::{MemoryRegion, RegionLookupError, lookup_region};
use crate::{
    DescriptorAttributes, RootTable, TableMapper, TranslationError, first_leaf_attributes,
};

/// Handle to a single translation regime.
pub struct AddressSpace<'m, M: TableMapper> {
    mapper: &'m M,
    root: PhysicalAddress,
    geometry: RootTable,
}

impl<'m, M: TableMapper> AddressSpace<'m, M> {
    /// View the regime described by `TTBR0_ELx` and `TCR_ELx.T0SZ`.
    ///
    /// # Errors
    /// [`TranslationError::UnsupportedT0sz`] if `T0SZ` is outside `16..=48`.
    pub fn from_registers<R: SystemRegisters + ?Sized>(
        mapper: &'m M,
        regs: &R,
    ) -> Result<Self, TranslationError> {
        let root = regs.translation_table_base().table_base();
        let t0sz = regs.translation_control().t0sz();
        let geometry = RootTable::from_t0sz(t0sz)?;
        log::debug!(
            "TTBR0 root {root}: T0SZ={t0sz}, {:?} with {} entries",
            geometry.level(),
            geometry.entry_count()
        );
        Ok(Self::from_root(mapper, root, geometry))
    }

    /// If you already know the root table and its geometry.
    #[inline]
    #[must_use]
    pub const fn from_root(mapper: &'m M, root: PhysicalAddress, geometry: RootTable) -> Self {
        Self {
            mapper,
            root,
            geometry,
        }
    }

    /// Physical address of the root table.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn root_table(&self) -> RootTable {
        self.geometry
    }

    /// Attributes of the leaf mapping input address 0, found by following
    /// entry 0 at every level.
    #[must_use]
    pub fn first_leaf_attributes(&self) -> Option<DescriptorAttributes> {
        first_leaf_attributes(self.mapper, self.root, self.geometry.level())
    }

    /// Hand every region of the address space to `sink`, in address order.
    ///
    /// The pass starts at input address 0 with the attributes of the first
    /// leaf already open; the region still open when the root table ends is
    /// flushed last.
    ///
    /// # Errors
    /// The first error returned by `sink`; later regions are not visited.
    pub fn coalesce<S: RegionSink>(&self, sink: &mut S) -> Result<(), S::Error> {
        let start = VirtualAddress::zero();
        let mut state = CoalescingState::seeded(start, self.first_leaf_attributes());
        let end = coalesce_table(
            self.mapper,
            self.root,
            self.geometry.level(),
            self.geometry.entry_count(),
            start,
            &mut state,
            sink,
        )?;

        if let Some(region) = state.finish(end) {
            sink.flush(region)?;
        }
        Ok(())
    }

    /// The region containing `address`.
    ///
    /// `base` is the start of the whole run of equally attributed leaves, so
    /// the result is the region [`coalesce`](Self::coalesce) reports for
    /// `address`. `attributes` is the raw hardware field.
    ///
    /// # Errors
    /// [`RegionLookupError::NoMapping`] if `address` is outside the range
    /// translated through `TTBR0` or no block or page maps it.
    pub fn get_memory_region(
        &self,
        address: VirtualAddress,
    ) -> Result<MemoryRegion, RegionLookupError> {
        lookup_region(
            self.mapper,
            self.root,
            self.geometry.level(),
            self.geometry.entry_count(),
            address,
        )
    }

    /// In/out form of [`get_memory_region`](Self::get_memory_region).
    ///
    /// `base` holds the address to look up and receives the region base;
    /// `length` and `attributes` receive the region length and raw attribute
    /// field. Outputs are written only on success.
    ///
    /// # Errors
    /// - [`RegionLookupError::InvalidParameter`] if any argument is `None`.
    /// - [`RegionLookupError::NoMapping`] as for `get_memory_region`.
    pub fn get_memory_region_into(
        &self,
        base: Option<&mut u64>,
        length: Option<&mut u64>,
        attributes: Option<&mut u64>,
    ) -> Result<(), RegionLookupError> {
        let (Some(base), Some(length), Some(attributes)) = (base, length, attributes) else {
            return Err(RegionLookupError::InvalidParameter);
        };

        let region = self.get_memory_region(VirtualAddress::new(*base))?;
        *base = region.base.as_u64();
        *length = region.length;
        *attributes = region.attributes.into_bits();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryType, TableArena, TranslationEntry, TranslationLevel};
    use alloc::vec::Vec;
    use core::convert::Infallible;
    use kernel_registers::{ExceptionLevel, RegisterSnapshot, Sctlr, Tcr, Ttbr0};

    const GIB: u64 = 1 << 30;

    fn attrs(memory_type: MemoryType) -> DescriptorAttributes {
        DescriptorAttributes::new().with_memory_type(memory_type).with_af(true)
    }

    fn registers(root: PhysicalAddress, t0sz: u8) -> RegisterSnapshot {
        RegisterSnapshot {
            current_el: ExceptionLevel::El1,
            ttbr0: Ttbr0::from_table_base(root),
            tcr: Tcr::new().with_t0sz(t0sz),
            sctlr: Sctlr::new().with_m(true),
        }
    }

    #[test]
    fn geometry_comes_from_tcr() {
        let mut arena = TableArena::default();
        let root = arena.allocate();
        let space = AddressSpace::from_registers(&arena, &registers(root, 28)).unwrap();
        assert_eq!(space.root(), root);
        assert_eq!(space.root_table().level(), TranslationLevel::L1);
        assert_eq!(space.root_table().entry_count(), 64);

        assert_eq!(
            AddressSpace::from_registers(&arena, &registers(root, 12)).err(),
            Some(TranslationError::UnsupportedT0sz(12))
        );
    }

    #[test]
    fn coalesce_flushes_trailing_region() {
        let mut arena = TableArena::default();
        let root = arena.allocate();
        // T0SZ=32: L1 root with 4 entries, all mapped.
        arena.fill(root, 0, 4, |i| {
            TranslationEntry::block(
                PhysicalAddress::new(i as u64 * GIB),
                attrs(MemoryType::WriteBack),
            )
        });
        let space = AddressSpace::from_registers(&arena, &registers(root, 32)).unwrap();

        let mut regions = Vec::new();
        space
            .coalesce(&mut |region: MemoryRegion| {
                regions.push(region);
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(
            regions,
            [MemoryRegion {
                base: VirtualAddress::zero(),
                length: 4 * GIB,
                attributes: attrs(MemoryType::WriteBack),
            }]
        );
    }

    #[test]
    fn addresses_beyond_the_input_range_are_unmapped() {
        let mut arena = TableArena::default();
        let root = arena.allocate();
        arena.fill(root, 0, 4, |i| {
            TranslationEntry::block(
                PhysicalAddress::new(i as u64 * GIB),
                attrs(MemoryType::WriteBack),
            )
        });
        let space = AddressSpace::from_registers(&arena, &registers(root, 32)).unwrap();

        assert!(space.get_memory_region(VirtualAddress::new(4 * GIB - 1)).is_ok());
        assert_eq!(
            space.get_memory_region(VirtualAddress::new(4 * GIB)),
            Err(RegionLookupError::NoMapping)
        );
    }

    #[test]
    fn into_form_writes_outputs_only_on_success() {
        let mut arena = TableArena::default();
        let root = arena.allocate();
        arena.set(
            root,
            1,
            TranslationEntry::block(PhysicalAddress::new(GIB), attrs(MemoryType::Device)),
        );
        let space = AddressSpace::from_registers(&arena, &registers(root, 25)).unwrap();

        let (mut base, mut length, mut attributes) = (GIB + 0x1234, 0, 0);
        space
            .get_memory_region_into(Some(&mut base), Some(&mut length), Some(&mut attributes))
            .unwrap();
        assert_eq!((base, length), (GIB, GIB));
        assert_eq!(attributes, attrs(MemoryType::Device).into_bits());

        let (mut base, mut length, mut attributes) = (0x1234, 7, 9);
        assert_eq!(
            space.get_memory_region_into(Some(&mut base), Some(&mut length), Some(&mut attributes)),
            Err(RegionLookupError::NoMapping)
        );
        assert_eq!((base, length, attributes), (0x1234, 7, 9));
    }
}
