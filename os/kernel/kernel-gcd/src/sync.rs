//! Full-table synchronization of the GCD with the live translation tables.

use alloc::vec::Vec;
use kernel_registers::SystemRegisters;
use kernel_vmem::{
    AddressSpace, MemoryRegion, RegionSink, TableMapper, TranslationError, VirtualAddress,
};

use crate::{
    GcdError, MemorySpaceDescriptor, MemorySpaceServices, region_attribute_to_gcd_attribute,
    set_gcd_memory_space_attributes,
};

const PAGE_SIZE: u64 = 4096;

/// Why a synchronization pass failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("failed to get the memory space map: {0}")]
    MemorySpaceMap(#[source] GcdError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("failed to set attributes of [{base}, +{length:#x}): {source}")]
    SetAttributes {
        base: VirtualAddress,
        length: u64,
        #[source]
        source: GcdError,
    },
}

/// Pushes every flushed region into the memory space database.
struct GcdSink<'a, S: ?Sized> {
    services: &'a mut S,
    map: &'a [MemorySpaceDescriptor],
    flushed: usize,
}

impl<S: MemorySpaceServices + ?Sized> RegionSink for GcdSink<'_, S> {
    type Error = SyncError;

    fn flush(&mut self, region: MemoryRegion) -> Result<(), SyncError> {
        let attributes = region_attribute_to_gcd_attribute(region.attributes);
        if !region.length.is_multiple_of(PAGE_SIZE) {
            log::warn!(
                "region [{}, {}) is not a whole number of pages",
                region.base,
                region.end()
            );
        }
        log::debug!("[{}, {}) = {attributes:?}", region.base, region.end());

        set_gcd_memory_space_attributes(
            self.services,
            self.map,
            region.base.as_u64(),
            region.length,
            attributes,
        )
        .map_err(|source| SyncError::SetAttributes {
            base: region.base,
            length: region.length,
            source,
        })?;
        self.flushed += 1;
        Ok(())
    }
}

/// Bring the attributes in the GCD memory space map in line with the
/// translation tables the CPU is currently using.
///
/// Every region of the `TTBR0` address space is translated into GCD
/// attributes and applied to the descriptors it overlaps. Returns the number
/// of regions applied.
///
/// # Panics
/// If the MMU is disabled.
///
/// # Errors
/// - [`SyncError::MemorySpaceMap`] if no snapshot of the map can be taken.
/// - [`SyncError::Translation`] if `TCR_ELx.T0SZ` is unsupported.
/// - [`SyncError::SetAttributes`] for the first region the database rejects;
///   later regions are not applied.
pub fn sync_cache_config<R, M, S>(regs: &R, mapper: &M, gcd: &mut S) -> Result<usize, SyncError>
where
    R: SystemRegisters + ?Sized,
    M: TableMapper,
    S: MemorySpaceServices + ?Sized,
{
    assert!(
        regs.mmu_enabled(),
        "cache configuration sync requires the MMU to be enabled"
    );

    let map: Vec<MemorySpaceDescriptor> =
        gcd.memory_space_map().map_err(SyncError::MemorySpaceMap)?;
    let space = AddressSpace::from_registers(mapper, regs)?;

    let mut sink = GcdSink {
        services: gcd,
        map: &map,
        flushed: 0,
    };
    space.coalesce(&mut sink)?;

    log::info!(
        "synchronized {} regions into {} memory space descriptors",
        sink.flushed,
        map.len()
    );
    Ok(sink.flushed)
}
