//! # Region Coalescing
//!
//! [`coalesce_table`] visits every entry of a table in address order and
//! merges neighbouring leaves with identical attributes. The open region lives
//! in a [`CoalescingState`] that is threaded through the recursion, so a run
//! can enter a sub-table, leave it again and continue at the parent level.
//! Finished regions are handed to a [`RegionSink`].

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

use crate::{
    Descriptor, DescriptorAttributes, ENTRIES_PER_TABLE, MemoryRegion, TableMapper,
    TranslationLevel,
};

/// Start and attributes of the region currently being grown.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OpenRegion {
    pub start: VirtualAddress,
    pub attributes: DescriptorAttributes,
}

/// Accumulator of a coalescing pass.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CoalescingState {
    open: Option<OpenRegion>,
}

impl CoalescingState {
    /// No region open.
    #[must_use]
    pub const fn new() -> Self {
        Self { open: None }
    }

    /// Open a region at `start` if `attributes` is known.
    ///
    /// Used to seed a pass with the attributes of the first mapped leaf.
    #[must_use]
    pub const fn seeded(start: VirtualAddress, attributes: Option<DescriptorAttributes>) -> Self {
        match attributes {
            Some(attributes) => Self {
                open: Some(OpenRegion { start, attributes }),
            },
            None => Self::new(),
        }
    }

    #[must_use]
    pub const fn open_region(&self) -> Option<OpenRegion> {
        self.open
    }

    /// Close the pass at `end`, returning the trailing region if it is not empty.
    #[must_use]
    pub fn finish(self, end: VirtualAddress) -> Option<MemoryRegion> {
        self.open.and_then(|open| region_between(open, end))
    }

    /// Close the open region at `at` and replace it with `next`.
    fn transition<S: RegionSink>(
        &mut self,
        at: VirtualAddress,
        next: Option<OpenRegion>,
        sink: &mut S,
    ) -> Result<(), S::Error> {
        if let Some(region) = self.open.and_then(|open| region_between(open, at)) {
            sink.flush(region)?;
        }
        self.open = next;
        Ok(())
    }
}

fn region_between(open: OpenRegion, end: VirtualAddress) -> Option<MemoryRegion> {
    (end.as_u64() > open.start.as_u64()).then(|| MemoryRegion {
        base: open.start,
        length: end.as_u64() - open.start.as_u64(),
        attributes: open.attributes,
    })
}

/// Receives each finished region of a coalescing pass.
pub trait RegionSink {
    type Error;

    /// Consume one region.
    ///
    /// # Errors
    /// Implementation defined; the pass stops at the first error.
    fn flush(&mut self, region: MemoryRegion) -> Result<(), Self::Error>;
}

impl<E, F> RegionSink for F
where
    F: FnMut(MemoryRegion) -> Result<(), E>,
{
    type Error = E;

    fn flush(&mut self, region: MemoryRegion) -> Result<(), E> {
        self(region)
    }
}

/// Coalesce the `entry_count` entries of `table` (a table of `level`) mapping
/// input addresses from `base` upwards.
///
/// A leaf whose attributes differ from the open region flushes that region
/// and opens a new one; an invalid entry flushes and leaves no region open; a
/// table descriptor is descended into with the same `state`. Regions still
/// open when the table ends stay in `state`.
///
/// Returns the first input address past the table.
///
/// # Errors
/// The first error returned by `sink`.
pub fn coalesce_table<M: TableMapper, S: RegionSink>(
    mapper: &M,
    table: PhysicalAddress,
    level: TranslationLevel,
    entry_count: usize,
    base: VirtualAddress,
    state: &mut CoalescingState,
    sink: &mut S,
) -> Result<VirtualAddress, S::Error> {
    let granularity = level.address_granularity();
    let mut address = base;

    for entry in mapper.entries(table, entry_count) {
        match entry.classify(level) {
            Descriptor::Block(leaf) | Descriptor::Page(leaf) => {
                let attributes = leaf.attributes();
                if state.open.map(|open| open.attributes) != Some(attributes) {
                    log::trace!("coalesce: {address} starts {attributes:?}");
                    state.transition(
                        address,
                        Some(OpenRegion {
                            start: address,
                            attributes,
                        }),
                        sink,
                    )?;
                }
            }
            Descriptor::Table(next) => {
                coalesce_table(
                    mapper,
                    next.next_table(),
                    level.child(),
                    ENTRIES_PER_TABLE,
                    address,
                    state,
                    sink,
                )?;
            }
            Descriptor::Invalid => {
                state.transition(address, None, sink)?;
            }
        }
        address += granularity;
    }

    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryType, TableArena, TranslationEntry};
    use alloc::vec::Vec;
    use core::convert::Infallible;

    const MIB2: u64 = 2 << 20;
    const PAGE: u64 = 4096;

    fn attrs(memory_type: MemoryType) -> DescriptorAttributes {
        DescriptorAttributes::new().with_memory_type(memory_type).with_af(true)
    }

    fn collect(
        arena: &TableArena,
        table: PhysicalAddress,
        level: TranslationLevel,
        entry_count: usize,
        mut state: CoalescingState,
    ) -> (Vec<MemoryRegion>, VirtualAddress, CoalescingState) {
        let mut regions = Vec::new();
        let end = coalesce_table(
            arena,
            table,
            level,
            entry_count,
            VirtualAddress::zero(),
            &mut state,
            &mut |region: MemoryRegion| {
                regions.push(region);
                Ok::<_, Infallible>(())
            },
        )
        .unwrap();
        (regions, end, state)
    }

    #[test]
    fn flushes_on_change_and_on_invalid() {
        let mut arena = TableArena::default();
        let l2 = arena.allocate();
        arena.fill(l2, 0, 3, |i| {
            TranslationEntry::block(
                PhysicalAddress::new(i as u64 * MIB2),
                attrs(MemoryType::WriteBack),
            )
        });
        arena.fill(l2, 3, 2, |i| {
            TranslationEntry::block(
                PhysicalAddress::new((3 + i as u64) * MIB2),
                attrs(MemoryType::Device),
            )
        });

        let (regions, end, state) =
            collect(&arena, l2, TranslationLevel::L2, 8, CoalescingState::new());
        assert_eq!(end.as_u64(), 8 * MIB2);
        assert_eq!(state.open_region(), None);
        assert_eq!(
            regions,
            [
                MemoryRegion {
                    base: VirtualAddress::zero(),
                    length: 3 * MIB2,
                    attributes: attrs(MemoryType::WriteBack),
                },
                MemoryRegion {
                    base: VirtualAddress::new(3 * MIB2),
                    length: 2 * MIB2,
                    attributes: attrs(MemoryType::Device),
                },
            ]
        );
    }

    #[test]
    fn trailing_region_stays_open() {
        let mut arena = TableArena::default();
        let l3 = arena.allocate();
        arena.fill(l3, 0, 512, |i| {
            TranslationEntry::page(
                PhysicalAddress::new(i as u64 * PAGE),
                attrs(MemoryType::WriteThrough),
            )
        });

        let seeded =
            CoalescingState::seeded(VirtualAddress::zero(), Some(attrs(MemoryType::WriteThrough)));
        let (regions, end, state) = collect(&arena, l3, TranslationLevel::L3, 512, seeded);
        assert!(regions.is_empty());
        assert_eq!(end.as_u64(), 512 * PAGE);
        assert_eq!(
            state.finish(end),
            Some(MemoryRegion {
                base: VirtualAddress::zero(),
                length: 512 * PAGE,
                attributes: attrs(MemoryType::WriteThrough),
            })
        );
    }

    #[test]
    fn run_continues_through_sub_table() {
        let mut arena = TableArena::default();
        let l2 = arena.allocate();
        let l3 = arena.allocate();
        arena.set(l2, 0, TranslationEntry::table(l3));
        arena.fill(l3, 0, 512, |i| {
            TranslationEntry::page(
                PhysicalAddress::new(i as u64 * PAGE),
                attrs(MemoryType::WriteBack),
            )
        });
        arena.set(
            l2,
            1,
            TranslationEntry::block(PhysicalAddress::new(MIB2), attrs(MemoryType::WriteBack)),
        );

        let (regions, end, state) =
            collect(&arena, l2, TranslationLevel::L2, 2, CoalescingState::new());
        assert!(regions.is_empty());
        assert_eq!(
            state.open_region(),
            Some(OpenRegion {
                start: VirtualAddress::zero(),
                attributes: attrs(MemoryType::WriteBack),
            })
        );
        assert_eq!(state.finish(end).map(|r| r.length), Some(2 * MIB2));
    }

    #[test]
    fn empty_state_finishes_without_region() {
        assert_eq!(CoalescingState::new().finish(VirtualAddress::new(MIB2)), None);
        let seeded =
            CoalescingState::seeded(VirtualAddress::new(MIB2), Some(attrs(MemoryType::Device)));
        assert_eq!(seeded.finish(VirtualAddress::new(MIB2)), None);
        assert_eq!(
            CoalescingState::seeded(VirtualAddress::zero(), None),
            CoalescingState::new()
        );
    }

    #[test]
    fn sink_error_stops_the_pass() {
        let mut arena = TableArena::default();
        let l2 = arena.allocate();
        arena.set(
            l2,
            0,
            TranslationEntry::block(PhysicalAddress::zero(), attrs(MemoryType::Device)),
        );
        arena.set(
            l2,
            1,
            TranslationEntry::block(PhysicalAddress::new(MIB2), attrs(MemoryType::WriteBack)),
        );
        arena.set(
            l2,
            2,
            TranslationEntry::block(PhysicalAddress::new(2 * MIB2), attrs(MemoryType::Device)),
        );

        let mut calls = 0;
        let mut state = CoalescingState::new();
        let result = coalesce_table(
            &arena,
            l2,
            TranslationLevel::L2,
            3,
            VirtualAddress::zero(),
            &mut state,
            &mut |_: MemoryRegion| -> Result<(), &'static str> {
                calls += 1;
                Err("database rejected the update")
            },
        );
        assert_eq!(result, Err("database rejected the update"));
        assert_eq!(calls, 1);
    }
}
