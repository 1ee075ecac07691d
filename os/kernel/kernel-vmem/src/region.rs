//! # Regions and Single-Address Lookup
//!
//! The lookup descends along the index path of one address to the leaf that
//! maps it (the *anchor*), then grows the run of equally attributed leaves in
//! both directions. Each table only scans its own entries; when a scan falls
//! off the edge of a table, the parent continues with its neighbouring
//! entries. Only the root may run out of entries without finding a boundary,
//! in which case the region ends at the edge of the translated range.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

use crate::{
    Descriptor, DescriptorAttributes, ENTRIES_PER_TABLE, TableMapper, TranslationEntry,
    TranslationLevel,
};

/// A maximal run of leaves with identical attributes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryRegion {
    pub base: VirtualAddress,
    pub length: u64,
    /// Raw hardware attribute field shared by every leaf of the region.
    pub attributes: DescriptorAttributes,
}

impl MemoryRegion {
    /// First address past the region.
    #[inline]
    #[must_use]
    pub fn end(&self) -> VirtualAddress {
        self.base + self.length
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u64() >= self.base.as_u64() && va.as_u64() - self.base.as_u64() < self.length
    }
}

/// Why a single-address lookup produced no region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionLookupError {
    /// An output location was missing.
    #[error("missing output parameter")]
    InvalidParameter,
    /// The address is not mapped by any block or page.
    #[error("address is not mapped")]
    NoMapping,
    /// The run reaches the edge of the table the lookup was confined to.
    #[error("region extends past the table")]
    NotFound,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

/// How a directional scan ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Reach {
    /// An invalid entry or a leaf with other attributes ends the run.
    Boundary,
    /// The scan consumed every entry of the table; the parent continues.
    TableEnd,
}

/// Region accumulated around the anchor.
struct RunScan<'a, M> {
    mapper: &'a M,
    attributes: DescriptorAttributes,
    base: u64,
    length: u64,
}

impl<M: TableMapper> RunScan<'_, M> {
    fn scan<'e>(
        &mut self,
        entries: impl Iterator<Item = &'e TranslationEntry>,
        level: TranslationLevel,
        direction: Direction,
    ) -> Reach {
        let granularity = level.address_granularity();
        for entry in entries {
            match entry.classify(level) {
                Descriptor::Block(leaf) | Descriptor::Page(leaf)
                    if leaf.attributes() == self.attributes =>
                {
                    self.grow(granularity, direction);
                }
                Descriptor::Table(next) => {
                    if self.scan_table(next.next_table(), level.child(), direction)
                        == Reach::Boundary
                    {
                        return Reach::Boundary;
                    }
                }
                _ => return Reach::Boundary,
            }
        }
        Reach::TableEnd
    }

    fn scan_table(
        &mut self,
        table: PhysicalAddress,
        level: TranslationLevel,
        direction: Direction,
    ) -> Reach {
        let mapper = self.mapper;
        let entries = mapper.entries(table, ENTRIES_PER_TABLE);
        match direction {
            Direction::Forward => self.scan(entries.iter(), level, direction),
            Direction::Backward => self.scan(entries.iter().rev(), level, direction),
        }
    }

    const fn grow(&mut self, bytes: u64, direction: Direction) {
        self.length += bytes;
        if matches!(direction, Direction::Backward) {
            self.base -= bytes;
        }
    }

    fn region(&self) -> MemoryRegion {
        MemoryRegion {
            base: VirtualAddress::new(self.base),
            length: self.length,
            attributes: self.attributes,
        }
    }
}

/// Result of locating the anchor below (and including) one table.
struct Located<'a, M> {
    run: RunScan<'a, M>,
    forward: Reach,
    backward: Reach,
}

fn locate<'a, M: TableMapper>(
    mapper: &'a M,
    table: PhysicalAddress,
    level: TranslationLevel,
    entry_count: usize,
    va: VirtualAddress,
) -> Result<Located<'a, M>, RegionLookupError> {
    let entries = mapper.entries(table, entry_count);
    let index = level.index_of(va);
    let Some(entry) = entries.get(index) else {
        return Err(RegionLookupError::NoMapping);
    };

    let mut located = match entry.classify(level) {
        Descriptor::Invalid => {
            log::trace!("lookup {va}: {level:?}[{index}] invalid");
            return Err(RegionLookupError::NoMapping);
        }
        Descriptor::Table(next) => {
            locate(mapper, next.next_table(), level.child(), ENTRIES_PER_TABLE, va)?
        }
        Descriptor::Block(leaf) | Descriptor::Page(leaf) => {
            let granularity = level.address_granularity();
            log::trace!("lookup {va}: anchor {level:?}[{index}] = {entry:?}");
            Located {
                run: RunScan {
                    mapper,
                    attributes: leaf.attributes(),
                    base: va.align_down(granularity).as_u64(),
                    length: granularity,
                },
                forward: Reach::TableEnd,
                backward: Reach::TableEnd,
            }
        }
    };

    if located.forward == Reach::TableEnd {
        located.forward = located
            .run
            .scan(entries[index + 1..].iter(), level, Direction::Forward);
    }
    if located.backward == Reach::TableEnd {
        located.backward = located
            .run
            .scan(entries[..index].iter().rev(), level, Direction::Backward);
    }
    Ok(located)
}

/// Region containing `va`, where `table` is a root of `level` with `entry_count` entries.
///
/// Running out of root entries is not a boundary: the region simply ends at
/// the edge of the translated range.
///
/// # Errors
/// [`RegionLookupError::NoMapping`] if `va` is past the range the root
/// translates or no leaf maps it.
pub fn lookup_region<M: TableMapper>(
    mapper: &M,
    table: PhysicalAddress,
    level: TranslationLevel,
    entry_count: usize,
    va: VirtualAddress,
) -> Result<MemoryRegion, RegionLookupError> {
    // Indices wrap at 9 bits; anything past the root would alias entry 0.
    if va.as_u64() >= entry_count as u64 * level.address_granularity() {
        log::trace!("lookup {va}: outside the translated range");
        return Err(RegionLookupError::NoMapping);
    }

    locate(mapper, table, level, entry_count, va).map(|located| located.run.region())
}

/// Region containing `va`, confined to the subtree of `table`.
///
/// # Errors
/// - [`RegionLookupError::NoMapping`] if no leaf maps `va`.
/// - [`RegionLookupError::NotFound`] if the run reaches either edge of
///   `table`; the region may then continue in neighbouring tables.
pub fn lookup_region_in_table<M: TableMapper>(
    mapper: &M,
    table: PhysicalAddress,
    level: TranslationLevel,
    va: VirtualAddress,
) -> Result<MemoryRegion, RegionLookupError> {
    let located = locate(mapper, table, level, ENTRIES_PER_TABLE, va)?;
    if located.forward == Reach::TableEnd || located.backward == Reach::TableEnd {
        return Err(RegionLookupError::NotFound);
    }
    Ok(located.run.region())
}
