//! # Synthetic Translation Tables
//!
//! A [`TableArena`] owns a set of 4 KiB-aligned [`TranslationTable`]s and
//! hands out fake physical addresses for them, so table hierarchies can be
//! built and walked without touching real memory.
//!
//! ```rust
//! # use kernel_vmem::{TableArena, TranslationEntry, TableMapper, PhysicalAddress};
//! let mut arena = TableArena::new(PhysicalAddress::new(0x8000_0000));
//! let root = arena.allocate();
//! let leaf = arena.allocate();
//! arena.set(root, 0, TranslationEntry::table(leaf));
//! assert_eq!(arena.entries(root, 1)[0], TranslationEntry::table(leaf));
//! ```

use alloc::vec::Vec;
use kernel_memory_addresses::PhysicalAddress;

use crate::{ENTRIES_PER_TABLE, TableMapper, TranslationEntry};

/// One 4 KiB translation table.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct TranslationTable {
    entries: [TranslationEntry; ENTRIES_PER_TABLE],
}

impl TranslationTable {
    /// A table with every entry invalid.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [TranslationEntry::INVALID; ENTRIES_PER_TABLE],
        }
    }

    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[TranslationEntry; ENTRIES_PER_TABLE] {
        &self.entries
    }

    #[inline]
    pub const fn entries_mut(&mut self) -> &mut [TranslationEntry; ENTRIES_PER_TABLE] {
        &mut self.entries
    }
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Bump-allocated pool of translation tables with synthetic physical addresses.
///
/// Table `n` lives at `base + n * 4096`. Tables are never freed.
pub struct TableArena {
    base: PhysicalAddress,
    tables: Vec<TranslationTable>,
}

impl TableArena {
    /// Size of one table in the synthetic physical address space.
    const TABLE_SIZE: u64 = 4096;

    /// An empty arena whose first table will be placed at `base`.
    ///
    /// # Panics
    /// If `base` is not 4 KiB aligned.
    #[must_use]
    pub fn new(base: PhysicalAddress) -> Self {
        assert!(base.is_aligned(Self::TABLE_SIZE), "arena base must be 4K-aligned");
        Self {
            base,
            tables: Vec::new(),
        }
    }

    /// Number of tables handed out so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Add a zeroed table and return its physical address.
    pub fn allocate(&mut self) -> PhysicalAddress {
        let pa = self.base + self.tables.len() as u64 * Self::TABLE_SIZE;
        self.tables.push(TranslationTable::zeroed());
        pa
    }

    /// Store `entry` at `index` of the table at `table`.
    ///
    /// # Panics
    /// If `table` was not handed out by this arena or `index >= 512`.
    pub fn set(&mut self, table: PhysicalAddress, index: usize, entry: TranslationEntry) {
        let slot = self.slot(table);
        self.tables[slot].entries_mut()[index] = entry;
    }

    /// Fill `count` consecutive entries starting at `first` using `make(i)`.
    ///
    /// # Panics
    /// Same as [`set`](Self::set).
    pub fn fill(
        &mut self,
        table: PhysicalAddress,
        first: usize,
        count: usize,
        mut make: impl FnMut(usize) -> TranslationEntry,
    ) {
        let slot = self.slot(table);
        for (i, entry) in self.tables[slot].entries_mut()[first..first + count]
            .iter_mut()
            .enumerate()
        {
            *entry = make(i);
        }
    }

    /// # Panics
    /// If `table` was not handed out by this arena.
    #[must_use]
    pub fn get(&self, table: PhysicalAddress) -> &TranslationTable {
        &self.tables[self.slot(table)]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot(&self, table: PhysicalAddress) -> usize {
        let offset = table.as_u64().wrapping_sub(self.base.as_u64());
        assert!(
            table.as_u64() >= self.base.as_u64()
                && offset.is_multiple_of(Self::TABLE_SIZE)
                && ((offset / Self::TABLE_SIZE) as usize) < self.tables.len(),
            "{table} is not a table in this arena"
        );
        (offset / Self::TABLE_SIZE) as usize
    }
}

impl Default for TableArena {
    fn default() -> Self {
        Self::new(PhysicalAddress::new(0x4000_0000))
    }
}

impl TableMapper for TableArena {
    fn entries(&self, table: PhysicalAddress, entry_count: usize) -> &[TranslationEntry] {
        &self.get(table).entries()[..entry_count]
    }
}
