//! # Translation Levels and Root Table Geometry

use crate::{BITS_PER_LEVEL, ENTRIES_PER_TABLE, MAX_T0SZ, MIN_T0SZ};
use kernel_memory_addresses::VirtualAddress;

/// One of the four lookup levels of the 4 KiB granule translation regime.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TranslationLevel {
    /// Resolves VA bits `[47:39]`; each entry spans 512 GiB.
    L0,
    /// Resolves VA bits `[38:30]`; each entry spans 1 GiB.
    L1,
    /// Resolves VA bits `[29:21]`; each entry spans 2 MiB.
    L2,
    /// Resolves VA bits `[20:12]`; each entry maps one 4 KiB page.
    L3,
}

impl TranslationLevel {
    /// Level from its architectural number.
    ///
    /// # Panics
    /// If `level > 3`; the hierarchy has exactly four levels.
    #[inline]
    #[must_use]
    pub const fn new(level: u8) -> Self {
        match Self::from_u8(level) {
            Some(level) => level,
            None => panic!("translation level out of range (0..=3)"),
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::L0),
            1 => Some(Self::L1),
            2 => Some(Self::L2),
            3 => Some(Self::L3),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this is the page level (L3).
    #[inline]
    #[must_use]
    pub const fn is_last(self) -> bool {
        matches!(self, Self::L3)
    }

    /// The level below this one, if any.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::L0 => Some(Self::L1),
            Self::L1 => Some(Self::L2),
            Self::L2 => Some(Self::L3),
            Self::L3 => None,
        }
    }

    /// The level a table descriptor at this level points to.
    ///
    /// # Panics
    /// At L3, which cannot hold table descriptors.
    #[inline]
    #[must_use]
    pub const fn child(self) -> Self {
        match self.next() {
            Some(level) => level,
            None => panic!("table descriptors only exist at levels 0 to 2"),
        }
    }

    /// Bit position of the lowest VA bit resolved at this level.
    #[inline]
    #[must_use]
    pub const fn address_shift(self) -> u32 {
        12 + BITS_PER_LEVEL * (3 - self.as_u8() as u32)
    }

    /// Bytes of input address space covered by one entry at this level.
    #[inline]
    #[must_use]
    pub const fn address_granularity(self) -> u64 {
        1 << self.address_shift()
    }

    /// Size of the block (L0-L2) or page (L3) a leaf descriptor maps here.
    ///
    /// Identical to [`address_granularity`](Self::address_granularity): a leaf
    /// maps exactly the span of its entry.
    #[inline]
    #[must_use]
    pub const fn block_size(self) -> u64 {
        self.address_granularity()
    }

    /// Table index of `va` at this level (its 9-bit field).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, va: VirtualAddress) -> usize {
        ((va.as_u64() >> self.address_shift()) as usize) & (ENTRIES_PER_TABLE - 1)
    }
}

/// Error deriving the root table geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("T0SZ {0} is outside the supported range 16..=48 for a 4 KiB granule")]
    UnsupportedT0sz(u8),
}

/// Where the walk starts: root level and number of descriptors in the root table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RootTable {
    level: TranslationLevel,
    entry_count: usize,
}

impl RootTable {
    /// Derive the root table geometry from `TCR_ELx.T0SZ`.
    ///
    /// ```rust
    /// # use kernel_vmem::{RootTable, TranslationLevel};
    /// let root = RootTable::from_t0sz(25).unwrap();
    /// assert_eq!(root.level(), TranslationLevel::L1);
    /// assert_eq!(root.entry_count(), 512);
    ///
    /// let root = RootTable::from_t0sz(20).unwrap();
    /// assert_eq!(root.level(), TranslationLevel::L0);
    /// assert_eq!(root.entry_count(), 32);
    /// ```
    ///
    /// # Errors
    /// [`TranslationError::UnsupportedT0sz`] unless `16 <= t0sz <= 48`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_t0sz(t0sz: u8) -> Result<Self, TranslationError> {
        if t0sz < MIN_T0SZ || t0sz > MAX_T0SZ {
            return Err(TranslationError::UnsupportedT0sz(t0sz));
        }

        let unused_bits = (t0sz - MIN_T0SZ) as u32;
        let level = TranslationLevel::new((unused_bits / BITS_PER_LEVEL) as u8);
        let entry_count = ENTRIES_PER_TABLE >> (unused_bits % BITS_PER_LEVEL);
        Ok(Self { level, entry_count })
    }

    #[inline]
    #[must_use]
    pub const fn level(self) -> TranslationLevel {
        self.level
    }

    #[inline]
    #[must_use]
    pub const fn entry_count(self) -> usize {
        self.entry_count
    }

    /// Size of the input range translated through this root (`2^(64 - T0SZ)`).
    #[inline]
    #[must_use]
    pub const fn input_size(self) -> u64 {
        self.entry_count as u64 * self.level.address_granularity()
    }
}
