//! # `AArch64` Stage 1 Descriptors (4 KiB granule)
//!
//! Every table entry is a 64-bit word whose low two bits select its role:
//!
//! | bits\[1:0\] | L0-L2 | L3 |
//! |:------------|:------|:---|
//! | `x0` | invalid | invalid |
//! | `01` | block descriptor | invalid (reserved) |
//! | `11` | table descriptor | page descriptor |
//!
//! - [`TranslationEntry`]: the raw word, classified with [`TranslationEntry::classify`].
//! - [`TableDescriptor`]: points to the next-level table.
//! - [`BlockDescriptor`] / [`PageDescriptor`]: leaf; output address + attributes.
//! - [`DescriptorAttributes`]: the attribute bits of a leaf with the type and
//!   address bits masked off. Two leaves describe the same kind of memory
//!   exactly when their `DescriptorAttributes` are equal.
//!
//! ## Attribute layout
//!
//! | Bits | Field | Meaning |
//! |------|-------|---------|
//! | 2–4 | `AttrIndx` | `MAIR_ELx` slot, see [`MemoryType`] |
//! | 5 | `NS` | non-secure output address |
//! | 6–7 | `AP[2:1]` | [`AccessPermissions`] |
//! | 8–9 | `SH` | [`Shareability`] |
//! | 10 | `AF` | access flag; clear ⇒ first access faults |
//! | 11 | `nG` | not global |
//! | 52 | `Contiguous` | TLB hint |
//! | 53 | `PXN` | privileged execute-never |
//! | 54 | `UXN` / `XN` | unprivileged execute-never (EL1&0), execute-never (EL2) |
//! | 55–58 | — | software use |
//! | 59–63 | — | implementation defined / ignored |

use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

use crate::TranslationLevel;

/// Descriptor type bits `[1:0]`.
pub const TYPE_MASK: u64 = 0b11;
const TYPE_BLOCK: u64 = 0b01;
const TYPE_TABLE_OR_PAGE: u64 = 0b11;

/// Output / next-table address bits `[47:12]`.
pub const ADDRESS_MASK: u64 = 0x0000_FFFF_FFFF_F000;

/// Lower (`[11:2]`) and upper (`[63:52]`) attribute bits of a leaf descriptor.
pub const ATTRIBUTES_MASK: u64 = (0xFFF << 52) | (0x3FF << 2);

/// `AttrIndx` value that names no memory type; produced when no cacheability
/// was requested.
pub const INVALID_ATTR_INDEX: u8 = 0b111;

/// Cacheability class selected through `AttrIndx`.
///
/// Follows the `MAIR_ELx` layout firmware programs at boot: slot 0 device,
/// slot 1 normal non-cacheable, slot 2 normal write-through, slot 3 normal
/// write-back. Slots 4–7 are not used for mappings.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MemoryType {
    /// Device-nGnRnE.
    Device = 0,
    /// Normal, inner/outer non-cacheable.
    NonCacheable = 1,
    /// Normal, inner/outer write-through.
    WriteThrough = 2,
    /// Normal, inner/outer write-back.
    WriteBack = 3,
}

impl MemoryType {
    /// The memory type configured for `AttrIndx = index`, if any.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Device),
            1 => Some(Self::NonCacheable),
            2 => Some(Self::WriteThrough),
            3 => Some(Self::WriteBack),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Data access permissions, `AP[2:1]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum AccessPermissions {
    /// Read/write at EL1+, no access at EL0.
    PrivilegedReadWrite = 0b00,
    /// Read/write at all levels.
    ReadWrite = 0b01,
    /// Read-only at EL1+, no access at EL0.
    PrivilegedReadOnly = 0b10,
    /// Read-only at all levels.
    ReadOnly = 0b11,
}

impl AccessPermissions {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::PrivilegedReadWrite,
            0b01 => Self::ReadWrite,
            0b10 => Self::PrivilegedReadOnly,
            _ => Self::ReadOnly,
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Whether writes are denied at every level that has access.
    #[inline]
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::PrivilegedReadOnly | Self::ReadOnly)
    }
}

/// Shareability domain, `SH[1:0]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Shareability {
    NonShareable = 0b00,
    /// Architecturally reserved encoding.
    Reserved = 0b01,
    OuterShareable = 0b10,
    InnerShareable = 0b11,
}

impl Shareability {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::NonShareable,
            0b01 => Self::Reserved,
            0b10 => Self::OuterShareable,
            _ => Self::InnerShareable,
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Attribute field of a block/page descriptor.
///
/// Always holds zero in the type bits `[1:0]` and the address bits `[51:12]`,
/// so equality compares attributes only.
#[bitfield(u64)]
#[derive(Eq, PartialEq, Hash)]
pub struct DescriptorAttributes {
    #[bits(2)]
    __type: u8,

    /// Bits 2–4 — `AttrIndx`: `MAIR_ELx` slot.
    #[bits(3)]
    pub attr_index: u8,

    /// Bit 5 — NS: non-secure.
    pub ns: bool,

    /// Bits 6–7 — `AP[2:1]`.
    #[bits(2)]
    pub ap: AccessPermissions,

    /// Bits 8–9 — SH.
    #[bits(2)]
    pub sh: Shareability,

    /// Bit 10 — AF: access flag.
    pub af: bool,

    /// Bit 11 — nG: not global.
    pub ng: bool,

    #[bits(40)]
    __address: u64,

    /// Bit 52 — Contiguous hint.
    pub contiguous: bool,

    /// Bit 53 — PXN: privileged execute-never.
    pub pxn: bool,

    /// Bit 54 — UXN (EL1&0) / XN (EL2): unprivileged execute-never.
    pub uxn: bool,

    /// Bits 55–58 — reserved for software use.
    #[bits(4)]
    pub software: u8,

    /// Bits 59–63 — implementation defined / ignored.
    #[bits(5)]
    pub ignored: u8,
}

impl DescriptorAttributes {
    /// Extract the attribute field from a raw descriptor word.
    #[inline]
    #[must_use]
    pub const fn from_entry(raw: u64) -> Self {
        Self::from_bits(raw & ATTRIBUTES_MASK)
    }

    /// The configured memory type, or `None` for `AttrIndx` 4–7.
    #[inline]
    #[must_use]
    pub const fn memory_type(self) -> Option<MemoryType> {
        MemoryType::from_index(self.attr_index())
    }

    #[inline]
    #[must_use]
    pub const fn with_memory_type(self, memory_type: MemoryType) -> Self {
        self.with_attr_index(memory_type.index())
    }

    /// Whether either execute-never bit is set.
    #[inline]
    #[must_use]
    pub const fn execute_never(self) -> bool {
        self.pxn() || self.uxn()
    }
}

/// Table descriptor (L0-L2): points to the next-level table.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct TableDescriptor {
    /// Bit 0 — valid.
    #[bits(default = true)]
    pub valid: bool,

    /// Bit 1 — must be 1 for a table.
    #[bits(default = true)]
    pub table: bool,

    #[bits(10)]
    __ignored_2_11: u16,

    /// Bits 12–47 — next-level table address \[47:12\].
    #[bits(36)]
    next_table_47_12: u64,

    #[bits(4)]
    __res_48_51: u8,

    #[bits(7)]
    __ignored_52_58: u8,

    /// Bit 59 — `PXNTable`.
    pub pxn_table: bool,

    /// Bit 60 — `UXNTable` / `XNTable`.
    pub uxn_table: bool,

    /// Bits 61–62 — `APTable`.
    #[bits(2)]
    pub ap_table: u8,

    /// Bit 63 — `NSTable`.
    pub ns_table: bool,
}

impl TableDescriptor {
    /// A valid table descriptor pointing at `next` (4 KiB aligned).
    #[inline]
    #[must_use]
    pub const fn pointing_to(next: PhysicalAddress) -> Self {
        debug_assert!(next.as_u64() & !ADDRESS_MASK == 0, "table must be 4K-aligned");
        Self::new().with_next_table_47_12((next.as_u64() & ADDRESS_MASK) >> 12)
    }

    /// Physical address of the next-level table.
    #[inline]
    #[must_use]
    pub const fn next_table(self) -> PhysicalAddress {
        PhysicalAddress::new(self.next_table_47_12() << 12)
    }
}

/// Block (L0-L2) or page (L3) descriptor.
///
/// Blocks and pages share this layout; they differ in the type bits and in
/// the alignment of the output address.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct BlockDescriptor {
    /// Bit 0 — valid.
    pub valid: bool,

    /// Bit 1 — 0 for an L0-L2 block, 1 for an L3 page.
    pub page: bool,

    /// Bits 2–4 — `AttrIndx`.
    #[bits(3)]
    pub attr_index: u8,

    /// Bit 5 — NS.
    pub ns: bool,

    /// Bits 6–7 — `AP[2:1]`.
    #[bits(2)]
    pub ap: AccessPermissions,

    /// Bits 8–9 — SH.
    #[bits(2)]
    pub sh: Shareability,

    /// Bit 10 — AF.
    pub af: bool,

    /// Bit 11 — nG.
    pub ng: bool,

    /// Bits 12–47 — output address \[47:12\].
    #[bits(36)]
    output_address_47_12: u64,

    #[bits(4)]
    __res_48_51: u8,

    /// Bit 52 — Contiguous.
    pub contiguous: bool,

    /// Bit 53 — PXN.
    pub pxn: bool,

    /// Bit 54 — UXN / XN.
    pub uxn: bool,

    /// Bits 55–58 — software use.
    #[bits(4)]
    pub software: u8,

    /// Bits 59–63 — implementation defined / ignored.
    #[bits(5)]
    pub ignored: u8,
}

/// Page descriptors (L3) have the block layout.
pub type PageDescriptor = BlockDescriptor;

impl BlockDescriptor {
    /// Physical address the block/page maps to.
    #[inline]
    #[must_use]
    pub const fn output_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.output_address_47_12() << 12)
    }

    /// The comparable attribute field of this leaf.
    #[inline]
    #[must_use]
    pub const fn attributes(self) -> DescriptorAttributes {
        DescriptorAttributes::from_entry(self.into_bits())
    }
}

/// Decoded role of a [`TranslationEntry`] at a given level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Descriptor {
    Invalid,
    Table(TableDescriptor),
    Block(BlockDescriptor),
    Page(PageDescriptor),
}

impl Descriptor {
    /// Attributes of a block or page; `None` for tables and invalid entries.
    #[inline]
    #[must_use]
    pub const fn leaf_attributes(self) -> Option<DescriptorAttributes> {
        match self {
            Self::Block(leaf) | Self::Page(leaf) => Some(leaf.attributes()),
            Self::Invalid | Self::Table(_) => None,
        }
    }
}

/// A raw 64-bit translation table entry.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct TranslationEntry(u64);

impl TranslationEntry {
    /// An invalid (faulting) entry.
    pub const INVALID: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u64 {
        self.0
    }

    /// A table descriptor pointing at `next`.
    #[inline]
    #[must_use]
    pub const fn table(next: PhysicalAddress) -> Self {
        Self(TableDescriptor::pointing_to(next).into_bits())
    }

    /// An L0-L2 block descriptor mapping `output` with `attributes`.
    #[inline]
    #[must_use]
    pub const fn block(output: PhysicalAddress, attributes: DescriptorAttributes) -> Self {
        Self((output.as_u64() & ADDRESS_MASK) | attributes.into_bits() | TYPE_BLOCK)
    }

    /// An L3 page descriptor mapping `output` with `attributes`.
    #[inline]
    #[must_use]
    pub const fn page(output: PhysicalAddress, attributes: DescriptorAttributes) -> Self {
        Self((output.as_u64() & ADDRESS_MASK) | attributes.into_bits() | TYPE_TABLE_OR_PAGE)
    }

    /// Decode this entry as found in a table at `level`.
    ///
    /// Type `01` at L3 is reserved and decodes as [`Descriptor::Invalid`].
    /// A block at L0 is accepted even though a 4 KiB granule without
    /// `FEAT_LPA2` never produces one.
    #[inline]
    #[must_use]
    pub const fn classify(self, level: TranslationLevel) -> Descriptor {
        match (self.0 & TYPE_MASK, level.is_last()) {
            (TYPE_TABLE_OR_PAGE, false) => Descriptor::Table(TableDescriptor::from_bits(self.0)),
            (TYPE_TABLE_OR_PAGE, true) => Descriptor::Page(BlockDescriptor::from_bits(self.0)),
            (TYPE_BLOCK, false) => Descriptor::Block(BlockDescriptor::from_bits(self.0)),
            _ => Descriptor::Invalid,
        }
    }
}

impl core::fmt::Debug for TranslationEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TranslationEntry(0x{:016X})", self.0)
    }
}
