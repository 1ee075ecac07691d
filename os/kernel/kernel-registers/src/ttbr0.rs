use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// `TTBR0_EL1` / `TTBR0_EL2` — Translation Table Base Register 0.
///
/// Holds the physical base address of the root table for the lower
/// (`TTBR0`) virtual address range, plus the ASID and common-not-private bit.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Ttbr0 {
    /// Bit 0 — CnP: Common not Private.
    pub cnp: bool,

    /// Bits 1–47 — BADDR\[47:1\]: root table base address.
    ///
    /// Bit 0 of the address is implied zero. The root table is at least
    /// 64-byte aligned, so the low bits of this field are zero in practice.
    #[bits(47)]
    baddr_47_1: u64,

    /// Bits 48–63 — ASID (EL1&0 regime only).
    #[bits(16)]
    pub asid: u16,
}

impl Ttbr0 {
    /// Build a `TTBR0` value that points at the given root table.
    #[inline]
    #[must_use]
    pub const fn from_table_base(base: PhysicalAddress) -> Self {
        Self::new().with_baddr_47_1(base.as_u64() >> 1)
    }

    /// Physical address of the root translation table.
    #[inline]
    #[must_use]
    pub const fn table_base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.baddr_47_1() << 1)
    }
}
