use bitfield_struct::bitfield;

/// `TCR_EL1` / `TCR_EL2` — Translation Control Register, `TTBR0` half.
///
/// Only the low 16 bits are modeled field by field: they describe the
/// `TTBR0` region and share one layout between `TCR_EL1` and the non-VHE
/// `TCR_EL2`. The upper bits differ per regime and are kept opaque.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Tcr {
    /// Bits 0–5 — T0SZ: the `TTBR0` region spans `2^(64 - T0SZ)` bytes.
    #[bits(6)]
    pub t0sz: u8,

    /// Bit 6 — Reserved.
    #[bits(1)]
    __res6: u8,

    /// Bit 7 — EPD0: disable table walks through `TTBR0` (EL1 only).
    pub epd0: bool,

    /// Bits 8–9 — IRGN0: inner cacheability of table walks.
    #[bits(2)]
    pub irgn0: u8,

    /// Bits 10–11 — ORGN0: outer cacheability of table walks.
    #[bits(2)]
    pub orgn0: u8,

    /// Bits 12–13 — SH0: shareability of table walks.
    #[bits(2)]
    pub sh0: u8,

    /// Bits 14–15 — TG0: granule size (`0b00` = 4 KiB).
    #[bits(2)]
    pub tg0: u8,

    /// Bits 16–63 — Regime specific (`T1SZ`/`TG1`/`IPS` at EL1, `PS` at EL2, …).
    #[bits(48)]
    pub upper: u64,
}
