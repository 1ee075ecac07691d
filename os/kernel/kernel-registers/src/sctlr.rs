use bitfield_struct::bitfield;

/// `SCTLR_EL1` / `SCTLR_EL2` — System Control Register.
///
/// Only the bits relevant to translation and caching are named.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Sctlr {
    /// Bit 0 — M: stage 1 address translation enable.
    pub m: bool,

    /// Bit 1 — A: alignment check enable.
    pub a: bool,

    /// Bit 2 — C: data cacheability control.
    pub c: bool,

    /// Bit 3 — SA: stack alignment check enable.
    pub sa: bool,

    #[bits(8)]
    __bits_4_11: u8,

    /// Bit 12 — I: instruction cacheability control.
    pub i: bool,

    #[bits(6)]
    __bits_13_18: u8,

    /// Bit 19 — WXN: writable implies execute-never.
    pub wxn: bool,

    #[bits(5)]
    __bits_20_24: u8,

    /// Bit 25 — EE: big-endian translation table walks.
    pub ee: bool,

    #[bits(38)]
    __bits_26_63: u64,
}
