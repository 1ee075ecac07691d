use bitfield_struct::bitfield;

/// `AArch64` exception level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum ExceptionLevel {
    /// Unprivileged (applications).
    El0 = 0,
    /// Privileged (OS kernel, UEFI at EL1).
    El1 = 1,
    /// Hypervisor (UEFI firmware commonly runs here).
    El2 = 2,
    /// Secure monitor.
    El3 = 3,
}

impl ExceptionLevel {
    /// Decode the two-bit `EL` field.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::El0,
            1 => Self::El1,
            2 => Self::El2,
            _ => Self::El3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// `CurrentEL` — the exception level the PE is executing at.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct CurrentEl {
    /// Bits 0–1 — Reserved.
    #[bits(2)]
    __res0: u8,

    /// Bits 2–3 — EL.
    #[bits(2)]
    pub el: ExceptionLevel,

    /// Bits 4–63 — Reserved.
    #[bits(60)]
    __res1: u64,
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl crate::LoadRegisterUnsafe for CurrentEl {
    unsafe fn load_unsafe() -> Self {
        let value: u64;
        unsafe {
            core::arch::asm!(
                "mrs {}, CurrentEL",
                out(reg) value,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits(value)
    }
}
