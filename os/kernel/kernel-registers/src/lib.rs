//! # Typed `AArch64` Translation Registers
//!
//! Bitfield models of the system registers the translation table code reads:
//!
//! | Register | Type | Used for |
//! |----------|------|----------|
//! | `CurrentEL` | [`CurrentEl`] | Selecting the EL1/EL2 register bank, execute-never encoding. |
//! | `TTBR0_ELx` | [`Ttbr0`] | Physical base of the root translation table. |
//! | `TCR_ELx` | [`Tcr`] | `T0SZ`, which fixes the root level and its entry count. |
//! | `SCTLR_ELx` | [`Sctlr`] | Whether stage 1 translation (the MMU) is on. |
//!
//! Code that walks tables never touches the hardware directly; it receives a
//! [`SystemRegisters`] implementation. On target, enable the `asm` feature and
//! use `NativeRegisters`; on the host, fill a [`RegisterSnapshot`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod current_el;
#[cfg(all(feature = "asm", target_arch = "aarch64"))]
mod native;
mod sctlr;
mod tcr;
mod ttbr0;

pub use crate::current_el::{CurrentEl, ExceptionLevel};
#[cfg(all(feature = "asm", target_arch = "aarch64"))]
pub use crate::native::NativeRegisters;
pub use crate::sctlr::Sctlr;
pub use crate::tcr::Tcr;
pub use crate::ttbr0::Ttbr0;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register may only be readable at EL1 or higher.
    unsafe fn load_unsafe() -> Self;
}

/// Read access to the registers that describe the active `TTBR0` translation regime.
///
/// Implementations must return values of the **same** regime for all calls
/// (e.g. all EL2 registers when running at EL2).
pub trait SystemRegisters {
    /// The exception level the caller runs at.
    fn current_el(&self) -> ExceptionLevel;

    /// `TTBR0_ELx` of the current regime.
    fn translation_table_base(&self) -> Ttbr0;

    /// `TCR_ELx` of the current regime.
    fn translation_control(&self) -> Tcr;

    /// `SCTLR_ELx` of the current regime.
    fn system_control(&self) -> Sctlr;

    /// Whether stage 1 address translation is enabled.
    #[inline]
    fn mmu_enabled(&self) -> bool {
        self.system_control().m()
    }
}

/// A captured, immutable set of register values.
///
/// Reading everything once gives walkers a consistent view even if the
/// hardware state is changed afterwards; it is also how tests inject
/// synthetic register values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterSnapshot {
    pub current_el: ExceptionLevel,
    pub ttbr0: Ttbr0,
    pub tcr: Tcr,
    pub sctlr: Sctlr,
}

impl RegisterSnapshot {
    /// Capture the current values of any [`SystemRegisters`] source.
    #[must_use]
    pub fn capture<R: SystemRegisters + ?Sized>(regs: &R) -> Self {
        Self {
            current_el: regs.current_el(),
            ttbr0: regs.translation_table_base(),
            tcr: regs.translation_control(),
            sctlr: regs.system_control(),
        }
    }
}

impl SystemRegisters for RegisterSnapshot {
    #[inline]
    fn current_el(&self) -> ExceptionLevel {
        self.current_el
    }

    #[inline]
    fn translation_table_base(&self) -> Ttbr0 {
        self.ttbr0
    }

    #[inline]
    fn translation_control(&self) -> Tcr {
        self.tcr
    }

    #[inline]
    fn system_control(&self) -> Sctlr {
        self.sctlr
    }
}
