//! Live register access through `mrs`.

use crate::{
    CurrentEl, ExceptionLevel, LoadRegisterUnsafe, Sctlr, SystemRegisters, Tcr, Ttbr0,
};

macro_rules! read_sysreg {
    ($name:literal) => {{
        let value: u64;
        unsafe {
            core::arch::asm!(
                concat!("mrs {}, ", $name),
                out(reg) value,
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }};
}

/// [`SystemRegisters`] backed by the executing PE.
///
/// Reads the EL2 register bank when running at EL2 and the EL1 bank
/// otherwise.
pub struct NativeRegisters {
    el: ExceptionLevel,
}

impl NativeRegisters {
    /// # Safety
    /// Must execute at EL1 or EL2; the EL1/EL2 system registers trap otherwise.
    #[must_use]
    pub unsafe fn new() -> Self {
        let el = unsafe { CurrentEl::load_unsafe() }.el();
        debug_assert!(
            matches!(el, ExceptionLevel::El1 | ExceptionLevel::El2),
            "translation registers are read at EL1 or EL2, not {el:?}"
        );
        Self { el }
    }

    #[inline]
    const fn at_el2(&self) -> bool {
        matches!(self.el, ExceptionLevel::El2)
    }
}

impl SystemRegisters for NativeRegisters {
    fn current_el(&self) -> ExceptionLevel {
        self.el
    }

    fn translation_table_base(&self) -> Ttbr0 {
        if self.at_el2() {
            Ttbr0::from_bits(read_sysreg!("ttbr0_el2"))
        } else {
            Ttbr0::from_bits(read_sysreg!("ttbr0_el1"))
        }
    }

    fn translation_control(&self) -> Tcr {
        if self.at_el2() {
            Tcr::from_bits(read_sysreg!("tcr_el2"))
        } else {
            Tcr::from_bits(read_sysreg!("tcr_el1"))
        }
    }

    fn system_control(&self) -> Sctlr {
        if self.at_el2() {
            Sctlr::from_bits(read_sysreg!("sctlr_el2"))
        } else {
            Sctlr::from_bits(read_sysreg!("sctlr_el1"))
        }
    }
}
