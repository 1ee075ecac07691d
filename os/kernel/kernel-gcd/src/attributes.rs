bitflags::bitflags! {
    /// Memory space attributes and capabilities as kept by the GCD.
    ///
    /// The same bits describe what a range *supports* (capabilities) and what
    /// is currently *applied* (attributes).
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct GcdAttributes: u64 {
        /// Uncacheable.
        const UC = 0x0000_0000_0000_0001;
        /// Write-combining.
        const WC = 0x0000_0000_0000_0002;
        /// Write-through.
        const WT = 0x0000_0000_0000_0004;
        /// Write-back.
        const WB = 0x0000_0000_0000_0008;
        /// Uncacheable, exported, fetch-and-add semaphores.
        const UCE = 0x0000_0000_0000_0010;

        /// Write-protected.
        const WP = 0x0000_0000_0000_1000;
        /// Read-protected; any access faults.
        const RP = 0x0000_0000_0000_2000;
        /// Execute-protected.
        const XP = 0x0000_0000_0000_4000;
        /// Non-volatile.
        const NV = 0x0000_0000_0000_8000;
        const MORE_RELIABLE = 0x0000_0000_0001_0000;
        /// Read-only.
        const RO = 0x0000_0000_0002_0000;
        /// Specific-purpose memory.
        const SP = 0x0000_0000_0004_0000;
        /// Protected by CPU crypto.
        const CPU_CRYPTO = 0x0000_0000_0008_0000;

        /// Needs a virtual mapping at OS runtime.
        const RUNTIME = 0x8000_0000_0000_0000;

        /// Every cacheability bit.
        const CACHE_TYPE_MASK = Self::UC.bits()
            | Self::WC.bits()
            | Self::WT.bits()
            | Self::WB.bits()
            | Self::UCE.bits();

        /// Every access protection bit.
        const ACCESS_MASK = Self::WP.bits()
            | Self::RP.bits()
            | Self::XP.bits()
            | Self::RO.bits();
    }
}

impl GcdAttributes {
    /// The cacheability part of this set.
    #[inline]
    #[must_use]
    pub const fn cache_type(self) -> Self {
        self.intersection(Self::CACHE_TYPE_MASK)
    }
}
