//! # Attribute Codec
//!
//! Translation between the attribute field of a block/page descriptor and
//! [`GcdAttributes`].
//!
//! | Descriptor | GCD |
//! |------------|-----|
//! | `AttrIndx` 0 (device) | `UC` |
//! | `AttrIndx` 1 (normal non-cacheable) | `WC` |
//! | `AttrIndx` 2 (normal write-through) | `WT` |
//! | `AttrIndx` 3 (normal write-back) | `WB` |
//! | `AF = 0` | `RP` |
//! | `AP[2] = 1` | `RO` |
//! | `PXN` or `UXN` | `XP` |
//!
//! The reverse direction sets only `PXN` for `XP`. Uncached memory is always
//! made non-executable: `XN` at EL2, `UXN` and `PXN` below.

use kernel_registers::ExceptionLevel;
use kernel_vmem::descriptor::INVALID_ATTR_INDEX;
use kernel_vmem::{AccessPermissions, DescriptorAttributes, MemoryType, Shareability};

use crate::GcdAttributes;

/// `AttrIndx` does not name one of the four configured memory types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported memory attribute index {index}")]
pub struct UnsupportedAttribute {
    pub index: u8,
}

/// Cacheability class of a descriptor attribute field.
///
/// # Errors
/// [`UnsupportedAttribute`] for `AttrIndx` 4–7.
pub const fn cache_attributes(
    attributes: DescriptorAttributes,
) -> Result<GcdAttributes, UnsupportedAttribute> {
    match attributes.memory_type() {
        Some(MemoryType::Device) => Ok(GcdAttributes::UC),
        Some(MemoryType::NonCacheable) => Ok(GcdAttributes::WC),
        Some(MemoryType::WriteThrough) => Ok(GcdAttributes::WT),
        Some(MemoryType::WriteBack) => Ok(GcdAttributes::WB),
        None => Err(UnsupportedAttribute {
            index: attributes.attr_index(),
        }),
    }
}

/// GCD attributes of a region with the given descriptor attribute field.
///
/// An unsupported `AttrIndx` is logged and contributes no cacheability bit;
/// the protection bits are still translated.
#[must_use]
pub fn region_attribute_to_gcd_attribute(attributes: DescriptorAttributes) -> GcdAttributes {
    let mut gcd = cache_attributes(attributes).unwrap_or_else(|err| {
        log::error!("{err} in descriptor attributes {:#x}", attributes.into_bits());
        GcdAttributes::empty()
    });

    if !attributes.af() {
        gcd |= GcdAttributes::RP;
    }
    if attributes.ap().is_read_only() {
        gcd |= GcdAttributes::RO;
    }
    if attributes.execute_never() {
        gcd |= GcdAttributes::XP;
    }
    gcd
}

/// Descriptor attribute field for a mapping with the given GCD attributes,
/// created by code running at `el`.
///
/// Cacheability is chosen by priority `UC`, `WC`, `WT`, `WB`; without any of
/// them `AttrIndx` is set to the unused slot 7.
#[must_use]
pub const fn efi_attribute_to_arm_attribute(
    gcd: GcdAttributes,
    el: ExceptionLevel,
) -> DescriptorAttributes {
    let mut attributes = DescriptorAttributes::new();

    if gcd.contains(GcdAttributes::UC) {
        attributes = attributes.with_memory_type(MemoryType::Device);
        // At EL2 bit 54 is the single XN bit and bit 53 is RES0.
        attributes = match el {
            ExceptionLevel::El2 => attributes.with_uxn(true),
            _ => attributes.with_uxn(true).with_pxn(true),
        };
    } else if gcd.contains(GcdAttributes::WC) {
        attributes = attributes.with_memory_type(MemoryType::NonCacheable);
    } else if gcd.contains(GcdAttributes::WT) {
        attributes = attributes
            .with_memory_type(MemoryType::WriteThrough)
            .with_sh(Shareability::InnerShareable);
    } else if gcd.contains(GcdAttributes::WB) {
        attributes = attributes
            .with_memory_type(MemoryType::WriteBack)
            .with_sh(Shareability::InnerShareable);
    } else {
        attributes = attributes.with_attr_index(INVALID_ATTR_INDEX);
    }

    if !gcd.contains(GcdAttributes::RP) {
        attributes = attributes.with_af(true);
    }
    if gcd.contains(GcdAttributes::RO) {
        attributes = attributes.with_ap(AccessPermissions::PrivilegedReadOnly);
    }
    if gcd.contains(GcdAttributes::XP) {
        attributes = attributes.with_pxn(true);
    }
    attributes
}
