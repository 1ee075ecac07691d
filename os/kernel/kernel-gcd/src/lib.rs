//! # GCD Attribute Synchronization
//!
//! Keeps the GCD (global coherency domain) memory space map in agreement
//! with the stage 1 translation tables that are actually live.
//!
//! - [`GcdAttributes`]: the capability/attribute bitmask the GCD speaks.
//! - [`region_attribute_to_gcd_attribute`] / [`efi_attribute_to_arm_attribute`]:
//!   translation between descriptor attribute fields and GCD attributes.
//! - [`MemorySpaceServices`]: the platform's memory space database.
//! - [`sync_cache_config`]: walk every region of the `TTBR0` tables and push
//!   its attributes into the database.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod attributes;
mod codec;
mod memory_space;
mod sync;

pub use crate::attributes::GcdAttributes;
pub use crate::codec::{
    UnsupportedAttribute, cache_attributes, efi_attribute_to_arm_attribute,
    region_attribute_to_gcd_attribute,
};
pub use crate::memory_space::{
    GcdError, GcdMemoryType, MemorySpaceDescriptor, MemorySpaceServices, search_memory_spaces,
    set_gcd_memory_space_attributes,
};
pub use crate::sync::{SyncError, sync_cache_config};
