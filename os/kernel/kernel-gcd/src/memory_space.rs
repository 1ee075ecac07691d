//! # GCD Memory Space Map
//!
//! The memory space database itself is owned by the platform and reached
//! through [`MemorySpaceServices`]. Attribute updates are applied per
//! descriptor of a snapshot of the map, so a single region may be split
//! across several descriptors with different capabilities.

use alloc::vec::Vec;

use crate::GcdAttributes;

/// Kind of memory a GCD descriptor describes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GcdMemoryType {
    /// Address range not backed by anything; never updated.
    NonExistent,
    Reserved,
    SystemMemory,
    MemoryMappedIo,
    Persistent,
    MoreReliable,
    Unaccepted,
}

/// One entry of the memory space map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemorySpaceDescriptor {
    pub base_address: u64,
    pub length: u64,
    /// Attributes the range supports.
    pub capabilities: GcdAttributes,
    /// Attributes currently applied.
    pub attributes: GcdAttributes,
    pub memory_type: GcdMemoryType,
}

impl MemorySpaceDescriptor {
    /// First address past the descriptor; saturates for a descriptor that
    /// reaches the top of the address space.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base_address.saturating_add(self.length)
    }

    /// Last address covered by the descriptor.
    #[inline]
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.base_address.saturating_add(self.length.saturating_sub(1))
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address - self.base_address < self.length
    }
}

/// Status reported by the memory space database.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GcdError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("range is not described by the memory space map")]
    NotFound,
    #[error("attributes are not supported by the range")]
    Unsupported,
    #[error("access denied")]
    AccessDenied,
    #[error("out of resources")]
    OutOfResources,
}

/// The platform's memory space database.
pub trait MemorySpaceServices {
    /// Snapshot of the memory space map, sorted by base address.
    ///
    /// # Errors
    /// Whatever prevents the database from producing the map, typically
    /// [`GcdError::OutOfResources`].
    fn memory_space_map(&self) -> Result<Vec<MemorySpaceDescriptor>, GcdError>;

    /// Apply `attributes` to `[base, base + length)`.
    ///
    /// # Errors
    /// The status of the database.
    fn set_memory_space_attributes(
        &mut self,
        base: u64,
        length: u64,
        attributes: GcdAttributes,
    ) -> Result<(), GcdError>;
}

/// Index of the descriptor containing `address`.
#[must_use]
pub fn search_memory_spaces(map: &[MemorySpaceDescriptor], address: u64) -> Option<usize> {
    map.iter().position(|descriptor| descriptor.contains(address))
}

/// Apply the cacheability and protection of `attributes` to every descriptor
/// overlapping `[base, base + length)`.
///
/// Each overlapping piece receives its descriptor's current attributes with
/// the cacheability replaced by the requested bits it is capable of.
/// `NonExistent` descriptors are left alone.
///
/// # Errors
/// - [`GcdError::InvalidParameter`] if `length` is zero.
/// - [`GcdError::NotFound`] if the first or the last byte of the range is not
///   covered by `map`.
/// - The first error of [`MemorySpaceServices::set_memory_space_attributes`].
pub fn set_gcd_memory_space_attributes<S: MemorySpaceServices + ?Sized>(
    services: &mut S,
    map: &[MemorySpaceDescriptor],
    base: u64,
    length: u64,
    attributes: GcdAttributes,
) -> Result<(), GcdError> {
    if length == 0 {
        return Err(GcdError::InvalidParameter);
    }

    let last_byte = base
        .checked_add(length - 1)
        .ok_or(GcdError::InvalidParameter)?;
    let first = search_memory_spaces(map, base).ok_or(GcdError::NotFound)?;
    let last = search_memory_spaces(map, last_byte).ok_or(GcdError::NotFound)?;

    for descriptor in map
        .iter()
        .skip(first)
        .take(last.saturating_sub(first) + 1)
    {
        if descriptor.memory_type == GcdMemoryType::NonExistent {
            continue;
        }

        let start = base.max(descriptor.base_address);
        let stop = last_byte.min(descriptor.last());
        // `difference` keeps attribute bits without a named flag.
        let applied = descriptor
            .attributes
            .difference(GcdAttributes::CACHE_TYPE_MASK)
            | (descriptor.capabilities & attributes);
        services.set_memory_space_attributes(start, stop - start + 1, applied)?;
    }
    Ok(())
}
