//! First-entry descent used to seed a coalescing pass.

use kernel_memory_addresses::PhysicalAddress;

use crate::{Descriptor, DescriptorAttributes, TableMapper, TranslationLevel};

/// Attributes of the leaf reached by following entry 0 at every level.
///
/// Starting at `table` (a table of `level`), table descriptors in slot 0 are
/// followed until a block or page is found. Returns `None` if an invalid
/// entry is hit first.
#[must_use]
pub fn first_leaf_attributes<M: TableMapper>(
    mapper: &M,
    table: PhysicalAddress,
    level: TranslationLevel,
) -> Option<DescriptorAttributes> {
    let mut table = table;
    let mut level = level;
    loop {
        let entry = mapper.entries(table, 1)[0];
        match entry.classify(level) {
            Descriptor::Table(next) => {
                log::trace!("first leaf: {level:?} {table} -> table {}", next.next_table());
                table = next.next_table();
                level = level.child();
            }
            Descriptor::Block(leaf) | Descriptor::Page(leaf) => {
                log::trace!("first leaf: {level:?} {table} -> {entry:?}");
                return Some(leaf.attributes());
            }
            Descriptor::Invalid => {
                log::trace!("first leaf: {level:?} {table} -> invalid");
                return None;
            }
        }
    }
}
