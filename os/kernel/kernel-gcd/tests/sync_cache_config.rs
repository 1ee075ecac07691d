use kernel_gcd::{
    GcdAttributes, GcdError, GcdMemoryType, MemorySpaceDescriptor, MemorySpaceServices,
    SyncError, sync_cache_config,
};
use kernel_registers::{ExceptionLevel, RegisterSnapshot, Sctlr, Tcr, Ttbr0};
use kernel_vmem::{
    DescriptorAttributes, MemoryType, PhysicalAddress, Shareability, TableArena,
    TranslationEntry, TranslationError, VirtualAddress,
};

const MIB2: u64 = 2 << 20;
const GIB: u64 = 1 << 30;

/// A memory space database that records every update.
struct RecordingGcd {
    map: Vec<MemorySpaceDescriptor>,
    map_error: Option<GcdError>,
    reject_from: Option<usize>,
    updates: Vec<(u64, u64, GcdAttributes)>,
}

impl RecordingGcd {
    /// One system memory descriptor spanning `[0, size)` that supports everything.
    fn covering(size: u64) -> Self {
        Self {
            map: vec![MemorySpaceDescriptor {
                base_address: 0,
                length: size,
                capabilities: GcdAttributes::CACHE_TYPE_MASK | GcdAttributes::ACCESS_MASK,
                attributes: GcdAttributes::WB,
                memory_type: GcdMemoryType::SystemMemory,
            }],
            map_error: None,
            reject_from: None,
            updates: Vec::new(),
        }
    }
}

impl MemorySpaceServices for RecordingGcd {
    fn memory_space_map(&self) -> Result<Vec<MemorySpaceDescriptor>, GcdError> {
        match self.map_error {
            Some(err) => Err(err),
            None => Ok(self.map.clone()),
        }
    }

    fn set_memory_space_attributes(
        &mut self,
        base: u64,
        length: u64,
        attributes: GcdAttributes,
    ) -> Result<(), GcdError> {
        if self.reject_from.is_some_and(|n| self.updates.len() >= n) {
            return Err(GcdError::AccessDenied);
        }
        self.updates.push((base, length, attributes));
        Ok(())
    }
}

fn normal(memory_type: MemoryType) -> DescriptorAttributes {
    DescriptorAttributes::new()
        .with_memory_type(memory_type)
        .with_sh(Shareability::InnerShareable)
        .with_af(true)
}

fn device() -> DescriptorAttributes {
    DescriptorAttributes::new()
        .with_memory_type(MemoryType::Device)
        .with_af(true)
        .with_pxn(true)
        .with_uxn(true)
}

fn registers(root: PhysicalAddress, t0sz: u8) -> RegisterSnapshot {
    RegisterSnapshot {
        current_el: ExceptionLevel::El1,
        ttbr0: Ttbr0::from_table_base(root),
        tcr: Tcr::new().with_t0sz(t0sz),
        sctlr: Sctlr::new().with_m(true),
    }
}

/// `T0SZ = 37`: a single L2 table with 64 entries.
/// `[0, a)` write-back, `[a, b)` device, `[b, 64)` invalid.
fn single_level(a: usize, b: usize) -> (TableArena, RegisterSnapshot) {
    let mut arena = TableArena::default();
    let l2 = arena.allocate();
    arena.fill(l2, 0, a, |i| {
        TranslationEntry::block(
            PhysicalAddress::new(i as u64 * MIB2),
            normal(MemoryType::WriteBack),
        )
    });
    arena.fill(l2, a, b - a, |i| {
        TranslationEntry::block(PhysicalAddress::new((a + i) as u64 * MIB2), device())
    });
    (arena, registers(l2, 37))
}

#[test]
fn single_level_table_yields_two_regions() {
    let (a, b) = (10, 25);
    let (arena, regs) = single_level(a, b);
    let mut gcd = RecordingGcd::covering(64 * MIB2);

    let flushed = sync_cache_config(&regs, &arena, &mut gcd).unwrap();

    assert_eq!(flushed, 2);
    assert_eq!(
        gcd.updates,
        [
            (0, a as u64 * MIB2, GcdAttributes::WB),
            (
                a as u64 * MIB2,
                (b - a) as u64 * MIB2,
                GcdAttributes::UC | GcdAttributes::XP
            ),
        ]
    );
}

#[test]
fn sub_table_and_following_block_are_one_region() {
    let mut arena = TableArena::default();
    let l1 = arena.allocate();
    let l2 = arena.allocate();
    arena.set(l1, 0, TranslationEntry::table(l2));
    arena.fill(l2, 0, 512, |i| {
        TranslationEntry::block(
            PhysicalAddress::new(i as u64 * MIB2),
            normal(MemoryType::WriteThrough),
        )
    });
    arena.set(
        l1,
        1,
        TranslationEntry::block(PhysicalAddress::new(GIB), normal(MemoryType::WriteThrough)),
    );
    let mut gcd = RecordingGcd::covering(512 * GIB);

    sync_cache_config(&registers(l1, 25), &arena, &mut gcd).unwrap();

    assert_eq!(gcd.updates, [(0, 2 * GIB, GcdAttributes::WT)]);
}

#[test]
fn region_reaching_the_end_of_the_root_is_flushed() {
    // T0SZ = 32: four L1 entries; the last two are mapped read-only.
    let mut arena = TableArena::default();
    let l1 = arena.allocate();
    let read_only = normal(MemoryType::WriteBack)
        .with_ap(kernel_vmem::AccessPermissions::PrivilegedReadOnly);
    arena.fill(l1, 2, 2, |i| {
        TranslationEntry::block(PhysicalAddress::new((2 + i as u64) * GIB), read_only)
    });
    let mut gcd = RecordingGcd::covering(4 * GIB);

    let flushed = sync_cache_config(&registers(l1, 32), &arena, &mut gcd).unwrap();

    assert_eq!(flushed, 1);
    assert_eq!(
        gcd.updates,
        [(2 * GIB, 2 * GIB, GcdAttributes::WB | GcdAttributes::RO)]
    );
}

#[test]
fn snapshot_failure_aborts_before_any_update() {
    let (arena, regs) = single_level(4, 8);
    let mut gcd = RecordingGcd::covering(64 * MIB2);
    gcd.map_error = Some(GcdError::OutOfResources);

    assert_eq!(
        sync_cache_config(&regs, &arena, &mut gcd),
        Err(SyncError::MemorySpaceMap(GcdError::OutOfResources))
    );
    assert!(gcd.updates.is_empty());
}

#[test]
fn rejected_update_stops_the_pass() {
    let (arena, regs) = single_level(4, 8);
    let mut gcd = RecordingGcd::covering(64 * MIB2);
    gcd.reject_from = Some(1);

    assert_eq!(
        sync_cache_config(&regs, &arena, &mut gcd),
        Err(SyncError::SetAttributes {
            base: VirtualAddress::new(4 * MIB2),
            length: 4 * MIB2,
            source: GcdError::AccessDenied,
        })
    );
    assert_eq!(gcd.updates.len(), 1);
}

#[test]
fn region_outside_the_map_is_an_error() {
    let (arena, regs) = single_level(4, 8);
    let mut gcd = RecordingGcd::covering(6 * MIB2);

    assert_eq!(
        sync_cache_config(&regs, &arena, &mut gcd),
        Err(SyncError::SetAttributes {
            base: VirtualAddress::new(4 * MIB2),
            length: 4 * MIB2,
            source: GcdError::NotFound,
        })
    );
}

#[test]
fn unsupported_t0sz_is_reported() {
    let (arena, regs) = single_level(4, 8);
    let regs = RegisterSnapshot {
        tcr: Tcr::new().with_t0sz(10),
        ..regs
    };
    let mut gcd = RecordingGcd::covering(64 * MIB2);

    assert_eq!(
        sync_cache_config(&regs, &arena, &mut gcd),
        Err(SyncError::Translation(TranslationError::UnsupportedT0sz(10)))
    );
}

#[test]
#[should_panic(expected = "requires the MMU to be enabled")]
fn sync_with_mmu_off_is_a_contract_violation() {
    let (arena, regs) = single_level(4, 8);
    let regs = RegisterSnapshot {
        sctlr: Sctlr::new(),
        ..regs
    };
    let mut gcd = RecordingGcd::covering(64 * MIB2);
    let _ = sync_cache_config(&regs, &arena, &mut gcd);
}

#[test]
fn four_level_tables_sync_across_root_entries() {
    // T0SZ = 16. L0[0] and L0[1] each reach an L3 table through L1 and L2;
    // the write-back run spans the last pages of the first subtree and the
    // first pages of the second.
    const L0_SPAN: u64 = 512 * GIB;
    const PAGE: u64 = 4096;

    let mut arena = TableArena::default();
    let l0 = arena.allocate();
    let low = [arena.allocate(), arena.allocate(), arena.allocate()];
    let high = [arena.allocate(), arena.allocate(), arena.allocate()];

    arena.set(l0, 0, TranslationEntry::table(low[0]));
    arena.set(low[0], 511, TranslationEntry::table(low[1]));
    arena.set(low[1], 511, TranslationEntry::table(low[2]));
    arena.fill(low[2], 0, 512, |i| {
        let pa = PhysicalAddress::new(L0_SPAN - MIB2 + i as u64 * PAGE);
        if i < 256 {
            TranslationEntry::page(pa, device())
        } else {
            TranslationEntry::page(pa, normal(MemoryType::WriteBack))
        }
    });

    arena.set(l0, 1, TranslationEntry::table(high[0]));
    arena.set(high[0], 0, TranslationEntry::table(high[1]));
    arena.set(high[1], 0, TranslationEntry::table(high[2]));
    arena.fill(high[2], 0, 512, |i| {
        TranslationEntry::page(
            PhysicalAddress::new(L0_SPAN + i as u64 * PAGE),
            normal(MemoryType::WriteBack),
        )
    });

    let mut gcd = RecordingGcd::covering(1 << 48);
    let flushed = sync_cache_config(&registers(l0, 16), &arena, &mut gcd).unwrap();

    assert_eq!(flushed, 2);
    assert_eq!(
        gcd.updates,
        [
            (
                L0_SPAN - MIB2,
                MIB2 / 2,
                GcdAttributes::UC | GcdAttributes::XP
            ),
            (L0_SPAN - MIB2 / 2, MIB2 / 2 + MIB2, GcdAttributes::WB),
        ]
    );
}
