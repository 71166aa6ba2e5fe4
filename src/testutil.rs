//! An in-process stand-in for a foreign Windows process, backed by a local
//! arena instead of a real `HANDLE`. Lets the pure-logic components (C3-C7)
//! be exercised without a target process or CI running under Windows.
//! Grounded on the shape of `libmemscan/src/windows/memmap.rs`'s
//! `MappedMemoryWin` (a local buffer standing in for remote memory), adapted
//! into a full [`MemoryBridge`] implementation.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::process::{MemoryBridge, MemoryProtection, MemoryRegion, MemoryState, MemoryType, SystemInfo};

pub struct FakeProcess {
    memory: RefCell<BTreeMap<usize, u8>>,
    regions: RefCell<Vec<MemoryRegion>>,
    sys: SystemInfo,
    deny_executable_alloc: std::cell::Cell<bool>,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self {
            memory: RefCell::new(BTreeMap::new()),
            regions: RefCell::new(Vec::new()),
            sys: SystemInfo {
                min_app_addr: 0x1_0000,
                max_app_addr: 0x7FFF_0000_0000,
                granularity: 0x1_0000,
                page_size: 0x1000,
            },
            deny_executable_alloc: std::cell::Cell::new(false),
        }
    }

    /// Makes every subsequent executable allocation fail, simulating a
    /// target where `PAGE_EXECUTE_READWRITE` is unavailable (DEP/W^X) so
    /// tests can exercise the cave placement engine's fallback path.
    pub fn deny_executable_alloc(&self) {
        self.deny_executable_alloc.set(true);
    }

    /// Writes raw bytes into the arena, independent of any declared region.
    pub fn seed(&self, addr: usize, bytes: &[u8]) {
        let mut mem = self.memory.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            mem.insert(addr + i, b);
        }
    }

    /// Writes a machine word (little-endian, pointer-sized) into the arena.
    pub fn write_word(&self, addr: usize, value: usize) {
        self.seed(addr, &value.to_le_bytes());
    }

    /// Adds a region to the simulated VM layout. Regions are expected to be
    /// declared in ascending, non-overlapping, gap-free order to mirror how
    /// `VirtualQueryEx` partitions the entire address space.
    pub fn declare_region(&self, region: MemoryRegion) {
        self.regions.borrow_mut().push(region);
    }

    /// Convenience for declaring a committed, readable+writable region and
    /// seeding it with `bytes` (zero-padded to `size`).
    pub fn declare_committed(&self, base: usize, size: usize, bytes: &[u8]) {
        let mut padded = bytes.to_vec();
        padded.resize(size, 0);
        self.seed(base, &padded);
        self.declare_region(MemoryRegion {
            base_address: base,
            size,
            protect: MemoryProtection {
                read: true,
                write: true,
                ..Default::default()
            },
            state: MemoryState {
                committed: true,
                ..Default::default()
            },
            type_: MemoryType::Private,
            image_file: None,
        });
    }

    /// Declares a free region spanning `base..base+size`.
    pub fn declare_free(&self, base: usize, size: usize) {
        self.declare_region(MemoryRegion {
            base_address: base,
            size,
            protect: MemoryProtection::default(),
            state: MemoryState {
                free: true,
                ..Default::default()
            },
            type_: MemoryType::Unknown,
            image_file: None,
        });
    }
}

impl Default for FakeProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBridge for FakeProcess {
    fn read_memory(&self, addr: usize, len: usize) -> Option<Vec<u8>> {
        // A region that was declared and is no longer committed (freed, or
        // never allocated) must not be readable, even though the arena still
        // holds whatever bytes were last written there — mirrors a real
        // `ReadProcessMemory` failing against an unmapped/released range.
        if let Some(region) = self
            .regions
            .borrow()
            .iter()
            .find(|r| addr >= r.base_address && addr < r.end())
        {
            if !region.state.committed {
                return None;
            }
        }

        let mem = self.memory.borrow();
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(*mem.get(&(addr + i))?);
        }
        Some(out)
    }

    fn write_memory(&self, addr: usize, bytes: &[u8]) -> bool {
        self.seed(addr, bytes);
        true
    }

    fn query_region(&self, addr: usize) -> Option<MemoryRegion> {
        self.regions
            .borrow()
            .iter()
            .find(|r| addr < r.end())
            .cloned()
    }

    fn alloc(&self, hint: usize, size: usize, executable: bool) -> usize {
        if executable && self.deny_executable_alloc.get() {
            return 0;
        }

        let mut regions = self.regions.borrow_mut();

        // A non-null hint mirrors `VirtualAllocEx` with an explicit
        // `lpAddress`: the OS only honors it if that exact range is free,
        // it never silently relocates the allocation.
        let idx = if hint == 0 {
            regions.iter().position(|r| r.state.free && r.size >= size)
        } else {
            regions
                .iter()
                .position(|r| r.state.free && hint >= r.base_address && hint + size <= r.end())
        };

        let Some(idx) = idx else { return 0 };
        let free_region = regions[idx].clone();
        let alloc_base = if hint == 0 {
            free_region.base_address
        } else {
            hint
        };

        let allocated = MemoryRegion {
            base_address: alloc_base,
            size,
            protect: MemoryProtection {
                read: true,
                write: true,
                execute: executable,
                ..Default::default()
            },
            state: MemoryState {
                committed: true,
                ..Default::default()
            },
            type_: MemoryType::Private,
            image_file: None,
        };

        regions.remove(idx);
        if alloc_base > free_region.base_address {
            regions.push(MemoryRegion {
                base_address: free_region.base_address,
                size: alloc_base - free_region.base_address,
                ..free_region.clone()
            });
        }
        if alloc_base + size < free_region.end() {
            regions.push(MemoryRegion {
                base_address: alloc_base + size,
                size: free_region.end() - (alloc_base + size),
                ..free_region.clone()
            });
        }
        regions.push(allocated);
        regions.sort_by_key(|r| r.base_address);

        self.seed(alloc_base, &vec![0u8; size]);
        alloc_base
    }

    fn free(&self, addr: usize) -> bool {
        let mut regions = self.regions.borrow_mut();
        if let Some(region) = regions.iter_mut().find(|r| r.base_address == addr && r.state.committed) {
            region.state = MemoryState {
                free: true,
                ..Default::default()
            };
            region.protect = MemoryProtection::default();
            true
        } else {
            false
        }
    }

    fn system_info(&self) -> SystemInfo {
        self.sys
    }
}
