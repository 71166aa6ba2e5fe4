//! Cross-cutting data model shared by every component: region descriptors,
//! protection/state flags, and the `MemoryBridge` seam over the OS bridge.
//!
//! The actual OS calls live in [`crate::windows::process`]; this module only
//! carries the platform-independent shapes and the [`MemoryBridge`] seam that
//! lets the rest of the crate (pointer chains, typed I/O, the scanner, the
//! cave placement engine) be written and tested without touching a real
//! `HANDLE`.

use std::fmt::{self, Display, Formatter};

use crate::windows;

/// A handle to a foreign process, closed automatically on drop.
pub type ProcessHandle = windows::process::ProcessHandleWin;

/// Host system parameters queried once per session.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    pub min_app_addr: usize,
    pub max_app_addr: usize,
    pub granularity: usize,
    pub page_size: usize,
}

/// Cross-platform memory protection flags.
/// Agnostic representation of Windows `PAGE_*` constants, see
/// <https://learn.microsoft.com/en-us/windows/win32/Memory/memory-protection-constants>
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProtection {
    pub no_access: bool,
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub copy_on_write: bool,
    pub guarded: bool,
    pub no_cache: bool,
}

impl MemoryProtection {
    /// Whether the scanner should be allowed to read this region at all:
    /// readable and not a guard page.
    pub fn is_scannable(&self) -> bool {
        self.read && !self.no_access && !self.guarded
    }
}

impl Display for MemoryProtection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.no_access {
            flags.push("NOACCESS");
        }
        if self.no_cache {
            flags.push("NOCACHE");
        }
        if self.read {
            flags.push("READ");
        }
        if self.write && !self.copy_on_write {
            flags.push("WRITE");
        }
        if self.write && self.copy_on_write {
            flags.push("WRITECOPY");
        }
        if self.execute {
            flags.push("EXECUTE");
        }
        if self.guarded {
            flags.push("GUARDED");
        }
        write!(f, "{}", flags.join("_"))
    }
}

/// Cross-platform memory state flags (Windows `MEM_*` constants).
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryState {
    pub committed: bool,
    pub free: bool,
    pub reserved: bool,
}

impl Display for MemoryState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut states = Vec::new();
        if self.committed {
            states.push("COMMITTED");
        }
        if self.free {
            states.push("FREE");
        }
        if self.reserved {
            states.push("RESERVED");
        }
        write!(f, "{}", states.join("|"))
    }
}

/// Cross-platform memory type (Windows `MEM_IMAGE`/`MEM_MAPPED`/`MEM_PRIVATE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryType {
    #[default]
    Unknown,
    Private,
    Mapped,
    Image,
}

impl Display for MemoryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryType::Private => "PRIVATE",
            MemoryType::Mapped => "MAPPED",
            MemoryType::Image => "IMAGE",
            MemoryType::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A single region of the foreign process's virtual address space.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub base_address: usize,
    pub size: usize,
    pub protect: MemoryProtection,
    pub state: MemoryState,
    pub type_: MemoryType,
    pub image_file: Option<String>,
}

impl MemoryRegion {
    pub fn is_superset_of(&self, other: &MemoryRegion) -> bool {
        self.base_address <= other.base_address
            && self.base_address + self.size >= other.base_address + other.size
    }

    pub fn end(&self) -> usize {
        self.base_address.saturating_add(self.size)
    }
}

/// The seam between the algorithmic core (pointer chains, typed I/O, the
/// scanner, cave placement and patching) and the OS bridge.
///
/// A real session implements this over `ReadProcessMemory`/`WriteProcessMemory`/
/// `VirtualQueryEx`/`VirtualAllocEx`/`VirtualFreeEx`; tests implement it over a
/// plain `Vec<u8>` arena (see `crate::testutil::FakeProcess`). Every method
/// reports failure through its return value, never by panicking or unwinding.
pub trait MemoryBridge {
    /// Reads up to `len` bytes starting at `addr`. Returns `None` on total
    /// failure; a short read (fewer than `len` bytes) is still `Some` with
    /// the bytes actually read.
    fn read_memory(&self, addr: usize, len: usize) -> Option<Vec<u8>>;

    /// Writes `bytes` at `addr`. Returns `true` only if every byte was written.
    fn write_memory(&self, addr: usize, bytes: &[u8]) -> bool;

    /// Queries the region containing (or following) `addr`. Returns `None`
    /// once the address space is exhausted.
    fn query_region(&self, addr: usize) -> Option<MemoryRegion>;

    /// Allocates `size` bytes, optionally near `hint` (`0` = OS chooses).
    /// `executable` selects `PAGE_EXECUTE_READWRITE` over `PAGE_READWRITE`.
    /// Returns `0` on failure.
    fn alloc(&self, hint: usize, size: usize, executable: bool) -> usize;

    /// Releases a region previously returned by `alloc`.
    fn free(&self, addr: usize) -> bool;

    fn system_info(&self) -> SystemInfo;
}

/// Walks every region of the foreign address space in ascending order,
/// unfiltered (committed, free, and reserved regions all come through).
/// Grounded on `libmemscan::process::MemoryRegionIterator`, generalized over
/// [`MemoryBridge`] instead of a concrete `ProcessHandle`.
pub struct RegionWalker<'a, M: MemoryBridge + ?Sized> {
    bridge: &'a M,
    cursor: usize,
    max_addr: usize,
}

impl<'a, M: MemoryBridge + ?Sized> RegionWalker<'a, M> {
    pub fn new(bridge: &'a M, start: usize, max_addr: usize) -> Self {
        Self {
            bridge,
            cursor: start,
            max_addr,
        }
    }
}

impl<'a, M: MemoryBridge + ?Sized> Iterator for RegionWalker<'a, M> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.max_addr {
            return None;
        }
        let region = self.bridge.query_region(self.cursor)?;
        let next_cursor = region.end().max(self.cursor + 1);
        self.cursor = next_cursor;
        Some(region)
    }
}
