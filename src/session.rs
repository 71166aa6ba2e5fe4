//! Session lifecycle (C8): attach to a foreign process, cache its module
//! table, and guarantee the handle is closed exactly once.
//!
//! Grounded on `libmemscan/src/windows/process.rs`'s `ProcessHandleWin`
//! (`Drop` closes the handle) and `src/handle.rs`'s `AutoCloseHandle`
//! pattern, unified into a single owner: `Session` holds an
//! `Option<ProcessHandle>`, so closing (or dropping) it drops the handle and
//! every operation attempted against an empty session fails safely instead
//! of touching a stale `HANDLE`.

use crate::process::{MemoryBridge, MemoryRegion, ProcessHandle, SystemInfo};
use crate::windows::process as os;

pub struct Session {
    handle: Option<ProcessHandle>,
    pid: Option<u32>,
    modules: Vec<MemoryRegion>,
    sys: SystemInfo,
}

impl Session {
    pub fn new() -> Self {
        Self {
            handle: None,
            pid: None,
            modules: Vec::new(),
            sys: os::query_system_info(),
        }
    }

    /// Attaches to the first process whose name starts with `name`
    /// (case-insensitive). Closes any previously attached handle first.
    /// Returns `false` if no matching process is found or `OpenProcess`
    /// fails.
    pub fn attach(&mut self, name: &str) -> bool {
        self.close();

        let Some(pid) = os::find_process_by_name(name) else {
            return false;
        };
        let Some(handle) = os::open_process(pid) else {
            return false;
        };

        self.modules = os::get_process_module_regions(&handle);
        self.pid = Some(pid);
        self.handle = Some(handle);
        true
    }

    /// Closes the session's handle, if any. Idempotent: closing an already
    /// closed session is a no-op that returns `true`.
    pub fn close(&mut self) -> bool {
        self.handle = None;
        self.pid = None;
        self.modules.clear();
        true
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn modules(&self) -> &[MemoryRegion] {
        &self.modules
    }

    pub fn system_info(&self) -> SystemInfo {
        self.sys
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        self.handle.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBridge for Session {
    fn read_memory(&self, addr: usize, len: usize) -> Option<Vec<u8>> {
        self.handle.as_ref()?.read_memory(addr, len)
    }

    fn write_memory(&self, addr: usize, bytes: &[u8]) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.write_memory(addr, bytes))
            .unwrap_or(false)
    }

    fn query_region(&self, addr: usize) -> Option<MemoryRegion> {
        self.handle.as_ref()?.query_region(addr)
    }

    fn alloc(&self, hint: usize, size: usize, executable: bool) -> usize {
        self.handle
            .as_ref()
            .map(|h| h.alloc(hint, size, executable))
            .unwrap_or(0)
    }

    fn free(&self, addr: usize) -> bool {
        self.handle.as_ref().map(|h| h.free(addr)).unwrap_or(false)
    }

    fn system_info(&self) -> SystemInfo {
        self.sys
    }
}
