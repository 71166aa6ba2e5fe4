//! Raw Windows calls backing the OS bridge: process open/close, module
//! enumeration, region queries, and read/write/alloc/free over another
//! process's virtual memory.

use std::ffi::CStr;
use std::mem;
use std::ptr::null_mut;

use winapi::shared::minwindef::{DWORD, FALSE, HMODULE, MAX_PATH};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::memoryapi::{ReadProcessMemory, VirtualAllocEx, VirtualFreeEx, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::psapi::{
    EnumProcessModules, GetModuleFileNameExA, GetModuleInformation, MODULEINFO,
};
use winapi::um::sysinfoapi::GetSystemInfo;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use winapi::um::winnt::{
    HANDLE, MEM_COMMIT, MEM_FREE, MEM_IMAGE, MEM_MAPPED, MEM_PRIVATE, MEM_RESERVE,
    MEM_RELEASE, PAGE_EXECUTE_READWRITE, PAGE_GUARD, PAGE_NOACCESS, PAGE_NOCACHE,
    PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY, PAGE_EXECUTE, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_WRITECOPY, MEMORY_BASIC_INFORMATION, PROCESS_QUERY_INFORMATION,
    PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};

use crate::process::{
    MemoryBridge, MemoryProtection, MemoryRegion, MemoryState, MemoryType, SystemInfo,
};

/// An owned handle to a foreign process. Closed automatically on drop.
pub struct ProcessHandleWin(pub HANDLE);

unsafe impl Send for ProcessHandleWin {}
unsafe impl Sync for ProcessHandleWin {}

impl Drop for ProcessHandleWin {
    fn drop(&mut self) {
        if !self.0.is_null() && self.0 != INVALID_HANDLE_VALUE {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }
}

impl From<DWORD> for MemoryProtection {
    fn from(protect: DWORD) -> Self {
        let base = protect & 0xff;
        MemoryProtection {
            no_access: base == PAGE_NOACCESS,
            read: base != PAGE_NOACCESS
                && (base == PAGE_READONLY
                    || base == PAGE_READWRITE
                    || base == PAGE_WRITECOPY
                    || base == PAGE_EXECUTE_READ
                    || base == PAGE_EXECUTE_READWRITE
                    || base == PAGE_EXECUTE_WRITECOPY),
            write: base == PAGE_READWRITE
                || base == PAGE_WRITECOPY
                || base == PAGE_EXECUTE_READWRITE
                || base == PAGE_EXECUTE_WRITECOPY,
            execute: base == PAGE_EXECUTE
                || base == PAGE_EXECUTE_READ
                || base == PAGE_EXECUTE_READWRITE
                || base == PAGE_EXECUTE_WRITECOPY,
            copy_on_write: base == PAGE_WRITECOPY || base == PAGE_EXECUTE_WRITECOPY,
            guarded: protect & PAGE_GUARD != 0,
            no_cache: protect & PAGE_NOCACHE != 0,
        }
    }
}

impl From<DWORD> for MemoryState {
    fn from(state: DWORD) -> Self {
        MemoryState {
            committed: state & MEM_COMMIT != 0,
            free: state & MEM_FREE != 0,
            reserved: state & MEM_RESERVE != 0,
        }
    }
}

impl From<DWORD> for MemoryType {
    fn from(type_: DWORD) -> Self {
        if type_ & MEM_IMAGE != 0 {
            MemoryType::Image
        } else if type_ & MEM_MAPPED != 0 {
            MemoryType::Mapped
        } else if type_ & MEM_PRIVATE != 0 {
            MemoryType::Private
        } else {
            MemoryType::Unknown
        }
    }
}

/// Opens a process for VM read/write/query, matching `memscan`'s access mask.
pub fn open_process(pid: u32) -> Option<ProcessHandleWin> {
    let handle = unsafe {
        OpenProcess(
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_VM_OPERATION,
            FALSE,
            pid,
        )
    };
    if handle.is_null() {
        None
    } else {
        Some(ProcessHandleWin(handle))
    }
}

/// Finds the first running process whose name starts with `name`
/// (case-insensitive), returning its pid.
pub fn find_process_by_name(name: &str) -> Option<u32> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        return None;
    }

    let mut entry: PROCESSENTRY32W = unsafe { mem::zeroed() };
    entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

    let needle = name.to_lowercase();
    let mut found = None;

    if unsafe { Process32FirstW(snapshot, &mut entry) } != FALSE {
        loop {
            let exe_name = wide_to_string(&entry.szExeFile);
            if exe_name.to_lowercase().starts_with(&needle) {
                found = Some(entry.th32ProcessID);
                break;
            }
            if unsafe { Process32NextW(snapshot, &mut entry) } == FALSE {
                break;
            }
        }
    }

    unsafe {
        CloseHandle(snapshot);
    }
    found
}

fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Enumerates the modules loaded by `process` (skipping the first, which is
/// the main executable image) and returns their address ranges as
/// [`MemoryRegion`]s tagged with their file path.
pub fn get_process_module_regions(process: &ProcessHandleWin) -> Vec<MemoryRegion> {
    const MAX_MODULES: usize = 1024;
    let mut modules: Vec<HMODULE> = vec![null_mut(); MAX_MODULES];
    let mut needed: DWORD = 0;

    let ok = unsafe {
        EnumProcessModules(
            process.0,
            modules.as_mut_ptr(),
            (modules.len() * mem::size_of::<HMODULE>()) as DWORD,
            &mut needed,
        )
    };
    if ok == FALSE {
        return Vec::new();
    }

    let count = (needed as usize / mem::size_of::<HMODULE>()).min(modules.len());
    let mut regions = Vec::new();

    for &module in modules.iter().take(count).skip(1) {
        let mut path_buf = [0i8; MAX_PATH];
        let len = unsafe {
            GetModuleFileNameExA(
                process.0,
                module,
                path_buf.as_mut_ptr(),
                path_buf.len() as DWORD,
            )
        };
        let path = if len > 0 {
            unsafe { CStr::from_ptr(path_buf.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        } else {
            String::new()
        };

        let mut info: MODULEINFO = unsafe { mem::zeroed() };
        let ok = unsafe {
            GetModuleInformation(
                process.0,
                module,
                &mut info,
                mem::size_of::<MODULEINFO>() as DWORD,
            )
        };
        if ok == FALSE {
            continue;
        }

        regions.push(MemoryRegion {
            base_address: info.lpBaseOfDll as usize,
            size: info.SizeOfImage as usize,
            protect: MemoryProtection {
                read: true,
                execute: true,
                ..Default::default()
            },
            state: MemoryState {
                committed: true,
                ..Default::default()
            },
            type_: MemoryType::Image,
            image_file: if path.is_empty() { None } else { Some(path) },
        });
    }

    regions
}

/// Queries host system parameters via `GetSystemInfo`.
pub fn query_system_info() -> SystemInfo {
    let mut info = unsafe { mem::zeroed() };
    unsafe {
        GetSystemInfo(&mut info);
    }
    SystemInfo {
        min_app_addr: info.lpMinimumApplicationAddress as usize,
        max_app_addr: info.lpMaximumApplicationAddress as usize,
        granularity: info.dwAllocationGranularity as usize,
        page_size: info.dwPageSize as usize,
    }
}

fn query_region_raw(process: &ProcessHandleWin, addr: usize) -> Option<MemoryRegion> {
    let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };
    let written = unsafe {
        VirtualQueryEx(
            process.0,
            addr as *const _,
            &mut mbi,
            mem::size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };
    if written == 0 {
        return None;
    }
    Some(MemoryRegion {
        base_address: mbi.BaseAddress as usize,
        size: mbi.RegionSize,
        protect: MemoryProtection::from(mbi.Protect),
        state: MemoryState::from(mbi.State),
        type_: MemoryType::from(mbi.Type),
        image_file: None,
    })
}

fn read_process_memory_raw(process: &ProcessHandleWin, addr: usize, len: usize) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut read = 0usize;
    let ok = unsafe {
        ReadProcessMemory(
            process.0,
            addr as *const _,
            buf.as_mut_ptr() as *mut _,
            len,
            &mut read,
        )
    };
    if ok == FALSE {
        return None;
    }
    buf.truncate(read);
    Some(buf)
}

fn write_process_memory_raw(process: &ProcessHandleWin, addr: usize, bytes: &[u8]) -> bool {
    let mut written = 0usize;
    let ok = unsafe {
        WriteProcessMemory(
            process.0,
            addr as *mut _,
            bytes.as_ptr() as *const _,
            bytes.len(),
            &mut written,
        )
    };
    ok != FALSE && written == bytes.len()
}

fn virtual_alloc_ex(process: &ProcessHandleWin, hint: usize, size: usize, executable: bool) -> usize {
    let protect = if executable {
        PAGE_EXECUTE_READWRITE
    } else {
        PAGE_READWRITE
    };
    let addr = unsafe {
        VirtualAllocEx(
            process.0,
            hint as *mut _,
            size,
            MEM_COMMIT | MEM_RESERVE,
            protect,
        )
    };
    addr as usize
}

fn virtual_free_ex(process: &ProcessHandleWin, addr: usize) -> bool {
    let ok = unsafe { VirtualFreeEx(process.0, addr as *mut _, 0, MEM_RELEASE) };
    ok != FALSE
}

impl MemoryBridge for ProcessHandleWin {
    fn read_memory(&self, addr: usize, len: usize) -> Option<Vec<u8>> {
        read_process_memory_raw(self, addr, len)
    }

    fn write_memory(&self, addr: usize, bytes: &[u8]) -> bool {
        write_process_memory_raw(self, addr, bytes)
    }

    fn query_region(&self, addr: usize) -> Option<MemoryRegion> {
        query_region_raw(self, addr)
    }

    fn alloc(&self, hint: usize, size: usize, executable: bool) -> usize {
        virtual_alloc_ex(self, hint, size, executable)
    }

    fn free(&self, addr: usize) -> bool {
        virtual_free_ex(self, addr)
    }

    fn system_info(&self) -> SystemInfo {
        query_system_info()
    }
}
