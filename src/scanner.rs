//! Signature / array-of-bytes scanning.
//!
//! The region filter requires the region to be committed and its protection
//! to be genuinely readable — RW, RO, EXECUTE_READ, or EXECUTE_READWRITE —
//! and excludes guard pages and `PAGE_NOACCESS`.

use crate::diagnostics::Reporter;
use crate::process::{MemoryBridge, RegionWalker};

/// A pattern byte of `0x00` matches any byte in memory — the wildcard
/// sentinel for byte patterns.
const WILDCARD: u8 = 0x00;

fn wildcard_match(haystack: &[u8], pattern: &[u8]) -> bool {
    haystack
        .iter()
        .zip(pattern.iter())
        .all(|(&h, &p)| p == WILDCARD || h == p)
}

/// Linear scan for every offset in `haystack` where `pattern` matches, with
/// `0x00` pattern bytes acting as wildcards. Kept as a standalone, bridge-free
/// primitive (grounded on `libmemscan/src/scanner.rs`'s `naive_search`) so it
/// can be driven directly by microbenchmarks without standing up a fake
/// process.
pub fn naive_search(haystack: &[u8], pattern: &[u8]) -> Vec<usize> {
    if pattern.is_empty() || haystack.len() < pattern.len() {
        return Vec::new();
    }
    (0..=(haystack.len() - pattern.len()))
        .filter(|&i| wildcard_match(&haystack[i..i + pattern.len()], pattern))
        .collect()
}

/// Scans every committed, readable region from `start` to the top of the
/// address space for occurrences of `pattern` (where `0x00` bytes act as
/// wildcards), returning every matching start address. Overlapping matches
/// are all reported — a match's own start does not block a later match that
/// begins one byte after it.
///
/// `reporter`, when present, is told which region is being scanned as the
/// walk progresses; pass `None` to scan silently (as the unit/integration
/// tests do).
pub fn scan_memory(
    bridge: &impl MemoryBridge,
    pattern: &[u8],
    start: usize,
    reporter: Option<&Reporter>,
) -> Vec<usize> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let sys = bridge.system_info();
    let mut matches = Vec::new();

    for region in RegionWalker::new(bridge, start, sys.max_app_addr) {
        if let Some(reporter) = reporter {
            reporter.info(format!(
                "scanning region at {:#x} ({} bytes)",
                region.base_address, region.size
            ));
        }
        if !region.state.committed || !region.protect.is_scannable() {
            continue;
        }
        let Some(bytes) = bridge.read_memory(region.base_address, region.size) else {
            continue;
        };
        for offset in naive_search(&bytes, pattern) {
            matches.push(region.base_address + offset);
        }
    }

    matches
}
