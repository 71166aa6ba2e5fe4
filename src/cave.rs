//! Code-cave placement: finding (or carving) a free block of the foreign
//! address space reachable from a donor instruction by a signed 32-bit
//! relative displacement.
//!
//! Walks free regions within ±2GiB of the donor, prefers the candidate
//! closest to the donor, aligns to allocation granularity, and on repeated
//! allocation failure widens the preferred address and tries again before
//! finally falling back to a non-executable allocation anywhere.

use crate::diagnostics::Reporter;
use crate::process::{MemoryBridge, SystemInfo};

/// A `jmp rel32` can only reach ±2GiB; search half that window on each side
/// of the donor so both directions stay within range after alignment.
const SEARCH_HALF_WINDOW: usize = 0x7000_0000;

/// Preferred-address retries before falling back to a non-executable
/// allocation anywhere in the address space.
const PLACEMENT_RETRIES: u32 = 10;

fn align_down(addr: usize, granularity: usize) -> usize {
    if granularity == 0 {
        addr
    } else {
        addr - (addr % granularity)
    }
}

fn align_up(addr: usize, granularity: usize) -> usize {
    if granularity == 0 {
        addr
    } else {
        let rem = addr % granularity;
        if rem == 0 {
            addr
        } else {
            addr + (granularity - rem)
        }
    }
}

/// Searches the free regions within reach of `donor` for the block closest
/// to it that can hold `size` bytes once aligned to the host's allocation
/// granularity, returning `0` if none is found.
///
/// Walks the address space with its own cursor, independent of
/// [`crate::process::RegionWalker`]: spec.md §4.6 step 7 rounds each
/// region's size up to the allocation granularity before advancing past it,
/// which is a different (coarser) advance rule than the scanner's raw,
/// unrounded walk over §4.5 — sharing one walker between the two would mean
/// one of them implements the wrong rule.
pub fn find_free_block_for_region(
    bridge: &impl MemoryBridge,
    sys: &SystemInfo,
    donor: usize,
    size: usize,
) -> usize {
    let lo = donor.saturating_sub(SEARCH_HALF_WINDOW).max(sys.min_app_addr);
    let hi = donor
        .saturating_add(SEARCH_HALF_WINDOW)
        .min(sys.max_app_addr);

    let mut best: usize = 0;
    let mut best_distance: i128 = i128::MAX;
    let mut cursor = lo;

    loop {
        let Some(region) = bridge.query_region(cursor) else {
            break;
        };
        if region.base_address > hi {
            break;
        }

        if region.state.free && region.size >= size {
            let mut candidate = align_up(region.base_address, sys.granularity);
            let mut candidate_valid = candidate + size <= region.end();

            if candidate_valid && candidate < donor {
                // Last-fit: start as close to the donor as the region allows.
                let max_start = region.end() - size;
                candidate = align_down(max_start, sys.granularity);
                candidate_valid =
                    candidate >= region.base_address && candidate + size <= region.end();
            } else if candidate_valid && candidate > donor {
                let aligned_donor = align_down(donor, sys.granularity);
                if aligned_donor >= region.base_address {
                    candidate = aligned_donor;
                }
            }

            if candidate_valid {
                let distance = (candidate as i128 - donor as i128).abs();
                if best == 0 || distance < best_distance {
                    best = candidate;
                    best_distance = distance;
                }
            }
        }

        // Round the region's size up to the allocation granularity before
        // advancing past it, per spec.md §4.6 step 7 — coarser than the
        // scanner's raw, unrounded region-to-region walk.
        let rounded_size = align_up(region.size.max(1), sys.granularity);
        let next_cursor = region.base_address.saturating_add(rounded_size);
        if next_cursor <= cursor || next_cursor >= hi {
            break;
        }
        cursor = next_cursor;
    }

    best
}

/// Allocates a `size`-byte executable cave reachable from `donor`, retrying
/// with a widened preferred address up to [`PLACEMENT_RETRIES`] times before
/// falling back to a non-executable allocation anywhere in the address
/// space. Returns `0` only if every attempt, including the fallback, fails.
///
/// `reporter`, when present, is told about each placement retry and about
/// the non-executable fallback; pass `None` to place a cave silently.
pub fn create_cave(
    bridge: &impl MemoryBridge,
    sys: &SystemInfo,
    donor: usize,
    size: usize,
    reporter: Option<&Reporter>,
) -> usize {
    let mut preferred = donor;

    for attempt in 1..=PLACEMENT_RETRIES {
        let hint = find_free_block_for_region(bridge, sys, preferred, size);
        if let Some(reporter) = reporter {
            reporter.info(format!(
                "cave placement attempt {attempt}/{PLACEMENT_RETRIES}: preferred {preferred:#x}, hint {hint:#x}"
            ));
        }
        let addr = bridge.alloc(hint, size, true);
        if addr != 0 {
            return addr;
        }
        preferred = preferred.wrapping_add(sys.granularity);
    }

    if let Some(reporter) = reporter {
        reporter.warn("executable cave allocation failed after all retries, falling back to non-executable memory");
    }
    bridge.alloc(0, size, false)
}
