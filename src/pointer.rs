//! Pointer-chain resolution.
//!
//! A chain is resolved hop by hop: the base address is dereferenced as a
//! machine word, each offset is added to the value just read, and that sum is
//! dereferenced again for the next hop. The load-bearing asymmetry: the final
//! hop's *address* is returned, not the value stored there — callers pass
//! that address on to the typed read/write layer.
//!
//! A read that fails partway through does not abort the chain: the resolver
//! keeps whatever value it last read and keeps walking with it, so a
//! transient failure on an early hop still produces a deterministic,
//! reproducible address rather than `0`.

use crate::process::MemoryBridge;

const WORD_SIZE: usize = size_of::<usize>();

fn read_word(bridge: &impl MemoryBridge, addr: usize) -> Option<usize> {
    let bytes = bridge.read_memory(addr, WORD_SIZE)?;
    if bytes.len() < WORD_SIZE {
        return None;
    }
    let mut buf = [0u8; WORD_SIZE];
    buf.copy_from_slice(&bytes[..WORD_SIZE]);
    Some(usize::from_le_bytes(buf))
}

/// Resolves `base_addr` through `offsets`, returning the address of the
/// final hop. An empty offset chain returns the value stored at `base_addr`
/// itself (there is no further hop to take its address of).
pub fn resolve(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64]) -> usize {
    let mut value = read_word(bridge, base_addr).unwrap_or(0);

    if offsets.is_empty() {
        return value;
    }

    let mut address = base_addr;
    for &offset in offsets {
        address = (value as i64).wrapping_add(offset) as usize;
        if let Some(word) = read_word(bridge, address) {
            value = word;
        }
    }
    address
}
