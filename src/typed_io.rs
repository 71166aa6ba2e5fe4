//! Typed read/write over a foreign process.
//!
//! Every entry point enforces a low-memory guard: addresses below `0x10000`
//! are refused outright (this is the null-page plus the region Windows
//! reserves and will never back with a mapping), returning the type's
//! zero/empty value rather than attempting the I/O.

use crate::pointer;
use crate::process::MemoryBridge;

/// Below this address nothing is ever mapped; refuse the read/write rather
/// than round-tripping it through the OS only to have it fail.
pub const LOW_MEMORY_BOUND: usize = 0x10000;

fn guarded(addr: usize) -> bool {
    addr >= LOW_MEMORY_BOUND
}

/// Defines `read_T`/`write_T` over a direct address plus `read_T_chain`/
/// `write_T_chain` overloads that first resolve `base_addr` through an
/// offset chain before doing the same read/write, so every primitive type
/// gets both a direct-address and a pointer-chain entry point.
macro_rules! typed_rw {
    ($read:ident, $write:ident, $read_chain:ident, $write_chain:ident, $ty:ty, $size:expr) => {
        pub fn $read(bridge: &impl MemoryBridge, addr: usize) -> Option<$ty> {
            if !guarded(addr) {
                return None;
            }
            let bytes = bridge.read_memory(addr, $size)?;
            if bytes.len() < $size {
                return None;
            }
            let mut buf = [0u8; $size];
            buf.copy_from_slice(&bytes[..$size]);
            Some(<$ty>::from_le_bytes(buf))
        }

        pub fn $write(bridge: &impl MemoryBridge, addr: usize, value: $ty) -> bool {
            if !guarded(addr) {
                return false;
            }
            bridge.write_memory(addr, &value.to_le_bytes())
        }

        pub fn $read_chain(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64]) -> Option<$ty> {
            $read(bridge, pointer::resolve(bridge, base_addr, offsets))
        }

        pub fn $write_chain(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64], value: $ty) -> bool {
            $write(bridge, pointer::resolve(bridge, base_addr, offsets), value)
        }
    };
}

typed_rw!(read_i32, write_i32, read_i32_chain, write_i32_chain, i32, 4);
typed_rw!(read_i64, write_i64, read_i64_chain, write_i64_chain, i64, 8);
typed_rw!(read_f32, write_f32, read_f32_chain, write_f32_chain, f32, 4);
typed_rw!(read_f64, write_f64, read_f64_chain, write_f64_chain, f64, 8);

/// Reads an `f32` at `addr` and rounds it to `digits` decimal places using
/// round-half-to-even, matching IEEE 754 `roundTiesToEven` rather than the
/// naive "round half away from zero" a hand-rolled `* 10.0).round() / 10.0`
/// would give.
pub fn read_f32_rounded(bridge: &impl MemoryBridge, addr: usize, digits: u32) -> Option<f32> {
    let value = read_f32(bridge, addr)? as f64;
    let factor = 10f64.powi(digits as i32);
    Some(((value * factor).round_ties_even() / factor) as f32)
}

/// Chain-resolving counterpart of [`read_f32_rounded`].
pub fn read_f32_rounded_chain(
    bridge: &impl MemoryBridge,
    base_addr: usize,
    offsets: &[i64],
    digits: u32,
) -> Option<f32> {
    read_f32_rounded(bridge, pointer::resolve(bridge, base_addr, offsets), digits)
}

/// Reads `len` raw bytes at `addr`, returning an empty vector if the address
/// is below the low-memory bound or the read fails outright.
pub fn read_bytes(bridge: &impl MemoryBridge, addr: usize, len: usize) -> Vec<u8> {
    if !guarded(addr) {
        return Vec::new();
    }
    bridge.read_memory(addr, len).unwrap_or_default()
}

/// Chain-resolving counterpart of [`read_bytes`].
pub fn read_bytes_chain(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64], len: usize) -> Vec<u8> {
    read_bytes(bridge, pointer::resolve(bridge, base_addr, offsets), len)
}

/// Writes `bytes` at `addr`. Returns `false` if the address is below the
/// low-memory bound or the write did not fully succeed.
pub fn write_bytes(bridge: &impl MemoryBridge, addr: usize, bytes: &[u8]) -> bool {
    guarded(addr) && bridge.write_memory(addr, bytes)
}

/// Chain-resolving counterpart of [`write_bytes`].
pub fn write_bytes_chain(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64], bytes: &[u8]) -> bool {
    write_bytes(bridge, pointer::resolve(bridge, base_addr, offsets), bytes)
}

/// Reads `len` bytes at `addr` and decodes them as a UTF-8 string
/// (lossily, replacing invalid sequences). When `zero_terminated` is set,
/// the string is truncated at the first NUL byte.
pub fn read_string(bridge: &impl MemoryBridge, addr: usize, len: usize, zero_terminated: bool) -> String {
    let bytes = read_bytes(bridge, addr, len);
    let bytes = if zero_terminated {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        &bytes[..end]
    } else {
        &bytes[..]
    };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Chain-resolving counterpart of [`read_string`].
pub fn read_string_chain(
    bridge: &impl MemoryBridge,
    base_addr: usize,
    offsets: &[i64],
    len: usize,
    zero_terminated: bool,
) -> String {
    read_string(bridge, pointer::resolve(bridge, base_addr, offsets), len, zero_terminated)
}

/// Reads `n_bytes` at `addr` and unpacks them into a little-endian bit
/// sequence (`bits[0]` is the least significant bit of the first byte).
pub fn read_bits(bridge: &impl MemoryBridge, addr: usize, n_bytes: usize) -> Vec<bool> {
    let bytes = read_bytes(bridge, addr, n_bytes);
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for i in 0..8 {
            bits.push(byte & (1 << i) != 0);
        }
    }
    bits
}

/// Chain-resolving counterpart of [`read_bits`].
pub fn read_bits_chain(bridge: &impl MemoryBridge, base_addr: usize, offsets: &[i64], n_bytes: usize) -> Vec<bool> {
    read_bits(bridge, pointer::resolve(bridge, base_addr, offsets), n_bytes)
}
