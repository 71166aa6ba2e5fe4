//! Code-cave installation and patch byte synthesis.
//!
//! A `0xE9` near jump plus a 4-byte little-endian signed displacement,
//! computed relative to the address immediately following the jump
//! instruction, with `0x90` (`NOP`) padding filling out any replaced bytes
//! beyond the 5-byte jump. The two writes happen in a fixed order — the
//! cave's contents are written before the donor site is patched to jump
//! into it, so a concurrent reader of the donor site never observes a jump
//! to not-yet-initialized memory.

use crate::cave;
use crate::diagnostics::Reporter;
use crate::process::{MemoryBridge, SystemInfo};

/// Opcode for a near, relative jump (`jmp rel32`).
const JMP_OPCODE: u8 = 0xE9;
const JMP_LEN: usize = 5;
const NOP: u8 = 0x90;

/// Default cave size when the caller does not request a specific one.
const DEFAULT_CAVE_SIZE: usize = 2048;

/// A code cave installed at `cave`, redirected to from `donor`.
#[derive(Debug, Clone, Copy)]
pub struct CodeCave {
    pub donor: usize,
    pub cave: usize,
    pub replaced_bytes: usize,
    pub installed: bool,
}

fn rel32(from_end: usize, to: usize) -> [u8; 4] {
    let disp = (to as i64 - from_end as i64) as i32;
    disp.to_le_bytes()
}

/// Builds the bytes written at the donor site: a jump to `cave`, followed by
/// `NOP` padding out to `replaced_bytes` (the number of original instruction
/// bytes being overwritten, which must be at least 5 to fit the jump).
pub fn assemble_donor_patch(donor: usize, cave: usize, replaced_bytes: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(replaced_bytes.max(JMP_LEN));
    bytes.push(JMP_OPCODE);
    bytes.extend_from_slice(&rel32(donor + JMP_LEN, cave));
    bytes.resize(replaced_bytes.max(JMP_LEN), NOP);
    bytes
}

/// Builds the bytes written into the cave itself: the caller's `payload`,
/// followed by a jump back to just past the patched donor bytes (when
/// `jump_back` is requested by the caller of [`install_cave`]).
pub fn assemble_cave_patch(cave: usize, payload: &[u8], donor: usize, donor_patch_len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + JMP_LEN);
    bytes.extend_from_slice(payload);
    bytes.push(JMP_OPCODE);
    let jump_source_end = cave + payload.len() + JMP_LEN;
    bytes.extend_from_slice(&rel32(jump_source_end, donor + donor_patch_len));
    bytes
}

/// Installs a code cave near `donor`: allocates (or reuses, per the
/// placement engine in [`cave`]) a block of executable memory within reach
/// of a `jmp rel32`, writes `payload` into it (with a trampoline jump back
/// to `donor + replaced_bytes` when `jump_back` is set), and only then
/// overwrites `replaced_bytes` at `donor` with a jump into the cave.
///
/// `replaced_bytes` must be at least 5 — the donor site's jump instruction
/// itself needs that many bytes — and any extra bytes are padded with
/// `NOP`. `size` is the cave's length; `0` uses a 2KiB default.
///
/// `reporter`, when present, is forwarded to the placement engine so its
/// retries are visible; pass `None` to install silently.
pub fn install_cave(
    bridge: &impl MemoryBridge,
    sys: &SystemInfo,
    donor: usize,
    payload: &[u8],
    replaced_bytes: usize,
    jump_back: bool,
    size: usize,
    reporter: Option<&Reporter>,
) -> CodeCave {
    if replaced_bytes < JMP_LEN {
        return CodeCave {
            donor,
            cave: 0,
            replaced_bytes,
            installed: false,
        };
    }

    let cave_size = if size == 0 { DEFAULT_CAVE_SIZE } else { size };
    let cave_addr = cave::create_cave(bridge, sys, donor, cave_size, reporter);
    if cave_addr == 0 {
        return CodeCave {
            donor,
            cave: 0,
            replaced_bytes,
            installed: false,
        };
    }

    let donor_patch = assemble_donor_patch(donor, cave_addr, replaced_bytes);

    let cave_write_ok = if jump_back {
        let cave_bytes = assemble_cave_patch(cave_addr, payload, donor, donor_patch.len());
        bridge.write_memory(cave_addr, &cave_bytes)
    } else if payload.is_empty() {
        true
    } else {
        bridge.write_memory(cave_addr, payload)
    };

    if !cave_write_ok {
        return CodeCave {
            donor,
            cave: cave_addr,
            replaced_bytes,
            installed: false,
        };
    }

    let installed = bridge.write_memory(donor, &donor_patch);
    CodeCave {
        donor,
        cave: cave_addr,
        replaced_bytes,
        installed,
    }
}

/// Releases a cave previously returned by [`install_cave`]. Does not restore
/// the donor site's original bytes — callers that need a full uninstall
/// must have kept a copy of them before patching.
pub fn free_cave(bridge: &impl MemoryBridge, cave_addr: usize) -> bool {
    bridge.free(cave_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeProcess;

    #[test]
    fn donor_patch_is_jump_plus_nop_padding() {
        let patch = assemble_donor_patch(0x1000, 0x2000, 8);
        assert_eq!(patch.len(), 8);
        assert_eq!(patch[0], JMP_OPCODE);
        let disp = i32::from_le_bytes([patch[1], patch[2], patch[3], patch[4]]);
        assert_eq!(disp, 0x2000 - (0x1000 + 5));
        assert_eq!(&patch[5..], &[NOP, NOP, NOP]);
    }

    #[test]
    fn donor_patch_refuses_replaced_bytes_shorter_than_jump() {
        // even if asked for 3, a jmp needs 5 — the patch is built at the
        // jump's own length, the caller-facing refusal happens in install_cave.
        let patch = assemble_donor_patch(0x1000, 0x2000, 3);
        assert_eq!(patch.len(), JMP_LEN);
    }

    #[test]
    fn cave_patch_ends_with_jump_back_to_donor() {
        let payload = [0x90, 0x90];
        let cave_patch = assemble_cave_patch(0x5000, &payload, 0x1000, 8);
        assert_eq!(&cave_patch[..2], &payload);
        assert_eq!(cave_patch[2], JMP_OPCODE);
        let jump_source_end = 0x5000 + 2 + 5;
        let disp = i32::from_le_bytes([cave_patch[3], cave_patch[4], cave_patch[5], cave_patch[6]]);
        assert_eq!(disp, (0x1000 + 8) - jump_source_end);
    }

    #[test]
    fn install_cave_writes_cave_before_donor() {
        let fp = FakeProcess::new();
        fp.declare_committed(0x1000_0000, 0x1000, &[]);
        fp.declare_free(0x1001_0000, 0x10_0000);
        let sys = fp.system_info();

        let cave = install_cave(&fp, &sys, 0x1000_0000, &[0x90, 0x90], 5, true, 0x100, None);
        assert!(cave.installed);
        assert_ne!(cave.cave, 0);

        let donor_bytes = fp.read_memory(cave.donor, 5).unwrap();
        assert_eq!(donor_bytes[0], JMP_OPCODE);

        let cave_bytes = fp.read_memory(cave.cave, 2).unwrap();
        assert_eq!(cave_bytes, vec![0x90, 0x90]);
    }

    #[test]
    fn install_cave_refuses_short_replaced_bytes() {
        let fp = FakeProcess::new();
        fp.declare_committed(0x1000_0000, 0x1000, &[]);
        fp.declare_free(0x1001_0000, 0x10_0000);
        let sys = fp.system_info();

        let cave = install_cave(&fp, &sys, 0x1000_0000, &[], 3, false, 0x100, None);
        assert!(!cave.installed);
        assert_eq!(cave.cave, 0);
    }

    #[test]
    fn free_cave_releases_allocation() {
        let fp = FakeProcess::new();
        fp.declare_committed(0x1000_0000, 0x1000, &[]);
        fp.declare_free(0x1001_0000, 0x10_0000);
        let sys = fp.system_info();

        let cave = install_cave(&fp, &sys, 0x1000_0000, &[0x90], 5, false, 0x100, None);
        assert!(cave.installed);
        assert!(free_cave(&fp, cave.cave));

        // spec.md §8 scenario 6: a subsequent read of the freed cave fails.
        assert_eq!(fp.read_memory(cave.cave, 16), None);
    }
}
