//! Typed read/write, pointer-chain resolution, signature scanning and
//! code-cave installation for a foreign Windows process.
//!
//! The crate is organized around the seam in [`process::MemoryBridge`]:
//! [`session::Session`] is the real, `HANDLE`-backed implementation, while
//! the pointer resolver, typed I/O, scanner, and cave placement/patch
//! modules are written purely against that trait so they can be driven by
//! `testutil::FakeProcess` in tests without a live target process.

#[cfg(not(target_os = "windows"))]
compile_error!("memcave only supports Windows.");

pub mod address;
pub mod cave;
pub mod cli;
pub mod diagnostics;
pub mod patch;
pub mod pointer;
pub mod process;
pub mod scanner;
pub mod session;
pub mod typed_io;
pub mod windows;

#[cfg(test)]
pub(crate) mod testutil;
