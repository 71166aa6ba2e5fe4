//! Windows-specific implementation of the OS bridge (C1).

pub mod process;
