//! Bracket-tagged, colored status reporting (C9, ambient).
//!
//! Grounded on the `println!("{} ...", "[info]".bright_cyan(), ...)` idiom
//! already used ad-hoc throughout `memscan`'s `main.rs` and
//! `libmemscan/src/scanner.rs`, formalized into one small [`Reporter`] so the
//! CLI and the library's own cave-placement/scan-progress diagnostics go
//! through the same palette instead of each module rolling its own
//! `println!`.

use owo_colors::OwoColorize;

/// Emits `[info]`/`[warn]`/`[error]`/`[done]` status lines to stdout, gated
/// by a verbosity level so callers that don't want chatter (library use, or
/// `-q`) can silence everything but errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    pub verbosity: u8,
}

impl Reporter {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.verbosity >= 1 {
            println!("{} {}", "[info]".bright_cyan(), msg.as_ref());
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        println!("{} {}", "[warn]".yellow(), msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        eprintln!("{} {}", "[error]".bright_red(), msg.as_ref());
    }

    pub fn done(&self, msg: impl AsRef<str>) {
        println!("{} {}", "[done]".bright_cyan(), msg.as_ref());
    }
}
