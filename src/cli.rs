use clap::{builder::styling::AnsiColor, Parser, Subcommand, ValueHint};

/// memcave – inspect and patch another process's virtual memory.
#[derive(Parser, Debug)]
#[command(
    name = "memcave",
    bin_name = "memcave",
    about = "Read, resolve, scan, and patch a foreign Windows process's memory",
    version,
    propagate_version = true,
    arg_required_else_help = true,
    styles = clap::builder::Styles::styled()
        .header(AnsiColor::BrightYellow.on_default())
        .usage(AnsiColor::BrightYellow.on_default())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::BrightCyan.on_default())
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a process's memory for a byte pattern
    Scan {
        /// Target process executable name or id (e.g. "notepad", "notepad.exe", or 1234)
        target: String,

        /// Hex pattern to search for, space-separated bytes, `00` for a wildcard (e.g. "48 8B 05 00 00 00 00")
        #[arg(short, long, value_hint = ValueHint::Other)]
        pattern: String,
    },

    /// Resolve a base address (or module+offset) through a pointer chain
    Resolve {
        /// Target process executable name or id
        target: String,

        /// Base address in hex, or "module.dll+offset"
        base: String,

        /// Space-separated chain of signed hex offsets (e.g. "10 -8 1C")
        #[arg(short, long)]
        offsets: Option<String>,
    },

    /// Install or remove a code cave
    #[command(subcommand)]
    Cave(CaveCommand),
}

#[derive(Subcommand, Debug)]
pub enum CaveCommand {
    /// Install a cave reachable from a donor address, redirecting it there
    Install {
        /// Target process executable name or id
        target: String,

        /// Donor instruction address to redirect, in hex
        donor: String,

        /// Hex byte pattern to write into the cave (e.g. "90 90 90")
        #[arg(short, long)]
        payload: String,

        /// Number of donor bytes being overwritten (must be >= 5)
        #[arg(short, long)]
        replaced_bytes: usize,

        /// Append a trampoline jump back to just past the donor patch
        #[arg(short = 'j', long, default_value_t = true, action = clap::ArgAction::Set)]
        jump_back: bool,

        /// Cave size in bytes (0 = default 2KiB)
        #[arg(short, long, default_value_t = 0)]
        size: usize,
    },

    /// Free a previously installed cave
    Free {
        /// Target process executable name or id
        target: String,

        /// Cave address in hex, as reported by `cave install`
        cave: String,
    },
}
