#[cfg(not(target_os = "windows"))]
compile_error!("This program only supports Windows.");

use anyhow::{bail, Context};
use clap::Parser;
use owo_colors::OwoColorize;

use memcave::address::{parse_address, parse_hex_bytes, parse_offsets};
use memcave::cli::{CaveCommand, Cli, Command};
use memcave::diagnostics::Reporter;
use memcave::process::MemoryBridge;
use memcave::session::Session;
use memcave::{patch, pointer, scanner};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let reporter = Reporter::new(cli.verbose.max(1));

    match cli.command {
        Command::Scan { target, pattern } => run_scan(&reporter, &target, &pattern),
        Command::Resolve {
            target,
            base,
            offsets,
        } => run_resolve(&reporter, &target, &base, offsets.as_deref()),
        Command::Cave(cave_cmd) => run_cave(&reporter, cave_cmd),
    }
}

fn attach(reporter: &Reporter, target: &str) -> anyhow::Result<Session> {
    reporter.info(format!("looking up process: {target}"));
    let mut session = Session::new();
    if !session.attach(target) {
        bail!("process '{target}' not found or could not be opened");
    }
    reporter.info(format!(
        "attached pid={} modules={}",
        session.pid().unwrap_or(0),
        session.modules().len()
    ));
    Ok(session)
}

fn run_scan(reporter: &Reporter, target: &str, pattern: &str) -> anyhow::Result<()> {
    let session = attach(reporter, target)?;
    let bytes = parse_hex_bytes(pattern).context("invalid --pattern")?;

    reporter.info(format!("scanning for {} byte pattern", bytes.len()));
    let hits = scanner::scan_memory(&session, &bytes, 0, Some(reporter));

    if hits.is_empty() {
        reporter.warn("no matches found");
    } else {
        for addr in &hits {
            println!("{} {:016x}", "match".bright_green(), addr);
        }
        reporter.done(format!("{} match(es)", hits.len()));
    }
    Ok(())
}

fn run_resolve(
    reporter: &Reporter,
    target: &str,
    base: &str,
    offsets: Option<&str>,
) -> anyhow::Result<()> {
    let session = attach(reporter, target)?;
    let base_addr = parse_address(base, session.modules()).context("invalid base address")?;
    let offsets = offsets.map(parse_offsets).transpose()?.unwrap_or_default();

    let resolved = pointer::resolve(&session, base_addr, &offsets);
    println!("{} {:016x}", "resolved".bright_green(), resolved);
    Ok(())
}

fn run_cave(reporter: &Reporter, cmd: CaveCommand) -> anyhow::Result<()> {
    match cmd {
        CaveCommand::Install {
            target,
            donor,
            payload,
            replaced_bytes,
            jump_back,
            size,
        } => {
            let session = attach(reporter, &target)?;
            let donor_addr =
                parse_address(&donor, session.modules()).context("invalid donor address")?;
            let payload_bytes = parse_hex_bytes(&payload).context("invalid --payload")?;
            let sys = session.system_info();

            let result = patch::install_cave(
                &session,
                &sys,
                donor_addr,
                &payload_bytes,
                replaced_bytes,
                jump_back,
                size,
                Some(reporter),
            );

            if result.installed {
                reporter.done(format!(
                    "cave installed at {:016x}, donor {:016x} redirected",
                    result.cave, result.donor
                ));
            } else {
                reporter.error("cave installation failed");
            }
        }
        CaveCommand::Free { target, cave: cave_addr } => {
            let session = attach(reporter, &target)?;
            let addr = usize::from_str_radix(cave_addr.trim(), 16).context("invalid cave address")?;
            if patch::free_cave(&session, addr) {
                reporter.done(format!("cave {addr:016x} freed"));
            } else {
                reporter.error("failed to free cave");
            }
        }
    }
    Ok(())
}
