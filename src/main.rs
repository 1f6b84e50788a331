//! memwatch - Live Memory Inspector
//!
//! Entry point that handles CLI argument parsing, target setup and mode
//! switching between headless CLI and GUI modes.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use memwatch::app::{parse_address, WatchSession};
use memwatch::config::EngineConfig;
use memwatch::core::{Debugger, ImageMemory, ProcessMemory};
use memwatch::schema::elf;
use memwatch::ui::cli::run_cli;
use memwatch::ui::gui::run_gui;

/// memwatch: watch a target's globals change, field by field
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Live process to attach to
    #[arg(short, long, conflicts_with = "image")]
    pid: Option<u32>,

    /// ELF binary providing the schema (globals and symbols)
    #[arg(short, long)]
    binary: Option<PathBuf>,

    /// Raw memory image to read instead of a live process
    #[arg(long)]
    image: Option<PathBuf>,

    /// Address the first byte of the image maps to
    #[arg(long, value_parser = address, default_value = "0")]
    image_base: u64,

    /// Added to every symbol address (PIE load bias)
    #[arg(long, value_parser = address, default_value = "0")]
    load_bias: u64,

    /// Run in headless mode (CLI only, no GUI)
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// GUI update tick interval for a running target, 0 disables polling
    #[arg(long, default_value_t = 250)]
    poll_ms: u64,

    /// Minimum interval between history generations
    #[arg(long)]
    history_cycle_ms: Option<u64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn address(s: &str) -> Result<u64, String> {
    parse_address(s).ok_or_else(|| format!("invalid address: {}", s))
}

/// Schema, reader and optional process control from the command line
fn build_session(args: &Args) -> anyhow::Result<(WatchSession, Option<Debugger>)> {
    let mut config = EngineConfig::default();
    if let Some(ms) = args.history_cycle_ms {
        config.history_cycle_ms = ms;
    }
    let mut session = WatchSession::new(config);

    if let Some(binary) = &args.binary {
        let (schema, summary) = elf::load_file(binary, args.load_bias)
            .with_context(|| format!("loading schema from {}", binary.display()))?;
        log::info!(
            "{}: {} globals in {} sections, {} functions",
            binary.display(),
            summary.globals,
            summary.sections,
            summary.functions
        );
        session.load_schema(schema);
    }

    let mut debugger = None;
    if let Some(pid) = args.pid {
        let mut dbg = Debugger::new();
        dbg.attach(pid)
            .with_context(|| format!("attaching to process {}", pid))?;
        let memory = ProcessMemory::open(pid)
            .with_context(|| format!("opening memory of process {}", pid))?;
        session.attach_reader(Box::new(memory));
        debugger = Some(dbg);
    } else if let Some(image) = &args.image {
        let memory = ImageMemory::from_file(image, args.image_base)
            .with_context(|| format!("reading image {}", image.display()))?;
        log::info!("{}: {} bytes at {:#x}", image.display(), memory.len(), args.image_base);
        session.attach_reader(Box::new(memory));
    }

    Ok((session, debugger))
}

/// Default log filter for a `-v` count
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> anyhow::Result<()> {
    // 1. Parse command line arguments
    let args = Args::parse();

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(args.verbose)),
    )
    .init();

    log::info!("memwatch initialized");
    log::debug!("Binary: {:?}", args.binary);
    log::debug!("Headless: {}", args.headless);
    log::debug!("Verbosity: {}", args.verbose);

    // 3. Attach the target
    let (session, debugger) = build_session(&args)?;

    // 4. Branch based on execution mode
    if args.headless {
        println!("[*] memwatch v{} - Headless Mode", env!("CARGO_PKG_VERSION"));
        run_cli(session, debugger)?;
    } else {
        println!("[*] memwatch v{} - GUI Mode", env!("CARGO_PKG_VERSION"));
        let poll = (args.poll_ms > 0).then(|| Duration::from_millis(args.poll_ms));
        run_gui(session, debugger, poll)?;
    }

    Ok(())
}
