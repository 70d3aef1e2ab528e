mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wd42_core::{Config, DEFAULT_PROCESS_NAME};

use crate::commands::hex_utils::parse_hex_address;

#[derive(Parser)]
#[command(name = "wd42")]
#[command(about = "External entity reader and ESP overlay for Minecraft: Java Edition")]
struct Args {
    /// Attach to this process id instead of searching by name
    #[arg(long, global = true)]
    pid: Option<u32>,

    /// Executable name to attach to
    #[arg(long, global = true, default_value = DEFAULT_PROCESS_NAME)]
    process: String,

    #[arg(short, long, global = true, default_value = "wd42.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the target for a byte pattern ("48 8B 05 ?? ?? ?? ??")
    Scan {
        pattern: String,

        /// Scan only this window instead of the whole address space (hex)
        #[arg(long, value_parser = parse_hex_address)]
        start: Option<u64>,

        /// Window size in bytes, used with --start
        #[arg(long, default_value = "0x10000", value_parser = parse_hex_address)]
        size: u64,

        /// Resolve each hit as a RIP-relative instruction with the displacement at this offset
        #[arg(long)]
        disp_offset: Option<u64>,

        #[arg(long, default_value_t = 7)]
        instr_len: u64,

        /// Dereference each resolved address once
        #[arg(long)]
        deref: bool,
    },

    /// Resolve a RIP-relative operand at an instruction address
    Rip {
        #[arg(value_parser = parse_hex_address)]
        address: u64,

        #[arg(long, default_value_t = 3)]
        disp_offset: u64,

        #[arg(long, default_value_t = 7)]
        instr_len: u64,
    },

    /// Scan for known class-name strings
    Strings,

    /// Walk the configured pointer chain once and print every step
    Chain,

    /// Read entities continuously until Ctrl+C
    Read {
        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,

        /// Also run the class-name string scan once
        #[arg(long)]
        strings: bool,
    },

    /// Run the reader and renderer, printing each frame's draw commands
    Esp {
        #[arg(long, default_value_t = 1920)]
        width: u32,

        #[arg(long, default_value_t = 1080)]
        height: u32,

        /// Size the overlay from this window's client area
        #[arg(long, conflicts_with_all = ["width", "height"])]
        window: Option<String>,
    },

    /// Dump memory at an address
    Hexdump {
        #[arg(value_parser = parse_hex_address)]
        address: u64,

        #[arg(long, default_value_t = 32)]
        size: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wd42=info".parse()?))
        .init();

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(c) => {
            info!("Loaded config from {:?}", args.config);
            c
        }
        Err(e) if e.is_not_found() => {
            debug!("No config at {:?}, using defaults", args.config);
            Config::default()
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    let target = commands::Target {
        pid: args.pid,
        process: &args.process,
    };

    match args.command {
        Command::Scan {
            pattern,
            start,
            size,
            disp_offset,
            instr_len,
            deref,
        } => {
            let window = start.map(|start| (start, size as usize));
            let resolve = disp_offset.map(|disp_offset| commands::scan::Resolve {
                disp_offset,
                instr_len,
                deref,
            });
            commands::scan::run(&target.open()?, &pattern, window, resolve)
        }
        Command::Rip {
            address,
            disp_offset,
            instr_len,
        } => commands::rip::run(&target.open()?, address, disp_offset, instr_len),
        Command::Strings => commands::strings::run(&target.open()?),
        Command::Chain => commands::chain::run(&target.open()?, &config),
        Command::Read { json, strings } => {
            commands::read::run(target.open()?, &config, json, strings)
        }
        Command::Esp {
            width,
            height,
            window,
        } => commands::esp::run(target.open()?, &config, width, height, window.as_deref()),
        Command::Hexdump { address, size } => {
            commands::hexdump::run(&target.open()?, address, size)
        }
    }
}
