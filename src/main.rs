use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tetris_isa::{
    emu::emulator::{parse_program, EmuConfig, EmuState, Emulator, DEFAULT_TEXT_BASE},
    emu::ram::{DEFAULT_DATA_BASE, DEFAULT_DATA_SIZE},
    plat::catalog::Catalog,
};

#[derive(Parser)]
#[command(name = "tetris-isa", about = "Run programs for the Tetris instruction set")]
struct Cli {
    /// Log every executed instruction.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program (one hex instruction word per line).
    Run {
        program: PathBuf,

        /// Random seed for `drop`, for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,

        /// Address the program is loaded at.
        #[arg(long, default_value_t = DEFAULT_TEXT_BASE, value_parser = parse_u32)]
        text_base: u32,

        /// Base address of data memory.
        #[arg(long, default_value_t = DEFAULT_DATA_BASE, value_parser = parse_u32)]
        data_base: u32,

        /// Size of data memory in bytes.
        #[arg(long, default_value_t = DEFAULT_DATA_SIZE, value_parser = parse_u32)]
        data_size: u32,

        /// Stop after this many instructions.
        #[arg(long)]
        max_steps: Option<u64>,

        /// Start paused in the debugger.
        #[arg(long)]
        debug: bool,
    },
    /// Disassemble a program.
    Disasm { program: PathBuf },
    /// List every instruction and its encoding.
    Catalog,
}

/// Accepts decimal or `0x`-prefixed hexadecimal.
fn parse_u32(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("invalid number `{s}`: {e}"))
}

fn load(path: &Path) -> Result<Vec<u32>> {
    let listing = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_program(&listing).with_context(|| format!("cannot load {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        simplelog::LevelFilter::Trace
    } else if cli.quiet {
        simplelog::LevelFilter::Warn
    } else if cfg!(debug_assertions) {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let catalog = Catalog::new()?;
    match cli.command {
        Command::Run {
            program,
            seed,
            text_base,
            data_base,
            data_size,
            max_steps,
            debug,
        } => {
            let config = EmuConfig {
                text_base,
                data_base,
                data_size,
                seed,
                max_steps,
            };
            let mut emu = Emulator::new(&catalog, load(&program)?, config);
            if debug {
                emu.state = EmuState::Pause;
            }
            emu.run_while_continue()?;
        }
        Command::Disasm { program } => {
            for (i, word) in load(&program)?.into_iter().enumerate() {
                let address = DEFAULT_TEXT_BASE + 4 * i as u32;
                match catalog.resolve(word) {
                    Ok(instr) => println!("{address:08x}:  {word:08x}  {}", catalog.render(&instr)),
                    Err(e) => println!("{address:08x}:  {word:08x}  ; {e}"),
                }
            }
        }
        Command::Catalog => {
            for desc in catalog.descriptors() {
                println!(
                    "{:<12} {:<40} {}",
                    desc.mnemonic.name(),
                    desc.mnemonic.template(),
                    desc.mnemonic.description()
                );
            }
        }
    }
    Ok(())
}
