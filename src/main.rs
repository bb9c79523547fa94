use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use magicc::{asm::Assembler, plat::OpcodeTable};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Assembler for the magick virtual machine.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Assembly source file.
    input: PathBuf,
    /// Where to write the program image. Defaults to standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Instruction set definition to use instead of the builtin one.
    #[arg(long, value_name = "FILE")]
    opcodes: Option<PathBuf>,
    /// Log more; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_opcodes(path: Option<&PathBuf>) -> Result<OpcodeTable> {
    let Some(path) = path else {
        return Ok(OpcodeTable::builtin()?);
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read instruction set {}", path.display()))?;
    OpcodeTable::from_definitions(&text)
        .with_context(|| format!("invalid instruction set {}", path.display()))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    TermLogger::init(
        match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let opcodes = load_opcodes(args.opcodes.as_ref())?;
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let name = args.input.display().to_string();

    let bin = match Assembler::new(&opcodes).assemble(&source) {
        Ok(bin) => bin,
        Err(e) => {
            eprintln!("{}", e.diagnostic(&name, &source));
            eprintln!("Compilation failed.");
            return Ok(ExitCode::FAILURE);
        }
    };

    match &args.output {
        Some(path) => fs::write(path, &bin)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bin)?;
            stdout.flush()?;
        }
    }
    log::info!("wrote {} bytes", bin.len());
    Ok(ExitCode::SUCCESS)
}
