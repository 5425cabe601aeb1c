use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sml::{InstructionRegistry, Machine, MachineConfig, Translator, logging};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SML stack machine programs", long_about = None)]
struct Args {
    /// Program file to execute
    script: PathBuf,

    /// Configuration file (defaults to <config dir>/sml/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Method to start execution from
    #[arg(long)]
    entry: Option<String>,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,

    /// Log translation and completion of the program
    #[arg(short, long)]
    verbose: bool,

    /// Print a numbered listing instead of running
    #[arg(long)]
    disasm: bool,

    /// With --disasm, emit the loaded program as JSON
    #[arg(long, requires = "disasm")]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.trace {
        Level::TRACE
    } else if args.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    logging::init(level);

    let mut config = MachineConfig::load(args.config.as_deref())?;
    if let Some(entry) = &args.entry {
        config = config.with_entry(entry);
    }

    let registry = InstructionRegistry::standard();
    let methods = Translator::new(&registry)
        .read_and_translate(&args.script)
        .with_context(|| format!("failed to translate {}", args.script.display()))?;
    info!(
        script = %args.script.display(),
        methods = methods.len(),
        "program translated"
    );

    if args.disasm {
        if args.json {
            let json = serde_json::to_string_pretty(&methods)
                .context("failed to serialise program")?;
            println!("{json}");
        } else {
            print!("{}", sml::disassemble(&methods));
        }
        return Ok(());
    }

    let mut machine = Machine::with_config(methods, config)
        .with_context(|| format!("failed to load {}", args.script.display()))?;
    machine
        .execute()
        .with_context(|| format!("failed to run {}", args.script.display()))?;
    info!("program finished");
    Ok(())
}
