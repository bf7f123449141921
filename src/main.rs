mod logging;

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use flexi_logger::FlexiLoggerError;
use riscv_hart::{
    Hart, HartConfig, HartError, Ram, Simulation,
    config::{ConfigError, load_csr_values},
    isa::riscv::observer::InstructionLogger,
    load::{load_bin, load_elf},
    ram_config,
};
use thiserror::Error;

use crate::logging::LogLevel;

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
enum TargetFormat {
    Auto,
    Elf,
    Bin,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the workload (elf/bin).
    path: PathBuf,

    /// Specify workload file format.
    #[arg(value_enum, short, long, default_value_t = TargetFormat::Auto)]
    format: TargetFormat,

    /// ISA string, e.g. rv64gc or rv32imac_zicsr.
    #[arg(long, default_value = "rv64imafdc_zicsr_zifencei")]
    isa: String,

    /// JSON list of initial register values: [{"name": "mtvec", "value": "0x80000000"}].
    #[arg(long = "csr-values")]
    csr_values: Option<PathBuf>,

    /// Stop after this many retired instructions.
    #[arg(long)]
    ilimit: Option<u64>,

    #[arg(long = "hart-id", default_value_t = 0)]
    hart_id: u64,

    /// Log every executed instruction (target `inst`, info level).
    #[arg(short, long, default_value_t = false)]
    trace: bool,

    /// Switch log level.
    #[arg(value_enum, long = "loglevel", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hart(#[from] HartError),
    #[error("logger: {0}")]
    Logger(#[from] FlexiLoggerError),
}

fn load_workload(args: &Args, ram: &mut Ram) -> Result<u64, ConfigError> {
    let bytes = std::fs::read(&args.path).map_err(|source| ConfigError::Io {
        path: args.path.display().to_string(),
        source,
    })?;
    let is_elf = bytes.starts_with(b"\x7fELF");
    match (args.format, is_elf) {
        (TargetFormat::Elf, _) | (TargetFormat::Auto, true) => load_elf(ram, &bytes),
        _ => load_bin(ram, &bytes),
    }
}

fn run(args: &Args) -> Result<u64, CliError> {
    let mut ram = Ram::new(ram_config::BASE_ADDR, ram_config::SIZE);
    let entry = load_workload(args, &mut ram)?;

    let csr_values = match &args.csr_values {
        Some(path) => load_csr_values(path)?,
        None => vec![],
    };
    let config = HartConfig::new()
        .with_isa(args.isa.as_str())
        .with_hart_id(args.hart_id)
        .with_reset_pc(entry)
        .with_csr_values(csr_values);
    log::info!("{config}");

    let mut hart = Hart::new(config, Box::new(ram))?;
    if args.trace {
        hart.add_observer(Box::new(InstructionLogger::new()))?;
    }

    let mut sim = Simulation::new();
    if let Some(limit) = args.ilimit {
        sim = sim.with_ilimit(limit);
    }
    sim.add_hart(hart);
    let report = sim.run()?;
    println!("{report}");
    Ok(report.exit_codes.first().map_or(0, |&(_, code)| code))
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _logger_handle = match logging::init(args.log_level) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", CliError::from(e));
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error occurred while running simulation: {e}");
            ExitCode::FAILURE
        }
    }
}
