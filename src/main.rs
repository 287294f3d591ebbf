use clap::{ArgAction, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};

use virtual_sensor_env::config::{load_config, Runtime, SystemConfig};
use virtual_sensor_env::control::LineTriggerSource;
use virtual_sensor_env::ipc::WriterSink;
use virtual_sensor_env::orchestrator::{resolve_catalog, Orchestrator};
use virtual_sensor_env::sensor::EmitMode;
use virtual_sensor_env::SensorResult;

#[derive(Parser)]
#[command(name = "virtual-sensors")]
#[command(about = "Virtual IoT sensor environment - correlated telemetry with periodic or triggered publishing", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sensors; read trigger codes from stdin until -1
    Run {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "config/sensors.toml")]
        config: PathBuf,
        /// Publish destination: "stdout" or a file path (overrides the config)
        #[arg(short, long)]
        output: Option<String>,
        /// Base topic for every subtopic (overrides the config)
        #[arg(long)]
        base_topic: Option<String>,
        /// Concurrency model (overrides the config)
        #[arg(long, value_enum)]
        runtime: Option<Runtime>,
    },
    /// Resolve the catalog and show each sensor's parameters
    Check {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "config/sensors.toml")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).init();

    let result = match cli.command {
        Commands::Run { config, output, base_topic, runtime } => {
            load_config(&config).and_then(|mut cfg| {
                if let Some(output) = output {
                    cfg.sink.output = output;
                }
                if let Some(base_topic) = base_topic {
                    cfg.sink.base_topic = base_topic;
                }
                if let Some(runtime) = runtime {
                    cfg.settings.runtime = runtime;
                }
                run(cfg)
            })
        }
        Commands::Check { config } => load_config(&config).map(|cfg| check(&cfg)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "aborting");
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: SystemConfig) -> SensorResult<ExitCode> {
    info!(output = %cfg.sink.output, base_topic = %cfg.sink.base_topic, "connecting to the sink");
    let sink = WriterSink::connect(&cfg.sink.output)?;

    let orchestrator = Orchestrator::from_config(&cfg, Arc::new(sink));
    let stdin = io::stdin();
    let mut source = LineTriggerSource::with_prompt(stdin.lock(), io::stderr());

    let report = orchestrator.run(&cfg.channels, &cfg.types, &mut source)?;

    for channel in &report.shutdown.channels {
        info!(channel = %channel.name, id = channel.id, published = channel.published, failed = channel.failed, "sensor summary");
    }
    Ok(ExitCode::SUCCESS)
}

fn check(cfg: &SystemConfig) -> ExitCode {
    let resolved = resolve_catalog(&cfg.channels, &cfg.types);

    println!("{:<4} {:<12} {:<16} {:>10} {:>10} {:>9} {:>8}", "ID", "NAME", "MODE", "LOW", "HIGH", "FRACTION", "DECIMAL");
    for channel in &resolved.channels {
        let p = &channel.params;
        let mode = match p.mode() {
            EmitMode::Periodic(interval) => format!("every {:?}", interval),
            EmitMode::Triggered => format!("trigger code {}", channel.trigger_code()),
        };
        println!(
            "{:<4} {:<12} {:<16} {:>10} {:>10} {:>9} {:>8}",
            channel.id, channel.name, mode, p.low, p.high, p.fraction, p.decimal_places
        );
    }
    for rejected in &resolved.rejected {
        println!("{:<4} {:<12} REJECTED: {}", rejected.index, rejected.name, rejected.error);
    }

    if resolved.rejected.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
