use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tscmd_commands::REGISTRY;
use tscmd_core::{CommandPhase, OutcomeState};

mod config;
mod logging;

use config::WorkflowConfig;
use logging::LogFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run table and time series command workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter directive, e.g. "debug" or "tscmd_commands=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every command in a workflow file
    Run {
        workflow: PathBuf,
        /// Stop after the discovery pass
        #[arg(long)]
        discovery_only: bool,
        /// Print every table left in the processor
        #[arg(long)]
        show_tables: bool,
    },
    /// Check command parameters without running anything
    Check { workflow: PathBuf },
    /// List the available commands
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.log_level.as_deref(), cli.log_format, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run {
            workflow,
            discovery_only,
            show_tables,
        } => run(&workflow, discovery_only, show_tables),
        Commands::Check { workflow } => check(&workflow),
        Commands::List => {
            for (name, description) in REGISTRY.iter() {
                println!("{name:<22} {description}");
            }
            Ok(())
        }
    }
}

fn run(workflow: &Path, discovery_only: bool, show_tables: bool) -> Result<()> {
    let config = WorkflowConfig::load(workflow)?;
    let mut commands = config.build_commands(&REGISTRY)?;
    let mut processor = config.processor();
    tracing::info!(workflow = %workflow.display(), commands = commands.len(), "running workflow");

    let summary = processor.run_commands(&mut commands, config.run_options(discovery_only));
    for label in &summary.discovered {
        println!("discovered {label}");
    }
    for outcome in &summary.outcomes {
        match &outcome.message {
            Some(message) => println!("{}: {} ({message})", outcome.command, outcome.state),
            None => println!("{}: {}", outcome.command, outcome.state),
        }
    }
    if show_tables {
        for table in processor.tables() {
            println!("{}", table.to_pretty_string());
        }
    }

    let failed = summary.count(OutcomeState::Failure) + summary.count(OutcomeState::InvalidParameters);
    if failed > 0 {
        bail!("{failed} command(s) failed");
    }
    Ok(())
}

fn check(workflow: &Path) -> Result<()> {
    let config = WorkflowConfig::load(workflow)?;
    let mut commands = config.build_commands(&REGISTRY)?;
    let mut invalid = 0;
    for command in commands.iter_mut() {
        match command.check_parameters() {
            Ok(()) => println!("{}: ok", command.name()),
            Err(_) => {
                invalid += 1;
                println!("{}: invalid parameters", command.name());
                for message in command.status().messages(CommandPhase::Initialization) {
                    println!("  {} {}", message.severity, message.message);
                }
            }
        }
    }
    if invalid > 0 {
        bail!("{invalid} command(s) have invalid parameters");
    }
    Ok(())
}
