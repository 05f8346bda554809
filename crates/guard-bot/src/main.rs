//! Trade guard operator binary - Entry Point
//!
//! evaluate: decide JSON or JSON Lines inputs from a file or stdin
//! info: validators, health and effective configuration
//! demo: built-in sample evaluations

use anyhow::Result;
use clap::{Parser, Subcommand};
use guard_bot::app::write_decision;
use guard_bot::{AppConfig, Application};
use guard_core::ConfigPreset;
use std::io::Write;
use tokio::io::BufReader;
use tracing::{info, warn};

/// Fail-closed trade authorization gate
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GUARD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the preset from the configuration file
    #[arg(long)]
    preset: Option<ConfigPreset>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a JSON document or JSON Lines file (`-` for stdin)
    Evaluate { path: String },
    /// Print validators, health and effective configuration
    Info,
    /// Evaluate built-in samples
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    guard_telemetry::init_logging()?;

    info!("Starting trade guard v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > GUARD_CONFIG > config/default.toml
    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    let app = Application::new(config, args.preset)?;
    let mut stdout = std::io::stdout().lock();

    match args.command {
        Command::Evaluate { path } if path == "-" => {
            let reader = BufReader::new(tokio::io::stdin());
            tokio::select! {
                result = app.evaluate_stream(reader, &mut stdout) => {
                    let count = result?;
                    info!(count, "Finished evaluating stdin");
                }
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping evaluation");
                }
            }
        }
        Command::Evaluate { path } => {
            let content = tokio::fs::read_to_string(&path).await?;
            let outputs = app.evaluate_str(&content);
            for output in &outputs {
                write_decision(&mut stdout, output)?;
            }
            info!(path = %path, count = outputs.len(), "Finished evaluating file");
        }
        Command::Info => {
            serde_json::to_writer_pretty(&mut stdout, &app.info()?)?;
            writeln!(stdout)?;
        }
        Command::Demo => {
            for output in app.demo() {
                info!("{}", output.format_summary());
                write_decision(&mut stdout, &output)?;
            }
        }
    }

    stdout.flush()?;
    app.shutdown()?;
    Ok(())
}
