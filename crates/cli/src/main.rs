//! Authflow CLI - Main Entry Point

use std::path::PathBuf;
use std::process::ExitCode;

use authflow_cli::commands::{self, decode, list, run};
use authflow_cli::output;
use clap::{Parser, Subcommand};

/// Authflow - browser-driven CAS/OIDC/SAML2 conformance harness
#[derive(Parser)]
#[command(name = "authflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file (TOML)
    #[arg(long, global = true, env = "AUTHFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios against the server under test
    Run(run::RunArgs),

    /// List discovered scenarios
    List(list::ListArgs),

    /// Decode a compact token and print its claims
    Decode(decode::DecodeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => {
            let config = commands::load_config(cli.config.as_deref())?;
            run::execute(args, config, cli.format).await
        }
        Commands::List(args) => {
            list::execute(args, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Decode(args) => {
            decode::execute(args, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
