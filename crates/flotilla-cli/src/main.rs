//! Flotilla CLI - layered Helm deployment orchestrator for Kubernetes platforms

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use commands::deploy::DeployArgs;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(author = "Flotilla Contributors")]
#[command(version)]
#[command(about = "Layered Helm deployment orchestrator for Kubernetes platforms", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (defaults to <config dir>/flotilla/config.yaml)
    #[arg(long, global = true, env = "FLOTILLA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the platform to an environment
    Deploy {
        /// Target environment (development, staging, production)
        environment: String,

        /// Override the environment's strategy (e.g. disaster-recovery)
        #[arg(long)]
        strategy: Option<String>,

        /// Simulate the rollout without changing the cluster
        #[arg(long)]
        dry_run: bool,

        /// Skip readiness waits and force resource updates
        #[arg(long)]
        force_update: bool,

        /// Install every chart into this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Print the run record as JSON
        #[arg(long)]
        json: bool,

        /// Write the run record to a JSON file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the layer plan for an environment
    Plan {
        /// Target environment (development, staging, production)
        environment: String,

        /// Override the environment's strategy
        #[arg(long)]
        strategy: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify an error message and show the recovery plan
    Classify {
        /// Error message to classify
        message: String,

        /// Operation that produced the error
        #[arg(long, default_value = "deploy")]
        operation: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the namespace topology of an environment
    Namespaces {
        /// Target environment (development, staging, production)
        environment: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run auto-recovery for one or more error messages
    Recover {
        /// Error messages to recover from
        #[arg(required = true)]
        messages: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Deploy {
            environment,
            strategy,
            dry_run,
            force_update,
            namespace,
            json,
            report,
        } => {
            commands::deploy::run(DeployArgs {
                environment,
                strategy,
                dry_run,
                force_update,
                namespace,
                config: cli.config.clone(),
                json,
                report,
            })
            .await
        }

        Commands::Plan {
            environment,
            strategy,
            json,
        } => commands::plan::run(&environment, strategy.as_deref(), config, json),

        Commands::Classify {
            message,
            operation,
            json,
        } => commands::classify::run(&message, &operation, json),

        Commands::Namespaces { environment, json } => {
            commands::namespaces::run(&environment, config, json)
        }

        Commands::Recover { messages, json } => {
            commands::recover::run(&messages, config, json).await
        }
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    std::process::exit(code);
}
