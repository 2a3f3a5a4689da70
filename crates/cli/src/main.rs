mod commands;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Akari invariant and causality engine toolchain.
#[derive(Parser)]
#[command(
    name = "akari",
    version,
    about = "Akari invariant and causality engine for container clusters"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the invariant catalog against a state event fixture
    Evaluate {
        /// Path to a JSON array of state events
        #[arg(long)]
        events: PathBuf,
        /// Only report violations at this severity (critical, degraded, warning)
        #[arg(long)]
        severity: Option<String>,
    },

    /// Explain the violations affecting one resource
    Explain {
        /// Path to a JSON array of state events
        #[arg(long)]
        events: PathBuf,
        /// Resource kind, e.g. Pod
        #[arg(long)]
        kind: String,
        /// Resource namespace; empty for cluster-scoped kinds
        #[arg(long, default_value = "")]
        namespace: String,
        /// Resource name
        #[arg(long)]
        name: String,
    },

    /// List the built-in invariants
    Invariants,

    /// Serve the HTTP JSON API
    Serve {
        /// Port to listen on (overridden by AKARI_ADDR)
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Preload a state event fixture before serving
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Evaluate { events, severity } => {
            commands::evaluate(&events, severity.as_deref(), cli.output)
        }
        Commands::Explain {
            events,
            kind,
            namespace,
            name,
        } => commands::explain(&events, &kind, &namespace, &name, cli.output),
        Commands::Invariants => commands::invariants(cli.output),
        Commands::Serve { port, events } => serve::run(port, events.as_deref()),
    };

    if let Err(err) = outcome {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
