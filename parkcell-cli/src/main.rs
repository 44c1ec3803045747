mod catalog;
mod handlers;
mod server;

#[cfg(test)]
mod server_test;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use parkcell_core::scheduler::SchedulerConfig;
use tracing_subscriber::EnvFilter;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(
    name = "parkcell",
    about = "Parkcell: parking reservation lifecycle and cell-state reconciliation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and the reconciliation loop
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3200")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "PARKCELL_STORAGE")]
        storage: String,

        /// Seconds between reconciliation passes
        #[arg(long, default_value = "30", env = "PARKCELL_RECONCILE_INTERVAL_SECS")]
        reconcile_interval_secs: u64,

        /// Upper bound in seconds on a single reconciliation pass
        #[arg(long, default_value = "10", env = "PARKCELL_RECONCILE_TIMEOUT_SECS")]
        reconcile_timeout_secs: u64,

        /// Maximum number of requests served concurrently
        #[arg(long, default_value = "64", env = "PARKCELL_MAX_CONCURRENCY")]
        max_concurrency: usize,

        /// JSON file with lots, cell types, customers and vehicles to load at startup
        #[arg(long, env = "PARKCELL_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// Run one reconciliation pass and print the report as JSON
    Reconcile {
        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "PARKCELL_STORAGE")]
        storage: String,

        /// JSON catalog to load before the pass
        #[arg(long, env = "PARKCELL_CATALOG")]
        catalog: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            port,
            host,
            storage,
            reconcile_interval_secs,
            reconcile_timeout_secs,
            max_concurrency,
            catalog,
        } => {
            server::run(server::ServeOptions {
                host,
                port,
                storage,
                scheduler: SchedulerConfig {
                    interval: Duration::from_secs(reconcile_interval_secs.max(1)),
                    pass_timeout: Duration::from_secs(reconcile_timeout_secs.max(1)),
                },
                max_concurrency: max_concurrency.max(1),
                catalog,
            })
            .await
        }
        Commands::Reconcile { storage, catalog } => reconcile_once(&storage, catalog.as_deref()),
        Commands::Version => {
            println!("parkcell {}", env!("CARGO_PKG_VERSION"));
            println!("Parking reservation lifecycle and cell-state reconciliation engine");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "parkcell failed");
            ExitCode::FAILURE
        }
    }
}

fn reconcile_once(storage: &str, catalog: Option<&std::path::Path>) -> Result<(), BoxError> {
    let mut client = server::create_client(storage)?;
    if let Some(path) = catalog {
        catalog::Catalog::load(path)?.apply(&mut client)?;
    }
    let report = client.reconcile()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
