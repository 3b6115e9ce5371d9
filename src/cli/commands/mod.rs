//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod run;
mod serve;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "vehinfo")]
#[command(about = "Batch vehicle registration lookup")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a batch of vehicle numbers and export the results
    Run {
        /// Vehicle numbers, comma or newline separated
        #[arg(short, long)]
        keys: Option<String>,
        /// CSV (vehicle_number column or first column) or TXT file of vehicle numbers
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// JSESSIONID of an authenticated browser session
        #[arg(short, long, env = "VEHINFO_SESSION_ID", hide_env_values = true)]
        session: Option<String>,
        /// Concurrent workers (1-10)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Delay in seconds before each request, per worker
        #[arg(short, long)]
        delay: Option<f64>,
        /// NIC number submitted with each lookup
        #[arg(long)]
        nic: Option<String>,
        /// Contact number submitted with each lookup
        #[arg(long)]
        contact: Option<String>,
        /// Directory for CSV/JSON results (default: configured results dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Start the web front end
    Serve {
        /// Address to bind: port, host, or host:port
        bind: Option<String>,
    },

    /// Check whether a session ID is accepted upstream
    CheckSession {
        /// JSESSIONID to check
        #[arg(short, long, env = "VEHINFO_SESSION_ID", hide_env_values = true)]
        session: Option<String>,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            keys,
            file,
            session,
            workers,
            delay,
            nic,
            contact,
            output_dir,
        } => {
            run::cmd_run(
                &settings,
                run::RunArgs {
                    keys,
                    file,
                    session,
                    workers,
                    delay,
                    nic,
                    contact,
                    output_dir,
                },
            )
            .await
        }
        Commands::Serve { bind } => serve::cmd_serve(settings, bind.as_deref()).await,
        Commands::CheckSession { session } => {
            session::cmd_check_session(&settings, session.as_deref()).await
        }
    }
}
