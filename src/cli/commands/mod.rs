//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cancel;
mod ocr;
mod serve;
mod worker;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "pageocr")]
#[command(about = "Page-granular, cancellable document OCR service")]
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
    /// Start the HTTP server
    Serve {
        /// Address to bind (port, host, or host:port)
        #[arg(short, long)]
        bind: Option<String>,
        /// OCR workers to run inside the server process (0 = none)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run OCR workers against the shared Redis queue
    Worker {
        /// Jobs to run concurrently
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
    },

    /// OCR a local file with a progress bar
    Ocr {
        /// PDF or image file
        file: PathBuf,
        /// Write the formatted result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Request cancellation of a running job
    Cancel {
        /// Task id returned by the upload endpoint
        task_id: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, _config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Serve { bind, workers } => serve::cmd_serve(&settings, bind, workers).await,
        Commands::Worker { concurrency } => worker::cmd_worker(&settings, concurrency).await,
        Commands::Ocr { file, output } => ocr::cmd_ocr(&settings, &file, output).await,
        Commands::Cancel { task_id } => cancel::cmd_cancel(&settings, &task_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["pageocr", "-v", "serve", "--bind", "9000", "--workers", "0"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve { bind, workers } => {
                assert_eq!(bind.as_deref(), Some("9000"));
                assert_eq!(workers, Some(0));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_ocr_with_global_config() {
        let cli = Cli::try_parse_from(["pageocr", "ocr", "scan.pdf", "-o", "out.html", "--config", "p.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("p.toml")));
        assert!(matches!(cli.command, Commands::Ocr { .. }));
    }

    #[test]
    fn test_cancel_requires_task_id() {
        assert!(Cli::try_parse_from(["pageocr", "cancel"]).is_err());
    }
}
