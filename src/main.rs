//! PDF Annotator MCP Server - Entry point
//!
//! Serves annotation extraction over MCP stdio, restricted to the accessible
//! directories given on the command line.

use clap::{Parser, ValueEnum};
use pdf_annotator_mcp::config::DEFAULT_MAX_FILE_SIZE;
use pdf_annotator_mcp::{run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(
    name = "pdf-annotator-mcp",
    version,
    about = "PDF Annotator MCP Server: annotation extraction limited to configured directories",
    after_help = "Examples:\n  pdf-annotator-mcp ~/Downloads ~/Documents\n  pdf-annotator-mcp --allow-dir ~/Work --allow-dir /shared/pdfs\n  pdf-annotator-mcp ~/Downloads --max-file-size 52428800 --log-level DEBUG"
)]
struct Cli {
    /// Accessible directories for PDFs (space-separated)
    directories: Vec<String>,

    /// Add an allowed directory (can be used multiple times)
    #[arg(long = "allow-dir", value_name = "DIR")]
    allow_dir: Vec<String>,

    /// Maximum file size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: u64,

    /// Logging level
    #[arg(long, value_enum, ignore_case = true, default_value = "INFO")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the MCP transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PDF Annotator MCP Server");

    let mut allowed_dirs = cli.directories;
    allowed_dirs.extend(cli.allow_dir);

    run_server_with_config(ServerConfig {
        allowed_dirs,
        max_file_size: cli.max_file_size,
    })
    .await
}
