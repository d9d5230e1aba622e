//! Parley application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Connect the HTTP backend
//! 4. Run the interactive loop on stdin

mod cli;
mod repl;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_client::HttpBackend;
use parley_core::ParleyConfig;

use crate::cli::CliArgs;
use crate::repl::{Command, Repl, Reply};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);
    config.backend.base_url = args.resolve_base_url(&config.backend.base_url);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Backend.
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    tracing::info!(base_url = %backend.base_url(), "Chat backend configured");

    let repl = Repl::new(backend);
    println!("{}", repl::HELP);

    if let Some(email) = args.email {
        if let Reply::Print(lines) = repl.handle(Command::Login(email)).await {
            print_lines(&lines);
        }
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", repl.prompt());
        std::io::stdout().flush()?;

        let Some(line) = input.next_line().await? else {
            break;
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        match repl.handle(command).await {
            Reply::Print(lines) => print_lines(&lines),
            Reply::Quit => break,
        }
    }

    tracing::info!("Parley stopped");
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
