// Copyright 2026 Reqtrack Contributors
// SPDX-License-Identifier: MIT

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use reqtrack_cli::cli::{self, TrackArgs};

#[derive(Parser)]
#[command(
    name = "reqtrack",
    about = "Discover the HTTP requests a web page issues or could issue",
    version,
    args_conflicts_with_subcommands = true,
    after_help = "Example: reqtrack -u https://app.example.com -o app.har"
)]
struct Cli {
    #[command(flatten)]
    track: TrackArgs,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "reqtrack", &mut std::io::stdout());
            Ok(())
        }
        None => {
            init_tracing(&cli.log_level, cli.log_json);
            cli::run::run(cli.track).await
        }
    };

    // 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    result
}
