// Copyright 2026 Netsieve Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use netsieve::cli;

#[derive(Parser)]
#[command(
    name = "netsieve",
    about = "netsieve — capture the first matching network response from a rendered page",
    version,
    after_help = "Run 'netsieve <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP scrape API
    Serve {
        /// Listening port (overrides the PORT environment variable)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Capture a single response and print it
    Capture {
        /// Target page URL
        url: String,
        /// Pseudo file-extension to wait for (e.g. "json")
        waitfor: String,
        /// Navigation timeout in milliseconds (0 disables the bound)
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Maximum poll attempts before giving up
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("NETSIEVE_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("NETSIEVE_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("NETSIEVE_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("NETSIEVE_NO_COLOR", "1");
    }

    let result = match cli.command {
        Commands::Serve { port } => cli::serve_cmd::run(port).await,
        Commands::Capture {
            url,
            waitfor,
            timeout_ms,
            poll_interval_ms,
            max_attempts,
        } => cli::capture_cmd::run(&url, &waitfor, timeout_ms, poll_interval_ms, max_attempts).await,
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "netsieve", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
