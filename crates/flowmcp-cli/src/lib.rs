//! # Flowmcp CLI
//!
//! Command-line client for flowmcp servers. Subcommands mirror the RPC
//! surface: `info`, `tools list|call`, `resources list|templates|describe|
//! read`, `prompts list|get`. The CLI speaks the client side of the
//! HTTP+SSE transport, answers server-issued `roots/list` requests from
//! `--root` pairs, and coerces `-p name=value` arguments through the
//! prototype rebuilt from each advertised schema.

pub mod cli;
pub mod client;
pub mod commands;

pub use cli::Cli;
pub use client::{Client, CliError, SseEvent, SseParser};

use clap::Parser;

/// Parse arguments, run the command, and return the process exit code
pub async fn run() -> i32 {
    let cli = Cli::parse();

    match commands::dispatch(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Protocol Error: {error}");
            1
        }
    }
}
