// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # embed-bridge
//!
//! Command-line driver for embedded-runtime sessions.
//!
//! ## Usage
//! ```bash
//! # Sum two inputs through the built-in native module
//! embed-bridge run --shape 3,2
//!
//! # Same through CPython (built with --features python)
//! embed-bridge -c demos/bridge.toml run --embedder python --shape 3,2
//!
//! # Fill a buffer and print it through the inspect callable, three times
//! embed-bridge show --buffer input_a --shape 3,2 --loops 3
//!
//! # Validate a configuration and list its buffers
//! embed-bridge -c demos/bridge.toml check
//! ```

mod commands;
mod modules;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "embed-bridge",
    about = "Exchange shaped buffers with an embedded runtime",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (defaults to the built-in layout).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Which runtime hosts the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Built-in Rust modules.
    Native,
    /// CPython (requires the `python` feature).
    Python,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind every non-output buffer, invoke the module and print the outputs.
    Run {
        #[arg(short, long, value_enum, default_value = "native")]
        embedder: EmbedderKind,

        /// Input shape, comma separated (e.g., "3,2"). Empty for a scalar.
        #[arg(short, long, default_value = "3,2")]
        shape: String,

        /// Number of invocations.
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
    },

    /// Fill one buffer with 0, 1, 2, ... and print it through the module.
    Show {
        #[arg(short, long, value_enum, default_value = "native")]
        embedder: EmbedderKind,

        /// Buffer to fill.
        #[arg(short, long, default_value = "input_a")]
        buffer: String,

        /// Shape, comma separated.
        #[arg(short, long, default_value = "3,2")]
        shape: String,

        /// Number of bind-and-show rounds.
        #[arg(short, long, default_value_t = 3)]
        loops: usize,
    },

    /// Validate the configuration and list the declared buffers.
    Check {
        /// Also print the effective configuration as TOML.
        #[arg(long)]
        dump: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            embedder,
            shape,
            repeat,
        } => commands::run::execute(config, embedder, &shape, repeat),
        Commands::Show {
            embedder,
            buffer,
            shape,
            loops,
        } => commands::show::execute(config, embedder, &buffer, &shape, loops),
        Commands::Check { dump } => commands::check::execute(&config, dump),
    }
}
