//! migrant - package migration units into archives and run them.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// migrant - migration packager and runner
#[derive(Parser, Debug)]
#[command(name = "migrant")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve migration definitions and write a migration archive
    Package {
        /// Local repository laid out by canonical path
        #[arg(long)]
        repo: PathBuf,

        /// Migration path as NAME=DEFS.json (repeatable, order kept)
        #[arg(long = "path", value_name = "NAME=DEFS", value_parser = parse_path_def, required = true)]
        paths: Vec<(String, PathBuf)>,

        /// Resolve only the N most recent units of each path (negative = all)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        include_most_recent: i64,

        /// Output archive
        #[arg(long)]
        out: PathBuf,
    },

    /// Run the pending migrations of one path and update the history file
    Run {
        /// Migration archive
        #[arg(long)]
        archive: PathBuf,

        /// Migration path name
        #[arg(long)]
        path: String,

        /// History document (created if missing)
        #[arg(long)]
        history: PathBuf,

        /// File whose bytes are handed to every handler
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Print the paths and packages of a migration archive
    Inspect {
        /// Migration archive
        #[arg(long)]
        archive: PathBuf,
    },

    /// Pack a prepared unit directory into a unit file
    Prep {
        /// Directory with entry/*.json descriptors, programs and resources
        #[arg(long)]
        dir: PathBuf,

        /// Output unit file
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_path_def(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, defs)) if !name.is_empty() && !defs.is_empty() => {
            Ok((name.to_string(), PathBuf::from(defs)))
        }
        _ => Err(format!("expected NAME=DEFS.json, got {s:?}")),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package {
            repo,
            paths,
            include_most_recent,
            out,
        } => commands::package(&repo, &paths, include_most_recent, &out),
        Commands::Run {
            archive,
            path,
            history,
            payload,
        } => commands::run(&archive, &path, &history, payload.as_deref()),
        Commands::Inspect { archive } => commands::inspect(&archive),
        Commands::Prep { dir, out } => commands::prep(&dir, &out),
    }
}
