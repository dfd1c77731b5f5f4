use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Device wizard - inspect and convert device-automation profiles
#[derive(Parser)]
#[command(name = "device-wizard")]
#[command(about = "Validate, normalize and prepare device-automation profile documents")]
#[command(version)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a profile document and list every problem found
    Validate {
        /// Path to the profile document
        file: PathBuf,
    },
    /// Write the normalized editing model
    Normalize {
        /// Path to the profile document
        file: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the payload the editor would send on save
    Prepare {
        /// Path to the profile document
        file: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the payload even when validation fails
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
