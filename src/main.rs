//! Device wizard - command-line entry point
//!
//! Runs the same load, validate and save transforms the editor uses against
//! profile documents on disk.

mod cli;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use device_wizard::config_file::write_document;
use device_wizard::{prepare_config_for_save, validate, ProfileSet, ValidationResult, WizardError};

use crate::cli::{Cli, Commands};

/// Initialize tracing on stderr so stdout stays clean JSON
fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Validate { file } => {
            info!("Validating profile document: {:?}", file);
            let set = ProfileSet::load_from_file(&file)?;
            let result = validate(&set.config.devices);
            if result.is_valid() {
                println!(
                    "✓ Profile document is valid: {} device(s)",
                    set.config.devices.len()
                );
            } else {
                report_errors(&result);
                std::process::exit(1);
            }
        }
        Commands::Normalize { file, output } => {
            let set = ProfileSet::load_from_file(&file)?;
            emit(&set.config, output.as_deref())?;
        }
        Commands::Prepare { file, output, force } => {
            let set = ProfileSet::load_from_file(&file)?;
            let result = validate(&set.config.devices);
            if !result.is_valid() {
                report_errors(&result);
                if !force {
                    error!("Refusing to prepare an invalid profile (use --force to override)");
                    return Err(WizardError::validation(format!(
                        "{} error(s) in {:?}",
                        result.error_count(),
                        file
                    ))
                    .into());
                }
            }
            emit(&prepare_config_for_save(&set.config), output.as_deref())?;
        }
    }

    Ok(())
}

fn report_errors(result: &ValidationResult) {
    eprintln!("✗ {} validation error(s):", result.error_count());
    for message in &result.messages {
        eprintln!("  {} [{}]", message.text, message.field);
    }
}

/// Write `document` to `output`, or pretty-print it to stdout
fn emit<T: Serialize>(document: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_document(document, path)?;
            info!(path = ?path, "wrote document");
        }
        None => println!("{}", serde_json::to_string_pretty(document)?),
    }
    Ok(())
}
