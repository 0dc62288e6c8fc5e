//! Entry point for the mld-regrid application.
//! Handles CLI parsing, logging setup and configuration loading, and dispatches the pipeline passes.

use clap::Parser;
use mld_regrid::config::PipelineConfig;
use mld_regrid::file_regrid::{regrid_file, RegridRequest};
use mld_regrid::metadata::print_metadata;
use mld_regrid::pipeline::{run_all, run_daily, run_masked};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match args.command {
        Command::Daily(overrides) => {
            overrides.apply(&mut config);
            let outputs = run_daily(&config)?;
            info!(combined = %outputs.combined.display(), "Daily pass finished");
        }
        Command::Masked(overrides) => {
            overrides.apply(&mut config);
            let output = run_masked(&config)?;
            info!(output = %output.display(), "Masked pass finished");
        }
        Command::Run(overrides) => {
            overrides.apply(&mut config);
            let (daily, masked) = run_all(&config)?;
            info!(
                combined = %daily.combined.display(),
                masked = %masked.display(),
                "Pipeline finished"
            );
        }
        Command::Regrid {
            source,
            variables,
            output,
            mask,
            mask_variable,
            method,
        } => {
            let request = RegridRequest::new(source, variables, output, mask)
                .with_method(method)
                .with_mask_variable(mask_variable)
                .with_aliases(config.aliases.clone());
            regrid_file(&request)?;
        }
        Command::Info { file } => {
            print_metadata(&file, &config.aliases)?;
        }
    }

    Ok(())
}
