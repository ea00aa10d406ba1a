//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - installs logging
//! - parses CLI arguments
//! - loads settings from the environment
//! - dispatches to the workflows in `pipeline`

use std::fs;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::catalog::{CkanClient, PublishOutcome};
use crate::cli::{BusLinesArgs, CatalogArgs, Cli, Command, ExportArgs, UploadCruzeroArgs};
use crate::config::Settings;
use crate::error::AppError;

pub mod pipeline;

const DEFAULT_LOG_FILTER: &str = "opendatabo=info";

/// Entry point for the `odbo` binary.
pub fn run() -> Result<(), AppError> {
    init_logging();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Command::Export(args) => handle_export(&settings, &args),
        Command::UploadSic(args) => handle_upload_sic(&settings, &args),
        Command::BusLines(args) => handle_bus_lines(&settings, &args),
        Command::UploadCruzero(args) => handle_upload_cruzero(&settings, &args),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_export(settings: &Settings, args: &ExportArgs) -> Result<(), AppError> {
    let summary = pipeline::run_export(settings, args)?;
    let path = summary.path.display();
    match summary.rows {
        Some(rows) if summary.duplicates_dropped > 0 => println!(
            "Wrote {rows} rows to {path} ({} duplicate rows dropped)",
            summary.duplicates_dropped
        ),
        Some(rows) => println!("Wrote {rows} rows to {path}"),
        None => println!("Wrote {path}"),
    }
    Ok(())
}

fn ckan_client(settings: &Settings, args: &CatalogArgs) -> Result<CkanClient, AppError> {
    let key = settings.api_key(args.key.as_deref());
    Ok(CkanClient::new(&args.host, key, &settings.user_agent)?)
}

fn handle_upload_sic(settings: &Settings, args: &CatalogArgs) -> Result<(), AppError> {
    let catalog = ckan_client(settings, args)?;
    let reports = pipeline::run_upload_sic(settings, &catalog, &args.package, &args.resource)?;

    let mut published = 0;
    for report in &reports {
        let action = match &report.outcome {
            Some(PublishOutcome::Created(_)) => "created",
            Some(PublishOutcome::Updated(_)) => "updated",
            None => "skipped",
        };
        if report.outcome.is_some() {
            published += 1;
        }
        println!(
            "{}: {action}, {} rows from {} year(s), {} year(s) without data, {} duplicates dropped",
            report.city.name(),
            report.rows,
            report.years_covered.len(),
            report.years_skipped.len(),
            report.duplicates_dropped
        );
    }
    println!("Published {published} city resource(s) to package '{}'", args.package);
    Ok(())
}

fn handle_bus_lines(settings: &Settings, args: &BusLinesArgs) -> Result<(), AppError> {
    let lines = pipeline::fetch_bus_lines(settings)?;
    let bytes = pipeline::bus_lines_payload(&lines)?;
    fs::write(&args.output, bytes).map_err(|e| {
        AppError::new(4, format!("Failed to write '{}': {e}", args.output.display()))
    })?;
    println!("Wrote {} bus lines to {}", lines.len(), args.output.display());
    Ok(())
}

fn handle_upload_cruzero(settings: &Settings, args: &UploadCruzeroArgs) -> Result<(), AppError> {
    let catalog = ckan_client(settings, &args.catalog)?;
    let lines = pipeline::fetch_bus_lines(settings)?;
    let outcome = pipeline::publish_bus_lines(
        &catalog,
        &lines,
        &args.catalog.package,
        &args.catalog.resource,
        &args.name,
    )?;

    let (verb, resource) = match outcome {
        PublishOutcome::Created(r) => ("Created", r),
        PublishOutcome::Updated(r) => ("Updated", r),
    };
    info!(id = %resource.id, "bus lines published");
    println!("{verb} resource '{}' ({} bus lines)", args.catalog.resource, lines.len());
    Ok(())
}
