//! kextplan - Main entry point
//!
//! Thin driver over the library: reads JSON inputs, runs the planner, writes
//! JSON to stdout. Logs and warnings go to stderr.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use kextplan::catalog::{KextCatalog, KextDescriptor};
use kextplan::cli::{Cli, Commands, SelectionArgs};
use kextplan::config_file::PlannerSettings;
use kextplan::engine::bundle::BundleRecord;
use kextplan::hardware::HardwareFacts;
use kextplan::logic::compat::{Incompatibility, in_window, warning_text};
use kextplan::planner::{KextPlanner, Resolution};
use kextplan::types::DarwinVersion;

/// Initialize logging. `--verbose` wins over `RUST_LOG`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Catalog { catalog, target } => {
            let catalog = load_catalog(catalog.as_deref())?;
            list_catalog(&catalog, target)?;
        }
        Commands::Resolve { selection } => {
            let catalog = load_catalog(selection.catalog.as_deref())?;
            let settings = load_settings(selection.settings.as_deref())?;
            let planner = KextPlanner::new(&catalog, &settings);

            let resolution = resolve(&planner, &selection)?;
            print_json(&resolution.report(&catalog))?;
        }
        Commands::Plan {
            selection,
            bundles,
            kernel_add,
        } => {
            let catalog = load_catalog(selection.catalog.as_deref())?;
            let settings = load_settings(selection.settings.as_deref())?;
            let planner = KextPlanner::new(&catalog, &settings);

            let resolution = resolve(&planner, &selection)?;
            let records = BundleRecord::load_all(&bundles)?;
            info!(records = records.len(), "Loaded bundle records from {:?}", bundles);

            let entries = planner
                .plan(&resolution, records)
                .context("Failed to compute load order")?;

            if kernel_add {
                print_json(&planner.kernel_add(&entries))?;
            } else {
                print_json(&entries)?;
            }
        }
        Commands::Validate { settings, catalog } => {
            let outcome = match (settings, catalog) {
                (Some(path), _) => PlannerSettings::load_from_file(&path)
                    .and_then(|s| s.validate())
                    .map(|_| path),
                (None, Some(path)) => KextCatalog::load_from_file(&path).map(|_| path),
                (None, None) => anyhow::bail!("Nothing to validate"),
            };

            match outcome {
                Ok(path) => {
                    info!("Validation successful");
                    println!("✓ File is valid: {:?}", path);
                }
                Err(e) => {
                    error!("Validation failed: {:#}", e);
                    eprintln!("✗ Validation failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<KextCatalog> {
    match path {
        Some(path) => {
            info!("Loading catalog from {:?}", path);
            KextCatalog::load_from_file(path)
        }
        None => Ok(KextCatalog::builtin()),
    }
}

fn load_settings(path: Option<&Path>) -> Result<PlannerSettings> {
    let Some(path) = path else {
        return Ok(PlannerSettings::default());
    };

    info!("Loading settings from {:?}", path);
    let settings = PlannerSettings::load_from_file(path)?;
    settings
        .validate()
        .with_context(|| format!("Invalid settings in {:?}", path))?;
    Ok(settings)
}

/// Candidates from hardware facts and `--kext`, then the optional checklist edit.
fn resolve(planner: &KextPlanner, args: &SelectionArgs) -> Result<Resolution> {
    let allow = args.allow_unsupported;
    let decision = |incompatible: &[Incompatibility], target: DarwinVersion| {
        eprintln!("{}", warning_text(incompatible, target, planner.catalog().core_hook()));
        eprintln!("{}", if allow { "Forcing (--allow-unsupported)" } else { "Skipping (pass --allow-unsupported to force)" });
        allow
    };

    let resolution = match &args.hardware {
        Some(path) => {
            let facts = HardwareFacts::load_from_file(path)?;
            info!("Hardware: {}", facts);
            planner.resolve_hardware(&facts, &args.kexts, args.target, &decision)
        }
        None => planner.resolve(&args.kexts, args.target, &decision),
    };

    Ok(match &args.checked {
        Some(checked) => planner.reconcile(resolution, checked, &decision),
        None => resolution,
    })
}

#[derive(Serialize)]
struct CatalogRow<'a> {
    #[serde(flatten)]
    kext: &'a KextDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    supported: Option<bool>,
}

fn list_catalog(catalog: &KextCatalog, target: Option<DarwinVersion>) -> Result<()> {
    let rows: Vec<CatalogRow> = catalog
        .iter()
        .map(|kext| CatalogRow {
            kext,
            supported: target.map(|t| in_window(kext, t)),
        })
        .collect();
    print_json(&rows)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
