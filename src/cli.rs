use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::DarwinVersion;

/// kextplan - kext selection and load-order planner
#[derive(Parser)]
#[command(name = "kextplan")]
#[command(about = "Select kexts for a Hackintosh build and order them for OpenCore")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the kext catalog
    Catalog {
        /// Catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Mark each kext as supported or not on this Darwin version
        #[arg(short, long)]
        target: Option<DarwinVersion>,
    },
    /// Resolve a kext selection and print it as JSON
    Resolve {
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Resolve, then order the selected kexts' bundles for loading
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
        /// JSON array of bundle records from the kexts directory
        #[arg(short, long)]
        bundles: PathBuf,
        /// Print OpenCore Kernel -> Add entries instead of the raw load order
        #[arg(long)]
        kernel_add: bool,
    },
    /// Validate a settings or catalog file
    Validate {
        /// Settings JSON file
        #[arg(long, conflicts_with = "catalog", required_unless_present = "catalog")]
        settings: Option<PathBuf>,
        /// Catalog JSON file
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

/// Inputs shared by `resolve` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Target Darwin version (e.g. 23.4.0)
    #[arg(short, long)]
    pub target: DarwinVersion,
    /// Hardware facts JSON file
    #[arg(long)]
    pub hardware: Option<PathBuf>,
    /// Extra kext to select (repeatable)
    #[arg(short = 'k', long = "kext")]
    pub kexts: Vec<String>,
    /// Force kexts that do not support the target version
    #[arg(long)]
    pub allow_unsupported: bool,
    /// Apply a checklist edit after resolving (comma-separated kext names)
    #[arg(long, value_delimiter = ',')]
    pub checked: Option<Vec<String>>,
    /// Catalog JSON file (defaults to the built-in catalog)
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Planner settings JSON file (defaults to the stock rules)
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
