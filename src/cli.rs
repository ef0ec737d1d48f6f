use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Extract census tract tables from ACS summary files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a table title against the sequence/table lookup file
    Lookup(LookupArgs),
    /// Build the tract geography registry from summary file archives
    Geos(GeosArgs),
    /// List the tables selected in a manifest
    Manifest(ManifestArgs),
    /// Decode and cache every selected table
    Parse(ConfigArgs),
    /// Join cached tables, filter, and write the joined dataset
    Join(ConfigArgs),
    /// Run extraction and the join end to end
    Run(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Sequence/table lookup file
    #[arg(short, long)]
    pub lookup: PathBuf,
    /// Table title exactly as published
    #[arg(short, long)]
    pub title: String,
    /// Subject area carried into the descriptor
    #[arg(short, long, default_value = "")]
    pub subject: String,
}

#[derive(Debug, Args)]
pub struct GeosArgs {
    /// Directory holding the summary file archives (*.zip); defaults to the
    /// configured raw directory
    #[arg(short, long)]
    pub archives: Option<PathBuf>,
    /// Write the registry as CSV instead of printing a summary
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Table manifest file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

/// Flags shared by the pipeline stages. Each overrides the matching key of
/// the `--config` file, which in turn overrides the built-in defaults.
#[derive(Debug, Args, Default)]
pub struct ConfigArgs {
    /// YAML file with pipeline settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Survey year of the summary file
    #[arg(long = "year")]
    pub acs_year: Option<u16>,
    /// Estimate span in years (1 or 5)
    #[arg(long = "span")]
    pub acs_span: Option<u8>,
    /// Root data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Directory holding the archives and lookup file
    #[arg(long)]
    pub raw_dir: Option<PathBuf>,
    /// Directory for per-table artifacts
    #[arg(long)]
    pub interim_dir: Option<PathBuf>,
    /// Directory for the joined dataset
    #[arg(long)]
    pub processed_dir: Option<PathBuf>,
    /// Sequence/table lookup file
    #[arg(long)]
    pub lookup: Option<PathBuf>,
    /// Table manifest file
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
    /// Maximum missing values a column may have and still be kept
    #[arg(long)]
    pub null_threshold: Option<usize>,
    /// Keep rows outside the 50 states and DC
    #[arg(long)]
    pub keep_territories: bool,
    /// Recompute artifacts even when cached copies exist
    #[arg(long)]
    pub overwrite: bool,
    /// Worker threads for per-table extraction
    #[arg(short, long)]
    pub jobs: Option<usize>,
    /// File stem of the joined dataset
    #[arg(long)]
    pub dataset_name: Option<String>,
}
