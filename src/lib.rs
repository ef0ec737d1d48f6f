pub mod archive;
pub mod assemble;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod geography;
pub mod io_utils;
pub mod join;
pub mod keyed;
pub mod lookup;
pub mod pipeline;
pub mod selector;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::{
    archive::ArchiveSet,
    cli::{Cli, Commands},
    config::PipelineConfig,
    data::namespaced_column,
    error::Error,
    geography::GeoRegistry,
    lookup::LookupIndex,
    pipeline::{Pipeline, PipelineInputs, SkippedTable},
    selector::subject_abbreviation,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("acs_tracts", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Lookup(args) => handle_lookup(&args),
        Commands::Geos(args) => handle_geos(&args),
        Commands::Manifest(args) => handle_manifest(&args),
        Commands::Parse(args) => handle_parse(&PipelineConfig::from_args(&args)?),
        Commands::Join(args) => handle_join(&PipelineConfig::from_args(&args)?),
        Commands::Run(args) => handle_run(PipelineConfig::from_args(&args)?),
    }
}

fn handle_lookup(args: &cli::LookupArgs) -> Result<()> {
    let index = LookupIndex::load(&args.lookup)
        .with_context(|| format!("Loading lookup file {:?}", args.lookup))?;
    let descriptor = index.resolve(&args.title, &args.subject)?;
    if !descriptor.is_resolved() {
        return Err(Error::TableNotFound {
            title: args.title.clone(),
        }
        .into());
    }
    let table_id = descriptor.table_id.clone().unwrap_or_default();
    let abbreviation = subject_abbreviation(&descriptor.subject_area);
    let start = descriptor.start_position.unwrap_or_default();
    info!(
        "'{}' is table {} in sequence {} at position {}",
        descriptor.title,
        table_id,
        descriptor.sequence_number.unwrap_or_default(),
        start
    );
    let rows = descriptor
        .cells
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            vec![
                (start + idx).to_string(),
                label.clone(),
                namespaced_column(&abbreviation, &table_id, label),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers(&["position", "cell", "column"]), &rows);
    Ok(())
}

fn handle_geos(args: &cli::GeosArgs) -> Result<()> {
    let dir = args
        .archives
        .clone()
        .unwrap_or_else(|| PipelineConfig::default().raw_dir());
    let archives = ArchiveSet::discover(&dir)
        .with_context(|| format!("Opening summary file archives in {dir:?}"))?;
    let registry = GeoRegistry::build(&archives).context("Building geography registry")?;
    match &args.output {
        Some(path) => write_registry(&registry, path),
        None => {
            let rows = registry
                .iter()
                .chunk_by(|record| record.geo_key.state.clone())
                .into_iter()
                .map(|(state, records)| vec![state, records.count().to_string()])
                .collect::<Vec<_>>();
            table::print_table(&headers(&["state", "tracts"]), &rows);
            Ok(())
        }
    }
}

fn write_registry(registry: &GeoRegistry, path: &Path) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer.write_record(["geographic_id", "state", "logical_record_number", "geo_label"])?;
    for record in registry.iter() {
        writer.write_record([
            record.geographic_id.as_str(),
            record.geo_key.state.as_str(),
            record.geo_key.logical_record_number.as_str(),
            record.geo_label.as_str(),
        ])?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    info!("Wrote {} tract(s) to {:?}", registry.len(), path);
    Ok(())
}

fn handle_manifest(args: &cli::ManifestArgs) -> Result<()> {
    let entries = selector::load_manifest(&args.input)
        .with_context(|| format!("Loading table manifest {:?}", args.input))?;
    let rows = entries
        .iter()
        .map(|entry| {
            vec![
                entry.table_id.clone(),
                entry.subject_abbreviation.clone(),
                entry.subject_area.clone(),
                entry.table_title.clone(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &headers(&["table_id", "abbreviation", "subject_area", "table_title"]),
        &rows,
    );
    Ok(())
}

fn handle_parse(config: &PipelineConfig) -> Result<()> {
    let inputs = PipelineInputs::load(config)?;
    let report = pipeline::parse_tables(&inputs, config)?;
    println!(
        "decoded: {}, reused: {}, skipped: {}",
        report.decoded.len(),
        report.reused.len(),
        report.skipped.len()
    );
    print_skipped(&report.skipped);
    Ok(())
}

fn handle_join(config: &PipelineConfig) -> Result<()> {
    let raw_dir = config.raw_dir();
    let archives = ArchiveSet::discover(&raw_dir)
        .with_context(|| format!("Opening summary file archives in {raw_dir:?}"))?;
    let registry = GeoRegistry::build(&archives).context("Building geography registry")?;
    let manifest_path = config.manifest_path();
    let manifest = selector::load_manifest(&manifest_path)
        .with_context(|| format!("Loading table manifest {manifest_path:?}"))?;
    let outcome = pipeline::join_tables(config, &manifest, &registry)?;
    println!(
        "{} table(s) joined into {:?}: {} row(s) x {} column(s){}",
        outcome.tables.len(),
        outcome.path,
        outcome.dataset.row_count(),
        outcome.dataset.columns.len(),
        if outcome.rebuilt { "" } else { " (reused)" }
    );
    Ok(())
}

fn handle_run(config: PipelineConfig) -> Result<()> {
    let report = Pipeline::new(config).run()?;
    let rows = vec![
        vec!["decoded".to_string(), report.decoded.to_string()],
        vec!["reused".to_string(), report.reused.to_string()],
        vec!["skipped".to_string(), report.skipped.len().to_string()],
        vec!["rows".to_string(), report.rows.to_string()],
        vec!["columns".to_string(), report.columns.to_string()],
        vec!["joined_rebuilt".to_string(), report.joined_rebuilt.to_string()],
        vec![
            "dataset".to_string(),
            report.dataset_path.display().to_string(),
        ],
    ];
    table::print_table(&headers(&["step", "result"]), &rows);
    print_skipped(&report.skipped);
    Ok(())
}

fn print_skipped(skipped: &[SkippedTable]) {
    if skipped.is_empty() {
        return;
    }
    let rows = skipped
        .iter()
        .map(|s| {
            vec![
                s.table_id.clone(),
                s.sequence_number.map(|n| n.to_string()).unwrap_or_default(),
                s.title.clone(),
                s.reason.clone(),
            ]
        })
        .collect::<Vec<_>>();
    println!();
    table::print_table(&headers(&["table_id", "sequence", "title", "reason"]), &rows);
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
