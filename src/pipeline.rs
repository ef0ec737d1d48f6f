//! End-to-end driver: per-table extraction into the interim cache, then the
//! join and filter into the processed dataset.
//!
//! Loading the archives, lookup index, geography registry and manifest is
//! fatal on failure. A single table that cannot be resolved, decoded or
//! assembled is logged and reported as skipped, and the run continues. The
//! final join is fatal on failure.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;

use crate::{
    archive::ArchiveSet,
    assemble::{self, AssembledTable},
    cache::{self, DatasetSidecar},
    config::PipelineConfig,
    decoder,
    error::Error,
    filter,
    geography::GeoRegistry,
    join::{self, JoinedDataset},
    lookup::LookupIndex,
    selector::{self, TableManifestEntry},
};

/// Everything loaded once before any table is processed.
pub struct PipelineInputs {
    pub archives: ArchiveSet,
    pub lookup: LookupIndex,
    pub registry: GeoRegistry,
    pub manifest: Vec<TableManifestEntry>,
}

impl PipelineInputs {
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let raw_dir = config.raw_dir();
        let archives = ArchiveSet::discover(&raw_dir)
            .with_context(|| format!("Opening summary file archives in {raw_dir:?}"))?;
        let registry = GeoRegistry::build(&archives).context("Building geography registry")?;
        let manifest = Self::load_manifest(config)?;
        let lookup_path = config.lookup_path();
        let lookup = LookupIndex::load(&lookup_path)
            .with_context(|| format!("Loading lookup file {lookup_path:?}"))?;
        Ok(PipelineInputs {
            archives,
            lookup,
            registry,
            manifest,
        })
    }

    fn load_manifest(config: &PipelineConfig) -> Result<Vec<TableManifestEntry>> {
        let path = config.manifest_path();
        let manifest = selector::load_manifest(&path)
            .with_context(|| format!("Loading table manifest {path:?}"))?;
        info!("{} table(s) selected in {:?}", manifest.len(), path);
        Ok(manifest)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTable {
    pub table_id: String,
    pub title: String,
    pub sequence_number: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    Decoded,
    Reused,
    Skipped(SkippedTable),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub decoded: Vec<String>,
    pub reused: Vec<String>,
    pub skipped: Vec<SkippedTable>,
}

impl ParseReport {
    fn record(&mut self, entry: &TableManifestEntry, outcome: TableOutcome) {
        match outcome {
            TableOutcome::Decoded => self.decoded.push(entry.table_id.clone()),
            TableOutcome::Reused => self.reused.push(entry.table_id.clone()),
            TableOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub dataset: JoinedDataset,
    pub tables: Vec<String>,
    pub rebuilt: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub decoded: usize,
    pub reused: usize,
    pub skipped: Vec<SkippedTable>,
    pub rows: usize,
    pub columns: usize,
    pub joined_rebuilt: bool,
    pub dataset_path: PathBuf,
}

/// Extracts every selected table into the interim cache.
pub fn parse_tables(inputs: &PipelineInputs, config: &PipelineConfig) -> Result<ParseReport> {
    let outcomes: Vec<TableOutcome> = if config.jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()
            .context("Building worker pool")?;
        info!("Processing tables on {} worker(s)", config.jobs);
        pool.install(|| {
            inputs
                .manifest
                .par_iter()
                .map(|entry| process_table(entry, inputs, config))
                .collect()
        })
    } else {
        inputs
            .manifest
            .iter()
            .map(|entry| process_table(entry, inputs, config))
            .collect()
    };

    let mut report = ParseReport::default();
    for (entry, outcome) in inputs.manifest.iter().zip(outcomes) {
        report.record(entry, outcome);
    }
    info!(
        "Tables: {} decoded, {} reused, {} skipped",
        report.decoded.len(),
        report.reused.len(),
        report.skipped.len()
    );
    Ok(report)
}

fn process_table(
    entry: &TableManifestEntry,
    inputs: &PipelineInputs,
    config: &PipelineConfig,
) -> TableOutcome {
    let path = cache::table_path(&config.interim_dir(), &entry.table_id);
    if path.exists() && !config.overwrite {
        info!("{} already cached at {:?}", entry.table_id, path);
        return TableOutcome::Reused;
    }
    let (sequence_number, err) = match extract_table(entry, inputs) {
        Ok(table) => match cache::save_table(&table, &path) {
            Ok(()) => return TableOutcome::Decoded,
            Err(err) => (None, err),
        },
        Err(failure) => failure,
    };
    // A failed table must not leave an earlier artifact for the join to pick up.
    discard_stale_table(&path);
    skip(entry, sequence_number, err)
}

fn discard_stale_table(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed stale cached table {:?}", path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("Could not remove stale cached table {:?}: {}", path, err),
    }
}

fn extract_table(
    entry: &TableManifestEntry,
    inputs: &PipelineInputs,
) -> std::result::Result<AssembledTable, (Option<u32>, Error)> {
    let descriptor = inputs
        .lookup
        .resolve(&entry.table_title, &entry.subject_area)
        .map_err(|err| (None, err))?;
    let sequence_number = descriptor.sequence_number;
    let decoded =
        decoder::decode(&descriptor, &inputs.archives).map_err(|err| (sequence_number, err))?;
    assemble::assemble(entry, &descriptor, decoded, &inputs.registry)
        .map_err(|err| (sequence_number, err))
}

fn skip(entry: &TableManifestEntry, sequence_number: Option<u32>, err: Error) -> TableOutcome {
    let sequence = sequence_number
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    warn!(
        "Skipping {} '{}' (sequence {}): {}",
        entry.table_id, entry.table_title, sequence, err
    );
    TableOutcome::Skipped(SkippedTable {
        table_id: entry.table_id.clone(),
        title: entry.table_title.clone(),
        sequence_number,
        reason: err.to_string(),
    })
}

/// Joins every cached table named in the manifest onto the geography
/// universe and filters the result. The previous dataset is reused when its
/// sidecar matches the current table artifacts and filter settings.
pub fn join_tables(
    config: &PipelineConfig,
    manifest: &[TableManifestEntry],
    registry: &GeoRegistry,
) -> Result<JoinOutcome> {
    let interim_dir = config.interim_dir();
    let processed_dir = config.processed_dir();
    let dataset_path = cache::dataset_path(&processed_dir, &config.dataset_name);
    let sidecar_path = cache::sidecar_path(&processed_dir, &config.dataset_name);

    let (tables, paths): (Vec<String>, Vec<PathBuf>) = manifest
        .iter()
        .map(|entry| {
            (
                entry.table_id.clone(),
                cache::table_path(&interim_dir, &entry.table_id),
            )
        })
        .filter(|(_, path)| path.exists())
        .unzip();
    let fingerprint = cache::fingerprint(&paths).context("Fingerprinting cached tables")?;

    if !config.overwrite && dataset_path.exists() {
        match DatasetSidecar::load(&sidecar_path) {
            Ok(sidecar)
                if sidecar.matches(&fingerprint, config.null_threshold, config.states_only) =>
            {
                info!("Joined dataset {:?} is up to date", dataset_path);
                let mut dataset = cache::load_dataset(&dataset_path)
                    .with_context(|| format!("Loading joined dataset {dataset_path:?}"))?;
                dataset.assign_states(&registry.universe());
                return Ok(JoinOutcome {
                    dataset,
                    tables,
                    rebuilt: false,
                    path: dataset_path,
                });
            }
            Ok(_) => info!("Cached tables changed since {:?} was built", dataset_path),
            Err(err) => warn!("Ignoring unreadable sidecar {:?}: {}", sidecar_path, err),
        }
    }

    let assembled = tables
        .iter()
        .zip(&paths)
        .map(|(table_id, path)| {
            cache::load_table(table_id, path)
                .with_context(|| format!("Loading cached table {path:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let joined = join::join_all(registry.universe(), &assembled);
    let dataset = filter::filter(joined, config.null_threshold, config.states_only);

    cache::save_dataset(&dataset, &dataset_path)
        .with_context(|| format!("Writing joined dataset {dataset_path:?}"))?;
    DatasetSidecar::new(
        fingerprint,
        tables.clone(),
        config.null_threshold,
        config.states_only,
        &dataset,
    )
    .save(&sidecar_path)
    .with_context(|| format!("Writing sidecar {sidecar_path:?}"))?;

    Ok(JoinOutcome {
        dataset,
        tables,
        rebuilt: true,
        path: dataset_path,
    })
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    /// Runs extraction and the join.
    pub fn run(&self) -> Result<PipelineReport> {
        let inputs = PipelineInputs::load(&self.config)?;
        let parsed = parse_tables(&inputs, &self.config)?;
        let joined = join_tables(&self.config, &inputs.manifest, &inputs.registry)?;
        Ok(PipelineReport {
            decoded: parsed.decoded.len(),
            reused: parsed.reused.len(),
            skipped: parsed.skipped,
            rows: joined.dataset.row_count(),
            columns: joined.dataset.columns.len(),
            joined_rebuilt: joined.rebuilt,
            dataset_path: joined.path,
        })
    }
}
