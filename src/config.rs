//! Pipeline settings.
//!
//! Defaults follow the on-disk layout the pipeline has always used
//! (`data/raw/{year}_{span}_year_data`, `data/interim`, `data/processed`).
//! A YAML file can replace any default, and explicit command-line flags
//! override both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::ConfigArgs;

pub const DEFAULT_ACS_YEAR: u16 = 2018;
pub const DEFAULT_ACS_SPAN: u8 = 5;
pub const DEFAULT_DATASET_NAME: &str = "acs__joined_tables";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub acs_year: u16,
    /// 1 or 5 year estimates.
    pub acs_span: u8,
    pub data_dir: PathBuf,
    pub raw_dir: Option<PathBuf>,
    pub interim_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    /// Sequence/table lookup file published with the summary file.
    pub lookup_path: Option<PathBuf>,
    /// User-edited manifest selecting which tables to extract.
    pub manifest_path: Option<PathBuf>,
    pub null_threshold: usize,
    pub states_only: bool,
    pub overwrite: bool,
    pub jobs: usize,
    pub dataset_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            acs_year: DEFAULT_ACS_YEAR,
            acs_span: DEFAULT_ACS_SPAN,
            data_dir: PathBuf::from("data"),
            raw_dir: None,
            interim_dir: None,
            processed_dir: None,
            lookup_path: None,
            manifest_path: None,
            null_threshold: 0,
            states_only: true,
            overwrite: false,
            jobs: 1,
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    /// Builds the effective configuration: defaults, then the `--config`
    /// file, then explicit flags.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &ConfigArgs) {
        if let Some(year) = args.acs_year {
            self.acs_year = year;
        }
        if let Some(span) = args.acs_span {
            self.acs_span = span;
        }
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(dir) = &args.raw_dir {
            self.raw_dir = Some(dir.clone());
        }
        if let Some(dir) = &args.interim_dir {
            self.interim_dir = Some(dir.clone());
        }
        if let Some(dir) = &args.processed_dir {
            self.processed_dir = Some(dir.clone());
        }
        if let Some(path) = &args.lookup {
            self.lookup_path = Some(path.clone());
        }
        if let Some(path) = &args.manifest {
            self.manifest_path = Some(path.clone());
        }
        if let Some(threshold) = args.null_threshold {
            self.null_threshold = threshold;
        }
        if args.keep_territories {
            self.states_only = false;
        }
        if args.overwrite {
            self.overwrite = true;
        }
        if let Some(jobs) = args.jobs {
            self.jobs = jobs;
        }
        if let Some(name) = &args.dataset_name {
            self.dataset_name = name.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.acs_span, 1 | 5) {
            bail!(
                "acs_span must be either 1 or 5 for 1-year or 5-year estimates, got {}",
                self.acs_span
            );
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        let name = self.dataset_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            bail!("dataset_name must be a plain file stem, got '{}'", self.dataset_name);
        }
        Ok(())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.raw_dir.clone().unwrap_or_else(|| {
            self.data_dir
                .join("raw")
                .join(format!("{}_{}_year_data", self.acs_year, self.acs_span))
        })
    }

    pub fn interim_dir(&self) -> PathBuf {
        self.interim_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("interim"))
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("processed"))
    }

    fn lookup_file_name(&self) -> String {
        format!("{}_{}y_lookup.txt", self.acs_year, self.acs_span)
    }

    pub fn lookup_path(&self) -> PathBuf {
        self.lookup_path
            .clone()
            .unwrap_or_else(|| self.raw_dir().join(self.lookup_file_name()))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.lookup_file_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_follow_year_and_span() {
        let config = PipelineConfig::default();
        assert_eq!(config.raw_dir(), Path::new("data/raw/2018_5_year_data"));
        assert_eq!(
            config.lookup_path(),
            Path::new("data/raw/2018_5_year_data/2018_5y_lookup.txt")
        );
        assert_eq!(config.manifest_path(), Path::new("2018_5y_lookup.txt"));
        assert_eq!(config.interim_dir(), Path::new("data/interim"));
        assert_eq!(config.processed_dir(), Path::new("data/processed"));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("acs_year: 2019\nacs_span: 1\nnull_threshold: 25\n").unwrap();
        assert_eq!(config.acs_year, 2019);
        assert_eq!(config.null_threshold, 25);
        assert!(config.states_only);
        assert_eq!(config.raw_dir(), Path::new("data/raw/2019_1_year_data"));
    }

    #[test]
    fn validate_rejects_unknown_span_and_zero_jobs() {
        let mut config = PipelineConfig {
            acs_span: 3,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        config.acs_span = 1;
        config.jobs = 0;
        assert!(config.validate().is_err());
        config.jobs = 4;
        assert!(config.validate().is_ok());
    }
}
