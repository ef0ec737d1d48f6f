//! Summary-file archives.
//!
//! An [`ArchiveSet`] is an explicit list of zip archive descriptors owned by
//! the pipeline driver. Stages receive `&ArchiveSet` and read members through
//! [`Archive::read_member`], which opens the archive read-only for the
//! duration of the call, so descriptors can be shared across worker threads.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use log::{debug, info};
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Prefix of geography members (`g20185ak.csv`).
pub const GEOGRAPHY_PREFIX: &str = "g";
/// Extension of geography members.
pub const GEOGRAPHY_EXTENSION: &str = ".csv";
/// Prefix of estimate data members (`e20185ak0001000.txt`).
pub const DATA_PREFIX: &str = "e";
/// Extension of estimate data members.
pub const DATA_EXTENSION: &str = ".txt";

#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    members: Vec<String>,
}

impl Archive {
    pub fn open(path: &Path) -> Result<Self> {
        let archive = open_zip(path)?;
        let mut members = archive
            .file_names()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        members.sort();
        debug!("Archive {:?} lists {} member(s)", path, members.len());
        Ok(Archive {
            path: path.to_path_buf(),
            members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Members whose file name (ignoring any directory inside the archive)
    /// starts with `prefix` and ends with `suffix`.
    pub fn members_matching<'a>(
        &'a self,
        prefix: &'a str,
        suffix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.members
            .iter()
            .map(|name| name.as_str())
            .filter(move |name| {
                let file_name = member_file_name(name);
                file_name.starts_with(prefix) && file_name.ends_with(suffix)
            })
    }

    pub fn read_member(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = open_zip(&self.path)?;
        let mut entry = archive.by_name(name).map_err(|source| Error::Archive {
            path: self.path.clone(),
            source,
        })?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| Error::io(format!("reading {name} from {:?}", self.path), e))?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveSet {
    archives: Vec<Archive>,
}

impl ArchiveSet {
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let archives = paths
            .iter()
            .map(|p| Archive::open(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(ArchiveSet { archives })
    }

    /// Opens every `*.zip` directly under `dir`, in file-name order.
    pub fn discover(dir: &Path) -> Result<Self> {
        let entries =
            fs::read_dir(dir).map_err(|e| Error::io(format!("listing archives in {dir:?}"), e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(format!("listing archives in {dir:?}"), e))?;
            let path = entry.path();
            let is_zip = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if is_zip && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        let set = ArchiveSet::open(&paths)?;
        info!("Discovered {} archive(s) in {:?}", set.len(), dir);
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archive> {
        self.archives.iter()
    }

    /// Every `(archive, member)` pair whose member name matches.
    pub fn members_matching<'a>(
        &'a self,
        prefix: &'a str,
        suffix: &'a str,
    ) -> impl Iterator<Item = (&'a Archive, &'a str)> + 'a {
        self.archives.iter().flat_map(move |archive| {
            archive
                .members_matching(prefix, suffix)
                .map(move |member| (archive, member))
        })
    }
}

/// Suffix identifying the data member of a sequence: `0001000.txt`.
pub fn data_member_suffix(sequence_number: u32) -> String {
    format!("{sequence_number:04}000{DATA_EXTENSION}")
}

fn member_file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn open_zip(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path).map_err(|e| Error::io(format!("opening archive {path:?}"), e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|source| Error::Archive {
        path: path.to_path_buf(),
        source,
    })
}
