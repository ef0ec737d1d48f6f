#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use acs_tracts::config::PipelineConfig;
use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

pub const LOOKUP: &str = "\
File ID,Table ID,Sequence Number,Line Number,Start Position,Total Cells in Table,Total Cells in Sequence,Table Title,Subject Area
ACSSF,B01001,0001,,7,2 CELLS,4,SEX BY AGE,Age-Sex
ACSSF,B01001,0001,,,,,Universe:  Total population,
ACSSF,B01001,0001,1,,,,Total:,
ACSSF,B01001,0001,2,,,,Male:,
ACSSF,B19013,0001,,9,2 CELLS,,MEDIAN HOUSEHOLD INCOME,Income
ACSSF,B19013,0001,1,,,,Median household income,
ACSSF,B19013,0001,2,,,,Margin,
";

pub const MANIFEST: &str = "\
# tract model inputs
Table ID,Table Title,Subject Area,Get
B01001,SEX BY AGE,Age-Sex,1
B19013,MEDIAN HOUSEHOLD INCOME,Income,0
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a zip archive holding the given members.
    pub fn write_zip(&self, name: &str, members: &[(&str, String)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let file = File::create(&path).expect("create zip");
        let mut zip = zip::ZipWriter::new(file);
        for (member, contents) in members {
            zip.start_file(*member, SimpleFileOptions::default())
                .expect("start member");
            zip.write_all(contents.as_bytes()).expect("write member");
        }
        zip.finish().expect("finish zip");
        path
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.path().join("raw")
    }

    /// Two-state summary file: three tracts (two in AK, one in DC) plus one
    /// state-level geography whose data row must not survive assembly.
    pub fn write_two_state_archives(&self) {
        let ak_geo = [
            geo_line("AK", "0000001", "04000US02", "Alaska"),
            geo_line("AK", "0000002", "14000US02013000100", "Census Tract 1"),
            geo_line("AK", "0000003", "14000US02013000200", "Census Tract 2"),
        ]
        .concat();
        let ak_data = [
            data_line("ak", "0000001", &["731545", "380000", "5", "1"]),
            data_line("ak", "0000002", &["3214", "1700", "6", "1"]),
            data_line("ak", "0000003", &["2100", "1001", "7", "1"]),
        ]
        .concat();
        self.write_zip(
            "raw/Alaska_Tracts_Block_Groups_Only.zip",
            &[
                ("g20185ak.csv", ak_geo),
                ("e20185ak0001000.txt", ak_data),
            ],
        );

        let dc_geo = geo_line("DC", "0000004", "14000US11001000100", "Census Tract 1");
        let dc_data = data_line("dc", "0000004", &["4890", "2405.5", "8", "1"]);
        self.write_zip(
            "raw/DistrictofColumbia_Tracts_Block_Groups_Only.zip",
            &[("g20185dc.csv", dc_geo), ("e20185dc0001000.txt", dc_data)],
        );
    }

    /// Archives, lookup file and manifest under the workspace, and a config
    /// pointing every path into it.
    pub fn pipeline_config(&self, manifest: &str) -> PipelineConfig {
        self.write_two_state_archives();
        let lookup = self.write("raw/2018_5y_lookup.txt", LOOKUP);
        let manifest = self.write("manifest.csv", manifest);
        PipelineConfig {
            data_dir: self.path().to_path_buf(),
            raw_dir: Some(self.raw_dir()),
            interim_dir: Some(self.path().join("interim")),
            processed_dir: Some(self.path().join("processed")),
            lookup_path: Some(lookup),
            manifest_path: Some(manifest),
            ..PipelineConfig::default()
        }
    }
}

pub fn geo_line(state: &str, logrecno: &str, geoid: &str, name: &str) -> String {
    format!("ACSSF,{state},000,00,{logrecno},140,00,,,,{geoid},{name},,,\n")
}

pub fn data_line(state: &str, logrecno: &str, values: &[&str]) -> String {
    format!("ACSSF,2018e5,{state},000,0001,{logrecno},{}\n", values.join(","))
}
