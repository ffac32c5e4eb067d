//! Calibration sinks
//!
//! `MemoryCalibrationSink` keeps the table in memory (tests, dry runs).
//! `JsonFileCalibrationSink` persists a per-instrument table as JSON and
//! rewrites the whole file on every update.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{CalibrationSink, ContractError, InstrumentId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{InstrumentError, Result};

/// In-memory calibration table
#[derive(Debug, Default)]
pub struct MemoryCalibrationSink {
    table: HashMap<InstrumentId, i64>,
    writes: usize,
}

impl MemoryCalibrationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skew_of(&self, instrument: &str) -> Option<i64> {
        self.table.get(instrument).copied()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CalibrationSink for MemoryCalibrationSink {
    fn name(&self) -> &str {
        "memory"
    }

    fn record_skew(&mut self, instrument: &InstrumentId, skew_fs: i64) -> std::result::Result<(), ContractError> {
        self.table.insert(instrument.clone(), skew_fs);
        self.writes += 1;
        Ok(())
    }
}

/// One instrument's stored deskew
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub skew_fs: i64,
    /// Convenience copy in picoseconds
    pub skew_ps: f64,
}

/// On-disk calibration table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    #[serde(default)]
    pub instruments: BTreeMap<String, CalibrationEntry>,
}

/// Calibration table persisted as a JSON file
pub struct JsonFileCalibrationSink {
    name: String,
    path: PathBuf,
    table: CalibrationTable,
}

impl JsonFileCalibrationSink {
    /// Open `path`, keeping entries of other instruments if it exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| InstrumentError::calibration_file(&path, e.to_string()))?;
            serde_json::from_str(&content)
                .map_err(|e| InstrumentError::calibration_file(&path, e.to_string()))?
        } else {
            CalibrationTable::default()
        };
        debug!(path = %path.display(), entries = table.instruments.len(), "calibration table opened");

        Ok(Self {
            name: format!("json:{}", path.display()),
            path,
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // write-then-rename so readers never see a partial table
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &self.table)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)
    }
}

impl CalibrationSink for JsonFileCalibrationSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "json_sink_record", skip(self), fields(path = %self.path.display()))]
    fn record_skew(&mut self, instrument: &InstrumentId, skew_fs: i64) -> std::result::Result<(), ContractError> {
        self.table.instruments.insert(
            instrument.to_string(),
            CalibrationEntry {
                skew_fs,
                skew_ps: skew_fs as f64 / 1000.0,
            },
        );
        self.persist()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        info!(instrument = %instrument, skew_fs, "calibration written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_overwrites() {
        let mut sink = MemoryCalibrationSink::new();
        let scope = InstrumentId::new("scope2");
        sink.record_skew(&scope, 10).unwrap();
        sink.record_skew(&scope, -20).unwrap();
        assert_eq!(sink.skew_of("scope2"), Some(-20));
        assert_eq!(sink.writes(), 2);
        assert_eq!(sink.skew_of("scope3"), None);
    }

    #[test]
    fn test_json_sink_persists_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal").join("deskew.json");

        let mut sink = JsonFileCalibrationSink::open(&path).unwrap();
        sink.record_skew(&InstrumentId::new("scope2"), 12_000_000).unwrap();
        drop(sink);

        let mut sink = JsonFileCalibrationSink::open(&path).unwrap();
        assert_eq!(sink.table().instruments["scope2"].skew_fs, 12_000_000);
        sink.record_skew(&InstrumentId::new("scope3"), -1_500).unwrap();

        let table: CalibrationTable =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(table.instruments.len(), 2);
        assert_eq!(table.instruments["scope3"].skew_ps, -1.5);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_sink_rejects_corrupt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let result = JsonFileCalibrationSink::open(file.path());
        assert!(matches!(result, Err(InstrumentError::CalibrationFile { .. })));
    }
}
