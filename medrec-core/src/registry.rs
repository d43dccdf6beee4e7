//! MPI registry loading.
//!
//! The registry is newline-delimited JSON, one [`MpiRecord`] per line.
//! Loading is forgiving by design: a malformed line is logged and skipped,
//! and a missing file yields an empty registry rather than a fatal error.
//! Records whose mapping identifiers fail the allow-list are quarantined
//! here instead of being discovered mid-query.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{MedrecError, Result};
use crate::schema::MpiRecord;

#[derive(Debug, Default)]
pub struct MpiRegistry {
    records: Vec<MpiRecord>,
}

impl MpiRegistry {
    pub fn new(records: Vec<MpiRecord>) -> Self {
        Self { records }
    }

    /// Load the registry from an NDJSON file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                warn!("MPI registry not found at {:?}: {err}", path);
                return Self::default();
            }
        };
        let registry = Self::from_reader(BufReader::new(file));
        info!("{} MPI records loaded from {:?}", registry.len(), path);
        registry
    }

    /// Load the registry from any line-oriented reader.
    pub fn from_reader(reader: impl BufRead) -> Self {
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("failed to read registry line {}: {err}", index + 1);
                    continue;
                }
            };
            match Self::parse_line(index + 1, &line) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => warn!("skipping registry entry: {err}"),
            }
        }
        Self { records }
    }

    /// Parse one registry line. Blank lines yield `Ok(None)`.
    fn parse_line(line_no: usize, line: &str) -> Result<Option<MpiRecord>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let record: MpiRecord = serde_json::from_str(trimmed)
            .map_err(|err| MedrecError::registry(line_no, err))?;
        record.validate_identifiers()?;
        Ok(Some(record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MpiRecord] {
        &self.records
    }

    /// Records eligible for identity matching: complete schema mapping only.
    pub fn usable(&self) -> impl Iterator<Item = &MpiRecord> {
        self.records.iter().filter(|r| r.mapping_complete())
    }

    pub fn get(&self, source_name: &str) -> Option<&MpiRecord> {
        self.records.iter().find(|r| r.source_name == source_name)
    }
}
