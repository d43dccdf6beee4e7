//! Schema registry value types.
//!
//! Everything here is validated once at load time. Query builders work with
//! these explicit types instead of discovering missing keys at query time.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MedrecError, Result};

/// Allow-list for table and column names drawn from the registry.
///
/// Registry files may originate from a less-trusted configuration path, and
/// these names are interpolated into query text. Anything outside this
/// pattern is rejected before it gets near a query.
static SAFE_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check a table or column name against the identifier allow-list.
pub fn is_safe_identifier(name: &str) -> bool {
    SAFE_IDENTIFIER_RE.is_match(name)
}

/// Validate an identifier, returning it on success.
pub fn safe_identifier(name: &str) -> Result<&str> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(MedrecError::UnsafeIdentifier(name.to_owned()))
    }
}

/// Turn a column name into a human-readable label:
/// underscores become spaces, each word is title-cased.
///
/// `"patient_name"` renders as `"Patient Name"`.
pub fn display_label(column: &str) -> String {
    column
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which table and columns hold the patient identity within one source.
///
/// Fields are optional at parse time; a record missing any of them is
/// unusable for matching, not a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMapping {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub columns: IdentityColumns,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityColumns {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
}

impl SchemaMapping {
    /// True when the primary table and both identity columns are present.
    pub fn is_complete(&self) -> bool {
        self.table.as_deref().is_some_and(|t| !t.is_empty())
            && self.columns.patient_id.as_deref().is_some_and(|c| !c.is_empty())
            && self.columns.patient_name.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// One column in a source's full-schema catalog.
///
/// The `Field` key follows the MySQL `DESCRIBE` output the registry is
/// generated from; the remaining describe columns (Type, Null, Key, ...)
/// are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// One MPI registry entry: a source plus the schema needed to locate a
/// patient's identity within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpiRecord {
    pub source_name: String,
    #[serde(default)]
    pub schema_mapping: Option<SchemaMapping>,
    /// Table name -> ordered column descriptors, for every table in the
    /// source. BTreeMap keeps secondary-table scan order deterministic.
    #[serde(default)]
    pub full_schema: BTreeMap<String, Vec<ColumnDescriptor>>,
}

impl MpiRecord {
    /// True when this record can participate in identity matching.
    pub fn mapping_complete(&self) -> bool {
        !self.source_name.is_empty()
            && self.schema_mapping.as_ref().is_some_and(SchemaMapping::is_complete)
    }

    /// Reject records whose mapping identifiers fail the allow-list.
    ///
    /// Unsafe table names inside `full_schema` are handled separately at
    /// query-build time so one bad catalog entry does not quarantine the
    /// whole source.
    pub fn validate_identifiers(&self) -> Result<()> {
        if let Some(mapping) = &self.schema_mapping {
            for name in [
                mapping.table.as_deref(),
                mapping.columns.patient_id.as_deref(),
                mapping.columns.patient_name.as_deref(),
            ]
            .into_iter()
            .flatten()
            {
                safe_identifier(name)?;
            }
        }
        Ok(())
    }
}

/// Connection parameters consumed per source. This is the full allow-list:
/// any other key present in a source's raw configuration is dropped before
/// pool creation, not forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Validated per-source configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub source_name: String,
    pub connection: ConnectionParams,
}
