//! Source configuration loading for the CLI.
//!
//! A TOML file lists the data sources to scan. `${VAR}` references are
//! expanded from the environment (a `.env` file is honored by the binary),
//! connection keys outside the allow-list are dropped, and sources with
//! incomplete parameters are skipped with a log rather than aborting
//! startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use medrec_core::{ConnectionParams, MedrecError, SourceConfig};

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap());

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    /// Path to the NDJSON MPI registry.
    #[serde(default)]
    pub mpi_file: Option<PathBuf>,

    #[serde(default)]
    pub sources: Vec<RawSource>,
}

/// One `[[sources]]` entry as written in the file, before validation.
#[derive(Debug, Deserialize)]
pub struct RawSource {
    pub source_name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Anything else configured for this source; dropped, never forwarded.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path:?}"))?;
        toml::from_str(&content).context("failed to parse config file (invalid TOML)")
    }

    /// Validate the raw entries into [`SourceConfig`]s, expanding `${VAR}`
    /// references from the environment. Incomplete entries are logged and
    /// excluded here, once, instead of failing at query time.
    pub fn source_configs(&self) -> Vec<SourceConfig> {
        let mut configs = Vec::new();
        for raw in &self.sources {
            match validate_source(raw) {
                Ok(config) => configs.push(config),
                Err(err) => warn!("skipping source: {err}"),
            }
        }
        configs
    }
}

fn validate_source(raw: &RawSource) -> std::result::Result<SourceConfig, MedrecError> {
    let name = raw.source_name.as_str();
    if name.is_empty() {
        return Err(MedrecError::config("<unnamed>", "missing source_name"));
    }
    if !raw.extra.is_empty() {
        let dropped: Vec<&str> = raw.extra.keys().map(String::as_str).collect();
        debug!("dropping non-allow-listed keys for '{name}': {dropped:?}");
    }

    let require = |field: &'static str, value: &Option<String>| {
        value
            .as_deref()
            .map(expand_env)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MedrecError::config(name, format!("missing {field}")))
    };

    Ok(SourceConfig {
        source_name: name.to_owned(),
        connection: ConnectionParams {
            host: require("host", &raw.host)?,
            port: raw
                .port
                .ok_or_else(|| MedrecError::config(name, "missing port"))?,
            user: require("user", &raw.user)?,
            password: raw.password.as_deref().map(expand_env).unwrap_or_default(),
            database: require("database", &raw.database)?,
        },
    })
}

/// Expand `${VAR}` references from the environment; unset variables expand
/// to the empty string.
fn expand_env(value: &str) -> String {
    ENV_VAR_RE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
