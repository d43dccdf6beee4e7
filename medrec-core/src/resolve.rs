//! Identity resolution across the MPI registry.
//!
//! Given a partial identity, probe every source with a complete schema
//! mapping and an existing pool, and collect the per-source local
//! identifiers. Matching across sources is independent; there is no voting
//! or cross-source reconciliation.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::client::SourcePools;
use crate::error::{MedrecError, Result};
use crate::registry::MpiRegistry;
use crate::schema::{safe_identifier, MpiRecord};

/// Per-request mapping of source name to the locally-valid patient
/// identifier. BTreeMap keeps downstream report order stable.
pub type IdentityMapping = BTreeMap<String, String>;

/// Resolve a partial identity against every usable source.
///
/// Returns `Err(NoIdentity)` when neither input is supplied, `Ok(None)`
/// when not a single source produced a match, so callers can tell
/// "no identifying input" apart from "no match found".
pub async fn resolve_identity(
    registry: &MpiRegistry,
    pools: &dyn SourcePools,
    patient_id: Option<&str>,
    full_name: Option<&str>,
) -> Result<Option<IdentityMapping>> {
    if patient_id.is_none() && full_name.is_none() {
        return Err(MedrecError::NoIdentity);
    }

    let mut mappings = IdentityMapping::new();
    for record in registry.usable() {
        let source = record.source_name.as_str();
        let Some(client) = pools.client(source) else {
            debug!("no pool for '{source}', skipping identity probe");
            continue;
        };

        let (sql, id_column) = match identity_query(record, patient_id, full_name) {
            Ok(built) => built,
            Err(err) => {
                warn!("cannot build identity probe for '{source}': {err}");
                continue;
            }
        };
        let params: Vec<&str> = patient_id.into_iter().chain(full_name).collect();

        match client.fetch_optional_row(&sql, &params).await {
            Ok(Some(row)) => {
                // Record the source's own identifier value, not the
                // caller-supplied one.
                match row.iter().find(|(column, _)| column == &id_column) {
                    Some((_, local_id)) => {
                        debug!("identity match in '{source}': {local_id}");
                        mappings.insert(source.to_owned(), local_id.clone());
                    }
                    None => warn!("identity probe on '{source}' returned no '{id_column}' column"),
                }
            }
            Ok(None) => debug!("no identity match in '{source}'"),
            Err(err) => warn!("failed MPI match in '{source}': {err}"),
        }
    }

    Ok(if mappings.is_empty() {
        None
    } else {
        Some(mappings)
    })
}

/// Build the single-row identity probe for one source.
///
/// The predicate covers only the inputs supplied; with both present it is a
/// logical OR, a match on either field is sufficient. Returns the statement
/// and the identifier column to read back from the row.
pub(crate) fn identity_query(
    record: &MpiRecord,
    patient_id: Option<&str>,
    full_name: Option<&str>,
) -> Result<(String, String)> {
    // usable() guarantees completeness; destructure defensively anyway.
    let mapping = record
        .schema_mapping
        .as_ref()
        .ok_or_else(|| MedrecError::config(&record.source_name, "missing schema mapping"))?;
    let table = mapping
        .table
        .as_deref()
        .ok_or_else(|| MedrecError::config(&record.source_name, "missing primary table"))?;
    let id_column = mapping
        .columns
        .patient_id
        .as_deref()
        .ok_or_else(|| MedrecError::config(&record.source_name, "missing patient_id column"))?;
    let name_column = mapping
        .columns
        .patient_name
        .as_deref()
        .ok_or_else(|| MedrecError::config(&record.source_name, "missing patient_name column"))?;

    safe_identifier(table)?;
    safe_identifier(id_column)?;
    safe_identifier(name_column)?;

    let mut predicates = Vec::new();
    if patient_id.is_some() {
        predicates.push(format!("`{id_column}` = ?"));
    }
    if full_name.is_some() {
        predicates.push(format!("`{name_column}` = ?"));
    }

    let sql = format!(
        "SELECT `{id_column}` FROM `{table}` WHERE {} LIMIT 1",
        predicates.join(" OR ")
    );
    Ok((sql, id_column.to_owned()))
}
