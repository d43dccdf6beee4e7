//! Concurrent multi-source aggregation.
//!
//! One task per mapped source, fanned out on the runtime and always joined
//! to completion: no task result is discarded on first success and no task
//! is cancelled because of another's outcome. Within a task, secondary
//! tables are scanned sequentially; only the source-to-source dimension is
//! parallel. Merged sections are ordered by source name so the report is
//! stable across runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::client::{RecordRow, SourceClient, SourcePools};
use crate::error::Result;
use crate::registry::MpiRegistry;
use crate::resolve::IdentityMapping;
use crate::schema::{display_label, is_safe_identifier, MpiRecord};

const REPORT_HEADER: &str = "Aggregated Patient Records:";

/// Fetch and merge every record for the resolved identity mapping.
///
/// Returns `None` when no source yielded data. One source's failure or
/// timeout never suppresses another's sections.
pub async fn aggregate(
    registry: &MpiRegistry,
    pools: &dyn SourcePools,
    mapping: &IdentityMapping,
    source_timeout: Duration,
) -> Option<String> {
    let mut tasks = JoinSet::new();
    for (source_name, local_id) in mapping {
        let Some(record) = registry.get(source_name) else {
            warn!("resolved source '{source_name}' missing from registry, skipping");
            continue;
        };
        let Some(client) = pools.client(source_name) else {
            warn!("resolved source '{source_name}' has no pool, skipping");
            continue;
        };

        let record = record.clone();
        let source_name = source_name.clone();
        let local_id = local_id.clone();
        tasks.spawn(async move {
            let work = collect_source(client, &record, &local_id);
            match tokio::time::timeout(source_timeout, work).await {
                Ok(section) => section.map(|text| (source_name, text)),
                Err(_) => {
                    warn!("source '{source_name}' timed out after {source_timeout:?}");
                    None
                }
            }
        });
    }

    let mut sections = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(section)) => sections.push(section),
            Ok(None) => {}
            Err(err) => error!("aggregation task failed to join: {err}"),
        }
    }

    if sections.is_empty() {
        return None;
    }
    sections.sort_by(|a, b| a.0.cmp(&b.0));
    let body: Vec<String> = sections.into_iter().map(|(_, text)| text).collect();
    Some(format!(
        "{REPORT_HEADER}\n{}\n\n{}",
        "=".repeat(40),
        body.join("\n\n")
    ))
}

/// Gather everything one source holds for a local identifier.
///
/// A primary-lookup failure abandons the whole source; a secondary-table
/// failure only omits that table's section.
async fn collect_source(
    client: Arc<dyn SourceClient>,
    record: &MpiRecord,
    local_id: &str,
) -> Option<String> {
    let source = record.source_name.as_str();
    let mapping = record.schema_mapping.as_ref()?;
    let primary_table = mapping.table.as_deref()?;
    let id_column = mapping.columns.patient_id.as_deref()?;

    let mut sections = Vec::new();

    match fetch_primary(client.as_ref(), primary_table, id_column, local_id).await {
        Ok(Some(row)) => sections.push(render_primary(source, &row)),
        Ok(None) => debug!("no primary record for '{local_id}' in '{source}'"),
        Err(err) => {
            error!("query error on '{source}': {err}");
            return None;
        }
    }

    for (table, columns) in &record.full_schema {
        if table == primary_table {
            continue;
        }
        if !columns.iter().any(|col| col.field == id_column) {
            continue;
        }
        if !is_safe_identifier(table) {
            warn!("unsafe table name '{table}' in '{source}' catalog, skipping");
            continue;
        }

        let sql = format!("SELECT * FROM `{table}` WHERE `{id_column}` = ?");
        match client.fetch_all_rows(&sql, &[local_id]).await {
            Ok(rows) if rows.is_empty() => {}
            Ok(rows) => sections.push(render_table(table, &rows)),
            Err(err) => warn!("failed to query table '{table}' in '{source}': {err}"),
        }
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

async fn fetch_primary(
    client: &dyn SourceClient,
    table: &str,
    id_column: &str,
    local_id: &str,
) -> Result<Option<RecordRow>> {
    // Identifiers were allow-listed at registry load; quoted here as a
    // second line of containment.
    let sql = format!("SELECT * FROM `{table}` WHERE `{id_column}` = ?");
    client.fetch_optional_row(&sql, &[local_id]).await
}

fn render_primary(source: &str, row: &RecordRow) -> String {
    let body: Vec<String> = row
        .iter()
        .map(|(column, value)| format!("- {}: {}", display_label(column), value))
        .collect();
    format!("--- Primary Record ({source}) ---\n{}", body.join("\n"))
}

fn render_table(table: &str, rows: &[RecordRow]) -> String {
    let blocks: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|(column, value)| format!("- {}: {}", display_label(column), value))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    format!(
        "--- {} Records ---\n{}",
        display_label(table),
        blocks.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_section_renders_labels() {
        let row = vec![
            ("pid".to_owned(), "A-99".to_owned()),
            ("patient_name".to_owned(), "Ada Lovelace".to_owned()),
        ];
        let section = render_primary("hospA", &row);
        assert_eq!(
            section,
            "--- Primary Record (hospA) ---\n- Pid: A-99\n- Patient Name: Ada Lovelace"
        );
    }

    #[test]
    fn table_section_separates_rows() {
        let rows = vec![
            vec![("visit_date".to_owned(), "2024-01-01".to_owned())],
            vec![("visit_date".to_owned(), "2024-02-01".to_owned())],
        ];
        let section = render_table("lab_results", &rows);
        assert!(section.starts_with("--- Lab Results Records ---\n"));
        assert!(section.contains("- Visit Date: 2024-01-01\n\n- Visit Date: 2024-02-01"));
    }
}
