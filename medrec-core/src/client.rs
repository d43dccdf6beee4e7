//! The query seam between the engine and its data sources.
//!
//! Resolution and aggregation talk to sources through [`SourceClient`] and
//! find clients through [`SourcePools`], so tests can substitute in-memory
//! fakes for live MySQL pools. [`MySqlSource`] is the production
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, MySqlPool, Row, TypeInfo};

use crate::error::{MedrecError, Result};

/// One row as ordered (column name, rendered value) pairs.
///
/// Sources have heterogeneous schemas, so rows are carried as display
/// strings rather than typed records; the report renderer is the only
/// consumer.
pub type RecordRow = Vec<(String, String)>;

/// A queryable patient-data source. Statement text carries validated,
/// quoted identifiers only; `params` are always bound, never interpolated.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Run a single-row lookup.
    async fn fetch_optional_row(&self, sql: &str, params: &[&str]) -> Result<Option<RecordRow>>;

    /// Run a multi-row query.
    async fn fetch_all_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<RecordRow>>;
}

/// Lookup of per-source clients by source name.
pub trait SourcePools: Send + Sync {
    fn client(&self, source_name: &str) -> Option<Arc<dyn SourceClient>>;
}

/// A source backed by a bounded sqlx MySQL pool. Checkout and release are
/// pool semantics: the connection returns to the pool when the query
/// future completes, on success and error paths alike.
pub struct MySqlSource {
    source_name: String,
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(source_name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            source_name: source_name.into(),
            pool,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

#[async_trait]
impl SourceClient for MySqlSource {
    async fn fetch_optional_row(&self, sql: &str, params: &[&str]) -> Result<Option<RecordRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| map_sqlx_error(&self.source_name, err))?;
        Ok(row.map(|r| row_to_pairs(&r)))
    }

    async fn fetch_all_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<RecordRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| map_sqlx_error(&self.source_name, err))?;
        Ok(rows.iter().map(row_to_pairs).collect())
    }
}

/// Pool and transport failures are connection errors; everything else is a
/// query error scoped to the statement that raised it.
fn map_sqlx_error(source_name: &str, err: sqlx::Error) -> MedrecError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            MedrecError::connection(source_name, err)
        }
        other => MedrecError::query(source_name, other),
    }
}

fn row_to_pairs(row: &MySqlRow) -> RecordRow {
    row.columns()
        .iter()
        .map(|col| (col.name().to_owned(), render_cell(row, col.ordinal())))
        .collect()
}

/// Render one cell as display text, trying the common MySQL type families
/// in turn. Columns outside these families render as a type placeholder
/// rather than failing the row.
fn render_cell(row: &MySqlRow, index: usize) -> String {
    macro_rules! try_render {
        ($ty:ty) => {
            if let Ok(value) = row.try_get::<Option<$ty>, _>(index) {
                return match value {
                    Some(v) => v.to_string(),
                    None => "NULL".to_owned(),
                };
            }
        };
    }

    try_render!(String);
    try_render!(i64);
    try_render!(u64);
    try_render!(f64);
    try_render!(bool);
    try_render!(NaiveDateTime);
    try_render!(DateTime<Utc>);
    try_render!(NaiveDate);
    try_render!(NaiveTime);

    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return match value {
            Some(bytes) => format!("<{} bytes>", bytes.len()),
            None => "NULL".to_owned(),
        };
    }

    let type_name = row.columns()[index].type_info().name().to_owned();
    format!("<{type_name}>")
}
