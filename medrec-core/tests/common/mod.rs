//! In-memory fakes for the source-client seam.
//!
//! A `FakeSource` serves canned rows keyed by table name, can fail at the
//! connection or per-table level, and can delay each call to exercise the
//! fan-out timing and timeout behavior. Captured statements let tests
//! assert on predicate shapes.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use medrec_core::{MedrecError, MpiRegistry, RecordRow, Result, SourceClient, SourcePools};

pub struct FakeSource {
    pub name: String,
    tables: BTreeMap<String, Vec<RecordRow>>,
    fail_connection: bool,
    fail_tables: HashSet<String>,
    delay: Duration,
    queries: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            tables: BTreeMap::new(),
            fail_connection: false,
            fail_tables: HashSet::new(),
            delay: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_table(mut self, table: &str, rows: Vec<RecordRow>) -> Self {
        self.tables.insert(table.to_owned(), rows);
        self
    }

    /// Every call errors as if the source were unreachable.
    pub fn failing(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Queries against this table error; everything else succeeds.
    pub fn failing_table(mut self, table: &str) -> Self {
        self.fail_tables.insert(table.to_owned());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn captured_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn table_of(sql: &str) -> Option<&str> {
        sql.split("FROM `").nth(1)?.split('`').next()
    }

    async fn run(&self, sql: &str, params: &[&str]) -> Result<Vec<RecordRow>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_connection {
            return Err(MedrecError::connection(&self.name, "fake source down"));
        }
        self.queries.lock().unwrap().push(sql.to_owned());

        let table = Self::table_of(sql)
            .ok_or_else(|| MedrecError::query(&self.name, format!("unparseable statement: {sql}")))?;
        if self.fail_tables.contains(table) {
            return Err(MedrecError::query(
                &self.name,
                format!("table '{table}' is broken"),
            ));
        }

        let rows = self.tables.get(table).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| row.iter().any(|(_, value)| params.contains(&value.as_str())))
            .collect())
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    async fn fetch_optional_row(&self, sql: &str, params: &[&str]) -> Result<Option<RecordRow>> {
        Ok(self.run(sql, params).await?.into_iter().next())
    }

    async fn fetch_all_rows(&self, sql: &str, params: &[&str]) -> Result<Vec<RecordRow>> {
        self.run(sql, params).await
    }
}

#[derive(Default)]
pub struct FakePools {
    clients: BTreeMap<String, Arc<FakeSource>>,
}

impl FakePools {
    /// Register a fake source, returning a handle for later assertions.
    pub fn add(&mut self, source: FakeSource) -> Arc<FakeSource> {
        let client = Arc::new(source);
        self.clients.insert(client.name.clone(), client.clone());
        client
    }
}

impl SourcePools for FakePools {
    fn client(&self, source_name: &str) -> Option<Arc<dyn SourceClient>> {
        self.clients
            .get(source_name)
            .map(|client| client.clone() as Arc<dyn SourceClient>)
    }
}

pub fn registry_from_lines(lines: &[&str]) -> MpiRegistry {
    MpiRegistry::from_reader(lines.join("\n").as_bytes())
}

pub fn row(pairs: &[(&str, &str)]) -> RecordRow {
    pairs
        .iter()
        .map(|(column, value)| ((*column).to_owned(), (*value).to_owned()))
        .collect()
}
