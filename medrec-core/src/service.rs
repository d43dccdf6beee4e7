//! Service facade tying resolution and aggregation together.
//!
//! Dependencies are injected at construction instead of living in
//! process-wide state, so tests can hand in fake pools.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::aggregate::aggregate;
use crate::client::SourcePools;
use crate::error::Result;
use crate::registry::MpiRegistry;
use crate::resolve::{resolve_identity, IdentityMapping};

/// Each source task gets this budget unless overridden; an unresponsive
/// source must not stall the whole aggregation indefinitely.
const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RecordService {
    registry: MpiRegistry,
    pools: Arc<dyn SourcePools>,
    source_timeout: Duration,
}

impl RecordService {
    pub fn new(registry: MpiRegistry, pools: Arc<dyn SourcePools>) -> Self {
        Self {
            registry,
            pools,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Override the per-source time budget for aggregation tasks.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &MpiRegistry {
        &self.registry
    }

    /// Resolve a partial identity into per-source local identifiers.
    pub async fn resolve_identity(
        &self,
        patient_id: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<Option<IdentityMapping>> {
        resolve_identity(&self.registry, self.pools.as_ref(), patient_id, full_name).await
    }

    /// Resolve, then fan out across every matched source and merge the
    /// results into one report. `Ok(None)` means nothing matched or nothing
    /// was retrieved.
    pub async fn fetch_patient_records(
        &self,
        patient_id: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(mapping) = self.resolve_identity(patient_id, full_name).await? else {
            warn!("no source produced an identity match");
            return Ok(None);
        };

        Ok(aggregate(
            &self.registry,
            self.pools.as_ref(),
            &mapping,
            self.source_timeout,
        )
        .await)
    }
}
