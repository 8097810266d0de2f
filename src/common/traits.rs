//! Trait seams between the engine and its external collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::Result;
use super::types::{MarketId, OrderRequest, Snapshot};

/// Source of validated snapshots for the live path
///
/// Implementations own retry and staleness handling; everything they return
/// must already have passed `Snapshot` validation.
#[async_trait]
pub trait SnapshotSource: Send {
    /// Fetch the next batch of snapshots
    ///
    /// # Arguments
    /// * `tracked` - Markets with active positions; these must be re-observed
    ///   even when they drop out of discovery so resolutions are seen
    /// * `now` - Observation timestamp to stamp on the snapshots
    async fn poll(&mut self, tracked: &[MarketId], now: DateTime<Utc>) -> Result<Vec<Snapshot>>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}

/// Order transport used by the live orchestrator
///
/// `submit` only hands the request over. Fills, cancellations and rejections
/// come back later as `ExecutionEvent`s on the orchestrator's event channel.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit(&self, request: OrderRequest) -> Result<()>;

    fn executor_name(&self) -> &'static str;
}
