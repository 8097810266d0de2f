//! Channel type definitions for inter-task communication

use tokio::sync::{mpsc, watch};

use super::types::{ExecutionEvent, MarketId, Snapshot};

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// Everything the live orchestrator reacts to, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Snapshot(Snapshot),
    Execution(ExecutionEvent),
    Shutdown,
}

/// Create a new live event channel with the default buffer size
pub fn create_event_channel() -> (mpsc::Sender<LiveEvent>, mpsc::Receiver<LiveEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new live event channel with a custom buffer size
pub fn create_event_channel_with_size(
    size: usize,
) -> (mpsc::Sender<LiveEvent>, mpsc::Receiver<LiveEvent>) {
    mpsc::channel(size.max(1))
}

/// Watch channel publishing the market ids that hold active positions
pub fn create_tracked_channel() -> (watch::Sender<Vec<MarketId>>, watch::Receiver<Vec<MarketId>>) {
    watch::channel(Vec::new())
}

/// Watch channel used to signal shutdown to background tasks
pub fn create_shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
