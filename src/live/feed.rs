use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::common::channels::LiveEvent;
use crate::common::traits::SnapshotSource;
use crate::common::types::MarketId;

/// Poll `source` every `period` and forward its snapshots to the orchestrator
///
/// Returns when `shutdown` flips to true, its sender is dropped, or the
/// orchestrator stops listening. Poll failures are logged and retried on the
/// next tick.
pub async fn run_source<S: SnapshotSource>(
    mut source: S,
    period: Duration,
    events: mpsc::Sender<LiveEvent>,
    tracked: watch::Receiver<Vec<MarketId>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(source = source.source_name(), period_secs = period.as_secs(), "Snapshot feed started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let markets = tracked.borrow().clone();
                match source.poll(&markets, Utc::now()).await {
                    Ok(snapshots) => {
                        debug!(count = snapshots.len(), tracked = markets.len(), "Forwarding snapshots");
                        for snapshot in snapshots {
                            if events.send(LiveEvent::Snapshot(snapshot)).await.is_err() {
                                info!("Orchestrator gone, snapshot feed stopping");
                                return;
                            }
                        }
                    }
                    Err(e) => warn!(source = source.source_name(), error = %e, "Poll failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(source = source.source_name(), "Snapshot feed stopped");
}
