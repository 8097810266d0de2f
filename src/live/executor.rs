use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::common::channels::LiveEvent;
use crate::common::errors::{EngineError, Result};
use crate::common::traits::OrderExecutor;
use crate::common::types::{ExecutionEvent, OrderRequest};
use crate::strategy::{FeeSchedule, Liquidity};

/// Executor that never touches an exchange
///
/// Every request is logged and confirmed as if it filled (or was cancelled)
/// immediately at its limit price. Confirmations are sent from a spawned task
/// so `submit` never waits on the event channel the orchestrator drains.
#[derive(Debug, Clone)]
pub struct DryRunExecutor {
    events: mpsc::Sender<LiveEvent>,
    fees: FeeSchedule,
}

impl DryRunExecutor {
    pub fn new(events: mpsc::Sender<LiveEvent>, fees: FeeSchedule) -> Self {
        Self { events, fees }
    }

    fn confirmation(&self, request: &OrderRequest) -> ExecutionEvent {
        let at = Utc::now();
        match request {
            OrderRequest::PlaceMakerBuy { market_id, price, .. } => ExecutionEvent::EntryFilled {
                market_id: market_id.clone(),
                price: *price,
                at,
            },
            OrderRequest::PlaceMakerSell {
                market_id,
                price,
                shares,
            } => ExecutionEvent::ExitFilled {
                market_id: market_id.clone(),
                price: *price,
                fee: self.fees.fee(*price, *shares, Liquidity::Maker),
                at,
            },
            OrderRequest::PlaceTakerSell {
                market_id,
                price,
                shares,
            } => ExecutionEvent::ExitFilled {
                market_id: market_id.clone(),
                price: *price,
                fee: self.fees.fee(*price, *shares, Liquidity::Taker),
                at,
            },
            OrderRequest::CancelOrder { market_id, intent } => ExecutionEvent::Cancelled {
                market_id: market_id.clone(),
                intent: *intent,
                at,
            },
        }
    }
}

#[async_trait]
impl OrderExecutor for DryRunExecutor {
    async fn submit(&self, request: OrderRequest) -> Result<()> {
        if self.events.is_closed() {
            return Err(EngineError::Execution(
                "confirmation channel closed".to_string(),
            ));
        }
        info!(
            market = request.market_id(),
            intent = ?request.intent(),
            side = ?request.side(),
            taker = request.is_taker(),
            "[DRY RUN] order"
        );
        let event = self.confirmation(&request);
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = events.send(LiveEvent::Execution(event)).await {
                warn!("Dry-run confirmation dropped: {}", e);
            }
        });
        Ok(())
    }

    fn executor_name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::OrderIntent;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_taker_sell_confirmed_with_fee() {
        let (tx, mut rx) = mpsc::channel(4);
        let executor = DryRunExecutor::new(tx, FeeSchedule::default());
        executor
            .submit(OrderRequest::PlaceTakerSell {
                market_id: "m1".to_string(),
                price: dec!(0.80),
                shares: dec!(100),
            })
            .await
            .unwrap();

        match rx.recv().await {
            Some(LiveEvent::Execution(ExecutionEvent::ExitFilled { price, fee, .. })) => {
                assert_eq!(price, dec!(0.80));
                assert_eq!(fee, dec!(0.4));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_is_execution_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let executor = DryRunExecutor::new(tx, FeeSchedule::default());
        let result = executor
            .submit(OrderRequest::CancelOrder {
                market_id: "m1".to_string(),
                intent: OrderIntent::Entry,
            })
            .await;
        assert!(matches!(result, Err(EngineError::Execution(_))));
    }

    #[tokio::test]
    async fn test_cancel_confirmed() {
        let (tx, mut rx) = mpsc::channel(4);
        let executor = DryRunExecutor::new(tx, FeeSchedule::default());
        executor
            .submit(OrderRequest::CancelOrder {
                market_id: "m1".to_string(),
                intent: OrderIntent::Entry,
            })
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(LiveEvent::Execution(ExecutionEvent::Cancelled {
                intent: OrderIntent::Entry,
                ..
            }))
        ));
    }
}
