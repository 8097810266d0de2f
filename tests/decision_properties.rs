//! Behavioural properties of the decision core, lifecycle manager and
//! circuit breaker working together.

mod common;

use common::{empty_portfolio, snap, trade, CONFIG};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tailend::common::types::{ExecutionEvent, OrderIntent, OrderRequest, Resolution};
use tailend::lifecycle::{ExitReason, PositionManager, PositionStatus, Settlement};
use tailend::risk::{CircuitBreaker, RiskState};
use tailend::strategy::{Action, SkipReason, Strategy, TailEndStrategy};

fn core() -> TailEndStrategy {
    TailEndStrategy::new(CONFIG.strategy.clone())
}

fn halted() -> RiskState {
    RiskState {
        halted: true,
        ..RiskState::default()
    }
}

/// Enter and confirm a position so it is Open
fn open_position(manager: &mut PositionManager, market: &str, category: &str) {
    let s = snap(market).category(category).build();
    manager.apply(&s, Action::Enter).unwrap();
    manager
        .on_execution(&ExecutionEvent::EntryFilled {
            market_id: market.to_string(),
            price: dec!(0.961),
            at: s.observed_at,
        })
        .unwrap();
}

#[test]
fn test_eligible_snapshots_enter() {
    let core = core();
    let risk = RiskState::default();
    for price in [dec!(0.94), dec!(0.95), dec!(0.965), dec!(0.99)] {
        for hours in [1, 6, 11] {
            let s = snap("m").price(price).hours_left(hours).build();
            assert_eq!(
                core.decide(&s, None, &empty_portfolio(), &risk),
                Action::Enter,
                "price {} hours {}",
                price,
                hours
            );
        }
    }
}

#[test]
fn test_ineligible_snapshots_skip() {
    let core = core();
    let risk = RiskState::default();
    let cases = vec![
        snap("m").price(dec!(0.93)).build(),
        snap("m").price(dec!(0.995)).build(),
        snap("m").hours_left(12).build(),
        snap("m").hours_left(30).build(),
        snap("m").resolved(Resolution::Yes).build(),
    ];
    for s in cases {
        assert_eq!(
            core.decide(&s, None, &empty_portfolio(), &risk),
            Action::Skip(SkipReason::NotEligible)
        );
    }
}

#[test]
fn test_take_profit_regardless_of_risk_state() {
    let core = core();
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "m", "politics");
    let position = manager.position("m");

    for price in [dec!(0.99), dec!(0.995), dec!(1)] {
        let s = snap("m").price(price).at(5).build();
        for risk in [RiskState::default(), halted()] {
            assert_eq!(
                core.decide(&s, position, &empty_portfolio(), &risk),
                Action::TakeProfitExit
            );
        }
    }
}

#[test]
fn test_stop_loss_requires_confirmation() {
    let core = core();
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "m", "politics");
    let risk = RiskState::default();

    let first = snap("m").price(dec!(0.84)).at(5).build();
    let action = core.decide(&first, manager.position("m"), &empty_portfolio(), &risk);
    assert_eq!(action, Action::Hold);
    manager.apply(&first, action).unwrap();

    let second = snap("m").price(dec!(0.83)).at(10).build();
    let action = core.decide(&second, manager.position("m"), &empty_portfolio(), &risk);
    assert_eq!(action, Action::StopLossExit);

    let request = manager.apply(&second, action).unwrap();
    assert!(matches!(request, Some(OrderRequest::PlaceTakerSell { .. })));
    assert_eq!(manager.position("m").map(|p| p.status), Some(PositionStatus::Exiting));
}

#[test]
fn test_recovery_resets_stop_confirmation() {
    let core = core();
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "m", "politics");
    let risk = RiskState::default();

    for (minute, price) in [(5, dec!(0.84)), (10, dec!(0.90)), (15, dec!(0.84))] {
        let s = snap("m").price(price).at(minute).build();
        let action = core.decide(&s, manager.position("m"), &empty_portfolio(), &risk);
        assert_eq!(action, Action::Hold, "minute {}", minute);
        manager.apply(&s, action).unwrap();
    }
}

#[test]
fn test_category_and_total_capacity() {
    let core = core();
    let mut manager = PositionManager::new(&CONFIG.strategy);
    for i in 0..5 {
        open_position(&mut manager, &format!("p{}", i), "politics");
    }
    let portfolio = manager.aggregate(dec!(10000));
    let risk = RiskState::default();

    let politics = snap("new_politics").category("Politics").build();
    assert_eq!(
        core.decide(&politics, None, &portfolio, &risk),
        Action::Skip(SkipReason::Capacity)
    );

    let sports = snap("new_sports").category("sports").build();
    assert_eq!(core.decide(&sports, None, &portfolio, &risk), Action::Enter);

    let mut full = PositionManager::new(&CONFIG.strategy);
    for i in 0..50 {
        open_position(&mut full, &format!("f{}", i), &format!("cat{}", i % 25));
    }
    assert_eq!(
        core.decide(&sports, None, &full.aggregate(dec!(10000)), &risk),
        Action::Skip(SkipReason::Capacity)
    );
}

#[test]
fn test_ten_losses_halt_entries() {
    let core = core();
    let mut breaker = CircuitBreaker::new(CONFIG.risk.clone(), dec!(10000));
    for i in 0..10 {
        breaker.record(&trade(i, dec!(-1)));
    }
    assert!(breaker.is_halted());

    let s = snap("m").build();
    assert_eq!(
        core.decide(&s, None, &empty_portfolio(), breaker.state()),
        Action::Skip(SkipReason::RiskHalted)
    );
}

#[test]
fn test_nine_losses_then_win_does_not_halt() {
    let core = core();
    let mut breaker = CircuitBreaker::new(CONFIG.risk.clone(), dec!(10000));
    for i in 0..9 {
        breaker.record(&trade(i, dec!(-1)));
    }
    breaker.record(&trade(9, dec!(2)));

    assert!(!breaker.is_halted());
    assert_eq!(breaker.state().consecutive_losses, 0);
    let s = snap("m").build();
    assert_eq!(
        core.decide(&s, None, &empty_portfolio(), breaker.state()),
        Action::Enter
    );
}

#[test]
fn test_settlement_closes_exactly_once() {
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "m", "politics");
    let resolved = snap("m").resolved(Resolution::No).at(90).build();

    let record = manager
        .settle(&resolved)
        .unwrap()
        .and_then(Settlement::into_trade)
        .expect("one trade record");
    assert_eq!(record.exit_reason, ExitReason::ResolutionSettlement);
    assert_eq!(
        record.realized_pnl,
        (Decimal::ZERO - record.entry_price) * record.size
    );

    for _ in 0..3 {
        assert_eq!(manager.settle(&resolved).unwrap(), None);
    }
    assert_eq!(manager.history().len(), 1);
    assert!(manager.position("m").is_none());
}

#[test]
fn test_settlement_while_exiting() {
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "m", "politics");
    let tp = snap("m").price(dec!(0.99)).at(10).build();
    manager.apply(&tp, Action::TakeProfitExit).unwrap();

    let resolved = snap("m").resolved(Resolution::Yes).at(20).build();
    let record = manager
        .settle(&resolved)
        .unwrap()
        .and_then(Settlement::into_trade)
        .unwrap();
    assert_eq!(record.exit_price, dec!(1));
    assert_eq!(record.exit_reason, ExitReason::ResolutionSettlement);

    // A late exit fill for the settled position is rejected, not double counted
    let late = manager.on_execution(&ExecutionEvent::ExitFilled {
        market_id: "m".to_string(),
        price: dec!(0.99),
        fee: Decimal::ZERO,
        at: resolved.observed_at,
    });
    assert!(late.is_err());
}

#[test]
fn test_shutdown_is_non_liquidating() {
    let mut manager = PositionManager::new(&CONFIG.strategy);
    open_position(&mut manager, "open", "politics");
    manager
        .apply(&snap("pending").category("sports").build(), Action::Enter)
        .unwrap();

    let requests = manager.shutdown(common::t0());

    assert_eq!(
        requests,
        vec![OrderRequest::CancelOrder {
            market_id: "pending".to_string(),
            intent: OrderIntent::Entry,
        }]
    );
    assert_eq!(manager.position("open").map(|p| p.status), Some(PositionStatus::Open));
    assert!(manager.position("pending").is_none());
    assert_eq!(manager.history()[0].status, PositionStatus::Cancelled);
}
