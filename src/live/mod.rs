//! Live trading path
//!
//! ```text
//! SnapshotSource ──run_source──▶ mpsc<LiveEvent> ──▶ Orchestrator ──▶ OrderExecutor
//!       ▲                               ▲                 │                │
//!       └──── watch<tracked markets> ◀──┼─────────────────┘                │
//!                                       └──── ExecutionEvent ◀─────────────┘
//! ```

mod executor;
mod feed;
mod orchestrator;

pub use executor::DryRunExecutor;
pub use feed::run_source;
pub use orchestrator::{Orchestrator, SessionSummary};
