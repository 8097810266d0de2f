//! Historical snapshot loading

use std::path::Path;
use tracing::{info, warn};

use crate::common::errors::Result;
use crate::common::types::{RawSnapshot, Snapshot};

/// Snapshots that passed validation plus the count of rejected records
#[derive(Debug, Clone, Default)]
pub struct SnapshotSet {
    pub snapshots: Vec<Snapshot>,
    pub rejected: usize,
}

/// Parse a JSON array of snapshot records
///
/// Records that fail validation are logged and dropped so the simulator only
/// ever sees valid snapshots. A payload that is not a JSON array of objects
/// is an error.
pub fn parse_snapshots(json: &str) -> Result<SnapshotSet> {
    let raw: Vec<RawSnapshot> = serde_json::from_str(json)?;
    let mut set = SnapshotSet::default();
    for (index, record) in raw.into_iter().enumerate() {
        match Snapshot::try_from(record) {
            Ok(snapshot) => set.snapshots.push(snapshot),
            Err(e) => {
                warn!(index, error = %e, "Dropping invalid snapshot record");
                set.rejected += 1;
            }
        }
    }
    Ok(set)
}

pub fn load_snapshots(path: impl AsRef<Path>) -> Result<SnapshotSet> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let set = parse_snapshots(&json)?;
    info!(
        path = %path.display(),
        loaded = set.snapshots.len(),
        rejected = set.rejected,
        "Loaded snapshots"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invalid_records_dropped() {
        let json = r#"[
            {"market_id": "a", "category": "Sports", "yes_price": 0.95,
             "observed_at": "2024-01-01T00:00:00Z", "resolves_at": "2024-01-01T06:00:00Z"},
            {"market_id": "b", "yes_price": "1.7",
             "observed_at": "2024-01-01T00:00:00Z", "resolves_at": "2024-01-01T06:00:00Z"},
            {"marketId": "c", "price": "0.97", "timestamp": "2024-01-01 01:00:00+00",
             "end_date": "2024-01-01", "resolved": true, "winningOutcome": "Yes"}
        ]"#;
        let set = parse_snapshots(json).unwrap();
        assert_eq!(set.rejected, 1);
        assert_eq!(set.snapshots.len(), 2);
        assert_eq!(set.snapshots[0].yes_price, dec!(0.95));
        assert!(set.snapshots[1].is_resolved());
    }

    #[test]
    fn test_not_an_array_is_error() {
        assert!(parse_snapshots(r#"{"market_id": "a"}"#).is_err());
    }
}
