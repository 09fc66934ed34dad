//! Plan quality scoring.
//!
//! Scoring ignores feasibility and always reads the initial snapshot, never
//! the post-simulation state.

use serde::{Deserialize, Serialize};

use crate::plan::{Action, Plan};
use crate::station::StationSnapshot;

/// Metric name reported with every score.
pub const LOW_STATION_DROPOFFS: &str = "low_station_dropoffs";

/// Default `free_bikes` level below which a station counts as critically low.
pub const DEFAULT_LOW_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub metric: String,
    pub score: u64,
}

/// Sum of bikes dropped off at stations that started below `low_threshold`.
///
/// Pickups, unknown stations and unreadable bike counts contribute nothing.
pub fn score(plan: &Plan, snapshot: &StationSnapshot, low_threshold: i64) -> ScoreResult {
    let score = plan
        .stops
        .iter()
        .filter(|stop| stop.action == Action::Dropoff)
        .filter(|stop| {
            snapshot
                .get(&stop.station_id)
                .is_some_and(|station| station.free_bikes < low_threshold)
        })
        .map(|stop| stop.bikes.unwrap_or(0).max(0) as u64)
        .fold(0u64, |total, bikes| total.saturating_add(bikes));

    ScoreResult {
        metric: LOW_STATION_DROPOFFS.to_string(),
        score,
    }
}
