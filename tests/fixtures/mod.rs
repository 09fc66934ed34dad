//! Test fixtures for bike-rebalancer.
//!
//! Provides:
//! - Real Palma de Mallorca station locations (from OpenStreetMap)
//! - A scripted oracle that replays canned replies and records what it saw
//! - Builders for snapshots, plans and oracle messages

#![allow(dead_code)]

pub mod palma_stations;

pub use palma_stations::*;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use bike_rebalancer::catalog::{Catalog, FnCapability, Param};
use bike_rebalancer::coerce::{ArgType, CallArgs};
use bike_rebalancer::datum::{Datum, Table};
use bike_rebalancer::error::OracleError;
use bike_rebalancer::station::{Station, StationSnapshot};
use bike_rebalancer::traits::Oracle;

// ============================================================================
// Oracles
// ============================================================================

/// Replays replies in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<OracleCall>>,
}

#[derive(Debug, Clone)]
pub struct OracleCall {
    pub instructions: String,
    pub document: Value,
}

impl ScriptedOracle {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, instructions: &str, context_document: &str) -> Result<String, OracleError> {
        self.calls.lock().unwrap().push(OracleCall {
            instructions: instructions.to_string(),
            document: serde_json::from_str(context_document).unwrap_or(Value::Null),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OracleError::Unavailable("script exhausted".to_string()))
    }
}

/// Always answers with the same text.
pub struct RepeatingOracle {
    reply: String,
    calls: Mutex<usize>,
}

impl RepeatingOracle {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Oracle for RepeatingOracle {
    fn complete(&self, _: &str, _: &str) -> Result<String, OracleError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.reply.clone())
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Snapshot from `(id, free_bikes, empty_slots)` triples.
pub fn snapshot(stations: &[(&str, i64, i64)]) -> StationSnapshot {
    StationSnapshot::new(
        stations
            .iter()
            .map(|(id, free, empty)| Station::new(*id, *free, *empty))
            .collect(),
    )
    .unwrap()
}

/// Builder for oracle `PLAN` messages.
#[derive(Clone, Debug)]
pub struct PlanMessage {
    truck_capacity: Option<i64>,
    time_budget_min: i64,
    stops: Vec<Value>,
    reason: Option<String>,
    expected_score_delta: Option<i64>,
}

impl PlanMessage {
    pub fn new(truck_capacity: i64) -> Self {
        Self {
            truck_capacity: Some(truck_capacity),
            time_budget_min: 90,
            stops: Vec::new(),
            reason: None,
            expected_score_delta: None,
        }
    }

    pub fn without_capacity(mut self) -> Self {
        self.truck_capacity = None;
        self
    }

    pub fn pickup(mut self, station_id: &str, bikes: i64) -> Self {
        self.stops
            .push(json!({"station_id": station_id, "action": "pickup", "bikes": bikes}));
        self
    }

    pub fn dropoff(mut self, station_id: &str, bikes: i64) -> Self {
        self.stops
            .push(json!({"station_id": station_id, "action": "dropoff", "bikes": bikes}));
        self
    }

    pub fn revision(mut self, reason: &str, expected_score_delta: i64) -> Self {
        self.reason = Some(reason.to_string());
        self.expected_score_delta = Some(expected_score_delta);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut assumptions = json!({"time_budget_min": self.time_budget_min});
        if let Some(capacity) = self.truck_capacity {
            assumptions["truck_capacity"] = json!(capacity);
        }
        let mut message = json!({
            "type": "PLAN",
            "assumptions": assumptions,
            "stops": self.stops,
        });
        if let Some(reason) = &self.reason {
            message["reason"] = json!(reason);
        }
        if let Some(delta) = self.expected_score_delta {
            message["expected_score_delta"] = json!(delta);
        }
        message
    }

    pub fn render(&self) -> String {
        self.to_value().to_string()
    }
}

pub fn capability_request(tool: &str, args: Value) -> String {
    json!({"type": "CAPABILITY_REQUEST", "tool": tool, "args": args}).to_string()
}

pub fn approved(reason: &str) -> String {
    json!({"type": "APPROVED", "reason": reason, "expected_score_delta": 0}).to_string()
}

// ============================================================================
// Fake catalogs
// ============================================================================

/// Catalog whose `get_nearby_stations` returns the given stations regardless
/// of arguments.
pub fn fake_station_catalog(stations: &[(&str, i64, i64)]) -> Catalog {
    let rows: Vec<(String, i64, i64)> = stations
        .iter()
        .map(|(id, free, empty)| (id.to_string(), *free, *empty))
        .collect();

    let mut catalog = Catalog::new();
    catalog
        .register(
            "get_nearby_stations",
            Arc::new(FnCapability::new(
                vec![
                    Param::required("lat"),
                    Param::required("lon"),
                    Param::optional("k"),
                    Param::optional("radius_km"),
                ],
                move |_: &CallArgs| {
                    let mut table = Table::new(["id", "free_bikes", "empty_slots"]);
                    for (id, free, empty) in &rows {
                        table.push_row(vec![Datum::from(id.as_str()), Datum::Int(*free), Datum::Int(*empty)]);
                    }
                    Ok(Datum::Table(table))
                },
            )),
            &[
                ("lat", ArgType::Float),
                ("lon", ArgType::Float),
                ("k", ArgType::Int),
                ("radius_km", ArgType::Float),
            ],
            "Stations near a point.",
        )
        .unwrap();
    catalog
}
