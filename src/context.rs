//! Mutable state threaded through the planning loop.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use crate::plan::Plan;
use crate::station::StationSnapshot;
use crate::validator::ValidationError;

/// Capability whose result is the canonical station snapshot.
pub const SNAPSHOT_CAPABILITY: &str = "get_nearby_stations";

/// Context entry holding the suggested station visiting order.
pub const ORDER_HINT_KEY: &str = "optimized_station_order";

/// Accumulated knowledge for one planning request.
///
/// Owned by a single loop; nothing here is shared between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationContext {
    task: Value,
    snapshot_key: String,
    results: BTreeMap<String, Value>,
    validation_errors: Vec<ValidationError>,
    previous_plan: Option<Plan>,
    approved_plan: Option<Plan>,
}

impl OrchestrationContext {
    pub fn new(task: Value) -> Self {
        Self::with_snapshot_key(task, SNAPSHOT_CAPABILITY)
    }

    /// Context whose station snapshot is read from the result stored under `snapshot_key`.
    pub fn with_snapshot_key(task: Value, snapshot_key: &str) -> Self {
        Self {
            task,
            snapshot_key: snapshot_key.to_string(),
            results: BTreeMap::new(),
            validation_errors: Vec::new(),
            previous_plan: None,
            approved_plan: None,
        }
    }

    pub fn task(&self) -> &Value {
        &self.task
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    /// Store a capability result, replacing any earlier result of the same name.
    pub fn record_result(&mut self, name: &str, value: Value) {
        self.results.insert(name.to_string(), value);
    }

    pub fn result(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    /// Station snapshot as currently known; empty until the snapshot capability ran.
    pub fn snapshot(&self) -> StationSnapshot {
        self.results
            .get(&self.snapshot_key)
            .map(StationSnapshot::from_records)
            .unwrap_or_default()
    }

    /// Remember a rejected plan and why, for the oracle's next step.
    pub fn record_violations(&mut self, plan: Plan, errors: Vec<ValidationError>) {
        self.previous_plan = Some(plan);
        self.validation_errors = errors;
        self.approved_plan = None;
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    pub fn approve(&mut self, plan: Plan) {
        self.validation_errors.clear();
        self.previous_plan = None;
        self.approved_plan = Some(plan);
    }

    pub fn approved_plan(&self) -> Option<&Plan> {
        self.approved_plan.as_ref()
    }

    /// JSON document handed to the oracle alongside its instructions.
    pub fn render(&self) -> String {
        let mut document = Map::new();
        document.insert("task".to_string(), self.task.clone());
        document.insert(
            "context".to_string(),
            Value::Object(
                self.results
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        );
        if let Some(plan) = &self.previous_plan {
            document.insert("previous_plan".to_string(), plan.to_json());
        }
        if !self.validation_errors.is_empty() {
            document.insert("validation_errors".to_string(), json!(self.validation_errors));
        }
        if let Some(plan) = &self.approved_plan {
            document.insert("approved_plan".to_string(), plan.to_json());
        }
        Value::Object(document).to_string()
    }
}
