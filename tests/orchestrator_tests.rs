//! End-to-end requests over the built-in capabilities and a static Palma feed.

mod fixtures;

use std::sync::Arc;

use serde_json::{Map, Value, json};

use bike_rebalancer::catalog::Catalog;
use bike_rebalancer::config::PlannerConfig;
use bike_rebalancer::critic::StopReason;
use bike_rebalancer::error::{CapabilityError, PlannerError};
use bike_rebalancer::haversine::HaversineMatrix;
use bike_rebalancer::orchestrator::Orchestrator;
use bike_rebalancer::planning::invoke_capability;
use bike_rebalancer::tools::register_builtins;
use bike_rebalancer::traits::{DistanceMatrixProvider, StaticFeed, TravelMatrix};

use fixtures::{
    DEPOT, PALMA_STATIONS, PlanMessage, RepeatingOracle, ScriptedOracle, approved,
    capability_request, distance_km, palma_observations,
};

// ============================================================================
// Helpers
// ============================================================================

fn palma_catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    register_builtins(
        &mut catalog,
        Arc::new(StaticFeed::new(palma_observations())),
        Arc::new(HaversineMatrix::default()),
    )
    .unwrap();
    Arc::new(catalog)
}

fn depot_task() -> Value {
    json!({
        "task": "PLAN_ROUTE",
        "start": {"lat": DEPOT.0, "lon": DEPOT.1},
        "truck_capacity": 10,
    })
}

fn rebalancing_plan() -> PlanMessage {
    PlanMessage::new(10)
        .pickup("pl-espanya", 10)
        .dropoff("borne", 5)
        .dropoff("pl-major", 5)
}

/// Provider that answers with one row too many.
struct OversizedMatrix;

impl DistanceMatrixProvider for OversizedMatrix {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, CapabilityError> {
        let n = locations.len() + 1;
        Ok(TravelMatrix {
            distances_m: vec![vec![Some(100.0); n]; n],
            durations_s: vec![vec![Some(10.0); n]; n],
        })
    }
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Full requests
// ============================================================================

#[test]
fn test_prefetch_order_hint_plan_and_review() {
    let oracle = ScriptedOracle::new([rebalancing_plan().render(), approved("serves both empty stations")]);
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), PlannerConfig::default())
        .with_matrix(Arc::new(HaversineMatrix::default()));

    let outcome = orchestrator.run(depot_task()).unwrap();

    assert_eq!(outcome.planning_steps, 1);
    assert_eq!(outcome.score.score, 10);
    assert_eq!(outcome.stop, StopReason::Approved);
    assert_eq!(outcome.revisions.len(), 1);

    let first = &oracle.calls()[0].document;
    let nearby = first["context"]["get_nearby_stations"].as_array().unwrap();
    assert_eq!(nearby.len(), 5, "Porto Pi lies outside the 3 km radius");
    assert_eq!(nearby[0]["id"], "pl-espanya");

    let order: Vec<&str> = first["context"]["optimized_station_order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap())
        .collect();
    assert_eq!(order.len(), 5);
    assert_eq!(order[0], "pl-espanya");
    assert!(!order.contains(&"portopi"));
}

#[test]
fn test_wrong_sized_matrix_skips_order_hint() {
    let oracle = ScriptedOracle::new([rebalancing_plan().render(), approved("fine")]);
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), PlannerConfig::default())
        .with_matrix(Arc::new(OversizedMatrix));

    let outcome = orchestrator.run(depot_task()).unwrap();

    assert_eq!(outcome.score.score, 10);
    let context = &oracle.calls()[0].document["context"];
    assert!(context.get("optimized_station_order").is_none());
    assert!(context.get("get_nearby_stations").is_some());
}

#[test]
fn test_outcome_serializes_for_the_cli() {
    let oracle = ScriptedOracle::new([rebalancing_plan().render(), approved("fine")]);
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), PlannerConfig::default());

    let outcome = orchestrator.run(depot_task()).unwrap();
    let rendered = serde_json::to_value(&outcome).unwrap();

    assert_eq!(rendered["score"]["metric"], "low_station_dropoffs");
    assert_eq!(rendered["stop"], "approved");
    assert_eq!(rendered["revisions"][0]["outcome"]["outcome"], "approved");
    assert_eq!(rendered["plan"]["stops"][1]["action"], "dropoff");
}

#[test]
fn test_without_start_the_oracle_fetches_stations_itself() {
    let oracle = ScriptedOracle::new([
        capability_request(
            "get_nearby_stations",
            json!({"lat": DEPOT.0, "lon": DEPOT.1, "k": 3, "radius_km": 2.5}),
        ),
        PlanMessage::new(10).pickup("pl-espanya", 4).dropoff("pl-major", 4).render(),
        approved("fine"),
    ]);
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), PlannerConfig::default())
        .with_matrix(Arc::new(HaversineMatrix::default()));

    let outcome = orchestrator.run(json!({"task": "PLAN_ROUTE"})).unwrap();

    assert_eq!(outcome.planning_steps, 2);
    assert_eq!(outcome.score.score, 4);
    let first = &oracle.calls()[0].document;
    assert_eq!(first["context"], json!({}));
}

#[test]
fn test_disabled_prefetch_leaves_context_empty() {
    let oracle = ScriptedOracle::new([PlanMessage::new(10).render(), approved("nothing to do")]);
    let config = PlannerConfig {
        prefetch_stations: false,
        ..PlannerConfig::default()
    };
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), config)
        .with_matrix(Arc::new(HaversineMatrix::default()));

    let outcome = orchestrator.run(depot_task()).unwrap();

    assert_eq!(outcome.score.score, 0);
    assert_eq!(oracle.calls()[0].document["context"], json!({}));
}

#[test]
fn test_planning_failure_aborts_request() {
    let oracle = RepeatingOracle::new(PlanMessage::new(10).dropoff("borne", 3).render());
    let config = PlannerConfig {
        max_steps: 3,
        ..PlannerConfig::default()
    };
    let orchestrator = Orchestrator::new(&oracle, palma_catalog(), config);

    let err = orchestrator.run(depot_task()).unwrap_err();
    assert!(matches!(err, PlannerError::PlannerDidNotConverge { steps: 3 }));
    assert_eq!(oracle.call_count(), 3);
}

// ============================================================================
// Built-in capabilities through the catalog
// ============================================================================

#[test]
fn test_distances_between_palma_stations() {
    let catalog = palma_catalog();
    let stations: Vec<Value> = PALMA_STATIONS[..3]
        .iter()
        .map(|s| json!({"id": s.id, "latitude": s.lat, "longitude": s.lon}))
        .collect();

    let result = invoke_capability(
        &catalog,
        "get_distances",
        &args(json!({
            "stations": stations,
            "start_coordinates": {"lat": DEPOT.0, "lon": DEPOT.1},
        })),
    )
    .unwrap();

    assert_eq!(result["ids"], json!(["start", "pl-espanya", "pl-major", "olivar"]));
    assert_eq!(result["units"], json!({"distance": "km", "duration": "min"}));

    let pairs = result["pairs"].as_array().unwrap();
    assert_eq!(pairs.len(), 6);
    let durations: Vec<f64> = pairs.iter().map(|p| p["duration_min"].as_f64().unwrap()).collect();
    assert!(durations.windows(2).all(|w| w[0] <= w[1]));

    let major_olivar = pairs
        .iter()
        .find(|p| p["from"] == "pl-major" && p["to"] == "olivar")
        .unwrap();
    let expected = distance_km(&PALMA_STATIONS[1], &PALMA_STATIONS[2]);
    assert!((major_olivar["distance_km"].as_f64().unwrap() - expected).abs() < 1e-9);
}

#[test]
fn test_station_features_through_catalog() {
    let result = invoke_capability(
        &palma_catalog(),
        "get_station_features",
        &args(json!({"station_ids": ["borne", "catedral"], "fields": ["free_bikes"]})),
    )
    .unwrap();

    assert_eq!(
        result,
        json!([
            {"id": "borne", "free_bikes": 0},
            {"id": "catedral", "free_bikes": 2}
        ])
    );
}

#[test]
fn test_nearby_rejects_non_positive_k() {
    let err = invoke_capability(
        &palma_catalog(),
        "get_nearby_stations",
        &args(json!({"lat": DEPOT.0, "lon": DEPOT.1, "k": 0, "radius_km": 3.0})),
    )
    .unwrap_err();

    assert!(matches!(err, PlannerError::CapabilityFailed { ref name, .. } if name == "get_nearby_stations"));
}
