//! Deterministic plan validation by simulated execution.
//!
//! The simulation keeps going after a violation so a single pass reports every
//! problem with a plan. Errors are ordered by the stop that produced them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::plan::{Action, Plan};
use crate::station::StationSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    MissingTruckCapacity,
    UnknownStation,
    InvalidBikes,
    PickupExceedsAvailable,
    DropoffExceedsCapacity,
    InvalidAction,
    NegativeTruckLoad,
    CapacityExceeded,
}

/// One feasibility violation, serialized for the oracle as `{"code", "detail"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "code")]
    pub kind: ViolationKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_index: Option<usize>,
}

impl ValidationError {
    fn at(kind: ViolationKind, stop_index: usize, detail: String) -> Self {
        Self {
            kind,
            detail,
            stop_index: Some(stop_index),
        }
    }
}

/// Result of simulating a plan against a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simulation {
    pub violations: Vec<ValidationError>,
    /// Vehicle load after each stop that changed it, in stop order.
    pub load_profile: Vec<i64>,
}

impl Simulation {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn final_load(&self) -> i64 {
        self.load_profile.last().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Occupancy {
    free_bikes: i64,
    empty_slots: i64,
}

/// Validate a plan; an empty result means the plan is feasible.
pub fn validate(plan: &Plan, snapshot: &StationSnapshot) -> Vec<ValidationError> {
    simulate(plan, snapshot).violations
}

/// Simulate a plan on a private copy of the snapshot.
pub fn simulate(plan: &Plan, snapshot: &StationSnapshot) -> Simulation {
    let mut simulation = Simulation::default();

    let Some(truck_capacity) = plan.assumptions.truck_capacity else {
        simulation.violations.push(ValidationError {
            kind: ViolationKind::MissingTruckCapacity,
            detail: "truck_capacity missing from assumptions".to_string(),
            stop_index: None,
        });
        return simulation;
    };

    let mut stations: HashMap<&str, Occupancy> = snapshot
        .iter()
        .map(|station| {
            (
                station.id.as_str(),
                Occupancy {
                    free_bikes: station.free_bikes,
                    empty_slots: station.empty_slots,
                },
            )
        })
        .collect();

    let mut current_load: i64 = 0;
    let errors = &mut simulation.violations;

    for (i, stop) in plan.stops.iter().enumerate() {
        let station_id = stop.station_id.as_str();
        let Some(station) = stations.get_mut(station_id) else {
            errors.push(ValidationError::at(
                ViolationKind::UnknownStation,
                i,
                format!("Station {} not found in context", station_id),
            ));
            continue;
        };

        let bikes = match stop.bikes {
            Some(bikes) if bikes >= 0 => bikes,
            _ => {
                errors.push(ValidationError::at(
                    ViolationKind::InvalidBikes,
                    i,
                    format!("Invalid bikes value at {}", station_id),
                ));
                continue;
            }
        };

        match &stop.action {
            Action::Pickup => {
                if bikes > station.free_bikes {
                    errors.push(ValidationError::at(
                        ViolationKind::PickupExceedsAvailable,
                        i,
                        format!(
                            "Pickup {} from {}, only {} available",
                            bikes, station_id, station.free_bikes
                        ),
                    ));
                }
                station.free_bikes = station.free_bikes.saturating_sub(bikes);
                station.empty_slots = station.empty_slots.saturating_add(bikes);
                current_load = current_load.saturating_add(bikes);
            }
            Action::Dropoff => {
                if bikes > station.empty_slots {
                    errors.push(ValidationError::at(
                        ViolationKind::DropoffExceedsCapacity,
                        i,
                        format!(
                            "Dropoff {} to {}, only {} slots available",
                            bikes, station_id, station.empty_slots
                        ),
                    ));
                }
                station.free_bikes = station.free_bikes.saturating_add(bikes);
                station.empty_slots = station.empty_slots.saturating_sub(bikes);
                current_load = current_load.saturating_sub(bikes);
            }
            Action::Other(action) => {
                errors.push(ValidationError::at(
                    ViolationKind::InvalidAction,
                    i,
                    format!("Invalid action '{}' at {}", action, station_id),
                ));
                continue;
            }
        }

        simulation.load_profile.push(current_load);

        if current_load < 0 {
            errors.push(ValidationError::at(
                ViolationKind::NegativeTruckLoad,
                i,
                format!("Truck load became negative after stop {}", i),
            ));
        }
        if current_load > truck_capacity {
            errors.push(ValidationError::at(
                ViolationKind::CapacityExceeded,
                i,
                format!(
                    "Truck load {} exceeds capacity {} at stop {}",
                    current_load, truck_capacity, i
                ),
            ));
        }
    }

    simulation
}
