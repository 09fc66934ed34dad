//! End-to-end planning request: context setup, planning loop, critic loop.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, info_span, warn};

use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::context::{ORDER_HINT_KEY, OrchestrationContext, SNAPSHOT_CAPABILITY};
use crate::critic::{RevisionRound, StopReason, run_critic_loop};
use crate::error::PlannerError;
use crate::ordering::suggest_order;
use crate::plan::Plan;
use crate::planning::{invoke_capability, run_planning_loop};
use crate::scorer::ScoreResult;
use crate::station::Coordinate;
use crate::traits::{DistanceMatrixProvider, Oracle};

/// Result of one planning request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub plan: Plan,
    pub score: ScoreResult,
    /// Oracle interactions used by the planning loop.
    pub planning_steps: usize,
    pub revisions: Vec<RevisionRound>,
    pub stop: StopReason,
}

pub struct Orchestrator<O> {
    oracle: O,
    catalog: Arc<Catalog>,
    matrix: Option<Arc<dyn DistanceMatrixProvider>>,
    config: PlannerConfig,
}

impl<O: Oracle> Orchestrator<O> {
    pub fn new(oracle: O, catalog: Arc<Catalog>, config: PlannerConfig) -> Self {
        Self {
            oracle,
            catalog,
            matrix: None,
            config,
        }
    }

    /// Provider used for the suggested visiting order.
    pub fn with_matrix(mut self, matrix: Arc<dyn DistanceMatrixProvider>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a route for `task` and refine it with the critic.
    pub fn run(&self, task: Value) -> Result<Outcome, PlannerError> {
        let _span = info_span!("rebalance").entered();

        let start = task_start(&task);
        let mut ctx = OrchestrationContext::new(task);

        if let Some(start) = start {
            if self.config.prefetch_stations {
                self.prefetch_stations(&mut ctx, start)?;
            }
            if self.config.suggest_order {
                self.suggest_visiting_order(&mut ctx, start);
            }
        }

        let planned = run_planning_loop(
            &self.oracle,
            &self.catalog,
            &mut ctx,
            &self.config.planning_options(),
        )?;
        info!(steps = planned.steps, "planning loop produced a valid plan");

        let refinement = run_critic_loop(
            &self.oracle,
            planned.plan,
            &ctx.snapshot(),
            &self.config.critic_options(),
        );
        info!(
            score = refinement.score.score,
            rounds = refinement.rounds.len(),
            stop = ?refinement.stop,
            "critic loop finished"
        );

        Ok(Outcome {
            plan: refinement.plan,
            score: refinement.score,
            planning_steps: planned.steps,
            revisions: refinement.rounds,
            stop: refinement.stop,
        })
    }

    fn prefetch_stations(
        &self,
        ctx: &mut OrchestrationContext,
        start: Coordinate,
    ) -> Result<(), PlannerError> {
        if !self.catalog.contains(SNAPSHOT_CAPABILITY) {
            return Ok(());
        }

        let mut args = Map::new();
        args.insert("lat".to_string(), json!(start.lat));
        args.insert("lon".to_string(), json!(start.lon));
        args.insert("k".to_string(), json!(self.config.nearby_k));
        args.insert("radius_km".to_string(), json!(self.config.nearby_radius_km));

        match invoke_capability(&self.catalog, SNAPSHOT_CAPABILITY, &args) {
            Ok(result) => {
                ctx.record_result(SNAPSHOT_CAPABILITY, result);
                info!(stations = ctx.snapshot().len(), "prefetched nearby stations");
                Ok(())
            }
            Err(err) if err.is_capability_error() => {
                warn!(error = %err, "station prefetch failed, leaving it to the oracle");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn suggest_visiting_order(&self, ctx: &mut OrchestrationContext, start: Coordinate) {
        let Some(matrix) = &self.matrix else {
            return;
        };

        let snapshot = ctx.snapshot();
        let located: Vec<(&str, Coordinate)> = snapshot
            .iter()
            .filter_map(|station| Some((station.id.as_str(), station.coordinate()?)))
            .collect();
        if located.is_empty() {
            return;
        }

        let locations: Vec<(f64, f64)> = std::iter::once(start.as_pair())
            .chain(located.iter().map(|(_, coordinate)| coordinate.as_pair()))
            .collect();

        let travel = match matrix.matrix_for(&locations) {
            Ok(travel) => travel,
            Err(err) => {
                warn!(error = %err, "no travel matrix, skipping visiting order");
                return;
            }
        };
        if travel.len() != locations.len() {
            warn!(
                expected = locations.len(),
                got = travel.len(),
                "travel matrix has the wrong size, skipping visiting order"
            );
            return;
        }

        // Index 0 is the start; stations follow at offset 1.
        let order: Vec<&str> = suggest_order(&travel, 0)
            .into_iter()
            .filter_map(|index| located.get(index.checked_sub(1)?))
            .map(|(id, _)| *id)
            .collect();
        ctx.record_result(ORDER_HINT_KEY, json!(order));
    }
}

/// Truck start position from `start` or `start_coordinates`.
fn task_start(task: &Value) -> Option<Coordinate> {
    let start = task.get("start").or_else(|| task.get("start_coordinates"))?;
    let lat = start.get("lat")?.as_f64()?;
    let lon = start.get("lon")?.as_f64()?;
    Some(Coordinate::new(lat, lon))
}
