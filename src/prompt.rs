//! Instruction texts for the two oracle roles.

use crate::catalog::Catalog;

const PLANNER_PREAMBLE: &str = "\
You plan pickup and drop-off stops for a city bike-rebalancing truck.

Reply with exactly one JSON object per turn and nothing else.

1. Ask for missing information:
{\"type\": \"CAPABILITY_REQUEST\", \"tool\": \"<name>\", \"args\": {...}}

2. Propose a plan:
{\"type\": \"PLAN\",
 \"assumptions\": {\"truck_capacity\": <int>, \"time_budget_min\": <int>},
 \"stops\": [{\"station_id\": \"<id>\", \"action\": \"pickup\" | \"dropoff\", \"bikes\": <int>}, ...]}

Rules:
- Only use station ids that appear in the context.
- The truck starts empty. Its load may never go below 0 or above truck_capacity.
- Never pick up more bikes than a station has, never drop off more than it has free slots.
- If the input contains validation_errors, the next PLAN must fix every one of them.
- Ask only for what you need; context grows with every request.

Available capabilities:
";

const CRITIC_PREAMBLE: &str = "\
You review a validated bike-rebalancing plan and may propose one improvement.

The score counts bikes dropped off at stations that were nearly empty before the
route started. Higher is better. You cannot request more information: reason only
from the stations, plan and score you are given.

Reply with exactly one JSON object and nothing else:

{\"type\": \"APPROVED\", \"reason\": \"<why no change helps>\", \"expected_score_delta\": 0}

or a revised plan:

{\"type\": \"PLAN\", \"reason\": \"<what changed>\", \"expected_score_delta\": <int >= 1>,
 \"assumptions\": {\"truck_capacity\": <int>, \"time_budget_min\": <int>},
 \"stops\": [{\"station_id\": \"<id>\", \"action\": \"pickup\" | \"dropoff\", \"bikes\": <int>}, ...]}

A revision must stay feasible: load within [0, truck_capacity] after every stop,
pickups within free_bikes, dropoffs within empty_slots. If validation_errors are
given, they describe your previous revision.
";

/// Planner instructions with the rendered capability catalog appended.
pub fn planner_instructions(catalog: &Catalog) -> String {
    format!("{}{}\n", PLANNER_PREAMBLE, catalog.render_catalog())
}

pub fn critic_instructions() -> &'static str {
    CRITIC_PREAMBLE
}
