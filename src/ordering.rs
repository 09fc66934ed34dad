//! Visiting-order hint for the planner.
//!
//! A cheap open-path heuristic over travel durations: nearest neighbour from
//! the start, then 2-opt segment reversals while they shorten the path. The
//! result is advisory; the oracle decides the actual stops.

use tracing::debug;

use crate::traits::TravelMatrix;

/// Cost charged for a leg the provider could not route.
const UNROUTABLE_COST: f64 = 1.0e9;

const MAX_IMPROVEMENT_PASSES: usize = 100;

/// Visiting order over all matrix indices, starting at `start`.
///
/// Returns an empty order when `start` is out of range.
pub fn suggest_order(matrix: &TravelMatrix, start: usize) -> Vec<usize> {
    if start >= matrix.len() {
        return Vec::new();
    }

    let mut order = nearest_neighbour(matrix, start);
    let before = path_cost(matrix, &order);

    let mut passes = 0;
    while passes < MAX_IMPROVEMENT_PASSES && two_opt_improve(matrix, &mut order) {
        passes += 1;
    }

    debug!(
        stops = order.len(),
        passes,
        before,
        after = path_cost(matrix, &order),
        "suggested visiting order"
    );
    order
}

fn leg(matrix: &TravelMatrix, from: usize, to: usize) -> f64 {
    matrix.duration(from, to).unwrap_or(UNROUTABLE_COST)
}

fn nearest_neighbour(matrix: &TravelMatrix, start: usize) -> Vec<usize> {
    let n = matrix.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    let mut current = start;
    visited[current] = true;
    order.push(current);

    while order.len() < n {
        // Ties go to the lower index.
        let next = (0..n)
            .filter(|&candidate| !visited[candidate])
            .min_by(|&a, &b| leg(matrix, current, a).total_cmp(&leg(matrix, current, b)));
        let Some(next) = next else { break };
        visited[next] = true;
        order.push(next);
        current = next;
    }

    order
}

fn path_cost(matrix: &TravelMatrix, order: &[usize]) -> f64 {
    order.windows(2).map(|w| leg(matrix, w[0], w[1])).sum()
}

/// Reverse the first segment whose reversal strictly shortens the path.
/// The first element stays fixed. Returns true if an improvement was made.
fn two_opt_improve(matrix: &TravelMatrix, order: &mut [usize]) -> bool {
    if order.len() < 3 {
        return false;
    }

    let current_cost = path_cost(matrix, order);
    let n = order.len();

    for i in 0..n - 1 {
        for j in i + 2..n {
            // Reverse segment [i+1..=j]
            let mut candidate = order.to_vec();
            candidate[i + 1..=j].reverse();

            if path_cost(matrix, &candidate) < current_cost {
                order[i + 1..=j].reverse();
                return true;
            }
        }
    }

    false
}
