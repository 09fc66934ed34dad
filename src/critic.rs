//! Critic-revision loop.
//!
//! Starting from a feasible seed, the oracle (in a critic role that cannot
//! request capabilities) may propose revisions. A revision replaces the best
//! plan only if it validates and scores at least as well. This loop never
//! fails: any oracle misbehavior counts as approval of the current best.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::plan::Plan;
use crate::prompt::critic_instructions;
use crate::protocol::OracleReply;
use crate::scorer::{DEFAULT_LOW_THRESHOLD, ScoreResult, score};
use crate::station::StationSnapshot;
use crate::traits::Oracle;
use crate::validator::{ValidationError, validate};

#[derive(Debug, Clone)]
pub struct CriticOptions {
    /// Maximum critic rounds (oracle interactions).
    pub max_revisions: usize,
    pub low_threshold: i64,
}

impl Default for CriticOptions {
    fn default() -> Self {
        Self {
            max_revisions: 4,
            low_threshold: DEFAULT_LOW_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Approved,
    RevisionBudgetExhausted,
    /// The seed handed in did not validate; it is returned untouched.
    InfeasibleSeed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    Approved {
        /// The reply was unusable and treated as approval.
        implicit: bool,
        reason: Option<String>,
    },
    /// Revision failed validation; its violations go back to the critic.
    Rejected { violations: Vec<ValidationError> },
    /// Revision validated and did not score lower; it is the new best.
    Accepted {
        score: u64,
        expected_score_delta: Option<i64>,
    },
    /// Revision validated but scored lower than the best plan.
    Regressed {
        score: u64,
        expected_score_delta: Option<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRound {
    pub round: usize,
    pub outcome: RoundOutcome,
    /// Best score after this round.
    pub best_score: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub plan: Plan,
    pub score: ScoreResult,
    pub rounds: Vec<RevisionRound>,
    pub stop: StopReason,
}

pub fn run_critic_loop<O>(
    oracle: &O,
    seed: Plan,
    snapshot: &StationSnapshot,
    options: &CriticOptions,
) -> Refinement
where
    O: Oracle + ?Sized,
{
    let mut best_score = score(&seed, snapshot, options.low_threshold);

    let seed_violations = validate(&seed, snapshot);
    if !seed_violations.is_empty() {
        warn!(violations = seed_violations.len(), "critic seed is infeasible, skipping review");
        return Refinement {
            plan: seed,
            score: best_score,
            rounds: Vec::new(),
            stop: StopReason::InfeasibleSeed,
        };
    }

    let mut best_plan = seed;
    let mut rejected: Option<(Plan, Vec<ValidationError>)> = None;
    let mut rounds = Vec::new();
    let mut stop = StopReason::RevisionBudgetExhausted;

    for round in 1..=options.max_revisions {
        let document = critic_document(
            snapshot,
            &best_plan,
            &best_score,
            options.low_threshold,
            rejected.as_ref(),
        );
        let reply = match oracle.complete(critic_instructions(), &document) {
            Ok(raw) => OracleReply::parse(&raw),
            Err(err) => OracleReply::Malformed {
                reason: err.to_string(),
            },
        };

        let proposal = match reply {
            OracleReply::Plan(proposal) if proposal.complete => proposal,
            OracleReply::Approved { reason, .. } => {
                info!(round, score = best_score.score, "critic approved plan");
                rounds.push(RevisionRound {
                    round,
                    outcome: RoundOutcome::Approved {
                        implicit: false,
                        reason,
                    },
                    best_score: best_score.score,
                });
                stop = StopReason::Approved;
                break;
            }
            other => {
                warn!(round, kind = other.kind(), "unusable critic reply, treating as approval");
                rounds.push(RevisionRound {
                    round,
                    outcome: RoundOutcome::Approved {
                        implicit: true,
                        reason: None,
                    },
                    best_score: best_score.score,
                });
                stop = StopReason::Approved;
                break;
            }
        };

        let violations = validate(&proposal.plan, snapshot);
        if !violations.is_empty() {
            info!(round, violations = violations.len(), "critic revision rejected");
            rounds.push(RevisionRound {
                round,
                outcome: RoundOutcome::Rejected {
                    violations: violations.clone(),
                },
                best_score: best_score.score,
            });
            rejected = Some((proposal.plan, violations));
            continue;
        }
        rejected = None;

        let candidate = score(&proposal.plan, snapshot, options.low_threshold);
        if let Some(expected) = proposal.expected_score_delta {
            let actual = i128::from(candidate.score) - i128::from(best_score.score);
            if i128::from(expected) != actual {
                debug!(round, expected, actual, "critic score estimate differs from observed delta");
            }
        }

        let outcome = if candidate.score >= best_score.score {
            info!(round, from = best_score.score, to = candidate.score, "critic revision accepted");
            best_plan = proposal.plan;
            best_score = candidate;
            RoundOutcome::Accepted {
                score: best_score.score,
                expected_score_delta: proposal.expected_score_delta,
            }
        } else {
            info!(round, best = best_score.score, candidate = candidate.score, "critic revision regressed");
            RoundOutcome::Regressed {
                score: candidate.score,
                expected_score_delta: proposal.expected_score_delta,
            }
        };
        rounds.push(RevisionRound {
            round,
            outcome,
            best_score: best_score.score,
        });
    }

    Refinement {
        plan: best_plan,
        score: best_score,
        rounds,
        stop,
    }
}

fn critic_document(
    snapshot: &StationSnapshot,
    plan: &Plan,
    best: &ScoreResult,
    low_threshold: i64,
    rejected: Option<&(Plan, Vec<ValidationError>)>,
) -> String {
    let mut document = Map::new();
    document.insert("stations".to_string(), snapshot.to_json());
    document.insert("plan".to_string(), plan.to_json());
    document.insert("score".to_string(), json!(best));
    document.insert("low_threshold".to_string(), json!(low_threshold));
    if let Some((revision, violations)) = rejected {
        document.insert("rejected_revision".to_string(), revision.to_json());
        document.insert("validation_errors".to_string(), json!(violations));
    }
    Value::Object(document).to_string()
}
