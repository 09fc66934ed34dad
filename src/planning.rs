//! Bounded planning loop.
//!
//! Each step asks the oracle for one message and either runs the requested
//! capability or validates the proposed plan. The first plan that validates
//! cleanly ends the loop; quality is left to [`crate::critic`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::coerce::{coerce, validate_signature};
use crate::context::OrchestrationContext;
use crate::error::PlannerError;
use crate::plan::Plan;
use crate::prompt::planner_instructions;
use crate::protocol::{APPROVED, OracleReply};
use crate::traits::Oracle;
use crate::validator::validate;

/// What to do when a requested capability cannot be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityFailurePolicy {
    /// Abort the request.
    #[default]
    Propagate,
    /// Store a `tool_error` entry under the capability name and keep going.
    /// Unknown capability names still abort.
    ReportToOracle,
}

#[derive(Debug, Clone)]
pub struct PlanningOptions {
    /// Maximum oracle interactions before giving up.
    pub max_steps: usize,
    pub capability_failures: CapabilityFailurePolicy,
}

impl Default for PlanningOptions {
    fn default() -> Self {
        Self {
            max_steps: 20,
            capability_failures: CapabilityFailurePolicy::Propagate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanningOutcome {
    /// First plan that passed validation.
    pub plan: Plan,
    /// Oracle interactions used, including the one that produced `plan`.
    pub steps: usize,
}

/// Drive the oracle until it proposes a valid plan or the step budget runs out.
pub fn run_planning_loop<O>(
    oracle: &O,
    catalog: &Catalog,
    ctx: &mut OrchestrationContext,
    options: &PlanningOptions,
) -> Result<PlanningOutcome, PlannerError>
where
    O: Oracle + ?Sized,
{
    let instructions = planner_instructions(catalog);

    for step in 1..=options.max_steps {
        let raw = oracle.complete(&instructions, &ctx.render())?;
        let reply = OracleReply::parse(&raw);
        debug!(step, kind = reply.kind(), bytes = raw.len(), "oracle replied");

        match reply {
            OracleReply::CapabilityRequest { tool, args } => {
                match invoke_capability(catalog, &tool, &args) {
                    Ok(result) => {
                        info!(step, capability = %tool, "capability result stored");
                        ctx.record_result(&tool, result);
                    }
                    Err(err) if reportable(&err, options.capability_failures) => {
                        warn!(step, capability = %tool, error = %err, "capability failed, reporting to oracle");
                        ctx.record_result(
                            &tool,
                            json!({"tool_error": {"message": err.to_string(), "args": Value::Object(args)}}),
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            OracleReply::Plan(proposal) => {
                let errors = validate(&proposal.plan, &ctx.snapshot());
                if errors.is_empty() {
                    info!(step, stops = proposal.plan.stops.len(), "plan validated");
                    ctx.approve(proposal.plan.clone());
                    return Ok(PlanningOutcome {
                        plan: proposal.plan,
                        steps: step,
                    });
                }
                info!(step, violations = errors.len(), "plan rejected");
                ctx.record_violations(proposal.plan, errors);
            }
            OracleReply::Malformed { reason } => {
                return Err(PlannerError::MalformedOracleOutput { raw, reason });
            }
            OracleReply::Approved { .. } => {
                return Err(PlannerError::UnknownOutputType {
                    kind: APPROVED.to_string(),
                    raw,
                });
            }
            OracleReply::Unknown { kind } => {
                return Err(PlannerError::UnknownOutputType { kind, raw });
            }
        }
    }

    Err(PlannerError::PlannerDidNotConverge {
        steps: options.max_steps,
    })
}

/// Look up, coerce, check and run one capability; returns its canonical JSON result.
pub fn invoke_capability(
    catalog: &Catalog,
    name: &str,
    raw_args: &Map<String, Value>,
) -> Result<Value, PlannerError> {
    let spec = catalog.lookup(name)?;
    let args = coerce(raw_args, &spec.arg_types)?;
    validate_signature(name, spec.callable.params(), &args)?;

    let result = spec
        .callable
        .call(&args)
        .map_err(|source| PlannerError::CapabilityFailed {
            name: name.to_string(),
            args: Value::Object(raw_args.clone()),
            source,
        })?;

    Ok(result.to_json())
}

fn reportable(err: &PlannerError, policy: CapabilityFailurePolicy) -> bool {
    policy == CapabilityFailurePolicy::ReportToOracle
        && err.is_capability_error()
        && !matches!(err, PlannerError::UnknownCapability { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::{FnCapability, Param};
    use crate::coerce::{ArgType, CallArgs};
    use crate::datum::{Datum, Table};
    use crate::error::CapabilityError;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .register(
                "get_nearby_stations",
                Arc::new(FnCapability::new(
                    vec![Param::required("k"), Param::optional("radius_km")],
                    |args: &CallArgs| {
                        let k = args.i64("k")?;
                        let mut table = Table::new(["id", "free_bikes", "empty_slots"]);
                        for i in 0..k {
                            table.push_row(vec![
                                Datum::from(format!("s{}", i)),
                                Datum::Int(i),
                                Datum::float(f64::NAN),
                            ]);
                        }
                        Ok(Datum::Table(table))
                    },
                )),
                &[("k", ArgType::Int), ("radius_km", ArgType::Float)],
                "",
            )
            .unwrap();
        catalog
            .register(
                "broken",
                Arc::new(FnCapability::new(vec![], |_: &CallArgs| {
                    Err(CapabilityError::Upstream("routing service down".to_string()))
                })),
                &[],
                "",
            )
            .unwrap();
        catalog
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_invoke_serializes_table_canonically() {
        let result = invoke_capability(&catalog(), "get_nearby_stations", &args(json!({"k": "2"}))).unwrap();
        assert_eq!(
            result,
            json!([
                {"id": "s0", "free_bikes": 0, "empty_slots": null},
                {"id": "s1", "free_bikes": 1, "empty_slots": null}
            ])
        );
    }

    #[test]
    fn test_invoke_checks_signature_before_calling() {
        let err = invoke_capability(&catalog(), "get_nearby_stations", &args(json!({"radius_km": 1})))
            .unwrap_err();
        assert!(matches!(err, PlannerError::MissingRequiredArgument { .. }));

        let err = invoke_capability(&catalog(), "get_nearby_stations", &args(json!({"k": 1, "lat": 3})))
            .unwrap_err();
        assert!(matches!(err, PlannerError::UnexpectedArgument { .. }));
    }

    #[test]
    fn test_invoke_wraps_capability_failure() {
        let err = invoke_capability(&catalog(), "broken", &Map::new()).unwrap_err();
        match err {
            PlannerError::CapabilityFailed { name, args, .. } => {
                assert_eq!(name, "broken");
                assert_eq!(args, json!({}));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_reportable_policy() {
        let failed = invoke_capability(&catalog(), "broken", &Map::new()).unwrap_err();
        let unknown = invoke_capability(&catalog(), "nope", &Map::new()).unwrap_err();

        assert!(!reportable(&failed, CapabilityFailurePolicy::Propagate));
        assert!(reportable(&failed, CapabilityFailurePolicy::ReportToOracle));
        assert!(!reportable(&unknown, CapabilityFailurePolicy::ReportToOracle));
    }
}
