//! Oracle message protocol.
//!
//! Raw oracle text is parsed into [`OracleReply`] right at the boundary; the
//! loops only ever branch on the variant.

use serde_json::{Map, Value};

use crate::datum::integral;
use crate::plan::Plan;

pub const CAPABILITY_REQUEST: &str = "CAPABILITY_REQUEST";
/// Older spelling of [`CAPABILITY_REQUEST`], still accepted.
pub const TOOL_REQUEST: &str = "TOOL_REQUEST";
pub const PLAN: &str = "PLAN";
pub const APPROVED: &str = "APPROVED";

#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    CapabilityRequest {
        tool: String,
        args: Map<String, Value>,
    },
    Plan(PlanProposal),
    Approved {
        reason: Option<String>,
        expected_score_delta: Option<i64>,
    },
    /// Well-formed message with a `type` the protocol does not define.
    Unknown { kind: String },
    /// Not a protocol message at all.
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanProposal {
    pub plan: Plan,
    /// Both `assumptions` and `stops` were present in the message.
    pub complete: bool,
    pub reason: Option<String>,
    pub expected_score_delta: Option<i64>,
}

impl OracleReply {
    pub fn parse(raw: &str) -> OracleReply {
        let body = strip_code_fence(raw);
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(err) => {
                return OracleReply::Malformed {
                    reason: err.to_string(),
                };
            }
        };

        let Some(message) = value.as_object() else {
            return OracleReply::Malformed {
                reason: "message is not a JSON object".to_string(),
            };
        };
        let Some(kind) = message.get("type").and_then(Value::as_str) else {
            return OracleReply::Malformed {
                reason: "message has no string 'type' field".to_string(),
            };
        };

        match kind {
            CAPABILITY_REQUEST | TOOL_REQUEST => parse_capability_request(message),
            PLAN => match Plan::from_value(&value) {
                Ok(plan) => OracleReply::Plan(PlanProposal {
                    plan,
                    complete: message.get("assumptions").is_some_and(Value::is_object)
                        && message.get("stops").is_some_and(Value::is_array),
                    reason: reason(message),
                    expected_score_delta: expected_score_delta(message),
                }),
                Err(err) => OracleReply::Malformed {
                    reason: format!("plan fields are malformed: {}", err),
                },
            },
            APPROVED => OracleReply::Approved {
                reason: reason(message),
                expected_score_delta: expected_score_delta(message),
            },
            other => OracleReply::Unknown {
                kind: other.to_string(),
            },
        }
    }

    /// Protocol name of the reply, for logging.
    pub fn kind(&self) -> &str {
        match self {
            OracleReply::CapabilityRequest { .. } => CAPABILITY_REQUEST,
            OracleReply::Plan(_) => PLAN,
            OracleReply::Approved { .. } => APPROVED,
            OracleReply::Unknown { kind } => kind,
            OracleReply::Malformed { .. } => "MALFORMED",
        }
    }
}

fn parse_capability_request(message: &Map<String, Value>) -> OracleReply {
    let Some(tool) = message.get("tool").and_then(Value::as_str) else {
        return OracleReply::Malformed {
            reason: "capability request has no 'tool' name".to_string(),
        };
    };
    let args = match message.get("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => {
            return OracleReply::Malformed {
                reason: "capability request 'args' is not a mapping".to_string(),
            };
        }
    };
    OracleReply::CapabilityRequest {
        tool: tool.to_string(),
        args,
    }
}

fn reason(message: &Map<String, Value>) -> Option<String> {
    message
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn expected_score_delta(message: &Map<String, Value>) -> Option<i64> {
    message.get("expected_score_delta").and_then(integral)
}

/// Unwrap text wrapped in a Markdown code fence, with or without a language tag.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}
