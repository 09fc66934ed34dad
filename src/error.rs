//! Error types for the planning orchestrator.
//!
//! Feasibility violations are not errors: they are returned as data by
//! [`crate::validator::validate`]. Everything here aborts the current loop.

use serde_json::Value;
use thiserror::Error;

/// Fatal outcomes of a planning request.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("capability '{name}' is already registered")]
    DuplicateCapability { name: String },

    #[error("capability '{name}' is not registered")]
    UnknownCapability { name: String },

    #[error("argument '{argument}' cannot be coerced to {expected}: {detail}")]
    TypeCoercion {
        argument: String,
        expected: String,
        detail: String,
    },

    #[error("unexpected arguments for {capability}: {arguments:?}")]
    UnexpectedArgument {
        capability: String,
        arguments: Vec<String>,
    },

    #[error("missing required arguments for {capability}: {arguments:?}")]
    MissingRequiredArgument {
        capability: String,
        arguments: Vec<String>,
    },

    #[error("capability '{name}' failed with args {args}: {source}")]
    CapabilityFailed {
        name: String,
        args: Value,
        #[source]
        source: CapabilityError,
    },

    #[error("oracle output is not a valid protocol message ({reason}): {raw}")]
    MalformedOracleOutput { raw: String, reason: String },

    #[error("oracle output has unknown type '{kind}': {raw}")]
    UnknownOutputType { kind: String, raw: String },

    #[error("planner did not produce a valid plan within {steps} steps")]
    PlannerDidNotConverge { steps: usize },

    #[error("station '{id}' appears more than once in the snapshot")]
    DuplicateStation { id: String },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl PlannerError {
    /// Oracle output was malformed or of a type the loop does not accept.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            PlannerError::MalformedOracleOutput { .. } | PlannerError::UnknownOutputType { .. }
        )
    }

    /// Lookup, argument or execution failure of a requested capability.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            PlannerError::UnknownCapability { .. }
                | PlannerError::TypeCoercion { .. }
                | PlannerError::UnexpectedArgument { .. }
                | PlannerError::MissingRequiredArgument { .. }
                | PlannerError::CapabilityFailed { .. }
        )
    }

    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, PlannerError::PlannerDidNotConverge { .. })
    }
}

/// Domain error raised by a capability body.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("missing fields: {0:?}")]
    MissingField(Vec<String>),

    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("station feed unavailable: {0}")]
    Feed(String),
}

impl CapabilityError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        CapabilityError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        CapabilityError::Upstream(err.to_string())
    }
}

/// Failure to obtain a completion from the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("oracle response contained no completion")]
    EmptyCompletion,

    #[error("oracle API key is not configured")]
    MissingApiKey,

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}
