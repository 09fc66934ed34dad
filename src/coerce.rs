//! Argument coercion and signature checks for capability calls.
//!
//! Both run before a capability is invoked, so a malformed argument set never
//! reaches the capability body.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::Param;
use crate::datum::{Datum, Table};
use crate::error::{CapabilityError, PlannerError};

/// Type tag declared for a capability argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    Int,
    Float,
    Str,
    List,
    Dict,
    DataframeRecords,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ArgType::Int => "int",
            ArgType::Float => "float",
            ArgType::Str => "str",
            ArgType::List => "list",
            ArgType::Dict => "dict",
            ArgType::DataframeRecords => "dataframe_records",
        };
        f.write_str(tag)
    }
}

/// Coerced arguments for one capability call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(BTreeMap<String, Datum>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Datum>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Present and not null.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn i64(&self, name: &str) -> Result<i64, CapabilityError> {
        self.required(name)?
            .as_i64()
            .ok_or_else(|| CapabilityError::invalid(name, "expected an integer"))
    }

    pub fn f64(&self, name: &str) -> Result<f64, CapabilityError> {
        self.required(name)?
            .as_f64()
            .ok_or_else(|| CapabilityError::invalid(name, "expected a number"))
    }

    pub fn str(&self, name: &str) -> Result<&str, CapabilityError> {
        self.required(name)?
            .as_str()
            .ok_or_else(|| CapabilityError::invalid(name, "expected a string"))
    }

    pub fn list(&self, name: &str) -> Result<&[Datum], CapabilityError> {
        self.required(name)?
            .as_list()
            .ok_or_else(|| CapabilityError::invalid(name, "expected a list"))
    }

    pub fn table(&self, name: &str) -> Result<&Table, CapabilityError> {
        self.required(name)?
            .as_table()
            .ok_or_else(|| CapabilityError::invalid(name, "expected a list of records"))
    }

    pub fn map(&self, name: &str) -> Result<&BTreeMap<String, Datum>, CapabilityError> {
        self.required(name)?
            .as_map()
            .ok_or_else(|| CapabilityError::invalid(name, "expected a mapping"))
    }

    fn required(&self, name: &str) -> Result<&Datum, CapabilityError> {
        self.get(name)
            .ok_or_else(|| CapabilityError::invalid(name, "value is required"))
    }
}

/// Coerce loosely-typed JSON arguments per the declared type tags.
///
/// Keys without a tag pass through structurally unchanged.
pub fn coerce(
    raw: &Map<String, Value>,
    tags: &BTreeMap<String, ArgType>,
) -> Result<CallArgs, PlannerError> {
    let mut args = CallArgs::new();
    for (name, value) in raw {
        let datum = match tags.get(name) {
            Some(tag) => coerce_value(name, value, *tag)?,
            None => Datum::from_json(value),
        };
        args.0.insert(name.clone(), datum);
    }
    Ok(args)
}

pub fn coerce_value(name: &str, value: &Value, tag: ArgType) -> Result<Datum, PlannerError> {
    let mismatch = |detail: String| PlannerError::TypeCoercion {
        argument: name.to_string(),
        expected: tag.to_string(),
        detail,
    };

    if value.is_null() {
        return Ok(Datum::Null);
    }

    match tag {
        ArgType::Int => match value {
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => Datum::Int(i),
                None => n
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| Datum::Int(f.trunc() as i64))
                    .unwrap_or(Datum::Null),
            }),
            Value::Bool(b) => Ok(Datum::Int(i64::from(*b))),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Datum::Int)
                .map_err(|_| mismatch(format!("'{}' is not an integer", s))),
            other => Err(mismatch(format!("got {}", kind_of(other)))),
        },
        ArgType::Float => match value {
            Value::Number(n) => Ok(Datum::from(n.as_f64().unwrap_or(f64::NAN))),
            Value::Bool(b) => Ok(Datum::Float(if *b { 1.0 } else { 0.0 })),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Datum::from)
                .map_err(|_| mismatch(format!("'{}' is not a number", s))),
            other => Err(mismatch(format!("got {}", kind_of(other)))),
        },
        ArgType::Str => Ok(Datum::Str(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ArgType::List => match value {
            Value::Array(_) => Ok(Datum::from_json(value)),
            other => Err(mismatch(format!("got {}", kind_of(other)))),
        },
        ArgType::Dict => match value {
            Value::Object(_) => Ok(Datum::from_json(value)),
            other => Err(mismatch(format!("got {}", kind_of(other)))),
        },
        ArgType::DataframeRecords => {
            let records = match value {
                Value::Array(items) => items,
                Value::Object(map) => match map.get("records") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(mismatch("mapping without a 'records' list".to_string())),
                },
                other => return Err(mismatch(format!("got {}", kind_of(other)))),
            };
            Table::from_records(records)
                .map(Datum::Table)
                .map_err(mismatch)
        }
    }
}

/// Check an argument set against a capability's declared parameters.
pub fn validate_signature(
    capability: &str,
    params: &[Param],
    args: &CallArgs,
) -> Result<(), PlannerError> {
    let unexpected: Vec<String> = args
        .names()
        .filter(|name| !params.iter().any(|param| param.name == *name))
        .map(str::to_string)
        .collect();
    if !unexpected.is_empty() {
        return Err(PlannerError::UnexpectedArgument {
            capability: capability.to_string(),
            arguments: unexpected,
        });
    }

    let missing: Vec<String> = params
        .iter()
        .filter(|param| param.required && !args.contains(&param.name))
        .map(|param| param.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(PlannerError::MissingRequiredArgument {
            capability: capability.to_string(),
            arguments: missing,
        });
    }

    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
