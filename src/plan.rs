//! Plan model as emitted by the oracle.
//!
//! Decoding is lenient on purpose: a missing capacity, an unknown action or a
//! non-integer bike count still produces a [`Plan`], so the validator can
//! report the problem back to the oracle instead of the loop failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::datum::{identifier, integral};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    #[serde(default, deserialize_with = "lenient_integer")]
    pub truck_capacity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub time_budget_min: Option<i64>,
}

/// What the vehicle does at a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum Action {
    Pickup,
    Dropoff,
    /// Anything else the oracle wrote; reported as an invalid action.
    Other(String),
}

impl Default for Action {
    fn default() -> Self {
        Action::Other(String::new())
    }
}

impl From<Value> for Action {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => match s.as_str() {
                "pickup" => Action::Pickup,
                "dropoff" => Action::Dropoff,
                _ => Action::Other(s),
            },
            other => Action::Other(other.to_string()),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Pickup => "pickup".to_string(),
            Action::Dropoff => "dropoff".to_string(),
            Action::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Pickup => write!(f, "pickup"),
            Action::Dropoff => write!(f, "dropoff"),
            Action::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(default, deserialize_with = "lenient_identifier")]
    pub station_id: String,
    #[serde(default)]
    pub action: Action,
    /// `None` when the oracle omitted the count or wrote a non-integer.
    #[serde(default, deserialize_with = "lenient_integer")]
    pub bikes: Option<i64>,
}

impl Stop {
    pub fn pickup(station_id: impl Into<String>, bikes: i64) -> Self {
        Self {
            station_id: station_id.into(),
            action: Action::Pickup,
            bikes: Some(bikes),
        }
    }

    pub fn dropoff(station_id: impl Into<String>, bikes: i64) -> Self {
        Self {
            station_id: station_id.into(),
            action: Action::Dropoff,
            bikes: Some(bikes),
        }
    }
}

/// An ordered sequence of stops plus the vehicle assumptions it was built for.
///
/// Plans are values: revisions produce new plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub assumptions: Assumptions,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl Plan {
    pub fn new(truck_capacity: i64, time_budget_min: i64, stops: Vec<Stop>) -> Self {
        Self {
            assumptions: Assumptions {
                truck_capacity: Some(truck_capacity),
                time_budget_min: Some(time_budget_min),
            },
            stops,
        }
    }

    /// Decode the plan fields of a `PLAN` message; other fields are ignored.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Plan::deserialize(value)
    }

    /// Wire form, tagged with `"type": "PLAN"`.
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("type".to_string(), Value::String("PLAN".to_string()));
        }
        value
    }
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(integral(&value))
}

fn lenient_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(identifier(&value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_wire_shape() {
        let plan = Plan::from_value(&json!({
            "type": "PLAN",
            "assumptions": {"truck_capacity": 10, "time_budget_min": 55},
            "stops": [
                {"station_id": "b202", "action": "pickup", "bikes": 6},
                {"station_id": "g707", "action": "dropoff", "bikes": 6}
            ]
        }))
        .unwrap();

        assert_eq!(
            plan,
            Plan::new(10, 55, vec![Stop::pickup("b202", 6), Stop::dropoff("g707", 6)])
        );
    }

    #[test]
    fn test_lenient_fields() {
        let plan = Plan::from_value(&json!({
            "stops": [
                {"station_id": 42, "action": "teleport", "bikes": "three"},
                {"action": 7, "bikes": 2.0}
            ]
        }))
        .unwrap();

        assert_eq!(plan.assumptions.truck_capacity, None);
        assert_eq!(plan.stops[0].station_id, "42");
        assert_eq!(plan.stops[0].action, Action::Other("teleport".to_string()));
        assert_eq!(plan.stops[0].bikes, None);
        assert_eq!(plan.stops[1].station_id, "");
        assert_eq!(plan.stops[1].action, Action::Other("7".to_string()));
        assert_eq!(plan.stops[1].bikes, Some(2));
    }

    #[test]
    fn test_stops_must_be_a_list() {
        assert!(Plan::from_value(&json!({"stops": "s1 then s2"})).is_err());
    }

    #[test]
    fn test_to_json_is_tagged() {
        let value = Plan::new(12, 120, vec![Stop::pickup("s1", 4)]).to_json();
        assert_eq!(value["type"], "PLAN");
        assert_eq!(value["stops"][0]["action"], "pickup");
        assert_eq!(value["assumptions"]["truck_capacity"], 12);
    }
}
