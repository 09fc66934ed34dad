//! Station occupancy snapshot used as ground truth for validation and scoring.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::datum::{identifier, integral};
use crate::error::PlannerError;

/// Geographic point (latitude, longitude in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn as_pair(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub free_bikes: i64,
    pub empty_slots: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Station {
    pub fn new(id: impl Into<String>, free_bikes: i64, empty_slots: i64) -> Self {
        Self {
            id: id.into(),
            free_bikes,
            empty_slots,
            latitude: None,
            longitude: None,
            distance_km: None,
        }
    }

    pub fn located(mut self, lat: f64, lon: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }

    /// Read a station from a capability row such as
    /// `{"id": "a101", "free_bikes": 1, "empty_slots": 18.0, ...}`.
    fn from_record(record: &Value) -> Option<Self> {
        let object = record.as_object()?;
        Some(Self {
            id: identifier(object.get("id")?)?,
            free_bikes: integral(object.get("free_bikes")?).filter(|n| *n >= 0)?,
            empty_slots: integral(object.get("empty_slots")?).filter(|n| *n >= 0)?,
            latitude: object.get("latitude").and_then(Value::as_f64),
            longitude: object.get("longitude").and_then(Value::as_f64),
            distance_km: object.get("distance_km").and_then(Value::as_f64),
        })
    }
}

/// One timestamped reading from a station feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationObservation {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub free_bikes: i64,
    pub empty_slots: i64,
    /// Unix seconds; the newest reading per station wins.
    #[serde(default)]
    pub timestamp: i64,
}

impl StationObservation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Immutable set of stations keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationSnapshot {
    stations: Vec<Station>,
    index: HashMap<String, usize>,
}

impl StationSnapshot {
    pub fn new(stations: Vec<Station>) -> Result<Self, PlannerError> {
        let mut index = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            if index.insert(station.id.clone(), i).is_some() {
                return Err(PlannerError::DuplicateStation {
                    id: station.id.clone(),
                });
            }
        }
        Ok(Self { stations, index })
    }

    /// Lenient construction from capability output (a sequence of row-mappings).
    ///
    /// Rows without a readable id or occupancy are skipped, and only the first
    /// row for a repeated id is kept.
    pub fn from_records(records: &Value) -> Self {
        let rows = records.as_array().map(Vec::as_slice).unwrap_or_default();
        let mut stations = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());

        for row in rows {
            let Some(station) = Station::from_record(row) else {
                warn!(row = %row, "skipping unreadable station row");
                continue;
            };
            if index.contains_key(&station.id) {
                warn!(station = %station.id, "ignoring duplicate station row");
                continue;
            }
            index.insert(station.id.clone(), stations.len());
            stations.push(station);
        }

        Self { stations, index }
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.index.get(id).map(|&i| &self.stations[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.stations).unwrap_or(Value::Array(Vec::new()))
    }
}
