use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::catalog::{Capability, Param};
use crate::coerce::CallArgs;
use crate::datum::{Datum, Table};
use crate::error::CapabilityError;
use crate::traits::{DistanceMatrixProvider, TravelMatrix};

/// Id given to the truck position when `start_coordinates` is passed.
pub const START_ID: &str = "start";

/// Pairwise travel distances and times between stations.
///
/// Pairs are undirected: each value averages i->j and j->i, ignoring a
/// direction the provider could not route.
pub struct Distances {
    matrix: Arc<dyn DistanceMatrixProvider>,
    params: Vec<Param>,
}

impl Distances {
    pub fn new(matrix: Arc<dyn DistanceMatrixProvider>) -> Self {
        Self {
            matrix,
            params: vec![
                Param::required("stations"),
                Param::optional("start_coordinates"),
            ],
        }
    }
}

impl Capability for Distances {
    fn params(&self) -> &[Param] {
        &self.params
    }

    fn call(&self, args: &CallArgs) -> Result<Datum, CapabilityError> {
        let stations = args.table("stations")?;
        let missing = stations.missing_columns(&["id", "latitude", "longitude"]);
        if !missing.is_empty() {
            return Err(CapabilityError::MissingField(missing));
        }

        let (mut ids, mut locations) = station_locations(stations)?;

        if args.get("start_coordinates").is_some() {
            let start = args.map("start_coordinates")?;
            let coordinate = |key: &str| {
                start
                    .get(key)
                    .and_then(Datum::as_f64)
                    .ok_or_else(|| {
                        CapabilityError::invalid("start_coordinates", "expected {lat, lon} numbers")
                    })
            };
            let (lat, lon) = (coordinate("lat")?, coordinate("lon")?);
            if !ids.iter().any(|id| id == START_ID) {
                ids.insert(0, START_ID.to_string());
                locations.insert(0, (lat, lon));
            }
        }

        if ids.is_empty() {
            return Ok(Datum::from_json(&json!({
                "ids": [],
                "pairs": [],
                "units": {"distance": "km", "duration": "min"},
            })));
        }

        let matrix = self.matrix.matrix_for(&locations)?;
        let pairs = undirected_pairs(&ids, &matrix);

        Ok(Datum::from_json(&json!({
            "ids": ids,
            "pairs": pairs,
            "units": {"distance": "km", "duration": "min"},
            "note": "pairs are undirected: avg(i->j, j->i)",
        })))
    }
}

fn station_locations(stations: &Table) -> Result<(Vec<String>, Vec<(f64, f64)>), CapabilityError> {
    let mut ids = Vec::with_capacity(stations.len());
    let mut locations = Vec::with_capacity(stations.len());

    for row in 0..stations.len() {
        let id = match stations.cell(row, "id") {
            Some(Datum::Str(id)) => id.clone(),
            Some(Datum::Int(id)) => id.to_string(),
            _ => {
                return Err(CapabilityError::invalid(
                    "stations",
                    format!("row {} has no usable id", row),
                ));
            }
        };
        let lat = stations.cell(row, "latitude").and_then(Datum::as_f64);
        let lon = stations.cell(row, "longitude").and_then(Datum::as_f64);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            return Err(CapabilityError::invalid(
                "stations",
                format!("station {} has non-numeric coordinates", id),
            ));
        };
        ids.push(id);
        locations.push((lat, lon));
    }

    Ok((ids, locations))
}

struct Pair {
    from: usize,
    to: usize,
    distance_km: Option<f64>,
    duration_min: Option<f64>,
}

fn undirected_pairs(ids: &[String], matrix: &TravelMatrix) -> Vec<Value> {
    let n = ids.len();
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            pairs.push(Pair {
                from: i,
                to: j,
                distance_km: mean_present(matrix.distance(i, j), matrix.distance(j, i))
                    .map(|m| m / 1000.0),
                duration_min: mean_present(matrix.duration(i, j), matrix.duration(j, i))
                    .map(|s| s / 60.0),
            });
        }
    }

    pairs.sort_by(|a, b| {
        absent_last(a.duration_min, b.duration_min)
            .then_with(|| absent_last(a.distance_km, b.distance_km))
    });

    pairs
        .into_iter()
        .map(|pair| {
            json!({
                "from": ids[pair.from],
                "to": ids[pair.to],
                "distance_km": Datum::from(pair.distance_km).to_json(),
                "duration_min": Datum::from(pair.duration_min).to_json(),
            })
        })
        .collect()
}

fn mean_present(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

fn absent_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
