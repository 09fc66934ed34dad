use std::sync::Arc;

use crate::catalog::{Capability, Param};
use crate::coerce::CallArgs;
use crate::datum::{Datum, Table};
use crate::error::CapabilityError;
use crate::station::StationObservation;
use crate::traits::StationFeed;

const KNOWN_FIELDS: [&str; 6] = [
    "id",
    "latitude",
    "longitude",
    "free_bikes",
    "empty_slots",
    "timestamp",
];

/// Selected fields of the newest reading for each requested station.
pub struct StationFeatures {
    feed: Arc<dyn StationFeed>,
    params: Vec<Param>,
}

impl StationFeatures {
    pub fn new(feed: Arc<dyn StationFeed>) -> Self {
        Self {
            feed,
            params: vec![Param::required("station_ids"), Param::required("fields")],
        }
    }
}

impl Capability for StationFeatures {
    fn params(&self) -> &[Param] {
        &self.params
    }

    fn call(&self, args: &CallArgs) -> Result<Datum, CapabilityError> {
        let station_ids: Vec<String> = args
            .list("station_ids")?
            .iter()
            .filter_map(|id| match id {
                Datum::Str(id) => Some(id.clone()),
                Datum::Int(id) => Some(id.to_string()),
                _ => None,
            })
            .collect();

        let mut fields = Vec::new();
        for field in args.list("fields")? {
            let field = field
                .as_str()
                .ok_or_else(|| CapabilityError::invalid("fields", "field names must be strings"))?;
            if field != "id" && !fields.contains(&field) {
                fields.push(field);
            }
        }

        let mut missing: Vec<String> = fields
            .iter()
            .filter(|field| !KNOWN_FIELDS.contains(field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(CapabilityError::MissingField(missing));
        }

        let mut table = Table::new(std::iter::once("id").chain(fields.iter().copied()));
        for observation in self.feed.latest()? {
            if !station_ids.contains(&observation.id) {
                continue;
            }
            let mut row = vec![Datum::Str(observation.id.clone())];
            row.extend(fields.iter().map(|field| field_value(&observation, field)));
            table.push_row(row);
        }
        Ok(Datum::Table(table))
    }
}

fn field_value(observation: &StationObservation, field: &str) -> Datum {
    match field {
        "latitude" => Datum::float(observation.latitude),
        "longitude" => Datum::float(observation.longitude),
        "free_bikes" => Datum::Int(observation.free_bikes),
        "empty_slots" => Datum::Int(observation.empty_slots),
        "timestamp" => Datum::Int(observation.timestamp),
        _ => Datum::Null,
    }
}
