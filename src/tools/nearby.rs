use std::sync::Arc;

use rayon::prelude::*;

use crate::catalog::{Capability, Param};
use crate::coerce::CallArgs;
use crate::datum::{Datum, Table};
use crate::error::CapabilityError;
use crate::haversine::haversine_km;
use crate::station::Coordinate;
use crate::traits::StationFeed;

const COLUMNS: [&str; 6] = [
    "id",
    "latitude",
    "longitude",
    "free_bikes",
    "empty_slots",
    "distance_km",
];

/// Nearest stations around a point, from the latest feed readings.
pub struct NearbyStations {
    feed: Arc<dyn StationFeed>,
    params: Vec<Param>,
}

impl NearbyStations {
    pub fn new(feed: Arc<dyn StationFeed>) -> Self {
        Self {
            feed,
            params: vec![
                Param::required("lat"),
                Param::required("lon"),
                Param::required("k"),
                Param::required("radius_km"),
            ],
        }
    }
}

impl Capability for NearbyStations {
    fn params(&self) -> &[Param] {
        &self.params
    }

    fn call(&self, args: &CallArgs) -> Result<Datum, CapabilityError> {
        let origin = Coordinate::new(args.f64("lat")?, args.f64("lon")?);
        let k = args.i64("k")?;
        let radius_km = args.f64("radius_km")?;

        if k <= 0 {
            return Err(CapabilityError::invalid("k", "must be a positive integer"));
        }
        if !(radius_km > 0.0) {
            return Err(CapabilityError::invalid("radius_km", "must be > 0"));
        }

        let mut nearby: Vec<_> = self
            .feed
            .latest()?
            .into_par_iter()
            .map(|observation| {
                let distance = haversine_km(origin, observation.coordinate());
                (observation, distance)
            })
            .filter(|(_, distance)| *distance <= radius_km)
            .collect();

        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby.truncate(k as usize);

        let mut table = Table::new(COLUMNS);
        for (observation, distance) in nearby {
            table.push_row(vec![
                Datum::Str(observation.id),
                Datum::float(observation.latitude),
                Datum::float(observation.longitude),
                Datum::Int(observation.free_bikes),
                Datum::Int(observation.empty_slots),
                Datum::float(distance),
            ]);
        }
        Ok(Datum::Table(table))
    }
}
