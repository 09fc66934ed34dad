//! Haversine distance matrix provider (fallback when OSRM unavailable).
//!
//! Uses great-circle distance to estimate travel time.
//! Less accurate than OSRM (ignores roads) but always available.

use rayon::prelude::*;

use crate::error::CapabilityError;
use crate::station::Coordinate;
use crate::traits::{DistanceMatrixProvider, TravelMatrix};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 25.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance matrix provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
/// Useful as a fallback when OSRM is unavailable.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert distance in km to travel time in seconds.
    fn km_to_seconds(&self, km: f64) -> f64 {
        (km / self.speed_kmh * 3600.0).round()
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, CapabilityError> {
        if !(self.speed_kmh > 0.0) {
            return Err(CapabilityError::invalid("speed_kmh", "must be positive"));
        }

        let rows: Vec<(Vec<Option<f64>>, Vec<Option<f64>>)> = locations
            .par_iter()
            .enumerate()
            .map(|(i, &(from_lat, from_lng))| {
                let from = Coordinate::new(from_lat, from_lng);
                locations
                    .iter()
                    .enumerate()
                    .map(|(j, &(to_lat, to_lng))| {
                        if i == j {
                            return (Some(0.0), Some(0.0));
                        }
                        let km = haversine_km(from, Coordinate::new(to_lat, to_lng));
                        (Some(km * 1000.0), Some(self.km_to_seconds(km)))
                    })
                    .unzip()
            })
            .collect();

        let (distances_m, durations_s) = rows.into_iter().unzip();
        Ok(TravelMatrix {
            distances_m,
            durations_s,
        })
    }
}
