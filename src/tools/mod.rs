//! Built-in capabilities offered to the oracle.

mod distances;
mod features;
mod nearby;

use std::sync::Arc;

pub use distances::Distances;
pub use features::StationFeatures;
pub use nearby::NearbyStations;

use crate::catalog::Catalog;
use crate::coerce::ArgType;
use crate::context::SNAPSHOT_CAPABILITY;
use crate::error::PlannerError;
use crate::traits::{DistanceMatrixProvider, StationFeed};

pub const GET_DISTANCES: &str = "get_distances";
pub const GET_STATION_FEATURES: &str = "get_station_features";

/// Register the standard capabilities on `catalog`.
pub fn register_builtins(
    catalog: &mut Catalog,
    feed: Arc<dyn StationFeed>,
    matrix: Arc<dyn DistanceMatrixProvider>,
) -> Result<(), PlannerError> {
    catalog.register(
        SNAPSHOT_CAPABILITY,
        Arc::new(NearbyStations::new(Arc::clone(&feed))),
        &[
            ("lat", ArgType::Float),
            ("lon", ArgType::Float),
            ("k", ArgType::Int),
            ("radius_km", ArgType::Float),
        ],
        "Closest stations to (lat, lon) within radius_km, at most k, nearest first. \
         Columns: id, latitude, longitude, free_bikes, empty_slots, distance_km.",
    )?;
    catalog.register(
        GET_DISTANCES,
        Arc::new(Distances::new(matrix)),
        &[
            ("stations", ArgType::DataframeRecords),
            ("start_coordinates", ArgType::Dict),
        ],
        "Driving distance (km) and time (min) for every pair of the given stations \
         (records with id, latitude, longitude). Pass start_coordinates {lat, lon} \
         to include the truck position as station 'start'.",
    )?;
    catalog.register(
        GET_STATION_FEATURES,
        Arc::new(StationFeatures::new(feed)),
        &[("station_ids", ArgType::List), ("fields", ArgType::List)],
        "Latest values of the requested fields for the given station ids.",
    )?;
    Ok(())
}
