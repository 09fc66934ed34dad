//! Seams to the external collaborators of the planner.
//!
//! The orchestration loops only see these traits, so tests can inject fakes
//! for the oracle, the routing service and the station feed.

use std::path::PathBuf;

use tracing::warn;

use crate::error::{CapabilityError, OracleError};
use crate::station::StationObservation;

/// The external decision maker driving the planning loop.
///
/// Output is untrusted free text; all structure checks happen in the loops.
pub trait Oracle {
    fn complete(&self, instructions: &str, context_document: &str) -> Result<String, OracleError>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn complete(&self, instructions: &str, context_document: &str) -> Result<String, OracleError> {
        (**self).complete(instructions, context_document)
    }
}

impl<T: Oracle + ?Sized> Oracle for Box<T> {
    fn complete(&self, instructions: &str, context_document: &str) -> Result<String, OracleError> {
        (**self).complete(instructions, context_document)
    }
}

/// Pairwise travel distances (meters) and durations (seconds).
///
/// Indexed by the order of the locations passed to the provider. `None`
/// marks a pair the provider could not route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelMatrix {
    pub distances_m: Vec<Vec<Option<f64>>>,
    pub durations_s: Vec<Vec<Option<f64>>>,
}

impl TravelMatrix {
    pub fn len(&self) -> usize {
        self.durations_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations_s.is_empty()
    }

    pub fn duration(&self, from: usize, to: usize) -> Option<f64> {
        self.durations_s.get(from)?.get(to).copied().flatten()
    }

    pub fn distance(&self, from: usize, to: usize) -> Option<f64> {
        self.distances_m.get(from)?.get(to).copied().flatten()
    }
}

/// Provides a distance/time matrix for a set of (lat, lng) locations.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, CapabilityError>;
}

/// Uses `primary` and falls back to `fallback` when it fails.
#[derive(Debug, Clone)]
pub struct FallbackMatrix<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P, F> FallbackMatrix<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P, F> DistanceMatrixProvider for FallbackMatrix<P, F>
where
    P: DistanceMatrixProvider,
    F: DistanceMatrixProvider,
{
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, CapabilityError> {
        match self.primary.matrix_for(locations) {
            Ok(matrix) => Ok(matrix),
            Err(err) => {
                warn!(error = %err, "primary distance provider failed, using fallback");
                self.fallback.matrix_for(locations)
            }
        }
    }
}

/// Source of station occupancy readings.
pub trait StationFeed: Send + Sync {
    /// All known readings; may contain several per station.
    fn observations(&self) -> Result<Vec<StationObservation>, CapabilityError>;

    /// Newest reading per station id, in first-seen id order.
    fn latest(&self) -> Result<Vec<StationObservation>, CapabilityError> {
        let mut latest: Vec<StationObservation> = Vec::new();
        for observation in self.observations()? {
            match latest.iter_mut().find(|seen| seen.id == observation.id) {
                Some(seen) if observation.timestamp > seen.timestamp => *seen = observation,
                Some(_) => {}
                None => latest.push(observation),
            }
        }
        Ok(latest)
    }
}

/// Feed over a fixed set of observations, such as one loaded from a file.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    observations: Vec<StationObservation>,
}

impl StaticFeed {
    pub fn new(observations: Vec<StationObservation>) -> Self {
        Self { observations }
    }
}

impl StationFeed for StaticFeed {
    fn observations(&self) -> Result<Vec<StationObservation>, CapabilityError> {
        Ok(self.observations.clone())
    }
}

/// Feed re-read from a JSON array of observations on every call, so an
/// external process can refresh the file between requests.
#[derive(Debug, Clone)]
pub struct JsonFileFeed {
    path: PathBuf,
}

impl JsonFileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StationFeed for JsonFileFeed {
    fn observations(&self) -> Result<Vec<StationObservation>, CapabilityError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|err| CapabilityError::Feed(format!("{}: {}", self.path.display(), err)))?;
        serde_json::from_str(&text)
            .map_err(|err| CapabilityError::Feed(format!("{}: {}", self.path.display(), err)))
    }
}
