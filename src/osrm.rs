//! OSRM HTTP adapter for distance matrices.

use serde::Deserialize;
use tracing::debug;

use crate::error::CapabilityError;
use crate::traits::{DistanceMatrixProvider, TravelMatrix};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 30,
        }
    }
}

impl OsrmConfig {
    /// Defaults overridden by `OSRM_BASE_URL` and `OSRM_PROFILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("OSRM_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(profile) = std::env::var("OSRM_PROFILE") {
            config.profile = profile;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn table_url(&self, locations: &[(f64, f64)]) -> String {
        let coords = locations
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance,duration",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrix, CapabilityError> {
        if locations.is_empty() {
            return Ok(TravelMatrix::default());
        }

        let url = self.table_url(locations);
        debug!(%url, locations = locations.len(), "requesting OSRM table");

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())?;

        body.into_matrix(locations.len())
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    /// Checked conversion; a missing annotation becomes an all-unroutable table.
    fn into_matrix(self, n: usize) -> Result<TravelMatrix, CapabilityError> {
        if self.code != "Ok" {
            return Err(CapabilityError::Upstream(format!(
                "OSRM table failed: {}",
                self.code
            )));
        }

        let distances_m = self.distances.unwrap_or_else(|| vec![vec![None; n]; n]);
        let durations_s = self.durations.unwrap_or_else(|| vec![vec![None; n]; n]);
        for (name, table) in [("distances", &distances_m), ("durations", &durations_s)] {
            if table.len() != n || table.iter().any(|row| row.len() != n) {
                return Err(CapabilityError::Upstream(format!(
                    "OSRM {} table is not {}x{}",
                    name, n, n
                )));
            }
        }

        Ok(TravelMatrix {
            distances_m,
            durations_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        assert_eq!(
            client.table_url(&[(39.5631, 2.6534), (39.5659, 2.6581)]),
            "http://localhost:5000/table/v1/car/2.653400,39.563100;2.658100,39.565900?annotations=distance,duration"
        );
    }

    #[test]
    fn test_parses_table_with_unroutable_pairs() {
        let body: OsrmTableResponse = serde_json::from_str(
            r#"{"code": "Ok", "durations": [[0, 61.5], [null, 0]], "distances": [[0, 420.0], [null, 0]]}"#,
        )
        .unwrap();
        assert_eq!(body.durations.unwrap()[1][0], None);
        assert_eq!(body.distances.unwrap()[0][1], Some(420.0));
    }

    #[test]
    fn test_table_dimensions_are_checked() {
        let extra_row: OsrmTableResponse = serde_json::from_str(
            r#"{"code": "Ok", "durations": [[0, 1], [1, 0], [2, 2]], "distances": [[0, 1], [1, 0]]}"#,
        )
        .unwrap();
        assert!(matches!(extra_row.into_matrix(2), Err(CapabilityError::Upstream(_))));

        let short_row: OsrmTableResponse =
            serde_json::from_str(r#"{"code": "Ok", "durations": [[0, 1], [1]]}"#).unwrap();
        assert!(matches!(short_row.into_matrix(2), Err(CapabilityError::Upstream(_))));

        let no_distances: OsrmTableResponse =
            serde_json::from_str(r#"{"code": "Ok", "durations": [[0, 61.5], [58.0, 0]]}"#).unwrap();
        let matrix = no_distances.into_matrix(2).unwrap();
        assert_eq!(matrix.duration(1, 0), Some(58.0));
        assert_eq!(matrix.distance(1, 0), None);
    }

    #[test]
    fn test_error_code_is_upstream_failure() {
        let body: OsrmTableResponse =
            serde_json::from_str(r#"{"code": "NoTable", "message": "no route"}"#).unwrap();
        assert!(matches!(body.into_matrix(2), Err(CapabilityError::Upstream(_))));
    }
}
