//! Bike-share station locations in central Palma de Mallorca.
//!
//! Coordinates from OpenStreetMap; occupancy values are made up but keep
//! `free_bikes + empty_slots` equal to the dock count.

use bike_rebalancer::station::StationObservation;

/// Truck depot near Plaça d'Espanya.
pub const DEPOT: (f64, f64) = (39.575_8, 2.654_9);

pub struct StationFixture {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub free_bikes: i64,
    pub empty_slots: i64,
}

pub const PALMA_STATIONS: &[StationFixture] = &[
    StationFixture {
        id: "pl-espanya",
        name: "Plaça d'Espanya",
        lat: 39.576_1,
        lon: 2.655_3,
        free_bikes: 19,
        empty_slots: 1,
    },
    StationFixture {
        id: "pl-major",
        name: "Plaça Major",
        lat: 39.571_8,
        lon: 2.651_0,
        free_bikes: 1,
        empty_slots: 15,
    },
    StationFixture {
        id: "olivar",
        name: "Mercat de l'Olivar",
        lat: 39.573_3,
        lon: 2.653_6,
        free_bikes: 12,
        empty_slots: 4,
    },
    StationFixture {
        id: "borne",
        name: "Passeig del Born",
        lat: 39.569_2,
        lon: 2.647_3,
        free_bikes: 0,
        empty_slots: 20,
    },
    StationFixture {
        id: "catedral",
        name: "Parc de la Mar",
        lat: 39.566_1,
        lon: 2.650_4,
        free_bikes: 2,
        empty_slots: 14,
    },
    StationFixture {
        id: "portopi",
        name: "Porto Pi",
        lat: 39.555_4,
        lon: 2.621_7,
        free_bikes: 9,
        empty_slots: 7,
    },
];

/// One observation per fixture station, all at the same timestamp.
pub fn palma_observations() -> Vec<StationObservation> {
    PALMA_STATIONS
        .iter()
        .map(|station| StationObservation {
            id: station.id.to_string(),
            latitude: station.lat,
            longitude: station.lon,
            free_bikes: station.free_bikes,
            empty_slots: station.empty_slots,
            timestamp: 1_700_000_000,
        })
        .collect()
}

/// Straight-line distance between two fixtures, in km.
pub fn distance_km(a: &StationFixture, b: &StationFixture) -> f64 {
    bike_rebalancer::haversine::haversine_km(
        bike_rebalancer::station::Coordinate::new(a.lat, a.lon),
        bike_rebalancer::station::Coordinate::new(b.lat, b.lon),
    )
}
