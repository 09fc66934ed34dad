//! bike-rebalancer core
//!
//! Drives a planner oracle through a request/response protocol to produce a
//! bike-rebalancing route for one truck, validating every proposed plan by
//! load simulation and refining the first valid plan with a critic loop.

pub mod traits;
pub mod error;
pub mod datum;
pub mod station;
pub mod plan;
pub mod validator;
pub mod scorer;
pub mod coerce;
pub mod catalog;
pub mod protocol;
pub mod context;
pub mod prompt;
pub mod planning;
pub mod critic;
pub mod ordering;
pub mod orchestrator;
pub mod tools;
pub mod haversine;
pub mod osrm;
pub mod oracle;
pub mod config;
