//! # RadarVarsler Common Library
//!
//! Shared code for the RadarVarsler services including:
//! - The Report model
//! - Geodesic distance and route-projection math
//! - Aggregation policy parameters
//! - Configuration resolution
//! - Error types

pub mod config;
pub mod error;
pub mod geo;
pub mod policy;
pub mod report;
pub mod time;

pub use error::{Error, Result};
pub use policy::Policy;
pub use report::Report;
