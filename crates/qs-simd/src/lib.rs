//! # qs-simd
//!
//! Participation rewards simulation: the keeper's epoch cycle played
//! against in-memory collaborators.
//!
//! ## Modules
//!
//! - [`config`] - daemon configuration
//! - [`scenario`] - scenario files and the epoch driver

pub mod config;
pub mod scenario;

pub use config::SimdConfig;
pub use scenario::{Scenario, Simulation};
