//! Load simulation for the access code system.
//!
//! Issues random codes day after day with concurrent workers, then reads the
//! notification log back to check that every issuance was recorded exactly
//! once, and finally races several callers to use one code.

pub mod config;
pub mod error;
pub mod runner;

pub use config::{Config, LogFormat};
pub use error::{Result, SimulatorError};
pub use runner::{Simulation, SimulationReport};
