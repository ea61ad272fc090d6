//! hh-sweep: amplitude sweeps and f-I curves on top of hh-core
//!
//! Additions:
//! - TOML configuration for the model, solver, stimulus window and sweep range
//! - Step-by-step or whole-curve sweeps, each point on a fresh step stimulus
//! - Optional rayon parallelism across sweep points (feature "parallel")
//!
//! This crate only composes hh-core; all numerics live there.

pub mod config;
pub mod error;
pub mod runner;

// Re-exports
pub use config::{find_config_file, AmplitudeRange, StimulusWindow, SweepConfig, CONFIG_ENV};
pub use error::{SweepError, SweepResult};
pub use runner::{FiPoint, FiSweep, SweepPoint};
