//! hh-core: Hodgkin-Huxley membrane simulation
//!
//! Stimulus → model → integrator → time series → spike frequency.
//! Every result is a pure function of the parameters, the solver
//! configuration, the initial state and the stimulus.

pub mod error;
pub mod state;
pub mod stimulus;
pub mod kinetics;
pub mod model;
pub mod integrator;
pub mod spike;

// Re-exports
pub use error::{HhError, HhResult};
pub use state::{StateVector, TimeSeries};
pub use stimulus::{linspace, Stimulus};
pub use kinetics::{Gate, Rates};
pub use model::{HodgkinHuxley, InitialConditions, ModelParameters};
pub use integrator::{DormandPrince, Integrator, RungeKutta4, SolverConfig};
pub use spike::{first_two_crossings, rising_crossings, spike_frequency, Latch, FREQUENCY_SCALE};
