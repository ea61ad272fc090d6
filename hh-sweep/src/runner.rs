//! Frequency-current sweeps.
//!
//! Semantics:
//! - each amplitude gets a fresh step stimulus from the configured window and
//!   the configured initial conditions; sweep points share nothing but the
//!   model, whose stimulus binding every point replaces;
//! - `step()` walks the amplitudes one at a time and hands back the full
//!   trace (for plotting), `run()` produces the whole curve at once.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use hh_core::{spike_frequency, HodgkinHuxley, TimeSeries};

use crate::config::SweepConfig;
use crate::error::SweepResult;

/// One point of the f-I curve; `frequency` is `None` when the membrane did
/// not fire twice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiPoint {
    pub amplitude: f64,
    pub frequency: Option<f64>,
}

/// A sweep point together with the trace it came from.
#[derive(Clone, Debug)]
pub struct SweepPoint {
    pub point: FiPoint,
    pub series: TimeSeries,
}

pub struct FiSweep {
    model: HodgkinHuxley,
    config: SweepConfig,
    amplitudes: Vec<f64>,
    cursor: usize,
}

impl FiSweep {
    pub fn new(config: SweepConfig) -> SweepResult<Self> {
        config.validate()?;
        let model = HodgkinHuxley::new(config.model)?.with_solver(config.solver)?;
        let amplitudes = config.sweep.amplitudes();
        Ok(Self { model, config, amplitudes, cursor: 0 })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn model(&self) -> &HodgkinHuxley {
        &self.model
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Amplitudes already visited by [`FiSweep::step`].
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.amplitudes.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Simulate one amplitude and extract its frequency.
    pub fn run_point(&mut self, amplitude: f64) -> SweepResult<SweepPoint> {
        simulate(&mut self.model, &self.config, amplitude)
    }

    /// Next amplitude in the sweep, or `None` once all have been visited.
    pub fn step(&mut self) -> Option<SweepResult<SweepPoint>> {
        let amplitude = *self.amplitudes.get(self.cursor)?;
        self.cursor += 1;
        Some(self.run_point(amplitude))
    }

    /// The whole curve, in amplitude order. Leaves the cursor at the end.
    pub fn run(&mut self) -> SweepResult<Vec<FiPoint>> {
        let points = self.run_all()?;
        self.cursor = self.amplitudes.len();
        Ok(points)
    }

    #[cfg(not(feature = "parallel"))]
    fn run_all(&mut self) -> SweepResult<Vec<FiPoint>> {
        let amplitudes = self.amplitudes.clone();
        amplitudes
            .into_iter()
            .map(|a| self.run_point(a).map(|p| p.point))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn run_all(&mut self) -> SweepResult<Vec<FiPoint>> {
        let (model, config) = (&self.model, &self.config);
        self.amplitudes
            .par_iter()
            .map(|&a| {
                let mut local = model.clone();
                simulate(&mut local, config, a).map(|p| p.point)
            })
            .collect()
    }
}

fn simulate(model: &mut HodgkinHuxley, config: &SweepConfig, amplitude: f64) -> SweepResult<SweepPoint> {
    let stimulus = config.stimulus.step(amplitude)?;
    let series = model.stimulate(&stimulus, config.initial)?;
    let frequency = spike_frequency(series.timepoints(), &series.vm(), config.sweep.start_index);
    info!(amplitude, frequency = ?frequency, "sweep point");
    Ok(SweepPoint { point: FiPoint { amplitude, frequency }, series })
}
