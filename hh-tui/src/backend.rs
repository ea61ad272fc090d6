// Backend abstraction for the TUI so the sweep engine can be swapped or faked.

use hh_sweep::{FiSweep, SweepConfig, SweepPoint};

/// Common interface for anything that can feed sweep points to the TUI.
pub trait SweepBackend {
    /// Simulate the next amplitude; `None` once the sweep is exhausted.
    fn step(&mut self) -> Option<anyhow::Result<SweepPoint>>;
    /// Number of amplitudes in the sweep.
    fn total(&self) -> usize;
    /// Amplitudes already simulated.
    fn position(&self) -> usize;
    /// Amplitude bounds of the sweep, for the f-I axis.
    fn amplitude_bounds(&self) -> (f64, f64);
    /// Restart from the first amplitude. Default no-op for one-shot backends.
    fn reset(&mut self) {}
}

/// Implementation backed by hh-sweep.
pub struct CoreBackend {
    sweep: FiSweep,
}

impl CoreBackend {
    pub fn new(config: SweepConfig) -> anyhow::Result<Self> {
        Ok(Self { sweep: FiSweep::new(config)? })
    }

    pub fn config(&self) -> &SweepConfig {
        self.sweep.config()
    }
}

impl SweepBackend for CoreBackend {
    fn step(&mut self) -> Option<anyhow::Result<SweepPoint>> {
        self.sweep.step().map(|r| r.map_err(anyhow::Error::from))
    }

    fn total(&self) -> usize {
        self.sweep.amplitudes().len()
    }

    fn position(&self) -> usize {
        self.sweep.position()
    }

    fn amplitude_bounds(&self) -> (f64, f64) {
        let range = &self.config().sweep;
        (range.amplitude_min, range.amplitude_max)
    }

    fn reset(&mut self) {
        self.sweep.reset();
    }
}
