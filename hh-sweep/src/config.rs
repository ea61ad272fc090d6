//! TOML configuration for amplitude sweeps.
//!
//! Every section is optional; missing values fall back to the classic
//! experiment: step currents from 0.3 to 2.3 in 100 points, switched on at
//! t = 0 in a [-100, 2000] ms window sampled 10000 times.
//!
//! ```toml
//! [sweep]
//! amplitude_min = 0.3
//! amplitude_max = 2.3
//! amplitude_count = 100
//!
//! [stimulus]
//! time_start = -100.0
//! time_stop = 2000.0
//! resolution = 10000
//! onset = 0.0
//!
//! [model]
//! g_na = 40.0
//!
//! [solver]
//! method = "dormand_prince"   # or "runge_kutta4"; may be omitted
//! rtol = 1e-10
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hh_core::{linspace, HhResult, InitialConditions, ModelParameters, SolverConfig, Stimulus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SweepError, SweepResult};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "HH_SWEEP_CONFIG";
/// File looked up in the working directory when no path is given.
pub const CONFIG_FILE_NAME: &str = "fi_sweep.toml";

/// Amplitudes to sweep and where spike detection starts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AmplitudeRange {
    pub amplitude_min: f64,
    pub amplitude_max: f64,
    pub amplitude_count: usize,
    /// First sample scanned for spikes.
    pub start_index: usize,
}

impl Default for AmplitudeRange {
    fn default() -> Self {
        Self { amplitude_min: 0.3, amplitude_max: 2.3, amplitude_count: 100, start_index: 0 }
    }
}

impl AmplitudeRange {
    pub fn amplitudes(&self) -> Vec<f64> {
        linspace(self.amplitude_min, self.amplitude_max, self.amplitude_count)
    }
}

/// Step-current window; the amplitude comes from the sweep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StimulusWindow {
    pub time_start: f64,
    pub time_stop: f64,
    pub resolution: usize,
    /// Current is on for t > onset.
    pub onset: f64,
}

impl Default for StimulusWindow {
    fn default() -> Self {
        Self { time_start: -100.0, time_stop: 2000.0, resolution: 10_000, onset: 0.0 }
    }
}

impl StimulusWindow {
    pub fn step(&self, amplitude: f64) -> HhResult<Stimulus> {
        Stimulus::step(amplitude, self.onset, self.time_start, self.time_stop, self.resolution)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub sweep: AmplitudeRange,
    pub stimulus: StimulusWindow,
    pub model: ModelParameters,
    pub solver: SolverConfig,
    pub initial: InitialConditions,
}

impl SweepConfig {
    pub fn from_toml_str(text: &str) -> SweepResult<Self> {
        let config: SweepConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SweepResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SweepError::ConfigNotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "loading sweep configuration");
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Load from `path` if given, else from the file found by
    /// [`find_config_file`], else the defaults.
    pub fn load(path: Option<&Path>) -> SweepResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match find_config_file()? {
                Some(found) => Self::from_file(found),
                None => {
                    debug!("no sweep configuration file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn validate(&self) -> SweepResult<()> {
        let range = &self.sweep;
        if range.amplitude_count == 0 {
            return Err(SweepError::InvalidConfig("sweep.amplitude_count must be positive".into()));
        }
        if !range.amplitude_min.is_finite() || !range.amplitude_max.is_finite() {
            return Err(SweepError::InvalidConfig("sweep amplitudes must be finite".into()));
        }
        if range.amplitude_min > range.amplitude_max {
            return Err(SweepError::InvalidConfig(format!(
                "sweep.amplitude_min ({}) exceeds sweep.amplitude_max ({})",
                range.amplitude_min, range.amplitude_max
            )));
        }
        if range.start_index >= self.stimulus.resolution {
            return Err(SweepError::InvalidConfig(format!(
                "sweep.start_index ({}) must be below stimulus.resolution ({})",
                range.start_index, self.stimulus.resolution
            )));
        }
        if !self.stimulus.onset.is_finite() {
            return Err(SweepError::InvalidConfig("stimulus.onset must be finite".into()));
        }
        // Window checks are the stimulus' own.
        self.stimulus.step(0.0)?;
        self.model.validate()?;
        self.solver.validate()?;
        Ok(())
    }
}

/// Locate a configuration file.
///
/// Search order:
/// 1. `HH_SWEEP_CONFIG` environment variable (must exist if set)
/// 2. `./fi_sweep.toml`
pub fn find_config_file() -> SweepResult<Option<PathBuf>> {
    if let Ok(env_path) = env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        return if path.exists() { Ok(Some(path)) } else { Err(SweepError::ConfigNotFound(path)) };
    }
    Ok(find_config_in(&env::current_dir()?))
}

/// `dir/fi_sweep.toml` if it exists.
pub fn find_config_in(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(CONFIG_FILE_NAME);
    candidate.exists().then_some(candidate)
}
