//! Injected-current stimulus sampled over a fixed time window.

use std::fmt;
use std::sync::Arc;

use crate::error::{HhError, HhResult};

type CurrentFn = dyn Fn(f64) -> f64 + Send + Sync;

/// Time-bounded injected current `I(t)` with precomputed sample times.
///
/// Clones share the current function and the time points.
#[derive(Clone)]
pub struct Stimulus {
    time_start: f64,
    time_stop: f64,
    resolution: usize,
    timepoints: Arc<[f64]>,
    current: Arc<CurrentFn>,
}

impl Stimulus {
    /// Build a stimulus sampled at `resolution` evenly spaced points over
    /// `[time_start, time_stop]`, both ends included.
    pub fn new<F>(current: F, time_start: f64, time_stop: f64, resolution: usize) -> HhResult<Self>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        if resolution < 2 {
            return Err(HhError::InvalidArgument(format!(
                "stimulus resolution must be at least 2, got {}",
                resolution
            )));
        }
        if !time_start.is_finite() || !time_stop.is_finite() {
            return Err(HhError::InvalidArgument(format!(
                "stimulus window must be finite, got [{}, {}]",
                time_start, time_stop
            )));
        }
        if time_stop <= time_start {
            return Err(HhError::InvalidArgument(format!(
                "stimulus window must be increasing, got [{}, {}]",
                time_start, time_stop
            )));
        }

        Ok(Self {
            time_start,
            time_stop,
            resolution,
            timepoints: linspace(time_start, time_stop, resolution).into(),
            current: Arc::new(current),
        })
    }

    /// Constant `amplitude` for `t > onset`, zero before and at the onset.
    pub fn step(amplitude: f64, onset: f64, time_start: f64, time_stop: f64, resolution: usize) -> HhResult<Self> {
        Self::new(
            move |t| if t > onset { amplitude } else { 0.0 },
            time_start,
            time_stop,
            resolution,
        )
    }

    /// Rectangular pulse: `amplitude` for `on <= t < off`, zero elsewhere.
    pub fn pulse(
        amplitude: f64,
        on: f64,
        off: f64,
        time_start: f64,
        time_stop: f64,
        resolution: usize,
    ) -> HhResult<Self> {
        if !(off > on) {
            return Err(HhError::InvalidArgument(format!(
                "pulse must end after it starts, got [{}, {})",
                on, off
            )));
        }
        Self::new(
            move |t| if t >= on && t < off { amplitude } else { 0.0 },
            time_start,
            time_stop,
            resolution,
        )
    }

    /// Injected current at `t`. No interpolation, no caching.
    #[inline]
    pub fn current_at(&self, t: f64) -> f64 {
        (self.current)(t)
    }

    pub fn timepoints(&self) -> &[f64] {
        &self.timepoints
    }

    pub fn time_start(&self) -> f64 {
        self.time_start
    }

    pub fn time_stop(&self) -> f64 {
        self.time_stop
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }
}

impl fmt::Debug for Stimulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stimulus")
            .field("time_start", &self.time_start)
            .field("time_stop", &self.time_stop)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

/// `count` evenly spaced values over `[start, stop]`; the last value is exactly `stop`.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut points: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            points[count - 1] = stop;
            points
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timepoints_cover_window_inclusively() {
        let s = Stimulus::new(|_| 0.0, -100.0, 2000.0, 10_000).unwrap();
        let tp = s.timepoints();
        assert_eq!(tp.len(), 10_000);
        assert_eq!(tp[0], -100.0);
        assert_eq!(tp[9_999], 2000.0);
        let dt = 2100.0 / 9_999.0;
        assert!((tp[1] - tp[0] - dt).abs() < 1e-9);
        assert!(tp.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn current_delegates_to_function() {
        let s = Stimulus::new(|t| 2.0 * t, 0.0, 10.0, 11).unwrap();
        assert_eq!(s.current_at(3.0), 6.0);
        // Outside the sampled window is still just the function.
        assert_eq!(s.current_at(-4.0), -8.0);
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(matches!(Stimulus::new(|_| 0.0, 0.0, 1.0, 1), Err(HhError::InvalidArgument(_))));
        assert!(matches!(Stimulus::new(|_| 0.0, 0.0, 1.0, 0), Err(HhError::InvalidArgument(_))));
        assert!(matches!(Stimulus::new(|_| 0.0, 1.0, 1.0, 10), Err(HhError::InvalidArgument(_))));
        assert!(matches!(Stimulus::new(|_| 0.0, 2.0, 1.0, 10), Err(HhError::InvalidArgument(_))));
        assert!(matches!(Stimulus::new(|_| 0.0, f64::NAN, 1.0, 10), Err(HhError::InvalidArgument(_))));
        assert!(matches!(
            Stimulus::pulse(1.0, 2.0, 2.0, 0.0, 10.0, 10),
            Err(HhError::InvalidArgument(_))
        ));
    }

    #[test]
    fn step_switches_on_strictly_after_onset() {
        let s = Stimulus::step(1.5, 0.0, -100.0, 2000.0, 100).unwrap();
        assert_eq!(s.current_at(-1.0), 0.0);
        assert_eq!(s.current_at(0.0), 0.0);
        assert_eq!(s.current_at(1e-9), 1.5);
    }

    #[test]
    fn pulse_is_half_open() {
        let s = Stimulus::pulse(200.0, 1.0, 2.0, 0.0, 20.0, 1000).unwrap();
        assert_eq!(s.current_at(0.999), 0.0);
        assert_eq!(s.current_at(1.0), 200.0);
        assert_eq!(s.current_at(1.999), 200.0);
        assert_eq!(s.current_at(2.0), 0.0);
    }

    #[test]
    fn clones_share_samples() {
        let s = Stimulus::new(|_| 1.0, 0.0, 1.0, 5).unwrap();
        let c = s.clone();
        assert_eq!(s.timepoints().as_ptr(), c.timepoints().as_ptr());
        assert_eq!(c.resolution(), 5);
    }

    #[test]
    fn linspace_edges() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
        let sweep = linspace(0.3, 2.3, 3);
        assert_eq!(sweep[0], 0.3);
        assert!((sweep[1] - 1.3).abs() < 1e-12);
        assert_eq!(sweep[2], 2.3);
    }
}
