// Application state for the TUI: last membrane trace plus the accumulated f-I curve.

use hh_core::TimeSeries;
use hh_sweep::FiPoint;
use tracing::warn;

use crate::backend::SweepBackend;

/// Plotted traces are decimated to at most this many points.
const MAX_PLOT_POINTS: usize = 2000;

pub struct App<B: SweepBackend> {
    pub backend: B,
    pub vm: Vec<(f64, f64)>,
    pub gates: [Vec<(f64, f64)>; 3], // n, m, h
    pub time_bounds: [f64; 2],
    pub curve: Vec<(f64, f64)>, // (amplitude, frequency) where defined
    pub last: Option<FiPoint>,
    pub error: Option<String>,
    pub running: bool,
}

impl<B: SweepBackend> App<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            vm: Vec::new(),
            gates: [Vec::new(), Vec::new(), Vec::new()],
            time_bounds: [0.0, 1.0],
            curve: Vec::new(),
            last: None,
            error: None,
            running: false,
        }
    }

    pub fn toggle_running(&mut self) {
        self.running = !self.running;
    }

    /// Simulate the next amplitude and refresh the plots. Stops running at
    /// the end of the sweep or on error.
    pub fn step(&mut self) {
        match self.backend.step() {
            Some(Ok(point)) => {
                self.load_trace(&point.series);
                if let Some(f) = point.point.frequency {
                    self.curve.push((point.point.amplitude, f));
                }
                self.last = Some(point.point);
            }
            Some(Err(e)) => {
                warn!(error = %e, "sweep point failed");
                self.error = Some(e.to_string());
                self.running = false;
            }
            None => self.running = false,
        }
    }

    /// Forget the curve and traces and start the sweep over, paused.
    pub fn restart(&mut self) {
        self.backend.reset();
        self.vm.clear();
        self.gates.iter_mut().for_each(Vec::clear);
        self.time_bounds = [0.0, 1.0];
        self.curve.clear();
        self.last = None;
        self.error = None;
        self.running = false;
    }

    pub fn max_frequency(&self) -> f64 {
        self.curve.iter().map(|&(_, f)| f).fold(0.0, f64::max)
    }

    fn load_trace(&mut self, series: &TimeSeries) {
        let stride = series.len() / MAX_PLOT_POINTS + 1;
        let samples = || series.iter().step_by(stride);

        self.vm = samples().map(|(t, y)| (t, y.vm)).collect();
        self.gates = [
            samples().map(|(t, y)| (t, y.n)).collect(),
            samples().map(|(t, y)| (t, y.m)).collect(),
            samples().map(|(t, y)| (t, y.h)).collect(),
        ];
        let tp = series.timepoints();
        if let (Some(&first), Some(&last)) = (tp.first(), tp.last()) {
            self.time_bounds = [first, last];
        }
    }
}
