//! Time integration of the 4-variable membrane state.
//!
//! Semantics shared by every [`Integrator`]:
//! - the first output is the initial state, reported at `timepoints[0]`;
//! - each later output is reached by integrating from the previous requested
//!   time to the next one, backwards if the request goes back in time;
//! - a repeated time yields the same state again;
//! - any failure aborts the whole call. No partial or NaN-filled series is
//!   ever returned.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{HhError, HhResult};
use crate::state::{StateVector, TimeSeries};

/// Right-hand side `dy/dt = f(t, y)`.
pub type Rhs<'a> = dyn Fn(f64, &StateVector) -> StateVector + 'a;

/// Produces a state at each requested time point.
pub trait Integrator {
    fn integrate(&self, rhs: &Rhs<'_>, initial: StateVector, timepoints: &[f64]) -> HhResult<TimeSeries>;
}

fn check_request(initial: &StateVector, timepoints: &[f64]) -> HhResult<()> {
    if timepoints.is_empty() {
        return Err(HhError::InvalidArgument("no time points requested".into()));
    }
    if let Some(t) = timepoints.iter().find(|t| !t.is_finite()) {
        return Err(HhError::InvalidArgument(format!("requested time {} is not finite", t)));
    }
    if !initial.is_finite() {
        return Err(HhError::InvalidArgument(format!("initial state {:?} is not finite", initial)));
    }
    Ok(())
}

fn failure(t: f64, reason: String) -> HhError {
    warn!(t, %reason, "integration failed");
    HhError::IntegrationFailure { t, reason }
}

/// `Σ c_i k_i` over Runge-Kutta stages.
#[inline]
fn lincomb(terms: &[(f64, &StateVector)]) -> StateVector {
    terms
        .iter()
        .fold(StateVector::default(), |acc, (c, k)| acc.add_scaled(*c, **k))
}

// ---------------------------------------------------------------------------
// Adaptive Dormand-Prince 5(4)
// ---------------------------------------------------------------------------

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// Fifth-order weights (also the last stage row, so k7 is FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Fifth minus fourth order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Embedded Runge-Kutta 5(4) with per-step error control.
///
/// Steps are clipped so that every requested time is hit exactly; the
/// proposed step size carries over between output intervals.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DormandPrince {
    pub rtol: f64,
    pub atol: f64,
    /// Attempted steps allowed per output interval.
    pub max_steps: usize,
    /// Smallest step (ms) tolerated after a rejection.
    pub min_step: f64,
    pub max_step: Option<f64>,
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-12,
            max_steps: 100_000,
            min_step: 1e-10,
            max_step: None,
        }
    }
}

impl DormandPrince {
    pub fn with_tolerances(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol, ..Self::default() }
    }

    pub fn validate(&self) -> HhResult<()> {
        if !(self.rtol > 0.0 && self.rtol.is_finite()) || !(self.atol > 0.0 && self.atol.is_finite()) {
            return Err(HhError::InvalidArgument(format!(
                "tolerances must be positive and finite, got rtol = {}, atol = {}",
                self.rtol, self.atol
            )));
        }
        if self.max_steps == 0 {
            return Err(HhError::InvalidArgument("max_steps must be positive".into()));
        }
        if !(self.min_step >= 0.0 && self.min_step.is_finite()) {
            return Err(HhError::InvalidArgument(format!("invalid min_step {}", self.min_step)));
        }
        if let Some(max) = self.max_step {
            if !(max > 0.0) {
                return Err(HhError::InvalidArgument(format!("invalid max_step {}", max)));
            }
        }
        Ok(())
    }
}

impl Integrator for DormandPrince {
    fn integrate(&self, rhs: &Rhs<'_>, initial: StateVector, timepoints: &[f64]) -> HhResult<TimeSeries> {
        self.validate()?;
        check_request(&initial, timepoints)?;

        let mut run = DpRun::start(self, rhs, timepoints[0], initial)?;
        let mut series = TimeSeries::with_capacity(timepoints.len());
        series.push(timepoints[0], initial);
        for &t in &timepoints[1..] {
            run.advance_to(t)?;
            series.push(t, run.y);
        }

        debug!(
            accepted = run.accepted,
            rejected = run.rejected,
            evaluations = run.evaluations,
            "dormand-prince integration finished"
        );
        Ok(series)
    }
}

struct DpRun<'a, 'f> {
    cfg: &'a DormandPrince,
    rhs: &'a Rhs<'f>,
    t: f64,
    y: StateVector,
    /// Derivative at (t, y), reused as the first stage of the next step.
    f: StateVector,
    /// Step magnitude to try next; `None` until the first step is sized.
    h: Option<f64>,
    accepted: usize,
    rejected: usize,
    evaluations: usize,
}

impl<'a, 'f> DpRun<'a, 'f> {
    fn start(cfg: &'a DormandPrince, rhs: &'a Rhs<'f>, t: f64, y: StateVector) -> HhResult<Self> {
        let f = rhs(t, &y);
        if !f.is_finite() {
            return Err(failure(t, format!("derivative {:?} is not finite", f)));
        }
        Ok(Self { cfg, rhs, t, y, f, h: None, accepted: 0, rejected: 0, evaluations: 1 })
    }

    fn eval(&mut self, t: f64, y: &StateVector) -> StateVector {
        self.evaluations += 1;
        (self.rhs)(t, y)
    }

    /// Weighted RMS of `v` against the mixed absolute/relative tolerance.
    fn error_norm(&self, v: &StateVector, y_old: &StateVector, y_new: &StateVector) -> f64 {
        let (v, a, b) = (v.to_array(), y_old.to_array(), y_new.to_array());
        let sum: f64 = (0..4)
            .map(|i| {
                let scale = self.cfg.atol + self.cfg.rtol * a[i].abs().max(b[i].abs());
                (v[i] / scale).powi(2)
            })
            .sum();
        (sum / 4.0).sqrt()
    }

    fn initial_step(&mut self, dir: f64) -> f64 {
        let d0 = self.error_norm(&self.y, &self.y, &self.y);
        let d1 = self.error_norm(&self.f, &self.y, &self.y);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };

        let y1 = self.y.add_scaled(dir * h0, self.f);
        let f1 = self.eval(self.t + dir * h0, &y1);
        let d2 = self.error_norm(&(f1 - self.f), &self.y, &self.y) / h0;

        let d = d1.max(d2);
        let h1 = if d <= 1e-15 || !d.is_finite() {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d).powf(1.0 / 5.0)
        };
        (100.0 * h0).min(h1)
    }

    /// One trial step of signed size `h`: fifth-order state, its derivative
    /// and the scaled error estimate.
    fn trial(&mut self, h: f64) -> (StateVector, StateVector, f64) {
        let (t, y, k1) = (self.t, self.y, self.f);
        let k2 = self.eval(t + C2 * h, &y.add_scaled(h, lincomb(&[(A21, &k1)])));
        let k3 = self.eval(t + C3 * h, &y.add_scaled(h, lincomb(&[(A31, &k1), (A32, &k2)])));
        let k4 = self.eval(
            t + C4 * h,
            &y.add_scaled(h, lincomb(&[(A41, &k1), (A42, &k2), (A43, &k3)])),
        );
        let k5 = self.eval(
            t + C5 * h,
            &y.add_scaled(h, lincomb(&[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)])),
        );
        let k6 = self.eval(
            t + h,
            &y.add_scaled(h, lincomb(&[(A61, &k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)])),
        );
        let y5 = y.add_scaled(h, lincomb(&[(B1, &k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)]));
        let k7 = self.eval(t + h, &y5);

        let err = lincomb(&[(E1, &k1), (E3, &k3), (E4, &k4), (E5, &k5), (E6, &k6), (E7, &k7)]) * h;
        let norm = self.error_norm(&err, &y, &y5);
        (y5, k7, norm)
    }

    fn advance_to(&mut self, target: f64) -> HhResult<()> {
        let span = target - self.t;
        if span == 0.0 {
            return Ok(());
        }
        let dir = span.signum();
        let mut h = match self.h {
            Some(h) => h,
            None => self.initial_step(dir),
        };
        if let Some(max) = self.cfg.max_step {
            h = h.min(max);
        }

        let mut attempts = 0usize;
        while (target - self.t) * dir > 0.0 {
            if attempts >= self.cfg.max_steps {
                return Err(failure(
                    self.t,
                    format!("step budget of {} exhausted before t = {}", self.cfg.max_steps, target),
                ));
            }
            attempts += 1;

            let remaining = (target - self.t).abs();
            let clipped = h >= remaining;
            let step = if clipped { remaining } else { h };

            let (y_new, f_new, err) = self.trial(dir * step);
            if err <= 1.0 {
                self.t = if clipped { target } else { self.t + dir * step };
                self.y = y_new;
                self.f = f_new;
                self.accepted += 1;
                // A step shortened to land on the target says nothing about
                // how large the next one may be.
                if !clipped {
                    let factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    h = step * factor;
                    if let Some(max) = self.cfg.max_step {
                        h = h.min(max);
                    }
                }
            } else {
                self.rejected += 1;
                let factor = if err.is_finite() {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
                } else {
                    MIN_FACTOR
                };
                h = step * factor;
                trace!(t = self.t, err, next = h, "step rejected");
                let floor = self.cfg.min_step.max(16.0 * f64::EPSILON * self.t.abs());
                if h < floor {
                    return Err(failure(self.t, format!("step size collapsed to {:e}", h)));
                }
            }
        }
        self.h = Some(h);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixed-step classical Runge-Kutta
// ---------------------------------------------------------------------------

/// Classical fourth-order Runge-Kutta with a fixed maximum substep.
///
/// Each output interval is divided into equal substeps no longer than `max_dt`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RungeKutta4 {
    pub max_dt: f64,
    /// Substeps allowed per output interval.
    pub max_steps: usize,
}

impl Default for RungeKutta4 {
    fn default() -> Self {
        Self { max_dt: 0.01, max_steps: 1_000_000 }
    }
}

impl RungeKutta4 {
    pub fn with_max_dt(max_dt: f64) -> Self {
        Self { max_dt, ..Self::default() }
    }

    pub fn validate(&self) -> HhResult<()> {
        if !(self.max_dt > 0.0 && self.max_dt.is_finite()) {
            return Err(HhError::InvalidArgument(format!("max_dt must be positive, got {}", self.max_dt)));
        }
        if self.max_steps == 0 {
            return Err(HhError::InvalidArgument("max_steps must be positive".into()));
        }
        Ok(())
    }

    fn step(rhs: &Rhs<'_>, t: f64, y: StateVector, h: f64) -> StateVector {
        let k1 = rhs(t, &y);
        let k2 = rhs(t + 0.5 * h, &y.add_scaled(0.5 * h, k1));
        let k3 = rhs(t + 0.5 * h, &y.add_scaled(0.5 * h, k2));
        let k4 = rhs(t + h, &y.add_scaled(h, k3));
        y.add_scaled(h / 6.0, lincomb(&[(1.0, &k1), (2.0, &k2), (2.0, &k3), (1.0, &k4)]))
    }
}

impl Integrator for RungeKutta4 {
    fn integrate(&self, rhs: &Rhs<'_>, initial: StateVector, timepoints: &[f64]) -> HhResult<TimeSeries> {
        self.validate()?;
        check_request(&initial, timepoints)?;

        let mut series = TimeSeries::with_capacity(timepoints.len());
        let (mut t, mut y) = (timepoints[0], initial);
        series.push(t, y);
        let mut substeps_total = 0usize;

        for &target in &timepoints[1..] {
            let span = target - t;
            let substeps = (span.abs() / self.max_dt).ceil() as usize;
            if substeps > self.max_steps {
                return Err(failure(
                    t,
                    format!("{} substeps needed to reach t = {}, budget is {}", substeps, target, self.max_steps),
                ));
            }
            if substeps > 0 {
                let h = span / substeps as f64;
                for i in 0..substeps {
                    let ti = t + h * i as f64;
                    y = Self::step(rhs, ti, y, h);
                    if !y.is_finite() {
                        return Err(failure(ti + h, format!("state {:?} is not finite", y)));
                    }
                }
                substeps_total += substeps;
            }
            t = target;
            series.push(t, y);
        }

        debug!(substeps = substeps_total, "runge-kutta integration finished");
        Ok(series)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Solver selection as it appears in configuration files.
///
/// `method` defaults to `dormand_prince`; fields left out keep the chosen
/// solver's defaults. Fields that belong to the other solver are rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "method", rename_all = "snake_case", try_from = "SolverSection")
)]
pub enum SolverConfig {
    DormandPrince(DormandPrince),
    RungeKutta4(RungeKutta4),
}

#[cfg(feature = "serde")]
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Method {
    #[default]
    DormandPrince,
    RungeKutta4,
}

/// Flat form of a `[solver]` table before the method is resolved.
#[cfg(feature = "serde")]
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SolverSection {
    method: Method,
    rtol: Option<f64>,
    atol: Option<f64>,
    max_steps: Option<usize>,
    min_step: Option<f64>,
    max_step: Option<f64>,
    max_dt: Option<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<SolverSection> for SolverConfig {
    type Error = HhError;

    fn try_from(section: SolverSection) -> HhResult<Self> {
        let stray = |field: &str| {
            HhError::InvalidArgument(format!("`{}` does not apply to method {:?}", field, section.method))
        };
        match section.method {
            Method::DormandPrince => {
                if section.max_dt.is_some() {
                    return Err(stray("max_dt"));
                }
                let base = DormandPrince::default();
                Ok(SolverConfig::DormandPrince(DormandPrince {
                    rtol: section.rtol.unwrap_or(base.rtol),
                    atol: section.atol.unwrap_or(base.atol),
                    max_steps: section.max_steps.unwrap_or(base.max_steps),
                    min_step: section.min_step.unwrap_or(base.min_step),
                    max_step: section.max_step.or(base.max_step),
                }))
            }
            Method::RungeKutta4 => {
                let foreign = [
                    ("rtol", section.rtol),
                    ("atol", section.atol),
                    ("min_step", section.min_step),
                    ("max_step", section.max_step),
                ];
                if let Some((field, _)) = foreign.iter().find(|(_, v)| v.is_some()) {
                    return Err(stray(field));
                }
                let base = RungeKutta4::default();
                Ok(SolverConfig::RungeKutta4(RungeKutta4 {
                    max_dt: section.max_dt.unwrap_or(base.max_dt),
                    max_steps: section.max_steps.unwrap_or(base.max_steps),
                }))
            }
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig::DormandPrince(DormandPrince::default())
    }
}

impl SolverConfig {
    pub fn validate(&self) -> HhResult<()> {
        match self {
            SolverConfig::DormandPrince(s) => s.validate(),
            SolverConfig::RungeKutta4(s) => s.validate(),
        }
    }
}

impl Integrator for SolverConfig {
    fn integrate(&self, rhs: &Rhs<'_>, initial: StateVector, timepoints: &[f64]) -> HhResult<TimeSeries> {
        match self {
            SolverConfig::DormandPrince(s) => s.integrate(rhs, initial, timepoints),
            SolverConfig::RungeKutta4(s) => s.integrate(rhs, initial, timepoints),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// vm' = -vm, n' = 1, m' = cos t, h' = -2h
    fn linear(t: f64, y: &StateVector) -> StateVector {
        StateVector::new(-y.vm, 1.0, t.cos(), -2.0 * y.h)
    }

    fn exact(t: f64) -> StateVector {
        StateVector::new((-t).exp(), t, t.sin(), (-2.0 * t).exp())
    }

    fn assert_close(a: &StateVector, b: &StateVector, tol: f64) {
        let (a, b) = (a.to_array(), b.to_array());
        for i in 0..4 {
            assert!((a[i] - b[i]).abs() < tol, "component {}: {} vs {}", i, a[i], b[i]);
        }
    }

    #[test]
    fn dormand_prince_matches_analytic_solution() {
        let solver = DormandPrince::with_tolerances(1e-10, 1e-12);
        let times = [0.0, 0.5, 1.0, 2.0, 5.0];
        let series = solver.integrate(&linear, exact(0.0), &times).unwrap();
        assert_eq!(series.timepoints(), &times);
        for (t, y) in series.iter() {
            assert_close(y, &exact(t), 1e-7);
        }
    }

    #[test]
    fn runge_kutta_matches_analytic_solution() {
        let solver = RungeKutta4::with_max_dt(1e-3);
        let times = [0.0, 1.0, 3.0];
        let series = solver.integrate(&linear, exact(0.0), &times).unwrap();
        for (t, y) in series.iter() {
            assert_close(y, &exact(t), 1e-9);
        }
    }

    #[test]
    fn first_output_is_initial_state() {
        let y0 = StateVector::new(3.0, 0.1, 0.2, 0.3);
        for solver in [
            SolverConfig::default(),
            SolverConfig::RungeKutta4(RungeKutta4::default()),
        ] {
            let series = solver.integrate(&linear, y0, &[7.0]).unwrap();
            assert_eq!(series.len(), 1);
            assert_eq!(series.states()[0], y0);
            assert_eq!(series.timepoints()[0], 7.0);
        }
    }

    #[test]
    fn non_monotonic_requests_integrate_backwards() {
        let solver = DormandPrince::with_tolerances(1e-10, 1e-12);
        let times = [0.0, 1.0, 0.5, 0.5, 2.0];
        let series = solver.integrate(&linear, exact(0.0), &times).unwrap();
        assert_eq!(series.len(), 5);
        for (t, y) in series.iter() {
            assert_close(y, &exact(t), 1e-7);
        }
        assert_eq!(series.states()[2], series.states()[3]);
    }

    #[test]
    fn handles_stiff_relaxation() {
        // y' = -1000 (y - cos t) tracks cos t after a fast transient.
        let stiff = |t: f64, y: &StateVector| {
            StateVector::new(-1000.0 * (y.vm - t.cos()), 0.0, 0.0, 0.0)
        };
        let series = SolverConfig::default()
            .integrate(&stiff, StateVector::new(0.0, 0.0, 0.0, 0.0), &[0.0, 1.0, 2.0])
            .unwrap();
        for (t, y) in series.iter().skip(1) {
            assert!((y.vm - t.cos()).abs() < 2e-3, "t = {}: {}", t, y.vm);
        }
    }

    #[test]
    fn step_budget_exhaustion_is_a_failure() {
        let solver = DormandPrince { max_steps: 3, ..DormandPrince::default() };
        let result = solver.integrate(&linear, exact(0.0), &[0.0, 1000.0]);
        assert!(matches!(result, Err(HhError::IntegrationFailure { .. })));

        let rk = RungeKutta4 { max_dt: 0.01, max_steps: 10 };
        let result = rk.integrate(&linear, exact(0.0), &[0.0, 1.0]);
        assert!(matches!(result, Err(HhError::IntegrationFailure { .. })));
    }

    #[test]
    fn non_finite_derivative_is_a_failure() {
        let blows_up = |t: f64, y: &StateVector| {
            if t > 0.5 {
                StateVector::new(f64::NAN, 0.0, 0.0, 0.0)
            } else {
                StateVector::new(-y.vm, 0.0, 0.0, 0.0)
            }
        };
        let y0 = StateVector::new(1.0, 0.0, 0.0, 0.0);
        for solver in [
            SolverConfig::default(),
            SolverConfig::RungeKutta4(RungeKutta4::default()),
        ] {
            let result = solver.integrate(&blows_up, y0, &[0.0, 1.0]);
            assert!(matches!(result, Err(HhError::IntegrationFailure { .. })), "{:?}", solver);
        }
    }

    #[test]
    fn rejects_malformed_requests() {
        let solver = SolverConfig::default();
        let y0 = exact(0.0);
        assert!(matches!(solver.integrate(&linear, y0, &[]), Err(HhError::InvalidArgument(_))));
        assert!(matches!(
            solver.integrate(&linear, y0, &[0.0, f64::NAN]),
            Err(HhError::InvalidArgument(_))
        ));
        let bad = StateVector::new(f64::INFINITY, 0.0, 0.0, 0.0);
        assert!(matches!(solver.integrate(&linear, bad, &[0.0, 1.0]), Err(HhError::InvalidArgument(_))));

        let loose = DormandPrince { rtol: 0.0, ..DormandPrince::default() };
        assert!(matches!(loose.integrate(&linear, y0, &[0.0, 1.0]), Err(HhError::InvalidArgument(_))));
        let coarse = RungeKutta4::with_max_dt(-1.0);
        assert!(matches!(coarse.integrate(&linear, y0, &[0.0, 1.0]), Err(HhError::InvalidArgument(_))));
    }
}
