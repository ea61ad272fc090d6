//! Single-compartment Hodgkin-Huxley membrane.
//!
//! ## Equations
//!
//! ```text
//! C_m dV/dt = I_inj(t) - I_K - I_Na - I_l
//! I_K  = g_K  n⁴   (V - E_K)
//! I_Na = g_Na m³ h (V - E_Na)
//! I_l  = g_l       (V - E_l)
//! ```
//!
//! Gate kinetics live in [`crate::kinetics`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HhError, HhResult};
use crate::integrator::{Integrator, SolverConfig};
use crate::kinetics::{self, Gate};
use crate::state::{StateVector, TimeSeries};
use crate::stimulus::Stimulus;

/// Conductances (mS/cm²), reversal potentials (mV) and capacitance (µF/cm²).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ModelParameters {
    pub g_na: f64,
    pub g_k: f64,
    pub g_l: f64,
    pub e_na: f64,
    pub e_k: f64,
    pub e_l: f64,
    pub c_m: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            g_na: 40.0,
            g_k: 35.0,
            g_l: 0.3,
            e_na: 55.0,
            e_k: -77.0,
            e_l: -65.0,
            c_m: 1.0,
        }
    }
}

impl ModelParameters {
    pub fn validate(&self) -> HhResult<()> {
        let positive = [("g_na", self.g_na), ("g_k", self.g_k), ("g_l", self.g_l), ("c_m", self.c_m)];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(HhError::InvalidArgument(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        let reversal = [("e_na", self.e_na), ("e_k", self.e_k), ("e_l", self.e_l)];
        for (name, value) in reversal {
            if !value.is_finite() {
                return Err(HhError::InvalidArgument(format!("{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Initial membrane voltage and optional gate values.
///
/// Unset gates start at their steady state for `vm`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct InitialConditions {
    pub vm: f64,
    pub n: Option<f64>,
    pub m: Option<f64>,
    pub h: Option<f64>,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self::at_rest(-65.0)
    }
}

impl InitialConditions {
    pub fn at_rest(vm: f64) -> Self {
        Self { vm, n: None, m: None, h: None }
    }

    pub fn resolve(&self) -> StateVector {
        StateVector::new(
            self.vm,
            self.n.unwrap_or_else(|| kinetics::n_inf(self.vm)),
            self.m.unwrap_or_else(|| kinetics::m_inf(self.vm)),
            self.h.unwrap_or_else(|| kinetics::h_inf(self.vm)),
        )
    }
}

/// Hodgkin-Huxley model bound to at most one stimulus at a time.
///
/// The only state kept between calls is the stimulus binding, which each
/// [`HodgkinHuxley::stimulate`] call replaces.
#[derive(Clone, Debug, Default)]
pub struct HodgkinHuxley {
    params: ModelParameters,
    solver: SolverConfig,
    stimulus: Option<Stimulus>,
}

impl HodgkinHuxley {
    pub fn new(params: ModelParameters) -> HhResult<Self> {
        params.validate()?;
        Ok(Self { params, solver: SolverConfig::default(), stimulus: None })
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> HhResult<Self> {
        solver.validate()?;
        self.solver = solver;
        Ok(self)
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn bound_stimulus(&self) -> Option<&Stimulus> {
        self.stimulus.as_ref()
    }

    // Ionic currents (µA/cm²)

    #[inline]
    pub fn i_k(&self, vm: f64, n: f64) -> f64 {
        self.params.g_k * (vm - self.params.e_k) * n.powi(4)
    }

    #[inline]
    pub fn i_na(&self, vm: f64, m: f64, h: f64) -> f64 {
        self.params.g_na * m.powi(3) * h * (vm - self.params.e_na)
    }

    #[inline]
    pub fn i_l(&self, vm: f64) -> f64 {
        self.params.g_l * (vm - self.params.e_l)
    }

    /// Total outward ionic current for `state`.
    pub fn ionic_current(&self, state: &StateVector) -> f64 {
        self.i_k(state.vm, state.n) + self.i_na(state.vm, state.m, state.h) + self.i_l(state.vm)
    }

    /// `dState/dt` at time `t` under the bound stimulus.
    pub fn derivative(&self, state: &StateVector, t: f64) -> HhResult<StateVector> {
        let stimulus = self
            .stimulus
            .as_ref()
            .ok_or(HhError::InvalidState("derivative evaluated before any stimulus was bound"))?;
        Ok(self.derivative_with(stimulus.current_at(t), state))
    }

    fn derivative_with(&self, injected: f64, state: &StateVector) -> StateVector {
        let vm = state.vm;
        let dvm = (injected - self.ionic_current(state)) / self.params.c_m;
        StateVector::new(
            dvm,
            Gate::N.rates(vm).derivative(state.n),
            Gate::M.rates(vm).derivative(state.m),
            Gate::H.rates(vm).derivative(state.h),
        )
    }

    /// Bind `stimulus` and integrate from `initial` over its time points.
    pub fn stimulate(&mut self, stimulus: &Stimulus, initial: InitialConditions) -> HhResult<TimeSeries> {
        self.stimulus = Some(stimulus.clone());
        let y0 = initial.resolve();
        debug!(
            vm = y0.vm,
            n = y0.n,
            m = y0.m,
            h = y0.h,
            samples = stimulus.resolution(),
            t_start = stimulus.time_start(),
            t_stop = stimulus.time_stop(),
            "stimulating membrane"
        );

        let rhs = |t: f64, y: &StateVector| self.derivative_with(stimulus.current_at(t), y);
        self.solver.integrate(&rhs, y0, stimulus.timepoints())
    }

    /// Steady-state ionic current with every gate at its steady state for `vm`.
    pub fn steady_state_current(&self, vm: f64) -> f64 {
        self.ionic_current(&InitialConditions::at_rest(vm).resolve())
    }

    /// Lowest stable equilibrium voltage under a constant injected current.
    ///
    /// Scans [-120, 60] mV for the first point where the steady-state
    /// current crosses `injected` upwards, then bisects.
    pub fn resting_potential_with(&self, injected: f64) -> Option<f64> {
        const LOW: f64 = -120.0;
        const HIGH: f64 = 60.0;
        const STEP: f64 = 0.25;

        let net = |vm: f64| self.steady_state_current(vm) - injected;
        let steps = ((HIGH - LOW) / STEP) as usize;
        let (mut lo, mut hi) = (0..steps)
            .map(|i| (LOW + STEP * i as f64, LOW + STEP * (i + 1) as f64))
            .find(|&(a, b)| net(a) <= 0.0 && net(b) > 0.0)?;

        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            if net(mid) <= 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Some(0.5 * (lo + hi))
    }

    /// [`Self::resting_potential_with`] for zero injected current.
    pub fn resting_potential(&self) -> Option<f64> {
        self.resting_potential_with(0.0)
    }
}
