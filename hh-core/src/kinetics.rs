//! Voltage-dependent channel kinetics.
//!
//! Rates are in ms⁻¹ and voltages in mV. Each gate `x` relaxes as
//!
//! ```text
//! dx/dt = α_x(V) (1 - x) - β_x(V) x
//! x_∞   = α_x / (α_x + β_x)
//! τ_x   = 1 / (α_x + β_x)
//! ```
//!
//! The n and m rates have the form `a (V - V0) / (1 - exp(∓(V - V0) / k))`,
//! which is 0/0 at `V = V0`. They are evaluated through [`exprel_recip`],
//! which is exact at the singular point and accurate around it.

/// Characteristic voltage of the potassium activation rates (mV).
pub const N_SINGULAR_VM: f64 = 25.0;
/// Characteristic voltage of the sodium activation rates (mV).
pub const M_SINGULAR_VM: f64 = -35.0;

const N_SLOPE: f64 = 9.0;
const M_SLOPE: f64 = 9.0;

/// `u / (1 - exp(-u))`, equal to 1 at `u = 0`.
#[inline]
pub fn exprel_recip(u: f64) -> f64 {
    if u == 0.0 {
        1.0
    } else {
        u / -(-u).exp_m1()
    }
}

/// Opening and closing rates of one gate at a given voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rates {
    pub alpha: f64,
    pub beta: f64,
}

impl Rates {
    #[inline]
    pub fn steady_state(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    #[inline]
    pub fn time_constant(&self) -> f64 {
        1.0 / (self.alpha + self.beta)
    }

    /// Right-hand side of the gate equation for gate value `x`.
    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        self.alpha * (1.0 - x) - self.beta * x
    }
}

// Potassium activation (n)

#[inline]
pub fn alpha_n(vm: f64) -> f64 {
    0.02 * N_SLOPE * exprel_recip((vm - N_SINGULAR_VM) / N_SLOPE)
}

#[inline]
pub fn beta_n(vm: f64) -> f64 {
    0.002 * N_SLOPE * exprel_recip(-(vm - N_SINGULAR_VM) / N_SLOPE)
}

pub fn n_inf(vm: f64) -> f64 {
    Gate::N.steady_state(vm)
}

// Fast sodium activation (m)

#[inline]
pub fn alpha_m(vm: f64) -> f64 {
    0.182 * M_SLOPE * exprel_recip((vm - M_SINGULAR_VM) / M_SLOPE)
}

#[inline]
pub fn beta_m(vm: f64) -> f64 {
    0.124 * M_SLOPE * exprel_recip(-(vm - M_SINGULAR_VM) / M_SLOPE)
}

pub fn m_inf(vm: f64) -> f64 {
    Gate::M.steady_state(vm)
}

// Slow sodium inactivation (h)

#[inline]
pub fn alpha_h(vm: f64) -> f64 {
    0.25 * (-(vm + 90.0) / 12.0).exp()
}

/// `0.25 exp((V + 62) / 6) / exp((V + 90) / 12)`, taken as one exponential
/// so large voltages do not produce inf / inf.
#[inline]
pub fn beta_h(vm: f64) -> f64 {
    0.25 * ((vm + 62.0) / 6.0 - (vm + 90.0) / 12.0).exp()
}

pub fn h_inf(vm: f64) -> f64 {
    Gate::H.steady_state(vm)
}

/// The three gates of the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Potassium activation.
    N,
    /// Sodium activation.
    M,
    /// Sodium inactivation.
    H,
}

impl Gate {
    pub const ALL: [Gate; 3] = [Gate::N, Gate::M, Gate::H];

    pub fn rates(self, vm: f64) -> Rates {
        match self {
            Gate::N => Rates { alpha: alpha_n(vm), beta: beta_n(vm) },
            Gate::M => Rates { alpha: alpha_m(vm), beta: beta_m(vm) },
            Gate::H => Rates { alpha: alpha_h(vm), beta: beta_h(vm) },
        }
    }

    pub fn steady_state(self, vm: f64) -> f64 {
        self.rates(vm).steady_state()
    }

    pub fn time_constant(self, vm: f64) -> f64 {
        self.rates(vm).time_constant()
    }

    pub fn name(self) -> &'static str {
        match self {
            Gate::N => "n",
            Gate::M => "m",
            Gate::H => "h",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The rates exactly as first written, including their 0/0 points.
    fn naive_alpha_n(vm: f64) -> f64 {
        0.02 * (vm - 25.0) / (1.0 - (-(vm - 25.0) / 9.0).exp())
    }
    fn naive_beta_n(vm: f64) -> f64 {
        -0.002 * (vm - 25.0) / (1.0 - ((vm - 25.0) / 9.0).exp())
    }
    fn naive_alpha_m(vm: f64) -> f64 {
        0.182 * (vm + 35.0) / (1.0 - (-(vm + 35.0) / 9.0).exp())
    }
    fn naive_beta_m(vm: f64) -> f64 {
        -0.124 * (vm + 35.0) / (1.0 - ((vm + 35.0) / 9.0).exp())
    }
    fn naive_beta_h(vm: f64) -> f64 {
        0.25 * ((vm + 62.0) / 6.0).exp() / ((vm + 90.0) / 12.0).exp()
    }

    fn voltages() -> impl Iterator<Item = f64> {
        (0..=600).map(|i| -150.0 + 0.5 * i as f64)
    }

    #[test]
    fn singular_points_take_analytic_limit() {
        assert!((alpha_n(25.0) - 0.18).abs() < 1e-6);
        assert!((beta_n(25.0) - 0.018).abs() < 1e-6);
        assert!((alpha_m(-35.0) - 1.638).abs() < 1e-6);
        assert!((beta_m(-35.0) - 1.116).abs() < 1e-6);
        for v in [alpha_n(25.0), beta_n(25.0), alpha_m(-35.0), beta_m(-35.0)] {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn continuous_across_singular_points() {
        for dv in [1e-12, 1e-9, 1e-6, 1e-3] {
            assert!((alpha_n(25.0 + dv) - alpha_n(25.0)).abs() < 1e-3);
            assert!((alpha_n(25.0 - dv) - alpha_n(25.0)).abs() < 1e-3);
            assert!((beta_m(-35.0 + dv) - beta_m(-35.0)).abs() < 1e-3);
            assert!((beta_m(-35.0 - dv) - beta_m(-35.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn matches_direct_formulas_away_from_singularities() {
        for vm in voltages() {
            if vm == N_SINGULAR_VM || vm == M_SINGULAR_VM {
                continue;
            }
            let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * b.abs().max(1e-12);
            assert!(close(alpha_n(vm), naive_alpha_n(vm)), "alpha_n at {}", vm);
            assert!(close(beta_n(vm), naive_beta_n(vm)), "beta_n at {}", vm);
            assert!(close(alpha_m(vm), naive_alpha_m(vm)), "alpha_m at {}", vm);
            assert!(close(beta_m(vm), naive_beta_m(vm)), "beta_m at {}", vm);
            assert!(close(beta_h(vm), naive_beta_h(vm)), "beta_h at {}", vm);
        }
    }

    #[test]
    fn rate_sums_positive_and_steady_states_open_interval() {
        for vm in voltages() {
            for gate in Gate::ALL {
                let r = gate.rates(vm);
                assert!(r.alpha + r.beta > 0.0, "{} rates at {}", gate.name(), vm);
                let x = r.steady_state();
                assert!(x > 0.0 && x < 1.0, "{}_inf({}) = {}", gate.name(), vm, x);
                assert!(gate.time_constant(vm) > 0.0);
            }
        }
    }

    #[test]
    fn steady_state_zeroes_gate_derivative() {
        for vm in [-80.0, -65.0, -35.0, 0.0, 25.0, 40.0] {
            for gate in Gate::ALL {
                let r = gate.rates(vm);
                assert!(r.derivative(r.steady_state()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn free_functions_agree_with_gate() {
        assert_eq!(n_inf(-65.0), Gate::N.steady_state(-65.0));
        assert_eq!(m_inf(-65.0), Gate::M.steady_state(-65.0));
        assert_eq!(h_inf(-65.0), Gate::H.steady_state(-65.0));
    }

    #[test]
    fn extreme_voltages_stay_finite() {
        for vm in [-1e4, -1e3, 1e3, 1e4] {
            for gate in Gate::ALL {
                let r = gate.rates(vm);
                assert!(!r.alpha.is_nan() && !r.beta.is_nan(), "{} at {}", gate.name(), vm);
                assert!(r.alpha >= 0.0 && r.beta >= 0.0);
            }
        }
    }
}
