//! State vector (Vm, n, m, h) and the time series produced by one integration.

use core::ops::{Add, Mul, Sub};

/// Membrane voltage (mV) and the three gating variables.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StateVector {
    pub vm: f64,
    pub n: f64,
    pub m: f64,
    pub h: f64,
}

impl StateVector {
    pub const fn new(vm: f64, n: f64, m: f64, h: f64) -> Self {
        Self { vm, n, m, h }
    }

    #[inline]
    pub fn to_array(self) -> [f64; 4] {
        [self.vm, self.n, self.m, self.h]
    }

    #[inline]
    pub fn from_array(y: [f64; 4]) -> Self {
        Self::new(y[0], y[1], y[2], y[3])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }

    /// Component-wise `self + k * other`, the basic Runge-Kutta stage update.
    #[inline]
    pub fn add_scaled(self, k: f64, other: StateVector) -> StateVector {
        self + other * k
    }

    pub(crate) fn zip_map(self, other: StateVector, f: impl Fn(f64, f64) -> f64) -> StateVector {
        let (a, b) = (self.to_array(), other.to_array());
        Self::from_array([f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2]), f(a[3], b[3])])
    }
}

impl Add for StateVector {
    type Output = StateVector;

    fn add(self, rhs: StateVector) -> StateVector {
        self.zip_map(rhs, |a, b| a + b)
    }
}

impl Sub for StateVector {
    type Output = StateVector;

    fn sub(self, rhs: StateVector) -> StateVector {
        self.zip_map(rhs, |a, b| a - b)
    }
}

impl Mul<f64> for StateVector {
    type Output = StateVector;

    fn mul(self, k: f64) -> StateVector {
        Self::new(self.vm * k, self.n * k, self.m * k, self.h * k)
    }
}

/// One state per requested time point, in request order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    timepoints: Vec<f64>,
    states: Vec<StateVector>,
}

impl TimeSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            timepoints: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: StateVector) {
        self.timepoints.push(t);
        self.states.push(state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn timepoints(&self) -> &[f64] {
        &self.timepoints
    }

    pub fn states(&self) -> &[StateVector] {
        &self.states
    }

    pub fn last(&self) -> Option<(f64, StateVector)> {
        Some((*self.timepoints.last()?, *self.states.last()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &StateVector)> + '_ {
        self.timepoints.iter().copied().zip(self.states.iter())
    }

    pub fn vm(&self) -> Vec<f64> {
        self.column(|s| s.vm)
    }

    pub fn n(&self) -> Vec<f64> {
        self.column(|s| s.n)
    }

    pub fn m(&self) -> Vec<f64> {
        self.column(|s| s.m)
    }

    pub fn h(&self) -> Vec<f64> {
        self.column(|s| s.h)
    }

    fn column(&self, pick: impl Fn(&StateVector) -> f64) -> Vec<f64> {
        self.states.iter().map(pick).collect()
    }
}
