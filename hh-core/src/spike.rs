//! Spike detection on a sampled voltage trace and the derived firing frequency.

/// Scale applied to the inverse inter-spike interval (ms timebase).
pub const FREQUENCY_SCALE: f64 = 1e4;

/// Voltage the trace must rise above to enter a spike.
pub const SPIKE_THRESHOLD: f64 = 0.0;

/// Whether the trace is currently inside a spike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Latch {
    #[default]
    Outside,
    Inside,
}

impl Latch {
    /// Feed one sample; returns `true` on a rising crossing into a spike.
    ///
    /// Above threshold enters, below leaves; a sample exactly at threshold
    /// leaves the latch as it is.
    #[inline]
    pub fn feed(&mut self, v: f64) -> bool {
        match *self {
            Latch::Outside if v > SPIKE_THRESHOLD => {
                *self = Latch::Inside;
                true
            }
            Latch::Inside if v < SPIKE_THRESHOLD => {
                *self = Latch::Outside;
                false
            }
            _ => false,
        }
    }
}

/// Indices (into `vm`) of every rising crossing at or after `start`.
///
/// The latch starts outside, so a sample above threshold at `start` counts.
pub fn rising_crossings(vm: &[f64], start: usize) -> impl Iterator<Item = usize> + '_ {
    let mut latch = Latch::default();
    vm.iter()
        .enumerate()
        .skip(start)
        .filter_map(move |(i, &v)| latch.feed(v).then_some(i))
}

/// The first two rising crossings at or after `start`, if there are two.
pub fn first_two_crossings(vm: &[f64], start: usize) -> Option<(usize, usize)> {
    let mut crossings = rising_crossings(vm, start);
    Some((crossings.next()?, crossings.next()?))
}

/// Firing frequency from the first inter-spike interval after `start`:
/// `FREQUENCY_SCALE / (t[second] - t[first])`.
///
/// `None` when fewer than two spikes are found.
pub fn spike_frequency(timepoints: &[f64], vm: &[f64], start: usize) -> Option<f64> {
    let len = timepoints.len().min(vm.len());
    let (first, second) = first_two_crossings(&vm[..len], start)?;
    Some(FREQUENCY_SCALE / (timepoints[second] - timepoints[first]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.5).collect()
    }

    #[test]
    fn undefined_when_never_above_threshold() {
        let vm = vec![-65.0, -40.0, -10.0, 0.0, -70.0, -65.0];
        assert_eq!(spike_frequency(&times(vm.len()), &vm, 0), None);
    }

    #[test]
    fn undefined_with_a_single_crossing() {
        let vm = vec![-65.0, 20.0, 30.0, -70.0, -65.0, -60.0];
        assert_eq!(spike_frequency(&times(vm.len()), &vm, 0), None);
    }

    #[test]
    fn frequency_from_first_interval() {
        // Rising crossings at indices 1 and 5: 2 ms apart.
        let vm = vec![-65.0, 20.0, 10.0, -70.0, -60.0, 25.0, -70.0, 30.0];
        let f = spike_frequency(&times(vm.len()), &vm, 0).unwrap();
        assert!((f - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_at_start_counts() {
        let vm = vec![-65.0, -65.0, 20.0, -70.0, 15.0];
        assert_eq!(first_two_crossings(&vm, 2), Some((2, 4)));
        assert_eq!(first_two_crossings(&vm, 0), Some((2, 4)));
        assert_eq!(first_two_crossings(&vm, 3), None);
    }

    #[test]
    fn zero_neither_enters_nor_leaves() {
        // Staying at 0 after a spike does not end it.
        let vm = vec![10.0, 0.0, 0.0, 5.0, -1.0, 0.0, 3.0];
        let found: Vec<usize> = rising_crossings(&vm, 0).collect();
        assert_eq!(found, vec![0, 6]);
    }

    #[test]
    fn start_past_end_is_undefined() {
        let vm = vec![10.0, -10.0, 10.0];
        assert_eq!(spike_frequency(&times(3), &vm, 3), None);
        assert_eq!(spike_frequency(&times(3), &vm, 100), None);
    }

    #[test]
    fn latch_transitions() {
        let mut latch = Latch::default();
        assert!(!latch.feed(-1.0));
        assert!(latch.feed(1.0));
        assert_eq!(latch, Latch::Inside);
        assert!(!latch.feed(2.0));
        assert!(!latch.feed(-1.0));
        assert_eq!(latch, Latch::Outside);
    }
}
