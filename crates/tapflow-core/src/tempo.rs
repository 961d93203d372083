//! Tempo calculation over tapped timestamps
//!
//! Taps are plain millisecond timestamps. The instantaneous tempo is derived
//! from a trailing window of the last `window_size` taps, the average from the
//! full sequence. Durations that are zero, negative (duplicate or
//! out-of-order taps) or too large for an `i64` never produce a sample.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single tap timestamp in milliseconds since an arbitrary fixed epoch
pub type Tap = i64;

/// Milliseconds per minute
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Smallest window that can yield a tempo (one beat interval)
pub const MIN_WINDOW_SIZE: usize = 2;

/// Integer tempo in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TempoSample(pub u32);

impl TempoSample {
    /// BPM value
    pub fn bpm(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TempoSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.0)
    }
}

/// Append-only record of tap timestamps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapSequence {
    taps: Vec<Tap>,
}

impl TapSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self { taps: Vec::new() }
    }

    /// Append a timestamp. Never fails, also for duplicate or earlier timestamps.
    pub fn add_tap(&mut self, timestamp: Tap) {
        self.taps.push(timestamp);
    }

    /// All taps in arrival order
    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    /// Number of taps
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// Check if no tap has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Most recent tap
    pub fn last(&self) -> Option<Tap> {
        self.taps.last().copied()
    }
}

impl From<Vec<Tap>> for TapSequence {
    fn from(taps: Vec<Tap>) -> Self {
        Self { taps }
    }
}

/// Ordered tempo samples, one per qualifying tap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoHistory {
    samples: Vec<TempoSample>,
}

impl TempoHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Append a sample if there is one. Returns true if the history grew.
    pub fn push(&mut self, sample: Option<TempoSample>) -> bool {
        match sample {
            Some(sample) => {
                self.samples.push(sample);
                true
            }
            None => false,
        }
    }

    /// All samples, oldest first
    pub fn samples(&self) -> &[TempoSample] {
        &self.samples
    }

    /// Latest sample
    pub fn latest(&self) -> Option<TempoSample> {
        self.samples.last().copied()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest sample, used for chart scaling
    pub fn max(&self) -> Option<TempoSample> {
        self.samples.iter().copied().max()
    }
}

/// Value-style append: consumes the sequence and returns it with the tap added
pub fn add_tap(mut sequence: TapSequence, timestamp: Tap) -> TapSequence {
    sequence.add_tap(timestamp);
    sequence
}

/// Value-style history append, a no-op for `None`
pub fn append_to_history(mut history: TempoHistory, sample: Option<TempoSample>) -> TempoHistory {
    history.push(sample);
    history
}

/// BPM implied by `intervals` beat intervals from `first` to `last`.
///
/// Returns `None` unless the span is positive and representable.
fn bpm_for(intervals: usize, first: Tap, last: Tap) -> Option<TempoSample> {
    let duration_ms = last.checked_sub(first).filter(|d| *d > 0)?;
    // f64::round rounds half away from zero
    let bpm = (MS_PER_MINUTE * intervals as f64 / duration_ms as f64).round();
    Some(TempoSample(bpm.min(u32::MAX as f64) as u32))
}

/// Instantaneous tempo over the trailing `window_size` taps.
///
/// Returns `None` while the sequence is shorter than the window, for windows
/// below [`MIN_WINDOW_SIZE`], and when the window spans no positive time.
pub fn compute_instantaneous(sequence: &TapSequence, window_size: usize) -> Option<TempoSample> {
    let taps = sequence.taps();
    if window_size < MIN_WINDOW_SIZE || taps.len() < window_size {
        return None;
    }
    let last = taps.len() - 1;
    bpm_for(window_size - 1, taps[last + 1 - window_size], taps[last])
}

/// Cumulative average tempo from the first to the last tap
pub fn compute_average(sequence: &TapSequence) -> Option<TempoSample> {
    let taps = sequence.taps();
    if taps.len() <= 1 {
        return None;
    }
    bpm_for(taps.len() - 1, taps[0], taps[taps.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(taps: &[Tap]) -> TapSequence {
        TapSequence::from(taps.to_vec())
    }

    #[test]
    fn test_instantaneous_needs_full_window() {
        let taps = seq(&[0, 500, 1000]);
        assert_eq!(compute_instantaneous(&taps, 4), None);
        assert_eq!(compute_instantaneous(&taps, 3), Some(TempoSample(120)));
    }

    #[test]
    fn test_window_below_minimum() {
        let taps = seq(&[0, 500, 1000]);
        assert_eq!(compute_instantaneous(&taps, 1), None);
        assert_eq!(compute_instantaneous(&taps, 0), None);
    }

    #[test]
    fn test_out_of_order_taps_produce_no_sample() {
        let taps = seq(&[1000, 400]);
        assert_eq!(compute_instantaneous(&taps, 2), None);
        assert_eq!(compute_average(&taps), None);
    }

    #[test]
    fn test_extreme_timestamps_produce_no_sample() {
        for taps in [seq(&[Tap::MIN, Tap::MAX]), seq(&[Tap::MAX, Tap::MIN])] {
            assert_eq!(compute_instantaneous(&taps, 2), None);
            assert_eq!(compute_average(&taps), None);
        }
        // Representable span still works
        assert_eq!(
            compute_average(&seq(&[Tap::MAX - 500, Tap::MAX])),
            Some(TempoSample(120))
        );
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 60000 / 960 = 62.5 -> 63
        assert_eq!(compute_instantaneous(&seq(&[0, 960]), 2), Some(TempoSample(63)));
        // 60000 / 700 = 85.71 -> 86
        assert_eq!(compute_instantaneous(&seq(&[0, 700]), 2), Some(TempoSample(86)));
    }

    #[test]
    fn test_average_single_tap() {
        assert_eq!(compute_average(&seq(&[42])), None);
        assert_eq!(compute_average(&TapSequence::new()), None);
    }

    #[test]
    fn test_history_ignores_none() {
        let history = append_to_history(TempoHistory::new(), None);
        assert!(history.is_empty());
        let history = append_to_history(history, Some(TempoSample(90)));
        assert_eq!(history.samples(), &[TempoSample(90)]);
        assert_eq!(history.latest(), Some(TempoSample(90)));
    }

    #[test]
    fn test_value_style_add_tap() {
        let taps = add_tap(add_tap(TapSequence::new(), 10), 5);
        assert_eq!(taps.taps(), &[10, 5]);
        assert_eq!(taps.last(), Some(5));
    }
}
