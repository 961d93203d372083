//! Tap session tracking
//!
//! [`TempoTracker`] owns the taps of one session, the tempo history and the
//! current window size. A new history sample is produced once per tap; the
//! current and average readings are derived lazily and cached.

use crate::reactive::{Memo, Signal};
use crate::tempo::{
    compute_average, compute_instantaneous, Tap, TapSequence, TempoHistory, TempoSample,
    MIN_WINDOW_SIZE,
};
use tracing::debug;

/// Tempo tracking state of one session
#[derive(Debug, Clone)]
pub struct TempoTracker {
    taps: Signal<TapSequence>,
    window_size: Signal<usize>,
    history: TempoHistory,
    current: Memo<Option<TempoSample>>,
    average: Memo<Option<TempoSample>>,
}

impl TempoTracker {
    /// Create a tracker with the given rolling window size
    pub fn new(window_size: usize) -> Self {
        Self {
            taps: Signal::new(TapSequence::new()),
            window_size: Signal::new(window_size.max(MIN_WINDOW_SIZE)),
            history: TempoHistory::new(),
            current: Memo::new(),
            average: Memo::new(),
        }
    }

    /// Record a tap and append the resulting sample (if any) to the history.
    ///
    /// At most one sample is produced per call.
    pub fn tap(&mut self, timestamp: Tap) -> Option<TempoSample> {
        self.taps.update(|taps| taps.add_tap(timestamp));
        let sample = compute_instantaneous(self.taps.get(), *self.window_size.get());
        self.history.push(sample);
        debug!(
            timestamp,
            taps = self.taps.get().len(),
            ?sample,
            "Tap recorded"
        );
        sample
    }

    /// Change the rolling window size. Values below 2 are raised to 2.
    ///
    /// The history is left untouched; only later taps use the new window.
    pub fn set_window_size(&mut self, window_size: usize) {
        if self.window_size.set(window_size.max(MIN_WINDOW_SIZE)) {
            debug!(window_size = *self.window_size.get(), "Window size changed");
        }
    }

    /// Current rolling window size
    pub fn window_size(&self) -> usize {
        *self.window_size.get()
    }

    /// Instantaneous tempo for the current taps and window
    pub fn current_tempo(&mut self) -> Option<TempoSample> {
        let taps = &self.taps;
        let window_size = &self.window_size;
        *self
            .current
            .get(&[taps.revision(), window_size.revision()], || {
                compute_instantaneous(taps.get(), *window_size.get())
            })
    }

    /// Average tempo over every tap of the session
    pub fn average_tempo(&mut self) -> Option<TempoSample> {
        let taps = &self.taps;
        *self
            .average
            .get(&[taps.revision()], || compute_average(taps.get()))
    }

    /// Tempo samples produced so far
    pub fn history(&self) -> &TempoHistory {
        &self.history
    }

    /// Taps recorded so far
    pub fn taps(&self) -> &TapSequence {
        self.taps.get()
    }

    /// Number of taps
    pub fn tap_count(&self) -> usize {
        self.taps.get().len()
    }

    #[cfg(test)]
    fn recompute_counts(&self) -> (usize, usize) {
        (
            self.current.recompute_count(),
            self.average.recompute_count(),
        )
    }
}

impl Default for TempoTracker {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_WINDOW_SIZE as usize)
    }
}
