//! Session state and command handling

use crate::input::{Command, HELP};
use tapflow_core::display::{
    average_label, chart_domain, history_lines, reference_label, tempo_label, window_label,
};
use tapflow_core::{SettingChange, StorageEvent, Tap, TempoSettings, TempoTracker};
use tracing::{debug, info};

/// Whether the event loop keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going
    Continue,
    /// Stop the loop
    Quit,
}

/// One tapping session: the tracker plus its persisted settings
pub struct TapApp {
    tracker: TempoTracker,
    settings: TempoSettings,
}

impl TapApp {
    /// Build the session from already activated settings
    pub fn new(settings: TempoSettings) -> Self {
        let tracker = TempoTracker::new(settings.window_size() as usize);
        Self { tracker, settings }
    }

    /// Tracker state
    pub fn tracker(&self) -> &TempoTracker {
        &self.tracker
    }

    /// Persisted settings
    pub fn settings(&self) -> &TempoSettings {
        &self.settings
    }

    /// Run one command, writing any output lines to `out`
    pub fn handle_command(&mut self, command: Command, at: Tap, out: &mut Vec<String>) -> Flow {
        match command {
            Command::Tap => {
                let sample = self.tracker.tap(at);
                debug!(at, ?sample, taps = self.tracker.tap_count(), "Tap");
                self.push_status(out);
            }
            Command::WindowSize(n) => {
                let stored = self.settings.set_window_size(n);
                self.tracker.set_window_size(stored as usize);
                self.push_status(out);
            }
            Command::ReferenceTempo(n) => {
                self.settings.set_reference_tempo(n);
                self.push_status(out);
            }
            Command::History => self.push_history(out),
            Command::Help => out.push(HELP.to_string()),
            Command::Invalid(line) => {
                out.push(format!("Unknown command: {}", line));
                out.push(HELP.to_string());
            }
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Apply a change notification arriving from another context
    pub fn handle_storage_event(&mut self, event: &StorageEvent, out: &mut Vec<String>) {
        if let Some(change) = self.settings.handle_event(event) {
            self.apply_change(change);
            self.push_status(out);
        }
    }

    /// Drain every pending notification of both settings
    pub fn sync(&mut self, out: &mut Vec<String>) {
        let changes = self.settings.sync();
        if changes.is_empty() {
            return;
        }
        for change in changes {
            self.apply_change(change);
        }
        self.push_status(out);
    }

    fn apply_change(&mut self, change: SettingChange) {
        info!(?change, "Setting changed in another context");
        if let SettingChange::WindowSize(n) = change {
            self.tracker.set_window_size(n as usize);
        }
    }

    /// Current readout
    pub fn status_lines(&mut self) -> Vec<String> {
        vec![
            window_label(self.settings.window_size()),
            reference_label(self.settings.reference_tempo()),
            tempo_label(self.tracker.current_tempo()),
            average_label(self.tracker.average_tempo()),
        ]
    }

    fn push_status(&mut self, out: &mut Vec<String>) {
        let status = self.status_lines();
        out.push(status.join(" | "));
    }

    fn push_history(&self, out: &mut Vec<String>) {
        let history = self.tracker.history();
        if history.is_empty() {
            out.push("No tempo history yet".to_string());
            return;
        }
        let (low, high) = chart_domain(history, self.settings.reference_tempo());
        out.push(format!("History ({} samples, {}-{} BPM):", history.len(), low, high));
        out.extend(history_lines(history));
    }
}
