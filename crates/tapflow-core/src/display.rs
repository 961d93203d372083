//! Display strings and chart scaling for tempo readouts

use crate::tempo::{TempoHistory, TempoSample};

/// Headroom added above the largest plotted value
pub const CHART_HEADROOM: u32 = 30;
/// Upper chart bound is rounded up to a multiple of this
pub const CHART_STEP: u32 = 10;

fn bpm_or_placeholder(sample: Option<TempoSample>) -> String {
    match sample {
        Some(TempoSample(bpm)) if bpm > 0 => bpm.to_string(),
        _ => "--".to_string(),
    }
}

/// `"120 BPM"`, or `"-- BPM"` without a reading
pub fn tempo_label(sample: Option<TempoSample>) -> String {
    format!("{} BPM", bpm_or_placeholder(sample))
}

/// `"118 BPM average"`, or `"-- BPM average"` without a reading
pub fn average_label(sample: Option<TempoSample>) -> String {
    format!("{} BPM average", bpm_or_placeholder(sample))
}

/// Reference tempo label; 0 means no reference
pub fn reference_label(reference_tempo: u32) -> String {
    if reference_tempo == 0 {
        "Reference tempo: None".to_string()
    } else {
        format!("Reference tempo: {} BPM", reference_tempo)
    }
}

/// Window size label
pub fn window_label(window_size: u32) -> String {
    format!("Rolling Average Window: {} beats", window_size)
}

/// Y-axis range `(min, max)` for plotting the history against the reference.
///
/// The lower bound is always 0. The upper bound leaves [`CHART_HEADROOM`]
/// above the largest sample or reference and is rounded up to
/// [`CHART_STEP`]. A reference of 0 is not plotted and does not count.
pub fn chart_domain(history: &TempoHistory, reference_tempo: u32) -> (u32, u32) {
    let max_sample = history.max().map(TempoSample::bpm).unwrap_or(0);
    let max_value = max_sample.max(reference_tempo);
    let upper = max_value
        .saturating_add(CHART_HEADROOM)
        .div_ceil(CHART_STEP)
        .saturating_mul(CHART_STEP);
    (0, upper)
}

/// One history sample per line, prefixed with its index
pub fn history_lines(history: &TempoHistory) -> Vec<String> {
    history
        .samples()
        .iter()
        .enumerate()
        .map(|(index, sample)| format!("{:>4}  {}", index, sample))
        .collect()
}
