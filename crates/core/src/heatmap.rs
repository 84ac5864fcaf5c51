//! Engagement heatmap updates and queries.
//!
//! The heatmap is a 24-vector of per-local-hour engagement scores in
//! `[0, 1]`. User feedback nudges the entry for the hour the interaction
//! happened in; the optimal-send-time picker and the profile endpoint read
//! it back.

use std::str::FromStr;

use crate::context::is_dnd_active;

/// Fixed learning rate for feedback updates.
pub const LEARNING_RATE: f64 = 0.1;

/// A user interaction with a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAction {
    Opened,
    Clicked,
    Dismissed,
    Muted,
}

impl FeedbackAction {
    /// Whether this action signals positive engagement.
    pub fn is_positive(&self) -> bool {
        matches!(self, FeedbackAction::Opened | FeedbackAction::Clicked)
    }
}

impl FromStr for FeedbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(FeedbackAction::Opened),
            "clicked" => Ok(FeedbackAction::Clicked),
            "dismissed" => Ok(FeedbackAction::Dismissed),
            "muted" => Ok(FeedbackAction::Muted),
            other => Err(format!(
                "action must be one of opened, clicked, dismissed, muted (got '{other}')"
            )),
        }
    }
}

/// Apply one feedback interaction to the heatmap entry for `hour`,
/// clamping the result to `[0, 1]`. Out-of-range hours are ignored.
pub fn apply_feedback(heatmap: &mut [f64], hour: usize, action: FeedbackAction) {
    let Some(entry) = heatmap.get_mut(hour) else {
        return;
    };
    if action.is_positive() {
        *entry = (*entry + LEARNING_RATE).min(1.0);
    } else {
        *entry = (*entry - LEARNING_RATE).max(0.0);
    }
}

/// The `k` best send hours by engagement, excluding hours inside the DND
/// window. Ties resolve to the earlier hour.
pub fn top_send_hours(heatmap: &[f64], dnd_start: u32, dnd_end: u32, k: usize) -> Vec<u32> {
    let mut scored: Vec<(u32, f64)> = (0..24u32)
        .filter(|&h| !is_dnd_active(dnd_start, dnd_end, h))
        .map(|h| (h, heatmap.get(h as usize).copied().unwrap_or(1.0)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(k).map(|(h, _)| h).collect()
}
