use chrono::{DateTime, Local};

use super::labels::{RiskLevel, DEFAULT_STATE};

/// One reported emotional state.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionPoint {
    pub state: String,
    pub risk: RiskLevel,
    pub timestamp: DateTime<Local>,
}

/// Timeline of emotional states for the current conversation.
#[derive(Debug, Default)]
pub struct EmotionTracker {
    history: Vec<EmotionPoint>,
    session_start: Option<DateTime<Local>>,
}

impl EmotionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the timeline and starts timing a new session at `now`.
    pub fn start(&mut self, now: DateTime<Local>) {
        self.history.clear();
        self.session_start = Some(now);
        tracing::debug!("Emotion tracker started");
    }

    pub fn record(&mut self, state: &str, risk: RiskLevel, at: DateTime<Local>) {
        tracing::debug!("Emotion update: {} / {}", state, risk);
        self.history.push(EmotionPoint {
            state: state.to_string(),
            risk,
            timestamp: at,
        });
    }

    /// Replaces the timeline with points restored from chat history.
    ///
    /// Entries without a state are skipped; a missing risk counts as Low and a
    /// missing timestamp as `now`.
    pub fn hydrate<I>(&mut self, points: I, now: DateTime<Local>)
    where
        I: IntoIterator<Item = (Option<String>, Option<RiskLevel>, Option<DateTime<Local>>)>,
    {
        self.history = points
            .into_iter()
            .filter_map(|(state, risk, timestamp)| {
                Some(EmotionPoint {
                    state: state?,
                    risk: risk.unwrap_or_default(),
                    timestamp: timestamp.unwrap_or(now),
                })
            })
            .collect();
        tracing::debug!("Emotion tracker hydrated with {} points", self.history.len());
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.session_start = None;
    }

    pub fn history(&self) -> &[EmotionPoint] {
        &self.history
    }

    /// Latest state and risk, or Normal/Low before any report.
    pub fn current(&self) -> (&str, RiskLevel) {
        self.history
            .last()
            .map(|p| (p.state.as_str(), p.risk))
            .unwrap_or((DEFAULT_STATE, RiskLevel::Low))
    }

    /// Number of times the state differed from the one before it.
    pub fn state_changes(&self) -> usize {
        self.history
            .windows(2)
            .filter(|pair| pair[0].state != pair[1].state)
            .count()
    }

    /// Most frequently reported state; the earliest seen wins ties.
    pub fn dominant_state(&self) -> &str {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for point in &self.history {
            match counts.iter_mut().find(|(state, _)| *state == point.state) {
                Some((_, count)) => *count += 1,
                None => counts.push((point.state.as_str(), 1)),
            }
        }

        let mut dominant = (DEFAULT_STATE, 0);
        for (state, count) in counts {
            if count > dominant.1 {
                dominant = (state, count);
            }
        }
        dominant.0
    }

    /// Session length as `Nm`, or `Hh Mm` from one hour on.
    pub fn duration_label(&self, now: DateTime<Local>) -> String {
        let Some(start) = self.session_start else {
            return "0m".to_string();
        };
        let minutes = (now - start).num_minutes().max(0);
        if minutes < 60 {
            format!("{minutes}m")
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tracker_with(states: &[&str]) -> EmotionTracker {
        let mut tracker = EmotionTracker::new();
        let now = Local::now();
        tracker.start(now);
        for state in states {
            tracker.record(state, RiskLevel::Low, now);
        }
        tracker
    }

    #[test]
    fn test_empty_tracker_reports_normal() {
        let tracker = EmotionTracker::new();
        assert_eq!(tracker.current(), ("Normal", RiskLevel::Low));
        assert_eq!(tracker.dominant_state(), "Normal");
        assert_eq!(tracker.state_changes(), 0);
    }

    #[test]
    fn test_state_changes_count_only_transitions() {
        let tracker = tracker_with(&["Normal", "Normal", "Anxiety", "Anxiety", "Normal"]);
        assert_eq!(tracker.state_changes(), 2);
    }

    #[test]
    fn test_dominant_state_prefers_first_seen_on_tie() {
        let tracker = tracker_with(&["Stress", "Anxiety", "Anxiety", "Stress"]);
        assert_eq!(tracker.dominant_state(), "Stress");

        let tracker = tracker_with(&["Stress", "Anxiety", "Anxiety"]);
        assert_eq!(tracker.dominant_state(), "Anxiety");
    }

    #[test]
    fn test_duration_label_formats_hours() {
        let mut tracker = EmotionTracker::new();
        let start = Local::now();
        assert_eq!(tracker.duration_label(start), "0m");

        tracker.start(start);
        assert_eq!(tracker.duration_label(start + Duration::minutes(42)), "42m");
        assert_eq!(tracker.duration_label(start + Duration::minutes(135)), "2h 15m");
    }

    #[test]
    fn test_hydrate_skips_stateless_entries_and_defaults_risk() {
        let mut tracker = EmotionTracker::new();
        let now = Local::now();
        tracker.hydrate(
            vec![
                (Some("Sadness".to_string()), None, None),
                (None, Some(RiskLevel::High), None),
                (Some("Stress".to_string()), Some(RiskLevel::Medium), None),
            ],
            now,
        );
        assert_eq!(tracker.history().len(), 2);
        assert_eq!(tracker.history()[0].risk, RiskLevel::Low);
        assert_eq!(tracker.current(), ("Stress", RiskLevel::Medium));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut tracker = tracker_with(&["Anxiety"]);
        tracker.reset();
        assert!(tracker.history().is_empty());
        assert_eq!(tracker.duration_label(Local::now()), "0m");
    }
}
