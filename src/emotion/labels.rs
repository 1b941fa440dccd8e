//! State and risk labels with their display colours.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// State assumed before the backend reports anything.
pub const DEFAULT_STATE: &str = "Normal";

/// Risk level attached to a backend reply.
///
/// Unknown labels deserialize as `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl From<String> for RiskLevel {
    fn from(label: String) -> Self {
        RiskLevel::from(label.as_str())
    }
}

impl From<&str> for RiskLevel {
    fn from(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "medium" => RiskLevel::Medium,
            "low" => RiskLevel::Low,
            other => {
                tracing::debug!("Unknown risk level '{}', treating as Low", other);
                RiskLevel::Low
            }
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.as_str().to_string()
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display colour for an emotional-state label; unknown states use Normal's.
pub fn state_color(state: &str) -> Color {
    match state {
        "Sadness" => Color::Rgb(0x60, 0xa5, 0xfa),
        "Anxiety" => Color::Rgb(0xfb, 0xbf, 0x24),
        "Stress" => Color::Rgb(0xfb, 0x92, 0x3c),
        "Depression" => Color::Rgb(0xa7, 0x8b, 0xfa),
        "Bipolar" => Color::Rgb(0xec, 0x48, 0x99),
        "ADHD" => Color::Rgb(0x22, 0xd3, 0xee),
        _ => Color::Rgb(0x4a, 0xde, 0x80),
    }
}

pub fn risk_color(risk: RiskLevel) -> Color {
    match risk {
        RiskLevel::Low => Color::Rgb(0x4a, 0xde, 0x80),
        RiskLevel::Medium => Color::Rgb(0xfb, 0x92, 0x3c),
        RiskLevel::High => Color::Rgb(0xef, 0x44, 0x44),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parses_known_and_unknown_labels() {
        assert_eq!(RiskLevel::from("High"), RiskLevel::High);
        assert_eq!(RiskLevel::from("medium"), RiskLevel::Medium);
        assert_eq!(RiskLevel::from("Critical"), RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_json_round_trip_uses_labels() {
        let parsed: RiskLevel = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(parsed, RiskLevel::Medium);
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"High\"");
    }

    #[test]
    fn test_unknown_state_uses_normal_color() {
        assert_eq!(state_color("Curious"), state_color(DEFAULT_STATE));
        assert_ne!(state_color("Anxiety"), state_color(DEFAULT_STATE));
    }
}
