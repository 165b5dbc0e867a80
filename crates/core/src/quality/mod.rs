use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VisualiserError;

/// Discrete fidelity setting chosen by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLevel {
    Low,
    Medium,
    High,
}

impl QualityLevel {
    pub const fn all() -> [Self; 3] {
        [Self::Low, Self::Medium, Self::High]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityLevel {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "fast" => Ok(Self::Low),
            "medium" | "balanced" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(VisualiserError::invalid(format!(
                "unknown quality level `{other}`"
            ))),
        }
    }
}

/// Bitmap filtering applied by the graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterLevel {
    None,
    Low,
    Medium,
    High,
}

/// Bundle of fidelity toggles shared by every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub antialias: bool,
    pub filter: FilterLevel,
    pub advanced_effects: bool,
    /// Points per curve, samples per ring, segments per meter.
    pub point_count: usize,
    pub blur_radius: f32,
    /// Multiplier on particle spawn and glitch frequency.
    pub effect_density: f32,
}

impl QualityProfile {
    pub const fn for_level(level: QualityLevel) -> Self {
        match level {
            QualityLevel::Low => Self {
                antialias: false,
                filter: FilterLevel::None,
                advanced_effects: false,
                point_count: 32,
                blur_radius: 0.0,
                effect_density: 0.5,
            },
            QualityLevel::Medium => Self {
                antialias: true,
                filter: FilterLevel::Low,
                advanced_effects: true,
                point_count: 64,
                blur_radius: 2.0,
                effect_density: 0.75,
            },
            QualityLevel::High => Self {
                antialias: true,
                filter: FilterLevel::High,
                advanced_effects: true,
                point_count: 128,
                blur_radius: 4.0,
                effect_density: 1.0,
            },
        }
    }
}

/// Outcome of [`QualityPolicy::apply`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityChange {
    pub profile: QualityProfile,
    /// True when quality-dependent caches must be rebuilt.
    pub changed: bool,
}

/// Tracks the active quality level and a generation number that bumps on
/// every effective change, so caches can tell whether they are stale.
#[derive(Debug, Clone)]
pub struct QualityPolicy {
    level: Option<QualityLevel>,
    profile: QualityProfile,
    generation: u64,
}

impl QualityPolicy {
    pub fn new() -> Self {
        Self {
            level: None,
            profile: QualityProfile::for_level(QualityLevel::Medium),
            generation: 0,
        }
    }

    /// Switches to `level`. Applying the active level again is a no-op.
    pub fn apply(&mut self, level: QualityLevel) -> QualityChange {
        if self.level == Some(level) {
            return QualityChange {
                profile: self.profile,
                changed: false,
            };
        }

        self.level = Some(level);
        self.profile = QualityProfile::for_level(level);
        self.generation += 1;
        QualityChange {
            profile: self.profile,
            changed: true,
        }
    }

    pub fn level(&self) -> Option<QualityLevel> {
        self.level
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forces the next `apply` to report a change.
    pub fn invalidate(&mut self) {
        self.level = None;
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_same_level_twice_is_idempotent() {
        let mut policy = QualityPolicy::new();
        let first = policy.apply(QualityLevel::High);
        let second = policy.apply(QualityLevel::High);

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.profile, second.profile);
        assert_eq!(policy.generation(), 1);
    }

    #[test]
    fn switching_levels_bumps_generation() {
        let mut policy = QualityPolicy::new();
        policy.apply(QualityLevel::Low);
        let change = policy.apply(QualityLevel::High);

        assert!(change.changed);
        assert_eq!(policy.generation(), 2);
        assert!(change.profile.antialias);
    }

    #[test]
    fn profiles_scale_with_level() {
        let low = QualityProfile::for_level(QualityLevel::Low);
        let high = QualityProfile::for_level(QualityLevel::High);

        assert!(!low.antialias);
        assert!(!low.advanced_effects);
        assert!(low.point_count < high.point_count);
        assert!(low.blur_radius < high.blur_radius);
    }

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!("HIGH".parse::<QualityLevel>().unwrap(), QualityLevel::High);
        assert_eq!("balanced".parse::<QualityLevel>().unwrap(), QualityLevel::Medium);
        assert!("ultra".parse::<QualityLevel>().is_err());
    }

    #[test]
    fn invalidate_forces_a_rebuild() {
        let mut policy = QualityPolicy::new();
        policy.apply(QualityLevel::Medium);
        policy.invalidate();
        assert!(policy.apply(QualityLevel::Medium).changed);
    }
}
