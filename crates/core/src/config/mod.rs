use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{QualityLevel, Result, VisualiserError};

/// Top-level configuration consumed by every renderer.
///
/// Changing any field takes effect on the next `configure()` call; nothing
/// requires the renderer to be rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualiserConfig {
    /// Faster smoothing response while drawn as an overlay.
    pub overlay: bool,
    pub quality: QualityLevel,
    pub spectrum: SpectrumSettings,
    pub clock: ClockSettings,
    pub pool: PoolSettings,
    pub particles: ParticleSettings,
    pub style: StyleTunables,
}

impl Default for VisualiserConfig {
    fn default() -> Self {
        Self {
            overlay: false,
            quality: QualityLevel::Medium,
            spectrum: SpectrumSettings::default(),
            clock: ClockSettings::default(),
            pool: PoolSettings::default(),
            particles: ParticleSettings::default(),
            style: StyleTunables::default(),
        }
    }
}

impl VisualiserConfig {
    /// Parses a JSON document. Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects values that would make the pipeline math meaningless.
    pub fn validate(&self) -> Result<()> {
        self.spectrum.validate()?;
        self.clock.validate()?;
        self.particles.validate()?;
        self.style.validate()
    }
}

/// Shared smoothing and clamping policy applied by the spectrum processor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumSettings {
    pub smoothing: f32,
    pub overlay_smoothing: f32,
    pub min_value: f32,
    pub max_value: f32,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            smoothing: 0.3,
            overlay_smoothing: 0.5,
            min_value: 0.0,
            max_value: 1.5,
        }
    }
}

impl SpectrumSettings {
    /// Smoothing factor in effect for the given overlay state.
    pub fn factor(&self, overlay: bool) -> f32 {
        if overlay {
            self.overlay_smoothing
        } else {
            self.smoothing
        }
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.smoothing) || !in_unit(self.overlay_smoothing) {
            return Err(VisualiserError::invalid(
                "smoothing factors must lie within [0, 1]",
            ));
        }
        if !(self.min_value.is_finite() && self.max_value.is_finite())
            || self.min_value > self.max_value
        {
            return Err(VisualiserError::invalid(format!(
                "clamp range [{}, {}] is empty",
                self.min_value, self.max_value
            )));
        }
        Ok(())
    }
}

/// Bounds applied to the per-frame delta time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub min_step: f32,
    pub max_step: f32,
    /// Delta reported on the very first tick, before any elapsed time exists.
    pub nominal_step: f32,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            min_step: 0.001,
            max_step: 0.1,
            nominal_step: 1.0 / 60.0,
        }
    }
}

impl ClockSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_step > 0.0 && self.min_step <= self.max_step) {
            return Err(VisualiserError::invalid(
                "clock steps must satisfy 0 < min_step <= max_step",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub paint_capacity: usize,
    pub path_capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            paint_capacity: 8,
            path_capacity: 8,
        }
    }
}

/// Capacity policy and physics constants for particle-based styles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub initial_capacity: usize,
    pub max_capacity: usize,
    pub grow_increment: usize,
    /// Downward acceleration in pixels per second squared.
    pub gravity: f32,
    /// Velocity multiplier per 1/60 s; 1.0 disables damping.
    pub air_resistance: f32,
    /// Lifetime lost per second, lifetime being normalised to 0..1.
    pub lifetime_decay: f32,
    pub jitter_probability: f32,
    pub jitter_strength: f32,
    /// Fraction of vertical speed kept after hitting the floor.
    pub rebound: f32,
    pub min_bounce_speed: f32,
    /// Distance outside the visible area before a particle is culled.
    pub margin: f32,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            max_capacity: 2048,
            grow_increment: 128,
            gravity: 400.0,
            air_resistance: 0.98,
            lifetime_decay: 0.6,
            jitter_probability: 0.05,
            jitter_strength: 30.0,
            rebound: 0.45,
            min_bounce_speed: 12.0,
            margin: 50.0,
        }
    }
}

impl ParticleSettings {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity > self.max_capacity {
            return Err(VisualiserError::invalid(
                "particle initial_capacity exceeds max_capacity",
            ));
        }
        if !(0.0..=1.0).contains(&self.air_resistance) || !(0.0..=1.0).contains(&self.rebound) {
            return Err(VisualiserError::invalid(
                "air_resistance and rebound must lie within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_probability) {
            return Err(VisualiserError::invalid(
                "jitter_probability must lie within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Flat option set of per-style knobs. Styles read the fields they need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleTunables {
    /// Radians per second at silence.
    pub rotation_speed: f32,
    pub max_rotation_speed: f32,
    /// Radius as a fraction of the smaller canvas side.
    pub radius_proportion: f32,
    pub amplitude_scale: f32,
    pub spawn_threshold: f32,
    pub spawn_probability: f32,
    pub max_intensity_multiplier: f32,
    /// Fixed RNG seed for reproducible particle and glitch output.
    pub seed: Option<u64>,
}

impl Default for StyleTunables {
    fn default() -> Self {
        Self {
            rotation_speed: 0.6,
            max_rotation_speed: 4.0,
            radius_proportion: 0.3,
            amplitude_scale: 1.0,
            spawn_threshold: 0.3,
            spawn_probability: 0.4,
            max_intensity_multiplier: 2.0,
            seed: None,
        }
    }
}

impl StyleTunables {
    pub fn validate(&self) -> Result<()> {
        if self.spawn_threshold < 0.0 {
            return Err(VisualiserError::invalid("spawn_threshold must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.spawn_probability) {
            return Err(VisualiserError::invalid(
                "spawn_probability must lie within [0, 1]",
            ));
        }
        if self.max_rotation_speed < 0.0 || self.radius_proportion <= 0.0 {
            return Err(VisualiserError::invalid(
                "rotation and radius tunables must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            VisualiserConfig::from_json_str(r#"{ "overlay": true, "quality": "High" }"#).unwrap();

        assert!(config.overlay);
        assert_eq!(config.quality, QualityLevel::High);
        assert_eq!(config.spectrum, SpectrumSettings::default());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = VisualiserConfig::default();
        config.style.seed = Some(7);
        let json = config.to_json_string().unwrap();

        assert_eq!(VisualiserConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_inverted_clamp_range() {
        let json = r#"{ "spectrum": { "min_value": 2.0, "max_value": 1.0 } }"#;
        let err = VisualiserConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidInput(_)));
    }

    #[test]
    fn overlay_selects_faster_smoothing() {
        let settings = SpectrumSettings::default();
        assert!(settings.factor(true) > settings.factor(false));
    }
}
