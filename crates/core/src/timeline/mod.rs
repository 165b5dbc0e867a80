use std::f32::consts::TAU;
use std::time::Instant;

use crate::config::ClockSettings;

/// Frame clock that turns wall time into a bounded simulation step.
///
/// Deltas are clamped to `[min_step, max_step]` so a stalled window does not
/// launch particles across the screen and a zero-length frame never divides
/// by zero.
#[derive(Debug, Clone)]
pub struct AnimationClock {
    settings: ClockSettings,
    last_tick: Option<Instant>,
    time_seconds: f32,
}

impl AnimationClock {
    pub fn new(settings: ClockSettings) -> Self {
        Self {
            settings,
            last_tick: None,
            time_seconds: 0.0,
        }
    }

    pub fn configure(&mut self, settings: ClockSettings) {
        self.settings = settings;
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
        self.time_seconds = 0.0;
    }

    /// Advances using the current wall time.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Advances to `now` and returns the clamped delta in seconds.
    ///
    /// Timestamps earlier than the previous tick count as a zero-length frame.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let raw = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => self.settings.nominal_step,
        };
        self.last_tick = Some(now);

        let delta = self.clamp_step(raw);
        self.time_seconds += delta;
        delta
    }

    /// Accumulated simulated time; the sum of every clamped delta.
    pub fn time_seconds(&self) -> f32 {
        self.time_seconds
    }

    fn clamp_step(&self, raw: f32) -> f32 {
        let ClockSettings {
            min_step, max_step, ..
        } = self.settings;
        if raw.is_finite() {
            raw.max(min_step).min(max_step)
        } else {
            min_step
        }
    }
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new(ClockSettings::default())
    }
}

/// Angle accumulator kept in `[0, 2π)`, optionally sped up by loudness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    angle: f32,
    pub speed: f32,
    pub max_speed: f32,
    /// Extra radians per second per unit of average intensity.
    pub intensity_gain: f32,
}

impl Rotation {
    pub fn new(speed: f32, max_speed: f32, intensity_gain: f32) -> Self {
        Self {
            angle: 0.0,
            speed,
            max_speed,
            intensity_gain,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Effective angular speed for the given intensity, capped at `max_speed`.
    pub fn speed_for(&self, intensity: f32) -> f32 {
        let boosted = self.speed + self.intensity_gain * intensity.max(0.0);
        boosted.min(self.max_speed.max(self.speed))
    }

    pub fn advance(&mut self, delta: f32, intensity: f32) -> f32 {
        self.angle = wrap_angle(self.angle + self.speed_for(intensity) * delta);
        self.angle
    }
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
