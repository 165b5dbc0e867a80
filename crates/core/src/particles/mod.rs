//! Shared particle simulation used by the fire, raindrop and text styles.
//!
//! Particles live in a dense prefix of a preallocated slot buffer. Spawning
//! appends, updating integrates and compacts survivors in place, so a steady
//! state frame performs no allocation at all. Both paths take the same lock.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::{ParticleSettings, StyleTunables};
use crate::geometry::{Point, Rect};
use crate::VisualiserError;

/// Velocity damping is expressed per frame at this rate.
const REFERENCE_FPS: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Point,
    /// Depth for styles that fake perspective; zero elsewhere.
    pub z: f32,
    pub velocity: Point,
    /// Remaining lifetime, 1.0 at spawn and expired at or below 0.0.
    pub life: f32,
    pub size: f32,
    /// Spectrum intensity that caused the spawn, for colouring.
    pub intensity: f32,
    pub active: bool,
    pub splash: bool,
    pub glyph: Option<char>,
}

impl Particle {
    pub fn new(position: Point, velocity: Point, size: f32) -> Self {
        Self {
            position,
            z: 0.0,
            velocity,
            life: 1.0,
            size,
            intensity: 0.0,
            active: true,
            splash: false,
            glyph: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.life.clamp(0.0, 1.0)
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            active: false,
            ..Self::new(Point::default(), Point::default(), 0.0)
        }
    }
}

/// What happens when a particle reaches the bottom of the update area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorBehavior {
    /// Keep falling until the culling margin removes it.
    PassThrough,
    /// Turn into a splash droplet that rebounds and settles.
    Splash,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticlePhysics {
    pub gravity: f32,
    pub air_resistance: f32,
    pub lifetime_decay: f32,
    pub jitter_probability: f32,
    pub jitter_strength: f32,
    pub rebound: f32,
    pub min_bounce_speed: f32,
    pub margin: f32,
    pub floor: FloorBehavior,
}

impl ParticlePhysics {
    pub fn from_settings(settings: &ParticleSettings) -> Self {
        Self {
            gravity: settings.gravity,
            air_resistance: settings.air_resistance,
            lifetime_decay: settings.lifetime_decay,
            jitter_probability: settings.jitter_probability,
            jitter_strength: settings.jitter_strength,
            rebound: settings.rebound,
            min_bounce_speed: settings.min_bounce_speed,
            margin: settings.margin,
            floor: FloorBehavior::PassThrough,
        }
    }
}

/// Converts a bucket intensity into a spawn probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRule {
    pub threshold: f32,
    pub max_intensity_multiplier: f32,
    pub base_probability: f32,
}

impl SpawnRule {
    pub fn from_tunables(tunables: &StyleTunables, density: f32) -> Self {
        Self {
            threshold: tunables.spawn_threshold,
            max_intensity_multiplier: tunables.max_intensity_multiplier,
            base_probability: tunables.spawn_probability * density,
        }
    }

    /// `min(intensity / threshold, max_multiplier) * base`, clamped to
    /// [0, 1]; zero at or below the threshold.
    pub fn probability(&self, intensity: f32) -> f32 {
        if !(intensity > self.threshold) {
            return 0.0;
        }
        let ratio = if self.threshold > 0.0 {
            intensity / self.threshold
        } else {
            self.max_intensity_multiplier
        };
        (ratio.min(self.max_intensity_multiplier) * self.base_probability).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub survivors: usize,
    pub expired: usize,
}

struct ParticleBuffer {
    slots: Vec<Particle>,
    len: usize,
    max_capacity: usize,
    grow_increment: usize,
    rng: SmallRng,
    dropped: u64,
}

impl ParticleBuffer {
    /// Makes room for one more particle, growing by the configured increment
    /// when full. Returns false once the hard cap is reached.
    fn reserve_one(&mut self) -> bool {
        if self.len < self.slots.len() {
            return true;
        }
        if self.slots.len() >= self.max_capacity {
            self.dropped += 1;
            return false;
        }

        let grown = (self.slots.len() + self.grow_increment.max(1)).min(self.max_capacity);
        debug!(from = self.slots.len(), to = grown, "growing particle buffer");
        self.slots.resize(grown, Particle::default());
        true
    }

    fn push(&mut self, mut particle: Particle) -> bool {
        if !self.reserve_one() {
            return false;
        }
        particle.active = true;
        self.slots[self.len] = particle;
        self.len += 1;
        true
    }
}

/// Lock-guarded particle buffer plus the physics that advances it.
pub struct ParticleSimulation {
    physics: ParticlePhysics,
    buffer: Mutex<ParticleBuffer>,
}

impl ParticleSimulation {
    pub fn new(settings: &ParticleSettings, physics: ParticlePhysics, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let initial = settings.initial_capacity.min(settings.max_capacity);
        Self {
            physics,
            buffer: Mutex::new(ParticleBuffer {
                slots: vec![Particle::default(); initial],
                len: 0,
                max_capacity: settings.max_capacity,
                grow_increment: settings.grow_increment,
                rng,
                dropped: 0,
            }),
        }
    }

    pub fn physics(&self) -> &ParticlePhysics {
        &self.physics
    }

    pub fn set_physics(&mut self, physics: ParticlePhysics) {
        self.physics = physics;
    }

    /// Adds one particle. Dropped silently when the buffer is at its cap.
    pub fn spawn(&self, particle: Particle) -> bool {
        self.lock().push(particle)
    }

    /// Rolls a spawn for every bucket of `spectrum`, calling `emit` to build
    /// each particle that passes. Returns how many were added.
    pub fn spawn_from_spectrum<F>(&self, spectrum: &[f32], rule: &SpawnRule, mut emit: F) -> usize
    where
        F: FnMut(usize, f32, &mut SmallRng) -> Particle,
    {
        let mut buffer = self.lock();
        let mut spawned = 0;

        for (bucket, &intensity) in spectrum.iter().enumerate() {
            let probability = rule.probability(intensity);
            if probability <= 0.0 || !buffer.rng.random_bool(f64::from(probability)) {
                continue;
            }

            let mut particle = emit(bucket, intensity, &mut buffer.rng);
            particle.intensity = intensity;
            if buffer.push(particle) {
                spawned += 1;
            }
        }

        spawned
    }

    /// Integrates every live particle by `delta` seconds and compacts the
    /// survivors. `area` is the visible region; its bottom edge is the floor.
    pub fn update(&self, delta: f32, area: Rect) -> UpdateStats {
        let physics = self.physics;
        let mut guard = self.lock();
        let ParticleBuffer {
            slots, len, rng, ..
        } = &mut *guard;

        let damping = physics.air_resistance.powf(delta * REFERENCE_FPS);
        let bounds = area.inflate(physics.margin);
        let floor = area.bottom;
        let mut write = 0;

        for read in 0..*len {
            let particle = &mut slots[read];
            integrate(particle, &physics, delta, damping, floor, rng);

            if particle.life > 0.0 && bounds.contains(particle.position) {
                slots.swap(write, read);
                write += 1;
            } else {
                particle.active = false;
            }
        }

        let expired = *len - write;
        *len = write;
        UpdateStats {
            survivors: write,
            expired,
        }
    }

    /// Copies live particles into `out`, reusing its allocation, so drawing
    /// happens without holding the lock.
    pub fn snapshot_into(&self, out: &mut Vec<Particle>) {
        let buffer = self.lock();
        out.clear();
        out.extend_from_slice(&buffer.slots[..buffer.len]);
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current slot capacity, which grows towards the configured maximum.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Spawn attempts rejected because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Applies new capacity limits to the live buffer. Particles above a
    /// lowered cap are discarded, newest first.
    pub fn set_capacity(&self, settings: &ParticleSettings) {
        let mut buffer = self.lock();
        let max = settings.max_capacity;
        let discarded = buffer.len.saturating_sub(max);
        buffer.len -= discarded;
        buffer.max_capacity = max;
        buffer.grow_increment = settings.grow_increment;

        let slots = buffer
            .slots
            .len()
            .max(settings.initial_capacity)
            .min(max);
        buffer.slots.resize(slots, Particle::default());
        debug!(slots, max, discarded, "particle capacity reconfigured");
    }

    pub fn clear(&self) {
        let mut buffer = self.lock();
        let live = buffer.len;
        for particle in &mut buffer.slots[..live] {
            particle.active = false;
        }
        buffer.len = 0;
    }

    fn lock(&self) -> MutexGuard<'_, ParticleBuffer> {
        self.buffer.lock().unwrap_or_else(|poisoned| {
            let error = VisualiserError::processing("particle buffer poisoned");
            warn!(%error, "continuing with last particle state");
            poisoned.into_inner()
        })
    }
}

impl fmt::Debug for ParticleSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSimulation")
            .field("physics", &self.physics)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

fn integrate(
    particle: &mut Particle,
    physics: &ParticlePhysics,
    delta: f32,
    damping: f32,
    floor: f32,
    rng: &mut SmallRng,
) {
    // A splash that has stopped bouncing rests on the floor for good.
    let resting = physics.floor == FloorBehavior::Splash
        && particle.splash
        && particle.velocity.y == 0.0
        && particle.position.y >= floor;
    if !resting {
        particle.velocity.y += physics.gravity * delta;
    }
    particle.velocity.x *= damping;
    particle.velocity.y *= damping;

    if physics.jitter_probability > 0.0 && rng.random::<f32>() < physics.jitter_probability {
        particle.velocity.x += rng.random_range(-1.0..1.0) * physics.jitter_strength;
    }

    particle.position.x += particle.velocity.x * delta;
    particle.position.y += particle.velocity.y * delta;
    particle.life -= physics.lifetime_decay * delta;

    if physics.floor == FloorBehavior::Splash
        && !resting
        && particle.position.y >= floor
        && particle.velocity.y >= 0.0
    {
        if !particle.splash {
            particle.splash = true;
            particle.size *= 0.5;
        }
        particle.position.y = floor;
        particle.velocity.y = -particle.velocity.y * physics.rebound;
        if particle.velocity.y.abs() < physics.min_bounce_speed {
            particle.velocity = Point::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(initial: usize, max: usize) -> ParticleSettings {
        ParticleSettings {
            initial_capacity: initial,
            max_capacity: max,
            grow_increment: 4,
            ..ParticleSettings::default()
        }
    }

    fn still_physics(lifetime_decay: f32) -> ParticlePhysics {
        ParticlePhysics {
            gravity: 0.0,
            air_resistance: 1.0,
            lifetime_decay,
            jitter_probability: 0.0,
            jitter_strength: 0.0,
            rebound: 0.5,
            min_bounce_speed: 5.0,
            margin: 10.0,
            floor: FloorBehavior::PassThrough,
        }
    }

    fn area() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    fn rule(threshold: f32, probability: f32) -> SpawnRule {
        SpawnRule {
            threshold,
            max_intensity_multiplier: 2.0,
            base_probability: probability,
        }
    }

    #[test]
    fn lifetime_decreases_until_removed_exactly_once() {
        let sim = ParticleSimulation::new(&settings(4, 4), still_physics(0.25), Some(1));
        sim.spawn(Particle::new(Point::new(50.0, 50.0), Point::default(), 2.0));

        let mut observed = Vec::new();
        let mut snapshot = Vec::new();
        let mut removed_at = None;

        for tick in 0..60 {
            sim.update(0.1, area());
            sim.snapshot_into(&mut snapshot);
            match snapshot.first() {
                Some(p) => {
                    assert!(removed_at.is_none(), "particle reappeared at tick {tick}");
                    observed.push(p.life);
                }
                None if removed_at.is_none() => removed_at = Some(tick),
                None => {}
            }
        }

        assert!(observed.windows(2).all(|w| w[1] < w[0]));
        assert!(observed.iter().all(|life| *life > 0.0));
        assert!(removed_at.is_some());
        assert!(*observed.last().unwrap() - 0.025 <= 1e-5);
    }

    #[test]
    fn scenario_spawn_only_above_threshold() {
        let sim = ParticleSimulation::new(&settings(16, 16), still_physics(0.1), Some(3));
        let spawned = sim.spawn_from_spectrum(&[0.9, 0.3], &rule(0.5, 1.0), |bucket, _, _| {
            Particle::new(Point::new(bucket as f32 * 10.0, 10.0), Point::default(), 1.0)
        });

        assert_eq!(spawned, 1);
        let mut snapshot = Vec::new();
        sim.snapshot_into(&mut snapshot);
        assert_eq!(snapshot[0].position.x, 0.0);
        assert_eq!(snapshot[0].intensity, 0.9);
    }

    #[test]
    fn spawn_probability_is_capped() {
        let rule = SpawnRule {
            threshold: 0.2,
            max_intensity_multiplier: 1.5,
            base_probability: 0.4,
        };
        assert_eq!(rule.probability(0.2), 0.0);
        assert!((rule.probability(0.3) - 0.6).abs() < 1e-6);
        assert!((rule.probability(10.0) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn buffer_grows_by_increment_then_drops() {
        let sim = ParticleSimulation::new(&settings(2, 7), still_physics(0.0), Some(5));
        let accepted = (0..10)
            .filter(|_| sim.spawn(Particle::new(Point::new(1.0, 1.0), Point::default(), 1.0)))
            .count();

        assert_eq!(accepted, 7);
        assert_eq!(sim.capacity(), 7);
        assert_eq!(sim.dropped(), 3);
    }

    #[test]
    fn compaction_keeps_survivors_dense() {
        let sim = ParticleSimulation::new(&settings(8, 8), still_physics(0.0), Some(9));
        for x in [10.0, 500.0, 20.0, -300.0, 30.0] {
            sim.spawn(Particle::new(Point::new(x, 50.0), Point::default(), 1.0));
        }

        let stats = sim.update(0.016, area());
        assert_eq!(stats, UpdateStats { survivors: 3, expired: 2 });

        let mut snapshot = Vec::new();
        sim.snapshot_into(&mut snapshot);
        let xs: Vec<f32> = snapshot.iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![10.0, 20.0, 30.0]);
        assert!(snapshot.iter().all(|p| p.active));
    }

    #[test]
    fn splash_particles_bounce_then_settle() {
        let mut physics = still_physics(0.0);
        physics.gravity = 500.0;
        physics.floor = FloorBehavior::Splash;
        let sim = ParticleSimulation::new(&settings(1, 1), physics, Some(2));
        sim.spawn(Particle::new(Point::new(50.0, 95.0), Point::new(0.0, 200.0), 4.0));

        let mut snapshot = Vec::new();
        sim.update(0.05, area());
        sim.snapshot_into(&mut snapshot);
        let first = snapshot[0];
        assert!(first.splash);
        assert_eq!(first.size, 2.0);
        assert!(first.velocity.y < 0.0);

        for _ in 0..200 {
            sim.update(0.02, area());
        }
        sim.snapshot_into(&mut snapshot);
        let settled = snapshot[0];
        assert_eq!(settled.position.y, 100.0);
        assert_eq!(settled.velocity.y, 0.0);
    }

    #[test]
    fn splashes_stay_at_rest_at_the_largest_step() {
        let mut physics = ParticlePhysics::from_settings(&ParticleSettings::default());
        physics.floor = FloorBehavior::Splash;
        physics.lifetime_decay = 0.0;
        physics.jitter_probability = 0.0;
        let sim = ParticleSimulation::new(&settings(1, 1), physics, Some(4));
        sim.spawn(Particle::new(Point::new(50.0, 95.0), Point::new(0.0, 200.0), 4.0));

        let mut snapshot = Vec::new();
        let mut tail = Vec::new();
        for tick in 0..200 {
            sim.update(0.1, area());
            if tick >= 100 {
                sim.snapshot_into(&mut snapshot);
                tail.push((snapshot[0].position.y, snapshot[0].velocity.y));
            }
        }

        assert!(tail.iter().all(|&(y, vy)| y == 100.0 && vy == 0.0), "{tail:?}");
    }

    #[test]
    fn lowering_the_cap_trims_a_live_buffer() {
        let sim = ParticleSimulation::new(&settings(8, 16), still_physics(0.0), Some(6));
        for x in 0..10 {
            sim.spawn(Particle::new(Point::new(x as f32, 1.0), Point::default(), 1.0));
        }
        assert_eq!(sim.capacity(), 12);

        sim.set_capacity(&settings(2, 4));
        assert_eq!(sim.capacity(), 4);
        assert_eq!(sim.len(), 4);
        assert!(!sim.spawn(Particle::new(Point::new(1.0, 1.0), Point::default(), 1.0)));

        let mut snapshot = Vec::new();
        sim.snapshot_into(&mut snapshot);
        let xs: Vec<f32> = snapshot.iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);

        sim.set_capacity(&settings(6, 32));
        assert_eq!(sim.capacity(), 6);
        assert_eq!(sim.len(), 4);
    }

    #[test]
    fn spawns_and_updates_from_several_threads() {
        let sim = ParticleSimulation::new(&settings(8, 64), still_physics(0.0), Some(8));

        std::thread::scope(|scope| {
            for worker in 0..3 {
                let sim = &sim;
                scope.spawn(move || {
                    for i in 0..16 {
                        let x = worker as f32 * 20.0 + i as f32;
                        sim.spawn(Particle::new(Point::new(x, 50.0), Point::default(), 1.0));
                    }
                });
            }
            scope.spawn(|| {
                sim.spawn_from_spectrum(&[0.9; 16], &rule(0.5, 1.0), |bucket, _, _| {
                    Particle::new(Point::new(bucket as f32 * 5.0, 20.0), Point::default(), 1.0)
                })
            });
            scope.spawn(|| {
                for _ in 0..32 {
                    sim.update(0.01, area());
                }
            });
        });

        assert_eq!(sim.len(), 64);
        assert_eq!(sim.capacity(), 64);
        assert_eq!(sim.dropped(), 0);

        let mut snapshot = Vec::new();
        sim.snapshot_into(&mut snapshot);
        assert!(snapshot.iter().all(|p| p.active && p.life == 1.0));
        assert_eq!(snapshot.iter().filter(|p| p.position.y == 20.0).count(), 16);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let sim = ParticleSimulation::new(&settings(4, 4), still_physics(0.1), None);
        sim.spawn(Particle::new(Point::new(1.0, 1.0), Point::default(), 1.0));
        sim.clear();
        assert!(sim.is_empty());
    }
}
