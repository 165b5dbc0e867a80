use rand::rngs::SmallRng;

use crate::config::{ParticleSettings, VisualiserConfig};
use crate::geometry::Rect;
use crate::particles::{FloorBehavior, Particle, ParticlePhysics, ParticleSimulation, SpawnRule};

use super::FrameContext;

/// Particle simulation plus the draw-time snapshot, shared by the
/// particle-driven styles.
#[derive(Debug)]
pub(crate) struct Emitter {
    settings: ParticleSettings,
    seed: Option<u64>,
    /// Multiplier applied to the configured gravity; negative rises.
    gravity_scale: f32,
    floor: FloorBehavior,
    simulation: Option<ParticleSimulation>,
    snapshot: Vec<Particle>,
}

impl Emitter {
    pub(crate) fn new(gravity_scale: f32, floor: FloorBehavior) -> Self {
        Self {
            settings: ParticleSettings::default(),
            seed: None,
            gravity_scale,
            floor,
            simulation: None,
            snapshot: Vec::new(),
        }
    }

    fn physics(&self) -> ParticlePhysics {
        let mut physics = ParticlePhysics::from_settings(&self.settings);
        physics.gravity *= self.gravity_scale;
        physics.floor = self.floor;
        physics
    }

    /// Allocates the particle buffer for `config`, dropping live particles.
    pub(crate) fn initialize(&mut self, config: &VisualiserConfig) {
        self.settings = config.particles;
        self.seed = config.style.seed;
        self.simulation = Some(ParticleSimulation::new(
            &self.settings,
            self.physics(),
            self.seed,
        ));
    }

    /// Picks up new physics constants and capacity limits without dropping
    /// live particles, unless the seed changed.
    pub(crate) fn configure(&mut self, config: &VisualiserConfig) {
        let reseed = self.seed != config.style.seed;
        let resized = capacity_changed(&self.settings, &config.particles);
        self.settings = config.particles;
        self.seed = config.style.seed;
        let physics = self.physics();
        if reseed && self.simulation.is_some() {
            self.initialize(config);
        } else if let Some(simulation) = self.simulation.as_mut() {
            if resized {
                simulation.set_capacity(&self.settings);
            }
            simulation.set_physics(physics);
        }
    }

    /// Integrates live particles, rolls spawns for this frame's spectrum and
    /// refreshes the snapshot used for bounds and drawing.
    pub(crate) fn step<F>(&mut self, ctx: &FrameContext<'_>, emit: F)
    where
        F: FnMut(usize, f32, &mut SmallRng) -> Particle,
    {
        let physics = self.physics();
        let simulation = self
            .simulation
            .get_or_insert_with(|| ParticleSimulation::new(&self.settings, physics, self.seed));

        simulation.update(ctx.delta, ctx.viewport);
        let rule = SpawnRule::from_tunables(ctx.tunables, ctx.profile.effect_density);
        simulation.spawn_from_spectrum(ctx.spectrum, &rule, emit);
        simulation.snapshot_into(&mut self.snapshot);
    }

    pub(crate) fn particles(&self) -> &[Particle] {
        &self.snapshot
    }

    /// Union of every particle's extent, `None` with no live particles.
    pub(crate) fn bounds(&self, extent: impl Fn(&Particle) -> Rect) -> Option<Rect> {
        self.snapshot
            .iter()
            .map(extent)
            .reduce(|a, b| a.union(&b))
    }

    pub(crate) fn shutdown(&mut self) {
        self.simulation = None;
        self.snapshot = Vec::new();
    }

    #[cfg(test)]
    pub(crate) fn simulation(&self) -> Option<&ParticleSimulation> {
        self.simulation.as_ref()
    }
}

fn capacity_changed(old: &ParticleSettings, new: &ParticleSettings) -> bool {
    old.initial_capacity != new.initial_capacity
        || old.max_capacity != new.max_capacity
        || old.grow_increment != new.grow_increment
}
