use rand::Rng;

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::particles::{FloorBehavior, Particle};
use crate::quality::QualityChange;

use super::emitter::Emitter;
use super::{BarLayout, Canvas, Color, DrawResources, DrawStrategy, FrameContext, StyleKind};

/// Flames rise instead of falling.
const BUOYANCY: f32 = -0.2;
const EMBER: Color = Color::rgb(200, 30, 0);
const CORE: Color = Color::rgb(255, 220, 80);

/// Flame tongues spawned along the bottom edge by loud buckets.
#[derive(Debug)]
pub struct FireStyle {
    emitter: Emitter,
}

impl FireStyle {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(BUOYANCY, FloorBehavior::PassThrough),
        }
    }

    fn half_width(particle: &Particle) -> f32 {
        particle.size * 0.5
    }

    /// Flames shrink as they burn out.
    fn height(particle: &Particle) -> f32 {
        particle.size * 2.5 * (0.4 + 0.6 * particle.alpha())
    }

    fn extent(particle: &Particle) -> Rect {
        let Point { x, y } = particle.position;
        let w = Self::half_width(particle);
        Rect::new(x - w, y - Self::height(particle), x + w, y)
    }
}

impl Default for FireStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for FireStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Fire
    }

    fn initialize(&mut self, config: &VisualiserConfig) -> crate::Result<()> {
        self.emitter.initialize(config);
        Ok(())
    }

    fn configure(&mut self, config: &VisualiserConfig, _quality: &QualityChange) {
        self.emitter.configure(config);
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        let layout = BarLayout::for_frame(ctx);
        let bottom = ctx.viewport.bottom;
        let lift = ctx.viewport.height() * 0.8;

        self.emitter.step(ctx, |bucket, intensity, rng| {
            let x = layout.left(bucket) + layout.stride * rng.random::<f32>();
            let velocity = Point::new(rng.random_range(-15.0..15.0), -(60.0 + intensity * lift));
            let size = (layout.stride * 0.6).max(2.0) * (0.6 + intensity.min(1.5) * 0.6);
            Particle::new(Point::new(x, bottom), velocity, size)
        });
    }

    fn bounds(&self, _ctx: &FrameContext<'_>) -> Option<Rect> {
        self.emitter.bounds(Self::extent)
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let mut paint = resources.paint(ctx.base_paint);
        paint.style = super::PaintStyle::Fill;
        if ctx.profile.advanced_effects {
            paint.blur_radius = ctx.profile.blur_radius;
        }
        let mut path = resources.path();

        for particle in self.emitter.particles() {
            if !Self::extent(particle).intersects(&ctx.viewport) {
                continue;
            }
            let Point { x, y } = particle.position;
            let w = Self::half_width(particle);
            let h = Self::height(particle);

            path.reset();
            path.move_to(Point::new(x - w, y))
                .cubic_to(
                    Point::new(x - w, y - h * 0.5),
                    Point::new(x - w * 0.4, y - h * 0.8),
                    Point::new(x, y - h),
                )
                .cubic_to(
                    Point::new(x + w * 0.4, y - h * 0.8),
                    Point::new(x + w, y - h * 0.5),
                    Point::new(x + w, y),
                )
                .close();

            let life = particle.alpha();
            paint.color = EMBER.lerp(CORE, life).with_alpha(life);
            canvas.draw_path(&path, &paint);
        }

        resources.release_path(path);
        resources.release_paint(paint);
    }

    fn shutdown(&mut self) {
        self.emitter.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleTunables;
    use crate::quality::{QualityLevel, QualityProfile};
    use crate::render::{DrawCommand, Paint, RecordingCanvas};

    #[test]
    fn loud_buckets_light_flames_that_rise() {
        let mut config = VisualiserConfig::default();
        config.style.seed = Some(7);
        let profile = QualityProfile::for_level(QualityLevel::High);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let spectrum = [1.0; 16];
        let ctx = FrameContext {
            spectrum: &spectrum,
            intensity: 1.0,
            viewport: Rect::new(0.0, 0.0, 200.0, 200.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = FireStyle::new();
        style.initialize(&config).unwrap();
        style.advance(&ctx);
        assert!(!style.emitter.particles().is_empty());
        let first_y = style.emitter.particles()[0].position.y;
        assert_eq!(first_y, 200.0);

        style.advance(&ctx);
        let risen = style
            .emitter
            .particles()
            .iter()
            .map(|p| p.position.y)
            .fold(f32::MAX, f32::min);
        assert!(risen < first_y);

        let mut resources = DrawResources::new(&config, profile);
        let mut canvas = RecordingCanvas::new(200.0, 200.0);
        style.draw(&ctx, &mut canvas, &mut resources);
        assert!(canvas.count(|c| matches!(c, DrawCommand::Path { .. })) > 0);
        assert!(style.bounds(&ctx).is_some());
    }

    #[test]
    fn quiet_buckets_spawn_nothing() {
        let profile = QualityProfile::for_level(QualityLevel::Medium);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let spectrum = [0.1; 16];
        let ctx = FrameContext {
            spectrum: &spectrum,
            intensity: 0.1,
            viewport: Rect::new(0.0, 0.0, 200.0, 200.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = FireStyle::new();
        for _ in 0..10 {
            style.advance(&ctx);
        }
        assert!(style.bounds(&ctx).is_none());
        style.shutdown();
        assert!(style.emitter.simulation().is_none());
    }

    #[test]
    fn capacity_changes_apply_to_a_running_renderer() {
        use std::time::{Duration, Instant};

        use crate::render::{FrameInput, StyleRenderer, Visualizer};

        let mut config = VisualiserConfig::default();
        config.style.seed = Some(3);
        let mut renderer = StyleRenderer::new(FireStyle::new());
        renderer.configure(&config).unwrap();
        renderer.initialize().unwrap();

        config.particles.initial_capacity = 2;
        config.particles.max_capacity = 4;
        renderer.configure(&config).unwrap();

        let spectrum = [1.0; 32];
        let paint = Paint::default();
        let mut canvas = RecordingCanvas::new(200.0, 200.0);
        let start = Instant::now();
        for frame in 0..10 {
            let input = FrameInput::new(&spectrum, &paint)
                .at(start + Duration::from_millis(16 * frame));
            renderer.render(&mut canvas, &input, None).unwrap();
        }

        let simulation = renderer.strategy.emitter.simulation().unwrap();
        assert_eq!(simulation.capacity(), 4);
        assert!(simulation.len() <= 4);
        assert!(simulation.dropped() > 0);
        renderer.dispose();
    }
}
