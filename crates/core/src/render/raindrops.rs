use rand::Rng;

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::particles::{FloorBehavior, Particle};
use crate::quality::QualityChange;

use super::emitter::Emitter;
use super::{
    BarLayout, Canvas, DrawResources, DrawStrategy, FrameContext, PaintStyle, StyleKind,
};

/// Seconds of motion a falling drop's streak covers.
const STREAK_TIME: f32 = 0.04;

/// Drops released from the top edge that splash on the bottom one.
#[derive(Debug)]
pub struct RaindropsStyle {
    emitter: Emitter,
}

impl RaindropsStyle {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(1.0, FloorBehavior::Splash),
        }
    }

    fn tail(particle: &Particle) -> Point {
        Point::new(
            particle.position.x - particle.velocity.x * STREAK_TIME,
            particle.position.y - particle.velocity.y * STREAK_TIME,
        )
    }

    fn extent(particle: &Particle) -> Rect {
        let head = Rect::around(particle.position, particle.size.max(1.0));
        if particle.splash {
            head
        } else {
            head.union(&Rect::around(Self::tail(particle), 1.0))
        }
    }
}

impl Default for RaindropsStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for RaindropsStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Raindrops
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
        let top = ctx.viewport.top;

        self.emitter.step(ctx, |bucket, intensity, rng| {
            let x = layout.left(bucket) + layout.stride * rng.random::<f32>();
            let velocity = Point::new(rng.random_range(-10.0..10.0), 150.0 + intensity * 250.0);
            Particle::new(Point::new(x, top), velocity, 2.0 + intensity.min(1.5) * 2.0)
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
        let mut streak = resources.paint(ctx.base_paint);
        streak.style = PaintStyle::Stroke;
        let mut splash = resources.paint(ctx.base_paint);
        splash.style = if ctx.profile.advanced_effects {
            PaintStyle::Stroke
        } else {
            PaintStyle::Fill
        };

        for particle in self.emitter.particles() {
            if !Self::extent(particle).intersects(&ctx.viewport) {
                continue;
            }
            let alpha = particle.alpha();
            if particle.splash {
                splash.color = ctx.base_paint.color.with_alpha(alpha * 0.8);
                // Rings widen as the splash fades.
                let radius = particle.size * (1.0 + (1.0 - alpha) * 2.0);
                canvas.draw_circle(particle.position, radius, &splash);
            } else {
                streak.color = ctx.base_paint.color.with_alpha(alpha);
                streak.stroke_width = (particle.size * 0.5).max(1.0);
                canvas.draw_line(Self::tail(particle), particle.position, &streak);
            }
        }

        resources.release_paint(splash);
        resources.release_paint(streak);
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
    fn drops_fall_then_splash_on_the_floor() {
        let mut config = VisualiserConfig::default();
        config.style.seed = Some(11);
        config.particles.jitter_probability = 0.0;
        let profile = QualityProfile::for_level(QualityLevel::Low);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let loud = [1.0; 8];
        let silent = [0.0; 8];
        let mut ctx = FrameContext {
            spectrum: &loud,
            intensity: 1.0,
            viewport: Rect::new(0.0, 0.0, 120.0, 60.0),
            delta: 0.05,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = RaindropsStyle::new();
        style.initialize(&config).unwrap();
        style.advance(&ctx);
        assert!(!style.emitter.particles().is_empty());
        assert!(style.emitter.particles().iter().all(|p| !p.splash));

        ctx.spectrum = &silent;
        for _ in 0..6 {
            style.advance(&ctx);
        }
        let particles = style.emitter.particles();
        assert!(!particles.is_empty());
        assert!(particles.iter().all(|p| p.splash && p.position.y <= 60.0));
        let splashes = particles.len();

        let mut resources = DrawResources::new(&config, profile);
        let mut canvas = RecordingCanvas::new(120.0, 60.0);
        style.draw(&ctx, &mut canvas, &mut resources);
        assert_eq!(
            canvas.count(|c| matches!(c, DrawCommand::Circle { .. })),
            splashes
        );
    }
}
