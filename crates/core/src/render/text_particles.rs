use rand::Rng;

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::particles::{FloorBehavior, Particle};
use crate::quality::QualityChange;

use super::emitter::Emitter;
use super::{BarLayout, Canvas, DrawResources, DrawStrategy, FrameContext, StyleKind};

const GLYPHS: &[char] = &['♪', '♫', '♬', '*', '+', '0', '1', '~'];
const DRIFT: f32 = -0.05;
const MIN_FONT: f32 = 8.0;

/// Glyphs that float up from loud buckets and fade out.
#[derive(Debug)]
pub struct TextParticlesStyle {
    emitter: Emitter,
}

impl TextParticlesStyle {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(DRIFT, FloorBehavior::PassThrough),
        }
    }

    /// Text is drawn from its baseline, so the box sits above the position.
    fn extent(particle: &Particle) -> Rect {
        let Point { x, y } = particle.position;
        Rect::new(x, y - particle.size, x + particle.size, y)
    }
}

impl Default for TextParticlesStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for TextParticlesStyle {
    fn style(&self) -> StyleKind {
        StyleKind::TextParticles
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

        self.emitter.step(ctx, |bucket, intensity, rng| {
            let x = layout.left(bucket);
            let velocity = Point::new(rng.random_range(-20.0..20.0), -(40.0 + intensity * 120.0));
            let size = MIN_FONT + intensity.min(1.5) * 12.0;
            let mut particle = Particle::new(Point::new(x, bottom), velocity, size);
            particle.glyph = Some(GLYPHS[rng.random_range(0..GLYPHS.len())]);
            particle
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
        let mut buf = [0u8; 4];

        for particle in self.emitter.particles() {
            let Some(glyph) = particle.glyph else {
                continue;
            };
            if !Self::extent(particle).intersects(&ctx.viewport) {
                continue;
            }
            let base = ctx.base_paint.color;
            let tint = base.lerp(base.shade(1.5), particle.intensity);
            paint.color = tint.with_alpha(particle.alpha());
            canvas.draw_text(glyph.encode_utf8(&mut buf), particle.position, particle.size, &paint);
        }

        resources.release_paint(paint);
    }

    fn shutdown(&mut self) {
        self.emitter.shutdown();
    }
}
