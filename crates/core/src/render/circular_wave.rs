use std::f32::consts::TAU;

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::quality::{QualityChange, QualityProfile};
use crate::timeline::Rotation;

use super::{
    peak, unit_circle, Canvas, DrawResources, DrawStrategy, FrameContext, FrameInput, PaintStyle,
    StyleKind, SILENCE,
};

const RING_SPACING: f32 = 0.22;
const WOBBLE_FREQUENCY: f32 = 3.0;

/// Concentric closed waves whose radius follows the spectrum around the
/// circle.
#[derive(Debug)]
pub struct CircularWaveStyle {
    phase: Rotation,
    /// Unit circle sampled at the quality's point count.
    circle: Vec<(f32, f32)>,
    /// Ring outline for the current frame.
    points: Vec<Point>,
    stale: bool,
}

impl CircularWaveStyle {
    pub fn new() -> Self {
        Self {
            phase: Rotation::new(0.8, 5.0, 3.0),
            circle: Vec::new(),
            points: Vec::new(),
            stale: true,
        }
    }

    fn ring_count(profile: &QualityProfile) -> usize {
        if profile.advanced_effects {
            3
        } else {
            2
        }
    }

    fn base_radius(ctx: &FrameContext<'_>) -> f32 {
        ctx.viewport.width().min(ctx.viewport.height()) * ctx.tunables.radius_proportion
    }

    /// Spectrum value under sample `index` of `samples`, mirrored so the
    /// wave closes without a seam.
    fn sample(spectrum: &[f32], index: usize, samples: usize) -> f32 {
        if spectrum.is_empty() || samples == 0 {
            return 0.0;
        }
        let half = samples / 2;
        let folded = if index < half { index } else { samples - 1 - index };
        let bucket = folded * spectrum.len() / half.max(1);
        spectrum[bucket.min(spectrum.len() - 1)]
    }
}

impl Default for CircularWaveStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for CircularWaveStyle {
    fn style(&self) -> StyleKind {
        StyleKind::CircularWave
    }

    fn bucket_count(&self, input: &FrameInput<'_>, profile: &QualityProfile) -> usize {
        input.bar_count.clamp(1, profile.point_count.max(1))
    }

    fn configure(&mut self, config: &VisualiserConfig, quality: &QualityChange) {
        self.phase.speed = config.style.rotation_speed;
        self.phase.max_speed = config.style.max_rotation_speed;
        if quality.changed {
            self.stale = true;
        }
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        self.phase.advance(ctx.delta, ctx.intensity);
        if self.stale || self.circle.len() != ctx.profile.point_count {
            unit_circle(ctx.profile.point_count, 0.0, &mut self.circle);
            self.stale = false;
        }
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        let loudest = peak(ctx.spectrum);
        if loudest < SILENCE {
            return None;
        }
        let rings = Self::ring_count(ctx.profile) as f32;
        let base = Self::base_radius(ctx);
        let outer = base * (1.0 + RING_SPACING * (rings - 1.0));
        let reach = outer + loudest * base * 0.5 * ctx.tunables.amplitude_scale + 2.0;
        Some(Rect::around(ctx.viewport.center(), reach))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let center = ctx.viewport.center();
        let base = Self::base_radius(ctx);
        let samples = self.circle.len();
        if samples < 3 {
            return;
        }

        let mut paint = resources.paint(ctx.base_paint);
        paint.style = PaintStyle::Stroke;
        paint.stroke_width = 2.0;
        paint.blur_radius = if ctx.profile.advanced_effects {
            ctx.profile.blur_radius
        } else {
            0.0
        };
        let mut path = resources.path();

        for ring in 0..Self::ring_count(ctx.profile) {
            let ring_radius = base * (1.0 + RING_SPACING * ring as f32);
            let phase = self.phase.angle() * (1.0 + ring as f32 * 0.5);
            let amplitude = base * 0.5 * ctx.tunables.amplitude_scale / (1.0 + ring as f32);

            self.points.clear();
            for (i, &(cos_a, sin_a)) in self.circle.iter().enumerate() {
                let value = Self::sample(ctx.spectrum, i, samples);
                let turn = i as f32 / samples as f32 * TAU;
                let wobble = 0.5 + 0.5 * (WOBBLE_FREQUENCY * turn + phase).sin();
                let r = ring_radius + value * amplitude * wobble;
                self.points.push(Point::new(center.x + cos_a * r, center.y + sin_a * r));
            }

            path.reset();
            if ctx.profile.advanced_effects {
                // Curve through edge midpoints, using each sample as the control.
                let last = self.points[samples - 1];
                path.move_to(last.midpoint(self.points[0]));
                for (i, &point) in self.points.iter().enumerate() {
                    let next = self.points[(i + 1) % samples];
                    path.quad_to(point, point.midpoint(next));
                }
            } else {
                path.move_to(self.points[0]);
                for &point in &self.points[1..] {
                    path.line_to(point);
                }
            }
            path.close();

            paint.color = ctx.base_paint.color.with_alpha(1.0 - ring as f32 * 0.25);
            canvas.draw_path(&path, &paint);
        }

        resources.release_path(path);
        resources.release_paint(paint);
    }
}
