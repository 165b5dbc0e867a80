use std::f32::consts::TAU;

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::quality::QualityChange;
use crate::timeline::Rotation;

use super::{
    peak, unit_circle, Canvas, DrawResources, DrawStrategy, FrameContext, StyleKind, SILENCE,
};

/// Extra angular speed per unit of average intensity.
const INTENSITY_GAIN: f32 = 2.0;

/// Bars radiating outwards from a slowly rotating ring.
#[derive(Debug)]
pub struct CircularBarsStyle {
    rotation: Rotation,
    /// Unit directions for each bar; rebuilt when the bar count or quality
    /// changes, rotated at draw time.
    directions: Vec<(f32, f32)>,
    stale: bool,
}

impl CircularBarsStyle {
    pub fn new() -> Self {
        Self {
            rotation: Rotation::new(0.6, 4.0, INTENSITY_GAIN),
            directions: Vec::new(),
            stale: true,
        }
    }

    fn radius(ctx: &FrameContext<'_>) -> f32 {
        ctx.viewport.width().min(ctx.viewport.height()) * ctx.tunables.radius_proportion
    }

    fn bar_length(ctx: &FrameContext<'_>, radius: f32, value: f32) -> f32 {
        value * radius * ctx.tunables.amplitude_scale
    }
}

impl Default for CircularBarsStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for CircularBarsStyle {
    fn style(&self) -> StyleKind {
        StyleKind::CircularBars
    }

    fn configure(&mut self, config: &VisualiserConfig, quality: &QualityChange) {
        self.rotation.speed = config.style.rotation_speed;
        self.rotation.max_speed = config.style.max_rotation_speed;
        if quality.changed {
            self.stale = true;
        }
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        self.rotation.advance(ctx.delta, ctx.intensity);
        if self.stale || self.directions.len() != ctx.spectrum.len() {
            unit_circle(ctx.spectrum.len(), -TAU / 4.0, &mut self.directions);
            self.stale = false;
        }
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        let loudest = peak(ctx.spectrum);
        if loudest < SILENCE {
            return None;
        }
        let radius = Self::radius(ctx);
        let reach = radius + Self::bar_length(ctx, radius, loudest) + ctx.bar_width;
        Some(Rect::around(ctx.viewport.center(), reach))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let center = ctx.viewport.center();
        let radius = Self::radius(ctx);
        let count = ctx.spectrum.len().max(1) as f32;
        let (sin_r, cos_r) = self.rotation.angle().sin_cos();

        let mut paint = resources.paint(ctx.base_paint);
        paint.style = super::PaintStyle::Stroke;
        paint.stroke_width = (TAU * radius / count * 0.6).clamp(1.0, ctx.bar_width.max(1.0));

        if ctx.profile.advanced_effects {
            let mut ring = resources.paint(ctx.base_paint);
            ring.style = super::PaintStyle::Stroke;
            ring.color = ctx.base_paint.color.with_alpha(0.4);
            ring.blur_radius = ctx.profile.blur_radius;
            canvas.draw_circle(center, radius, &ring);
            resources.release_paint(ring);
        }

        for (&value, &(cos_a, sin_a)) in ctx.spectrum.iter().zip(&self.directions) {
            let length = Self::bar_length(ctx, radius, value);
            if length < 1.0 {
                continue;
            }
            // Rotate the cached direction by the current angle.
            let dx = cos_a * cos_r - sin_a * sin_r;
            let dy = sin_a * cos_r + cos_a * sin_r;
            let inner = Point::new(center.x + dx * radius, center.y + dy * radius);
            let outer = Point::new(inner.x + dx * length, inner.y + dy * length);

            let base = ctx.base_paint.color;
            paint.color = base.lerp(base.shade(1.6), value.min(1.0));
            canvas.draw_line(inner, outer, &paint);
        }

        resources.release_paint(paint);
    }
}
