use crate::geometry::{Point, Rect};

use super::{
    BarLayout, Canvas, DrawResources, DrawStrategy, FrameContext, StyleKind, SILENCE,
};

const BOB_SPEED: f32 = 2.5;

/// A row of pulsing dots, one per bucket, bobbing around the centre line.
#[derive(Debug, Default)]
pub struct DotsStyle;

impl DotsStyle {
    pub fn new() -> Self {
        Self
    }

    fn dot(
        ctx: &FrameContext<'_>,
        layout: &BarLayout,
        index: usize,
        value: f32,
    ) -> Option<(Point, f32)> {
        if value < SILENCE {
            return None;
        }
        let max_radius = (layout.stride * 0.5).max(1.0) * (1.0 + ctx.tunables.amplitude_scale);
        let radius = (value.min(1.5) * max_radius).max(1.0);
        let phase = ctx.time * BOB_SPEED + index as f32 * 0.4;
        let bob = phase.sin() * value * ctx.viewport.height() * 0.15;
        let center = Point::new(
            layout.left(index) + layout.stride * 0.5,
            ctx.viewport.center().y + bob,
        );
        Some((center, radius))
    }
}

impl DrawStrategy for DotsStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Dots
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        let layout = BarLayout::for_frame(ctx);
        ctx.spectrum
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| Self::dot(ctx, &layout, i, v))
            .map(|(center, radius)| Rect::around(center, radius))
            .reduce(|a, b| a.union(&b))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let layout = BarLayout::for_frame(ctx);
        let mut paint = resources.paint(ctx.base_paint);

        for (i, &value) in ctx.spectrum.iter().enumerate() {
            let Some((center, radius)) = Self::dot(ctx, &layout, i, value) else {
                continue;
            };
            if !Rect::around(center, radius).intersects(&ctx.viewport) {
                continue;
            }

            if ctx.profile.advanced_effects {
                paint.color = ctx.base_paint.color.with_alpha(0.25);
                paint.blur_radius = ctx.profile.blur_radius;
                canvas.draw_circle(center, radius * 1.6, &paint);
                paint.blur_radius = 0.0;
            }
            paint.color = ctx.base_paint.color.with_alpha(0.4 + 0.6 * value.min(1.0));
            canvas.draw_circle(center, radius, &paint);
        }

        resources.release_paint(paint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleTunables;
    use crate::quality::{QualityLevel, QualityProfile};
    use crate::render::{DrawCommand, Paint, RecordingCanvas};
    use crate::VisualiserConfig;

    #[test]
    fn louder_buckets_get_bigger_dots() {
        let profile = QualityProfile::for_level(QualityLevel::Low);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let spectrum = [0.2, 0.0, 0.9];
        let ctx = FrameContext {
            spectrum: &spectrum,
            intensity: 0.37,
            viewport: Rect::new(0.0, 0.0, 120.0, 80.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 10.0,
            bar_spacing: 4.0,
        };

        let mut resources = DrawResources::new(&VisualiserConfig::default(), profile);
        let mut canvas = RecordingCanvas::new(120.0, 80.0);
        DotsStyle::new().draw(&ctx, &mut canvas, &mut resources);

        let radii: Vec<f32> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Circle { radius, .. } => Some(*radius),
                _ => None,
            })
            .collect();
        assert_eq!(radii.len(), 2);
        assert!(radii[1] > radii[0]);
    }
}
