use crate::geometry::{Point, Rect};

use super::{BarLayout, Canvas, DrawResources, DrawStrategy, FrameContext, StyleKind};

/// Bars narrower than a pixel are not worth a draw call.
const MIN_BAR_HEIGHT: f32 = 1.0;
const HEIGHT_FRACTION: f32 = 0.9;

/// Classic vertical spectrum bars rising from the bottom edge.
#[derive(Debug, Default)]
pub struct BarsStyle;

impl BarsStyle {
    pub fn new() -> Self {
        Self
    }

    fn bar_rect(
        ctx: &FrameContext<'_>,
        layout: &BarLayout,
        index: usize,
        value: f32,
    ) -> Option<Rect> {
        let viewport = ctx.viewport;
        let max_height = viewport.height() * HEIGHT_FRACTION;
        let height = (value * ctx.tunables.amplitude_scale * max_height).min(viewport.height());
        if height < MIN_BAR_HEIGHT {
            return None;
        }

        let width = layout.width;
        let left = layout.left(index);
        Some(Rect::new(left, viewport.bottom - height, left + width, viewport.bottom))
    }
}

impl DrawStrategy for BarsStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Bars
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        let layout = BarLayout::for_frame(ctx);
        ctx.spectrum
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| Self::bar_rect(ctx, &layout, i, v))
            .reduce(|a, b| a.union(&b))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let layout = BarLayout::for_frame(ctx);
        let viewport = ctx.viewport;

        let mut paint = resources.paint(ctx.base_paint);
        if ctx.profile.advanced_effects {
            paint.set_gradient(
                Point::new(0.0, viewport.bottom),
                Point::new(0.0, viewport.top),
                ctx.base_paint.color.shade(0.45),
                ctx.base_paint.color,
            );
        }

        let mut glow = None;
        if ctx.profile.advanced_effects && ctx.profile.blur_radius > 0.0 {
            let mut p = resources.paint(ctx.base_paint);
            p.color = ctx.base_paint.color.with_alpha(0.35);
            p.blur_radius = ctx.profile.blur_radius;
            glow = Some(p);
        }

        for (i, &value) in ctx.spectrum.iter().enumerate() {
            let Some(rect) = Self::bar_rect(ctx, &layout, i, value) else {
                continue;
            };
            if !rect.intersects(&viewport) {
                continue;
            }
            if let Some(glow) = glow.as_deref() {
                canvas.draw_rect(rect.inflate(ctx.profile.blur_radius * 0.5), glow);
            }
            canvas.draw_rect(rect, &paint);
        }

        if let Some(glow) = glow {
            resources.release_paint(glow);
        }
        resources.release_paint(paint);
    }
}
