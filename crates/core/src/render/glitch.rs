use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect};
use crate::quality::QualityChange;
use crate::Result;

use super::{
    peak, BarLayout, Canvas, Color, DrawResources, DrawStrategy, FrameContext, StyleKind,
    SILENCE,
};

const MAX_BANDS: f32 = 8.0;
const CHROMA_SHIFT: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    rows: Rect,
    offset: f32,
}

/// Mirrored bars torn apart by random row displacement on loud frames.
#[derive(Debug)]
pub struct GlitchStyle {
    rng: SmallRng,
    seed: Option<u64>,
    bands: Vec<Band>,
}

impl GlitchStyle {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
            seed: None,
            bands: Vec::new(),
        }
    }

    fn reseed(&mut self, seed: Option<u64>) {
        self.seed = seed;
        self.rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
    }

    fn half_height(ctx: &FrameContext<'_>, value: f32) -> f32 {
        value * ctx.viewport.height() * 0.45 * ctx.tunables.amplitude_scale
    }

    fn bar(ctx: &FrameContext<'_>, layout: &BarLayout, index: usize, value: f32) -> Option<Rect> {
        let half = Self::half_height(ctx, value).min(ctx.viewport.height() * 0.5);
        if half < 0.5 {
            return None;
        }
        let mid = ctx.viewport.center().y;
        let left = layout.left(index);
        let width = layout.width;
        Some(Rect::new(left, mid - half, left + width, mid + half))
    }
}

impl Default for GlitchStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for GlitchStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Glitch
    }

    fn initialize(&mut self, config: &VisualiserConfig) -> Result<()> {
        self.reseed(config.style.seed);
        Ok(())
    }

    fn configure(&mut self, config: &VisualiserConfig, _quality: &QualityChange) {
        if config.style.seed != self.seed {
            self.reseed(config.style.seed);
        }
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        self.bands.clear();
        if ctx.intensity < SILENCE {
            return;
        }

        let viewport = ctx.viewport;
        let wanted = ctx.intensity.min(1.0) * MAX_BANDS * ctx.profile.effect_density;
        let count = wanted.round() as usize;
        let max_rows = (viewport.height() * 0.08).max(2.0);
        let max_shift = (ctx.intensity * viewport.width() * 0.1).max(1.0);

        for _ in 0..count {
            let height = self.rng.random_range(1.0..max_rows);
            let room = (viewport.height() - height).max(0.0);
            let top = viewport.top + self.rng.random::<f32>() * room;
            let offset = self.rng.random_range(-max_shift..max_shift);
            self.bands.push(Band {
                rows: Rect::new(viewport.left, top, viewport.right, top + height),
                offset,
            });
        }
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        if peak(ctx.spectrum) < SILENCE {
            return None;
        }
        let layout = BarLayout::for_frame(ctx);
        let bars = ctx
            .spectrum
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| Self::bar(ctx, &layout, i, v))
            .reduce(|a, b| a.union(&b))?;
        Some(self.bands.iter().fold(bars, |r, band| r.union(&band.rows)))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let layout = BarLayout::for_frame(ctx);
        let mut paint = resources.paint(ctx.base_paint);
        let chroma = ctx.profile.advanced_effects;
        let mut ghost = resources.paint(ctx.base_paint);

        for (i, &value) in ctx.spectrum.iter().enumerate() {
            let Some(rect) = Self::bar(ctx, &layout, i, value) else {
                continue;
            };
            if chroma {
                let alpha = ctx.base_paint.color.a as f32 / 255.0 * 0.5;
                ghost.color = Color::rgb(255, 0, 80).with_alpha(alpha);
                canvas.draw_rect(shift(rect, -CHROMA_SHIFT), &ghost);
                ghost.color = Color::rgb(0, 255, 230).with_alpha(alpha);
                canvas.draw_rect(shift(rect, CHROMA_SHIFT), &ghost);
            }
            canvas.draw_rect(rect, &paint);
        }

        for band in &self.bands {
            canvas.displace_rows(band.rows, band.offset);
        }
        if chroma && !self.bands.is_empty() {
            // Thin scanline over the strongest tear.
            let band = self.bands[0];
            paint.color = Color::WHITE.with_alpha(0.3);
            canvas.draw_line(
                Point::new(band.rows.left, band.rows.top),
                Point::new(band.rows.right, band.rows.top),
                &paint,
            );
        }

        resources.release_paint(ghost);
        resources.release_paint(paint);
    }
}

fn shift(rect: Rect, dx: f32) -> Rect {
    Rect::new(rect.left + dx, rect.top, rect.right + dx, rect.bottom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleTunables;
    use crate::quality::{QualityLevel, QualityProfile};
    use crate::render::{DrawCommand, Paint, RecordingCanvas};

    fn run(seed: u64, spectrum: &[f32]) -> Vec<DrawCommand> {
        let mut config = VisualiserConfig::default();
        config.style.seed = Some(seed);
        let profile = QualityProfile::for_level(QualityLevel::High);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let ctx = FrameContext {
            spectrum,
            intensity: spectrum.iter().sum::<f32>() / spectrum.len() as f32,
            viewport: Rect::new(0.0, 0.0, 200.0, 100.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = GlitchStyle::new();
        style.initialize(&config).unwrap();
        style.advance(&ctx);
        let mut canvas = RecordingCanvas::new(200.0, 100.0);
        if style.bounds(&ctx).is_some() {
            let mut resources = DrawResources::new(&config, profile);
            style.draw(&ctx, &mut canvas, &mut resources);
        }
        canvas.take_commands()
    }

    #[test]
    fn loud_frames_tear_rows_deterministically() {
        let first = run(99, &[0.8; 16]);
        let displaced = first
            .iter()
            .filter(|c| matches!(c, DrawCommand::Displace { .. }))
            .count();
        assert_eq!(displaced, 6);
        // Two ghost copies per bar in high quality.
        assert_eq!(first.iter().filter(|c| matches!(c, DrawCommand::Rect { .. })).count(), 48);
        assert_eq!(first, run(99, &[0.8; 16]));
    }

    #[test]
    fn silence_draws_nothing() {
        assert!(run(1, &[0.0; 16]).is_empty());
    }
}
