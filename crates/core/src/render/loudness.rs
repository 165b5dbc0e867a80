use crate::geometry::{Point, Rect};

use super::{Canvas, Color, DrawResources, DrawStrategy, FrameContext, StyleKind, SILENCE};

/// Seconds for the level to cover ~63% of a rise.
const ATTACK: f32 = 0.05;
/// Seconds for the level to cover ~63% of a fall.
const RELEASE: f32 = 0.4;
const PEAK_HOLD: f32 = 1.0;
/// Peak marker fall speed in level units per second once the hold expires.
const PEAK_DECAY: f32 = 0.5;
const METER_HEIGHT: f32 = 0.12;
const PADDING: f32 = 8.0;

const GREEN: Color = Color::rgb(40, 220, 90);
const YELLOW: Color = Color::rgb(240, 210, 40);
const RED: Color = Color::rgb(235, 50, 40);

/// Segmented horizontal loudness meter with a peak-hold marker.
#[derive(Debug, Default)]
pub struct LoudnessStyle {
    level: f32,
    peak: f32,
    hold: f32,
}

impl LoudnessStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    fn follow(&mut self, target: f32, delta: f32) {
        let time = if target > self.level { ATTACK } else { RELEASE };
        let k = 1.0 - (-delta / time).exp();
        self.level += (target - self.level) * k;

        if self.level >= self.peak {
            self.peak = self.level;
            self.hold = PEAK_HOLD;
        } else if self.hold > 0.0 {
            self.hold -= delta;
        } else {
            self.peak = (self.peak - PEAK_DECAY * delta).max(self.level);
        }
    }

    fn meter(viewport: Rect) -> Rect {
        let height = (viewport.height() * METER_HEIGHT).max(4.0);
        Rect::new(
            viewport.left + PADDING,
            viewport.bottom - PADDING - height,
            viewport.right - PADDING,
            viewport.bottom - PADDING,
        )
    }

    fn segment_color(fraction: f32) -> Color {
        if fraction < 0.6 {
            GREEN
        } else if fraction < 0.85 {
            YELLOW
        } else {
            RED
        }
    }
}

fn rms(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f32>() / values.len() as f32).sqrt()
}

impl DrawStrategy for LoudnessStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Loudness
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        self.follow(rms(ctx.spectrum) * ctx.tunables.amplitude_scale, ctx.delta);
    }

    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect> {
        if self.level.max(self.peak) < SILENCE {
            return None;
        }
        let meter = Self::meter(ctx.viewport);
        let reach = meter.left + meter.width() * self.level.max(self.peak).min(1.0);
        Some(Rect::new(meter.left, meter.top, reach.max(meter.left + 1.0), meter.bottom))
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let meter = Self::meter(ctx.viewport);
        let segments = (ctx.profile.point_count / 2).max(8);
        let pitch = meter.width() / segments as f32;
        let gap = (pitch * 0.2).min(2.0);
        let lit = (self.level.min(1.0) * segments as f32).ceil() as usize;

        let mut paint = resources.paint(ctx.base_paint);
        if ctx.profile.advanced_effects {
            paint.color = Color::WHITE.with_alpha(0.08);
            canvas.draw_rect(meter, &paint);
        }

        for i in 0..lit.min(segments) {
            let left = meter.left + pitch * i as f32;
            let rect = Rect::new(left, meter.top, left + pitch - gap, meter.bottom);
            paint.color = Self::segment_color((i as f32 + 0.5) / segments as f32);
            canvas.draw_rect(rect, &paint);
        }

        if self.peak >= SILENCE {
            let x = meter.left + meter.width() * self.peak.min(1.0);
            paint.color = Color::WHITE;
            paint.stroke_width = 2.0;
            canvas.draw_line(
                Point::new(x, meter.top - 2.0),
                Point::new(x, meter.bottom + 2.0),
                &paint,
            );
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
    fn attack_is_faster_than_release() {
        let mut style = LoudnessStyle::new();
        style.follow(1.0, 0.05);
        let risen = style.level();
        assert!((risen - (1.0 - (-1.0f32).exp())).abs() < 1e-5);

        let mut falling = LoudnessStyle {
            level: 1.0,
            peak: 1.0,
            hold: 0.0,
        };
        falling.follow(0.0, 0.05);
        assert!(1.0 - falling.level() < risen);
    }

    #[test]
    fn peak_holds_then_decays() {
        let mut style = LoudnessStyle::new();
        for _ in 0..20 {
            style.follow(0.8, 0.05);
        }
        let peak = style.peak();
        assert!(peak > 0.79);

        for _ in 0..10 {
            style.follow(0.0, 0.05);
        }
        assert_eq!(style.peak(), peak);
        assert!(style.level() < peak);

        for _ in 0..20 {
            style.follow(0.0, 0.05);
        }
        assert!(style.peak() < peak);
        assert!(style.peak() >= style.level());
    }

    #[test]
    fn lit_segments_follow_the_level() {
        let profile = QualityProfile::for_level(QualityLevel::Low);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let ctx = FrameContext {
            spectrum: &[0.5; 4],
            intensity: 0.5,
            viewport: Rect::new(0.0, 0.0, 216.0, 100.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = LoudnessStyle {
            level: 0.5,
            peak: 0.75,
            hold: PEAK_HOLD,
        };
        let bounds = style.bounds(&ctx).unwrap();
        assert_eq!(bounds.right, 8.0 + 200.0 * 0.75);

        let mut resources = DrawResources::new(&VisualiserConfig::default(), profile);
        let mut canvas = RecordingCanvas::new(216.0, 100.0);
        style.draw(&ctx, &mut canvas, &mut resources);
        // Low quality: 16 segments, half of them lit, plus the peak marker.
        assert_eq!(canvas.count(|c| matches!(c, DrawCommand::Rect { .. })), 8);
        assert_eq!(canvas.count(|c| matches!(c, DrawCommand::Line { .. })), 1);
    }
}
