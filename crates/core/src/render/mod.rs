//! Renderer lifecycle and per-style drawing strategies.
//!
//! Every style is a [`DrawStrategy`] wrapped by the generic [`StyleRenderer`],
//! which owns the shared pipeline: spectrum processing, clocking, quality
//! policy, resource pools, visibility culling and failure containment.

mod bars;
mod canvas;
mod circular_bars;
mod circular_wave;
mod cube;
mod dots;
mod emitter;
mod fire;
mod glitch;
mod loudness;
mod raindrops;
mod text_particles;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{StyleTunables, VisualiserConfig};
use crate::geometry::Rect;
use crate::pool::{Pooled, ResourcePool};
use crate::quality::{QualityChange, QualityPolicy, QualityProfile};
use crate::spectrum::{average, SpectrumProcessor};
use crate::timeline::AnimationClock;
use crate::{Result, VisualiserError};

pub use bars::BarsStyle;
pub use canvas::{
    Canvas, Color, DrawCommand, Gradient, Paint, PaintStyle, Path, PathCommand, RecordingCanvas,
};
pub use circular_bars::CircularBarsStyle;
pub use circular_wave::CircularWaveStyle;
pub use cube::{project_cube, CubeRequest, CubeSnapshot, CubeStyle, ProjectedFace};
pub use dots::DotsStyle;
pub use fire::FireStyle;
pub use glitch::GlitchStyle;
pub use loudness::LoudnessStyle;
pub use raindrops::RaindropsStyle;
pub use text_particles::TextParticlesStyle;

/// The visual styles this crate can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleKind {
    Bars,
    CircularBars,
    CircularWave,
    Dots,
    Fire,
    Raindrops,
    TextParticles,
    Cube,
    Glitch,
    Loudness,
}

impl StyleKind {
    pub const fn all() -> [Self; 10] {
        [
            Self::Bars,
            Self::CircularBars,
            Self::CircularWave,
            Self::Dots,
            Self::Fire,
            Self::Raindrops,
            Self::TextParticles,
            Self::Cube,
            Self::Glitch,
            Self::Loudness,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::CircularBars => "circular-bars",
            Self::CircularWave => "circular-wave",
            Self::Dots => "dots",
            Self::Fire => "fire",
            Self::Raindrops => "raindrops",
            Self::TextParticles => "text-particles",
            Self::Cube => "cube",
            Self::Glitch => "glitch",
            Self::Loudness => "loudness",
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StyleKind {
    type Err = VisualiserError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::all()
            .into_iter()
            .find(|kind| kind.label() == wanted)
            .ok_or_else(|| VisualiserError::invalid(format!("unknown style `{s}`")))
    }
}

/// Builds a fresh, unconfigured renderer for `kind`.
pub fn create_visualizer(kind: StyleKind) -> Box<dyn Visualizer> {
    match kind {
        StyleKind::Bars => Box::new(StyleRenderer::new(BarsStyle::new())),
        StyleKind::CircularBars => Box::new(StyleRenderer::new(CircularBarsStyle::new())),
        StyleKind::CircularWave => Box::new(StyleRenderer::new(CircularWaveStyle::new())),
        StyleKind::Dots => Box::new(StyleRenderer::new(DotsStyle::new())),
        StyleKind::Fire => Box::new(StyleRenderer::new(FireStyle::new())),
        StyleKind::Raindrops => Box::new(StyleRenderer::new(RaindropsStyle::new())),
        StyleKind::TextParticles => Box::new(StyleRenderer::new(TextParticlesStyle::new())),
        StyleKind::Cube => Box::new(StyleRenderer::new(CubeStyle::new())),
        StyleKind::Glitch => Box::new(StyleRenderer::new(GlitchStyle::new())),
        StyleKind::Loudness => Box::new(StyleRenderer::new(LoudnessStyle::new())),
    }
}

/// Per-frame input supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub spectrum: &'a [f32],
    pub bar_width: f32,
    pub bar_spacing: f32,
    pub bar_count: usize,
    pub paint: &'a Paint,
    /// Frame time; `None` uses the wall clock.
    pub timestamp: Option<Instant>,
}

impl<'a> FrameInput<'a> {
    pub fn new(spectrum: &'a [f32], paint: &'a Paint) -> Self {
        Self {
            spectrum,
            bar_width: 8.0,
            bar_spacing: 2.0,
            bar_count: 32,
            paint,
            timestamp: None,
        }
    }

    pub fn with_bars(mut self, bar_width: f32, bar_spacing: f32, bar_count: usize) -> Self {
        self.bar_width = bar_width;
        self.bar_spacing = bar_spacing;
        self.bar_count = bar_count;
        self
    }

    pub fn at(mut self, timestamp: Instant) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// What a render call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    /// Nothing visible this frame; drawing was skipped.
    Culled,
    /// The input was rejected and logged.
    Invalid,
    /// The style failed mid-frame; the failure was logged and contained.
    Failed,
}

/// Callback drawn on top of every frame, whatever path the frame took.
pub type OverlayFn<'a> = &'a mut dyn FnMut(&mut dyn Canvas);

/// Lifecycle shared by every visual style.
pub trait Visualizer: Send {
    fn style(&self) -> StyleKind;

    /// Allocates pools and caches. Calling it again is a no-op.
    fn initialize(&mut self) -> Result<()>;

    /// Re-applies overlay, quality and tunables. Idempotent.
    fn configure(&mut self, config: &VisualiserConfig) -> Result<()>;

    /// Draws one frame. Errors only when called after `dispose`; every
    /// other failure is logged and reported through [`FrameOutcome`].
    fn render(
        &mut self,
        canvas: &mut dyn Canvas,
        input: &FrameInput<'_>,
        overlay: Option<OverlayFn<'_>>,
    ) -> Result<FrameOutcome>;

    /// Releases pools, caches and worker threads. Safe to call repeatedly.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Everything a strategy may read while drawing one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub spectrum: &'a [f32],
    /// Mean of `spectrum`.
    pub intensity: f32,
    pub viewport: Rect,
    pub delta: f32,
    pub time: f32,
    pub profile: &'a QualityProfile,
    pub tunables: &'a StyleTunables,
    pub base_paint: &'a Paint,
    pub bar_width: f32,
    pub bar_spacing: f32,
}

/// Paint and path pools handed to strategies while drawing.
pub struct DrawResources {
    paints: ResourcePool<Paint>,
    paths: ResourcePool<Path>,
    profile: QualityProfile,
}

impl DrawResources {
    fn new(config: &VisualiserConfig, profile: QualityProfile) -> Self {
        Self {
            paints: ResourcePool::new(config.pool.paint_capacity, Paint::default, Paint::reset),
            paths: ResourcePool::new(config.pool.path_capacity, Path::new, Path::reset),
            profile,
        }
    }

    /// A reset paint carrying `base`'s colour and the active quality flags.
    pub fn paint(&mut self, base: &Paint) -> Pooled<Paint> {
        let mut paint = self.paints.acquire();
        paint.color = base.color;
        paint.style = base.style;
        paint.stroke_width = base.stroke_width;
        paint.antialias = self.profile.antialias && base.antialias;
        paint.filter = self.profile.filter;
        paint
    }

    pub fn path(&mut self) -> Pooled<Path> {
        self.paths.acquire()
    }

    pub fn release_paint(&mut self, paint: Pooled<Paint>) {
        self.paints.release(paint);
    }

    pub fn release_path(&mut self, path: Pooled<Path>) {
        self.paths.release(path);
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    /// Tops both pools back up after a draw that never returned its items.
    fn restock(&mut self) {
        self.paints.refill();
        self.paths.refill();
    }

    pub fn paint_pool(&self) -> &ResourcePool<Paint> {
        &self.paints
    }

    pub fn path_pool(&self) -> &ResourcePool<Path> {
        &self.paths
    }
}

impl fmt::Debug for DrawResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawResources")
            .field("paints", &self.paints)
            .field("paths", &self.paths)
            .finish()
    }
}

/// The geometry of one visual style.
pub trait DrawStrategy: Send {
    fn style(&self) -> StyleKind;

    /// Number of buckets the spectrum is resampled into for this frame.
    fn bucket_count(&self, input: &FrameInput<'_>, _profile: &QualityProfile) -> usize {
        input.bar_count.max(1)
    }

    fn initialize(&mut self, _config: &VisualiserConfig) -> Result<()> {
        Ok(())
    }

    /// Called on every configure; `quality.changed` means caches are stale.
    fn configure(&mut self, _config: &VisualiserConfig, _quality: &QualityChange) {}

    /// Time-based state updates (particles, rotation, decay).
    fn advance(&mut self, _ctx: &FrameContext<'_>) {}

    /// Region this frame will touch, or `None` when there is nothing to draw.
    fn bounds(&self, ctx: &FrameContext<'_>) -> Option<Rect>;

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    );

    /// Stops workers and drops caches.
    fn shutdown(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Ready,
    Disposed,
}

/// Runs the shared per-frame pipeline around a [`DrawStrategy`].
pub struct StyleRenderer<S: DrawStrategy> {
    strategy: S,
    config: VisualiserConfig,
    processor: SpectrumProcessor,
    clock: AnimationClock,
    quality: QualityPolicy,
    resources: Option<DrawResources>,
    spectrum: Vec<f32>,
    lifecycle: Lifecycle,
}

impl<S: DrawStrategy> StyleRenderer<S> {
    pub fn new(strategy: S) -> Self {
        let config = VisualiserConfig::default();
        Self {
            strategy,
            processor: SpectrumProcessor::new(config.spectrum),
            clock: AnimationClock::new(config.clock),
            quality: QualityPolicy::new(),
            resources: None,
            spectrum: Vec::new(),
            lifecycle: Lifecycle::Created,
            config,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn processor(&self) -> &SpectrumProcessor {
        &self.processor
    }

    pub fn quality(&self) -> &QualityPolicy {
        &self.quality
    }

    pub fn resources(&self) -> Option<&DrawResources> {
        self.resources.as_ref()
    }

    /// Smoothed buckets from the most recent frame.
    pub fn last_spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    fn ensure_live(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Disposed {
            return Err(VisualiserError::Disposed {
                style: self.strategy.style().label(),
            });
        }
        Ok(())
    }

    fn apply_config(&mut self) {
        let change = self.quality.apply(self.config.quality);
        self.processor
            .configure(self.config.spectrum, self.config.overlay);
        self.clock.configure(self.config.clock);
        if let Some(resources) = self.resources.as_mut() {
            resources.profile = change.profile;
        }
        self.strategy.configure(&self.config, &change);
        if change.changed {
            debug!(
                style = %self.strategy.style(),
                quality = %self.config.quality,
                "quality caches invalidated"
            );
        }
    }
}

fn validate_frame(canvas: &dyn Canvas, input: &FrameInput<'_>) -> Result<()> {
    let (w, h) = (canvas.width(), canvas.height());
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(VisualiserError::invalid(format!(
            "canvas must have positive size, got {w}x{h}"
        )));
    }
    if input.spectrum.is_empty() {
        return Err(VisualiserError::invalid("spectrum is empty"));
    }
    Ok(())
}

impl<S: DrawStrategy> Visualizer for StyleRenderer<S> {
    fn style(&self) -> StyleKind {
        self.strategy.style()
    }

    fn initialize(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.lifecycle == Lifecycle::Ready {
            return Ok(());
        }

        self.quality.invalidate();
        let change = self.quality.apply(self.config.quality);
        self.resources = Some(DrawResources::new(&self.config, change.profile));
        self.strategy.initialize(&self.config)?;
        self.lifecycle = Lifecycle::Ready;
        self.strategy.configure(&self.config, &change);
        info!(style = %self.strategy.style(), "renderer initialized");
        Ok(())
    }

    fn configure(&mut self, config: &VisualiserConfig) -> Result<()> {
        self.ensure_live()?;
        config.validate()?;

        let pools_changed = config.pool != self.config.pool;
        self.config = config.clone();
        if pools_changed && self.resources.is_some() {
            let profile = *self.quality.profile();
            self.resources = Some(DrawResources::new(&self.config, profile));
        }
        self.apply_config();
        Ok(())
    }

    fn render(
        &mut self,
        canvas: &mut dyn Canvas,
        input: &FrameInput<'_>,
        overlay: Option<OverlayFn<'_>>,
    ) -> Result<FrameOutcome> {
        self.ensure_live()?;
        if self.lifecycle == Lifecycle::Created {
            self.initialize()?;
        }

        let outcome = match validate_frame(canvas, input) {
            Ok(()) => self.render_frame(canvas, input),
            Err(err) => {
                warn!(style = %self.strategy.style(), error = %err, "skipping frame");
                FrameOutcome::Invalid
            }
        };

        if let Some(overlay) = overlay {
            overlay(canvas);
        }
        Ok(outcome)
    }

    fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        self.strategy.shutdown();
        self.resources = None;
        self.spectrum = Vec::new();
        self.processor.reset();
        self.clock.reset();
        self.lifecycle = Lifecycle::Disposed;
        info!(style = %self.strategy.style(), "renderer disposed");
    }

    fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }
}

impl<S: DrawStrategy> StyleRenderer<S> {
    fn render_frame(&mut self, canvas: &mut dyn Canvas, input: &FrameInput<'_>) -> FrameOutcome {
        let profile = *self.quality.profile();
        let buckets = self.strategy.bucket_count(input, &profile);
        self.processor
            .process_into(input.spectrum, buckets, &mut self.spectrum);

        let delta = match input.timestamp {
            Some(now) => self.clock.tick_at(now),
            None => self.clock.tick(),
        };

        let Some(resources) = self.resources.as_mut() else {
            return FrameOutcome::Failed;
        };

        let ctx = FrameContext {
            spectrum: &self.spectrum,
            intensity: average(&self.spectrum),
            viewport: canvas.bounds(),
            delta,
            time: self.clock.time_seconds(),
            profile: &profile,
            tunables: &self.config.style,
            base_paint: input.paint,
            bar_width: input.bar_width,
            bar_spacing: input.bar_spacing,
        };

        let strategy = &mut self.strategy;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            strategy.advance(&ctx);
            match strategy.bounds(&ctx) {
                Some(region) if region.intersects(&ctx.viewport) => {
                    strategy.draw(&ctx, canvas, &mut *resources);
                    FrameOutcome::Drawn
                }
                _ => FrameOutcome::Culled,
            }
        }));

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                let style = self.strategy.style();
                warn!(%style, "style panicked while drawing, frame dropped");
                resources.restock();
                FrameOutcome::Failed
            }
        }
    }
}

impl<S: DrawStrategy> Drop for StyleRenderer<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: DrawStrategy> fmt::Debug for StyleRenderer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleRenderer")
            .field("style", &self.strategy.style())
            .field("lifecycle", &self.lifecycle)
            .field("quality", &self.quality.level())
            .field("resources", &self.resources)
            .finish()
    }
}

/// Buckets below this level count as silence for culling.
pub(crate) const SILENCE: f32 = 0.01;

pub(crate) fn peak(values: &[f32]) -> f32 {
    values.iter().copied().fold(0.0, f32::max)
}

/// Horizontal layout of `count` bars centred in `viewport`; returns the left
/// edge of the first bar and the stride between bars.
/// Horizontal placement of one bar per bucket, shrunk to fit the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BarLayout {
    pub start: f32,
    pub stride: f32,
    /// Bar width after shrinking; the rest of the stride is the gap.
    pub width: f32,
}

impl BarLayout {
    pub(crate) fn new(viewport: Rect, count: usize, bar_width: f32, spacing: f32) -> Self {
        let count = count.max(1) as f32;
        let mut width = bar_width.max(1.0);
        let mut gap = spacing.max(0.0);
        let total = count * width + (count - 1.0) * gap;
        if total > viewport.width() {
            let scale = viewport.width() / total;
            width *= scale;
            gap *= scale;
        }
        let used = count * width + (count - 1.0) * gap;
        Self {
            start: viewport.left + (viewport.width() - used) * 0.5,
            stride: width + gap,
            width,
        }
    }

    pub(crate) fn for_frame(ctx: &FrameContext<'_>) -> Self {
        Self::new(ctx.viewport, ctx.spectrum.len(), ctx.bar_width, ctx.bar_spacing)
    }

    pub(crate) fn left(&self, index: usize) -> f32 {
        self.start + self.stride * index as f32
    }
}

/// Fills `out` with a unit circle sampled at `count` points, rotated by
/// `offset`. Reuses the allocation when the count is unchanged.
pub(crate) fn unit_circle(count: usize, offset: f32, out: &mut Vec<(f32, f32)>) {
    out.clear();
    let step = std::f32::consts::TAU / count.max(1) as f32;
    out.extend((0..count).map(|i| {
        let angle = offset + step * i as f32;
        (angle.cos(), angle.sin())
    }));
}
