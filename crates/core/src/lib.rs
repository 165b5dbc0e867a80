//! Core library for the Spectrum Visualiser.
//!
//! Raw magnitude spectra go in, primitive draw calls come out. The pipeline
//! resamples and smooths the spectrum into visual buckets, advances animation
//! state on a clamped frame clock, pools paints and paths across frames and
//! lets a quality policy trade effects for throughput. Each visual style is a
//! strategy plugged into that shared pipeline; the drawing backend sits behind
//! the [`Canvas`] trait.

pub mod config;
pub mod error;
pub mod geometry;
pub mod particles;
pub mod pool;
pub mod quality;
pub mod render;
pub mod spectrum;
pub mod timeline;

pub use config::{
    ClockSettings, ParticleSettings, PoolSettings, SpectrumSettings, StyleTunables,
    VisualiserConfig,
};
pub use error::{Result, VisualiserError};
pub use geometry::{Point, Rect, Vec3};
pub use particles::{Particle, ParticlePhysics, ParticleSimulation, SpawnRule};
pub use pool::{PoolStats, Pooled, ResourcePool};
pub use quality::{FilterLevel, QualityChange, QualityLevel, QualityPolicy, QualityProfile};
pub use render::{
    create_visualizer, Canvas, Color, DrawCommand, FrameInput, FrameOutcome, Paint, PaintStyle,
    Path, RecordingCanvas, StyleKind, Visualizer,
};
pub use spectrum::{ProcessedSpectrum, SpectrumProcessor, SpectrumSource};
pub use timeline::{AnimationClock, Rotation};
