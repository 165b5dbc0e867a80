use std::fmt;
use std::sync::{Arc, Mutex, TryLockError};

use tracing::{debug, warn};

use crate::config::SpectrumSettings;
use crate::VisualiserError;

/// Where a [`ProcessedSpectrum`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumSource {
    /// Resampled and smoothed this call, and published as the latest buffer.
    Fresh,
    /// Another writer held the lock; the last published buffer was reused.
    Reused,
    /// Computed without smoothing or caching because nothing could be reused.
    Direct,
}

/// One frame's bucketed, smoothed and clamped magnitudes.
///
/// Consumers that need the values past the current frame must copy them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSpectrum {
    values: Arc<[f32]>,
    source: SpectrumSource,
}

impl ProcessedSpectrum {
    fn new(values: Arc<[f32]>, source: SpectrumSource) -> Self {
        Self { values, source }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn source(&self) -> SpectrumSource {
        self.source
    }

    /// Arithmetic mean of all buckets; zero for an empty buffer.
    pub fn average(&self) -> f32 {
        average(&self.values)
    }
}

/// Mutable smoothing history guarded by the single-writer lock.
struct SmoothingState {
    previous: Vec<f32>,
    scratch: Vec<Option<f32>>,
}

/// Resamples raw spectra into a fixed bucket count and smooths them over time.
///
/// Writers race through `try_lock`: at most one call updates the smoothing
/// state at a time and losers never wait. They reuse the last published
/// buffer, or compute an unsmoothed result directly when that buffer has the
/// wrong length.
pub struct SpectrumProcessor {
    settings: SpectrumSettings,
    overlay: bool,
    state: Mutex<SmoothingState>,
    published: Mutex<Option<Arc<[f32]>>>,
}

impl SpectrumProcessor {
    pub fn new(settings: SpectrumSettings) -> Self {
        Self {
            settings,
            overlay: false,
            state: Mutex::new(SmoothingState {
                previous: Vec::new(),
                scratch: Vec::new(),
            }),
            published: Mutex::new(None),
        }
    }

    /// Replaces the smoothing policy. The smoothing history is kept.
    pub fn configure(&mut self, settings: SpectrumSettings, overlay: bool) {
        self.settings = settings;
        self.overlay = overlay;
    }

    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    /// Smoothing factor currently applied.
    pub fn smoothing_factor(&self) -> f32 {
        self.settings.factor(self.overlay)
    }

    /// Forgets smoothing history and the published buffer.
    pub fn reset(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.previous = Vec::new();
        state.scratch.clear();
        *self
            .published
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Produces `bucket_count` smoothed magnitudes from `raw`.
    ///
    /// Never blocks. An empty `raw` yields an idle (zero) frame and clears the
    /// smoothing history.
    pub fn process(&self, raw: &[f32], bucket_count: usize) -> ProcessedSpectrum {
        if bucket_count == 0 {
            return ProcessedSpectrum::new(Arc::from(Vec::new()), SpectrumSource::Direct);
        }

        match self.state.try_lock() {
            Ok(mut state) => {
                let values = self.process_locked(&mut state, raw, bucket_count);
                drop(state);
                self.publish(values.clone());
                ProcessedSpectrum::new(values, SpectrumSource::Fresh)
            }
            Err(TryLockError::WouldBlock) => {
                debug!(bucket_count, "spectrum writer busy, falling back");
                self.fallback(raw, bucket_count)
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                let error = VisualiserError::processing("smoothing state poisoned");
                warn!(%error, "resetting spectrum history");
                let mut state = poisoned.into_inner();
                state.previous = Vec::new();
                drop(state);
                self.state.clear_poison();
                self.direct(raw, bucket_count)
            }
        }
    }

    /// Copies `process` output into a caller-owned buffer, reusing its
    /// allocation when the bucket count is unchanged.
    pub fn process_into(
        &self,
        raw: &[f32],
        bucket_count: usize,
        out: &mut Vec<f32>,
    ) -> SpectrumSource {
        let processed = self.process(raw, bucket_count);
        if out.len() != processed.len() {
            *out = vec![0.0; processed.len()];
        }
        out.copy_from_slice(processed.values());
        processed.source()
    }

    /// Last published buffer, if one exists and the slot is not being written.
    pub fn try_latest(&self) -> Option<ProcessedSpectrum> {
        match self.published.try_lock() {
            Ok(slot) => slot
                .as_ref()
                .map(|values| ProcessedSpectrum::new(values.clone(), SpectrumSource::Reused)),
            Err(_) => None,
        }
    }

    fn process_locked(
        &self,
        state: &mut SmoothingState,
        raw: &[f32],
        bucket_count: usize,
    ) -> Arc<[f32]> {
        let (min, max) = (self.settings.min_value, self.settings.max_value);

        if raw.is_empty() {
            state.previous = vec![0.0; bucket_count];
            return Arc::from(vec![bound(0.0, min, max); bucket_count]);
        }

        if state.previous.len() != bucket_count {
            state.previous = vec![0.0; bucket_count];
        }

        let factor = self.smoothing_factor();
        resample_into(raw, bucket_count, &mut state.scratch);

        for (previous, target) in state.previous.iter_mut().zip(&state.scratch) {
            let target = target.unwrap_or(0.0);
            let next = *previous + (target - *previous) * factor;
            *previous = if next.is_finite() { bound(next, min, max) } else { 0.0 };
        }

        Arc::from(state.previous.as_slice())
    }

    fn publish(&self, values: Arc<[f32]>) {
        match self.published.try_lock() {
            Ok(mut slot) => *slot = Some(values),
            Err(TryLockError::Poisoned(poisoned)) => {
                *poisoned.into_inner() = Some(values);
                self.published.clear_poison();
            }
            // A reader is copying the previous buffer; it stays current.
            Err(TryLockError::WouldBlock) => {}
        }
    }

    fn fallback(&self, raw: &[f32], bucket_count: usize) -> ProcessedSpectrum {
        match self.try_latest() {
            Some(latest) if latest.len() == bucket_count => latest,
            _ => self.direct(raw, bucket_count),
        }
    }

    fn direct(&self, raw: &[f32], bucket_count: usize) -> ProcessedSpectrum {
        let (min, max) = (self.settings.min_value, self.settings.max_value);
        let mut buckets = Vec::with_capacity(bucket_count);
        resample_into(raw, bucket_count, &mut buckets);
        let values: Vec<f32> = buckets
            .into_iter()
            .map(|bucket| bound(bucket.unwrap_or(0.0), min, max))
            .collect();
        ProcessedSpectrum::new(Arc::from(values), SpectrumSource::Direct)
    }
}

impl fmt::Debug for SpectrumProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumProcessor")
            .field("settings", &self.settings)
            .field("overlay", &self.overlay)
            .finish()
    }
}

/// Block-averages `raw` into `bucket_count` contiguous blocks of
/// `raw.len() / bucket_count` bins, the last block absorbing the remainder.
/// Empty blocks are reported as `None`. Non-finite and negative bins count
/// as silence.
pub fn resample_into(raw: &[f32], bucket_count: usize, out: &mut Vec<Option<f32>>) {
    out.clear();
    if bucket_count == 0 {
        return;
    }

    let block = raw.len() / bucket_count;
    for bucket in 0..bucket_count {
        let start = bucket * block;
        let end = if bucket + 1 == bucket_count {
            raw.len()
        } else {
            start + block
        };

        let bins = &raw[start.min(raw.len())..end];
        if bins.is_empty() {
            out.push(None);
            continue;
        }

        let sum: f32 = bins
            .iter()
            .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
            .sum();
        out.push(Some(sum / bins.len() as f32));
    }
}

/// Like `f32::clamp` but tolerates an inverted range instead of panicking.
fn bound(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

pub(crate) fn average(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn processor(smoothing: f32) -> SpectrumProcessor {
        SpectrumProcessor::new(SpectrumSettings {
            smoothing,
            overlay_smoothing: 0.5,
            min_value: 0.0,
            max_value: 1.5,
        })
    }

    #[test]
    fn output_length_matches_bucket_count() {
        let processor = processor(0.3);
        for len in [0usize, 1, 3, 16, 64, 257] {
            let raw: Vec<f32> = (0..len).map(|i| i as f32 / 10.0).collect();
            for buckets in [1usize, 2, 7, 32, 300] {
                assert_eq!(processor.process(&raw, buckets).len(), buckets);
            }
        }
    }

    #[test]
    fn poisoned_state_recovers_on_the_next_frame() {
        let processor = processor(0.5);
        processor.process(&[1.0; 8], 4);
        let crashed = thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _state = processor.state.lock().unwrap();
                    panic!("writer died mid-frame");
                })
                .join()
        });
        assert!(crashed.is_err());

        let recovered = processor.process(&[1.0; 8], 4);
        assert_eq!(recovered.source(), SpectrumSource::Direct);
        assert_eq!(recovered.len(), 4);
        assert_eq!(processor.process(&[1.0; 8], 4).source(), SpectrumSource::Fresh);
    }

    #[test]
    fn last_bucket_absorbs_remainder() {
        let mut out = Vec::new();
        resample_into(&[1.0, 1.0, 1.0, 4.0, 4.0], 2, &mut out);
        assert_eq!(out, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn empty_blocks_decay_instead_of_being_undefined() {
        let processor = processor(0.5);
        processor.process(&[1.0, 1.0, 1.0, 1.0], 4);
        let next = processor.process(&[1.0, 1.0], 4);

        // Two bins over four buckets: only the last block has data.
        assert_eq!(next.values()[0], 0.25);
        assert_eq!(next.values()[3], 0.75);
    }

    #[test]
    fn converges_monotonically_towards_constant_input() {
        let processor = processor(0.3);
        let raw = vec![0.8; 32];
        let mut last_distance = f32::MAX;

        for _ in 0..40 {
            let processed = processor.process(&raw, 8);
            let distance = (processed.values()[0] - 0.8).abs();
            assert!(distance <= last_distance);
            last_distance = distance;
        }
        assert!(last_distance < 1e-3);
    }

    #[test]
    fn clamps_spikes_and_negative_values() {
        let processor = processor(1.0);
        let raw = [9.0, -4.0, f32::NAN, 0.4, 100.0, f32::INFINITY];
        let processed = processor.process(&raw, 6);

        for value in processed.values() {
            assert!((0.0..=1.5).contains(value));
        }
    }

    #[test]
    fn empty_spectrum_is_an_idle_frame() {
        let processor = processor(0.3);
        processor.process(&[1.0; 8], 8);
        let processed = processor.process(&[], 8);

        assert_eq!(processed.source(), SpectrumSource::Fresh);
        assert!(processed.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn bucket_count_change_recreates_history() {
        let processor = processor(1.0);
        processor.process(&[1.0; 16], 16);
        let processed = processor.process(&[0.5; 16], 4);
        assert_eq!(processed.values(), &[0.5; 4]);
    }

    #[test]
    fn contended_writer_reuses_latest_buffer() {
        let processor = processor(1.0);
        processor.process(&[1.0; 4], 4);

        let _held = processor.state.lock().unwrap();
        let reused = processor.process(&[0.2; 4], 4);
        assert_eq!(reused.source(), SpectrumSource::Reused);
        assert_eq!(reused.values(), &[1.0; 4]);

        let direct = processor.process(&[0.2; 4], 2);
        assert_eq!(direct.source(), SpectrumSource::Direct);
        assert_eq!(direct.values(), &[0.2; 2]);
    }

    #[test]
    fn try_latest_is_none_before_first_frame() {
        let processor = processor(0.3);
        assert!(processor.try_latest().is_none());
        processor.process(&[0.5; 4], 2);
        assert_eq!(processor.try_latest().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_callers_always_get_full_buffers() {
        let processor = Arc::new(processor(0.4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let processor = Arc::clone(&processor);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let processed = processor.process(&[0.7; 64], 16);
                        assert_eq!(processed.len(), 16);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn process_into_reuses_the_callers_buffer() {
        let processor = processor(1.0);
        let mut out = Vec::new();
        processor.process_into(&[0.25; 8], 4, &mut out);
        assert_eq!(out, vec![0.25; 4]);
    }
}
