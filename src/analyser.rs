//! Frequency analyser over the samples currently being played.
//!
//! Mirrors the byte frequency output of a Web Audio `AnalyserNode`:
//! Blackman window over the last `fft_size` samples, forward FFT,
//! magnitude scaled by `1/fft_size`, exponential smoothing across reads,
//! then dB mapped linearly from `[min_decibels, max_decibels]` to `0..=255`.
//!
//! `AnalyserTap` sits in the playback chain and copies each down-mixed
//! frame into the analyser without altering the audio.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rodio::source::SeekError;
use rodio::{ChannelCount, Sample, SampleRate, Source};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::VisualizerConfig;
use crate::error::{Result, StudioError};

/// Samples are handed to the shared ring in batches of this size.
const PUSH_BATCH: usize = 64;

struct Ring {
    buf: Vec<f32>,
    /// Index of the oldest sample, i.e. the next slot to overwrite.
    write: usize,
}

struct Inner {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    ring: Mutex<Ring>,
    smoothed: Mutex<Vec<f32>>,
}

/// Cheap to clone; clones share the same sample ring.
#[derive(Clone)]
pub struct FrequencyAnalyser {
    inner: Arc<Inner>,
}

impl FrequencyAnalyser {
    pub fn new(config: &VisualizerConfig) -> Result<Self> {
        let n = config.fft_size;
        if !n.is_power_of_two() || !(32..=32768).contains(&n) {
            return Err(StudioError::Audio(format!(
                "fft_size must be a power of two in 32..=32768, got {n}"
            )));
        }
        if !(0.0..=1.0).contains(&config.smoothing) {
            return Err(StudioError::Audio(format!(
                "smoothing must be within 0..=1, got {}",
                config.smoothing
            )));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(StudioError::Audio("min_decibels must be below max_decibels".into()));
        }

        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
                    + 0.08 * (4.0 * std::f32::consts::PI * x).cos()
            })
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);

        Ok(Self {
            inner: Arc::new(Inner {
                fft_size: n,
                smoothing: config.smoothing,
                min_decibels: config.min_decibels,
                max_decibels: config.max_decibels,
                window,
                fft,
                ring: Mutex::new(Ring {
                    buf: vec![0.0; n],
                    write: 0,
                }),
                smoothed: Mutex::new(vec![0.0; n / 2]),
            }),
        })
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.inner.fft_size / 2
    }

    /// True when both handles read the same sample ring.
    pub fn is_same(&self, other: &FrequencyAnalyser) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn push_samples(&self, samples: &[f32]) {
        let mut ring = self.inner.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let n = ring.buf.len();
        for &s in samples {
            let w = ring.write;
            ring.buf[w] = s;
            ring.write = (w + 1) % n;
        }
    }

    /// Fill `out` with the current byte magnitudes, one per bin.
    /// Extra slots in `out` are left untouched.
    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        let inner = &self.inner;
        let n = inner.fft_size;

        let mut buffer: Vec<Complex<f32>> = {
            let ring = inner.ring.lock().unwrap_or_else(PoisonError::into_inner);
            ring.buf[ring.write..]
                .iter()
                .chain(&ring.buf[..ring.write])
                .zip(&inner.window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect()
        };
        inner.fft.process(&mut buffer);

        let mut smoothed = inner.smoothed.lock().unwrap_or_else(PoisonError::into_inner);
        let scale = 255.0 / (inner.max_decibels - inner.min_decibels);
        for (k, slot) in out.iter_mut().take(n / 2).enumerate() {
            let magnitude = buffer[k].norm() / n as f32;
            let value = inner.smoothing * smoothed[k] + (1.0 - inner.smoothing) * magnitude;
            smoothed[k] = value;

            *slot = if value > 0.0 {
                let db = 20.0 * value.log10();
                (scale * (db - inner.min_decibels)).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    #[cfg(test)]
    fn recent_samples(&self) -> Vec<f32> {
        let ring = self.inner.ring.lock().unwrap();
        ring.buf[ring.write..]
            .iter()
            .chain(&ring.buf[..ring.write])
            .copied()
            .collect()
    }
}

/// Pass-through `Source` that feeds a mono mix of every frame to an analyser.
pub struct AnalyserTap<S> {
    inner: S,
    analyser: FrequencyAnalyser,
    frame_sum: f32,
    frame_len: usize,
    pending: Vec<f32>,
}

impl<S: Source> AnalyserTap<S> {
    pub fn new(inner: S, analyser: FrequencyAnalyser) -> Self {
        Self {
            inner,
            analyser,
            frame_sum: 0.0,
            frame_len: 0,
            pending: Vec::with_capacity(PUSH_BATCH),
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.analyser.push_samples(&self.pending);
            self.pending.clear();
        }
    }
}

impl<S: Source> Iterator for AnalyserTap<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let Some(sample) = self.inner.next() else {
            self.flush();
            return None;
        };

        self.frame_sum += sample;
        self.frame_len += 1;
        let channels = self.inner.channels().max(1) as usize;
        if self.frame_len >= channels {
            self.pending.push(self.frame_sum / self.frame_len as f32);
            self.frame_sum = 0.0;
            self.frame_len = 0;
            if self.pending.len() >= PUSH_BATCH {
                self.flush();
            }
        }

        Some(sample)
    }
}

impl<S: Source> Source for AnalyserTap<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> std::result::Result<(), SeekError> {
        self.inner.try_seek(pos)
    }
}
