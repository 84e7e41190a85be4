//! Spectrum visualizer.
//!
//! Owns at most one audio graph (the analyser of the mounted source),
//! keyed by source URL, and a frame loop that stays scheduled while
//! playback runs. Each frame reads one analyser snapshot and lays out
//! one bar per bin, bottom-anchored, left to right:
//!
//! ```text
//! bar_width = surface_width / bins * bar_scale
//! height_i  = magnitude_i / height_divisor
//! x_{i+1}   = x_i + bar_width + bar_gap
//! ```
//!
//! Frames carry no state between them, so a skipped frame just means the
//! next one reads a fresher snapshot. The last laid-out frame is kept so a
//! paused canvas keeps showing it.

use tracing::debug;

use crate::analyser::FrequencyAnalyser;
use crate::config::VisualizerConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn parse(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

/// One filled rectangle, in surface coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Two-stop vertical gradient spanning the full surface height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    pub top: Rgb,
    pub bottom: Rgb,
}

impl Gradient {
    pub fn from_config(config: &VisualizerConfig) -> Self {
        let defaults = VisualizerConfig::default();
        let pick = |value: &str, fallback: &str| {
            Rgb::parse(value).unwrap_or_else(|| {
                debug!("Invalid gradient colour {value:?}, using {fallback}");
                Rgb::parse(fallback).unwrap_or(Rgb(0, 0, 0))
            })
        };
        Self {
            top: pick(&config.gradient_top, &defaults.gradient_top),
            bottom: pick(&config.gradient_bottom, &defaults.gradient_bottom),
        }
    }

    /// Colour at `y` on a surface `height` tall.
    pub fn at(&self, y: f32, height: f32) -> Rgb {
        if height <= 0.0 {
            return self.top;
        }
        self.top.lerp(self.bottom, (y / height).clamp(0.0, 1.0))
    }
}

pub fn layout_bars(magnitudes: &[u8], width: f32, height: f32, config: &VisualizerConfig) -> Vec<Bar> {
    if magnitudes.is_empty() {
        return Vec::new();
    }
    let bar_width = (width / magnitudes.len() as f32) * config.bar_scale;
    let mut x = 0.0;
    magnitudes
        .iter()
        .map(|&m| {
            let bar_height = m as f32 / config.height_divisor;
            let bar = Bar {
                x,
                y: height - bar_height,
                width: bar_width,
                height: bar_height,
            };
            x += bar_width + config.bar_gap;
            bar
        })
        .collect()
}

/// Self-rescheduling frame callback chain, reduced to its state.
#[derive(Debug, Default)]
struct FrameLoop {
    scheduled: bool,
    frames: u64,
}

impl FrameLoop {
    fn start(&mut self) {
        if !self.scheduled {
            debug!("Spectrum frame loop started");
        }
        self.scheduled = true;
    }

    fn cancel(&mut self) {
        if self.scheduled {
            debug!("Spectrum frame loop cancelled after {} frames", self.frames);
        }
        self.scheduled = false;
        self.frames = 0;
    }
}

struct AudioGraph {
    source_url: String,
    analyser: FrequencyAnalyser,
}

pub struct SpectrumVisualizer {
    config: VisualizerConfig,
    gradient: Gradient,
    graph: Option<AudioGraph>,
    frame_loop: FrameLoop,
    magnitudes: Vec<u8>,
    last_frame: Vec<Bar>,
}

impl SpectrumVisualizer {
    pub fn new(config: VisualizerConfig) -> Self {
        Self {
            gradient: Gradient::from_config(&config),
            config,
            graph: None,
            frame_loop: FrameLoop::default(),
            magnitudes: Vec::new(),
            last_frame: Vec::new(),
        }
    }

    pub fn gradient(&self) -> Gradient {
        self.gradient
    }

    /// Bind the analyser of `source_url`. Built once per source: attaching
    /// the same URL again keeps the graph and the frame loop, only swapping
    /// in `analyser` if it is not the one already bound. A different URL
    /// tears the old graph down first.
    pub fn attach(&mut self, source_url: &str, analyser: FrequencyAnalyser) {
        if let Some(graph) = self.graph.as_mut().filter(|g| g.source_url == source_url) {
            if !graph.analyser.is_same(&analyser) {
                debug!("Rebinding spectrum of {source_url} to a new analyser");
                self.magnitudes = vec![0; analyser.frequency_bin_count()];
                graph.analyser = analyser;
            }
            return;
        }
        self.teardown();
        self.magnitudes = vec![0; analyser.frequency_bin_count()];
        self.graph = Some(AudioGraph {
            source_url: source_url.to_string(),
            analyser,
        });
    }

    pub fn source_url(&self) -> Option<&str> {
        self.graph.as_ref().map(|g| g.source_url.as_str())
    }

    /// Start or stop the frame loop. Starting needs a graph.
    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.graph.is_some() {
            self.frame_loop.start();
        } else {
            self.frame_loop.cancel();
        }
    }

    /// Cancel the frame loop, drop the graph and clear the last frame.
    pub fn teardown(&mut self) {
        self.frame_loop.cancel();
        self.graph = None;
        self.last_frame.clear();
    }

    /// Bars of the most recent frame; left in place when the loop stops.
    pub fn last_frame(&self) -> &[Bar] {
        &self.last_frame
    }

    /// Whether another frame should be requested from the host.
    pub fn is_scheduled(&self) -> bool {
        self.frame_loop.scheduled
    }

    #[cfg(test)]
    pub fn frames_drawn(&self) -> u64 {
        self.frame_loop.frames
    }

    /// Run one frame. `None` means nothing to draw: the loop is not
    /// scheduled, there is no graph, or the surface has no area.
    pub fn next_frame(&mut self, width: f32, height: f32) -> Option<Vec<Bar>> {
        if !self.frame_loop.scheduled || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let graph = self.graph.as_ref()?;

        graph.analyser.byte_frequency_data(&mut self.magnitudes);
        self.frame_loop.frames += 1;
        self.last_frame = layout_bars(&self.magnitudes, width, height, &self.config);
        Some(self.last_frame.clone())
    }
}
