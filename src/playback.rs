//! Playback controller: one decoded source at a time, play/pause, and
//! transition reports so the spectrum view can follow along.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::{debug, info, warn};

use crate::analyser::{AnalyserTap, FrequencyAnalyser};
use crate::config::VisualizerConfig;
use crate::error::{Result, StudioError};

pub type MountedSource = AnalyserTap<Decoder<Cursor<Vec<u8>>>>;

/// Where decoded audio ends up. `RodioOutput` is the real device.
pub trait AudioOutput {
    /// Replace whatever is loaded with `source`, paused.
    fn load(&mut self, source: MountedSource);
    fn play(&mut self);
    fn pause(&mut self);
    /// True once the loaded source has been fully played (or nothing is loaded).
    fn is_drained(&self) -> bool;
    fn clear(&mut self);
}

pub struct RodioOutput {
    stream: OutputStream,
    sink: Option<Sink>,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| StudioError::Audio(format!("Failed to open audio output: {e}")))?;
        Ok(Self { stream, sink: None })
    }
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, source: MountedSource) {
        self.clear();
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);
        self.sink = Some(sink);
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn is_drained(&self) -> bool {
        self.sink.as_ref().map_or(true, Sink::empty)
    }

    fn clear(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
}

pub struct PlaybackController<O: AudioOutput> {
    output: O,
    config: VisualizerConfig,
    source_url: Option<String>,
    /// Encoded bytes and analyser of the mounted source, kept for rewinding.
    loaded: Option<(Vec<u8>, FrequencyAnalyser)>,
    playing: bool,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O, config: VisualizerConfig) -> Self {
        Self {
            output,
            config,
            source_url: None,
            loaded: None,
            playing: false,
        }
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Decode `bytes` and load them paused, replacing the current source.
    ///
    /// Returns the analyser fed by the new source. A mount that fails to
    /// decode leaves the previous source in place.
    pub fn mount(&mut self, url: &str, bytes: Vec<u8>) -> Result<(FrequencyAnalyser, Option<Transition>)> {
        let decoder = decode(url, bytes.clone())?;
        let analyser = FrequencyAnalyser::new(&self.config)?;

        let transition = self.stop();
        self.output.load(AnalyserTap::new(decoder, analyser.clone()));
        self.source_url = Some(url.to_string());
        self.loaded = Some((bytes, analyser.clone()));
        info!("Mounted audio from {url}");

        Ok((analyser, transition))
    }

    pub fn play(&mut self) -> Option<Transition> {
        if self.playing || self.source_url.is_none() {
            return None;
        }
        self.output.play();
        self.playing = true;
        debug!("Playback started");
        Some(Transition::Started)
    }

    pub fn pause(&mut self) -> Option<Transition> {
        if !self.playing {
            return None;
        }
        self.output.pause();
        self.playing = false;
        debug!("Playback paused");
        Some(Transition::Stopped)
    }

    pub fn toggle(&mut self) -> Option<Transition> {
        if self.playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Report the end of the track and rewind to the start, paused.
    pub fn poll(&mut self) -> Option<Transition> {
        if !self.playing || !self.output.is_drained() {
            return None;
        }
        self.playing = false;
        debug!("Playback finished");

        let rewound = match (&self.source_url, &self.loaded) {
            (Some(url), Some((bytes, analyser))) => decode(url, bytes.clone())
                .map(|decoder| AnalyserTap::new(decoder, analyser.clone())),
            _ => Err(StudioError::Audio("nothing mounted".into())),
        };
        match rewound {
            Ok(source) => self.output.load(source),
            Err(e) => {
                warn!("Cannot rewind: {e}");
                self.stop();
            }
        }
        Some(Transition::Stopped)
    }

    /// Drop the mounted source. Play is refused until the next mount.
    pub fn eject(&mut self) -> Option<Transition> {
        if let Some(url) = &self.source_url {
            info!("Ejecting audio from {url}");
        }
        self.stop()
    }

    fn stop(&mut self) -> Option<Transition> {
        self.output.clear();
        self.source_url = None;
        self.loaded = None;
        if self.playing {
            self.playing = false;
            Some(Transition::Stopped)
        } else {
            None
        }
    }
}

fn decode(url: &str, bytes: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>> {
    Decoder::new(Cursor::new(bytes)).map_err(|e| StudioError::Audio(format!("Cannot decode {url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sine_wav;

    /// Plays by draining the source on demand.
    #[derive(Default)]
    struct FakeOutput {
        source: Option<MountedSource>,
        playing: bool,
        drained: bool,
        loads: usize,
    }

    impl FakeOutput {
        fn render(&mut self, samples: usize) {
            if !self.playing {
                return;
            }
            if let Some(source) = &mut self.source {
                let rendered = source.by_ref().take(samples).count();
                if rendered < samples {
                    self.drained = true;
                }
            }
        }
    }

    impl AudioOutput for FakeOutput {
        fn load(&mut self, source: MountedSource) {
            self.source = Some(source);
            self.playing = false;
            self.drained = false;
            self.loads += 1;
        }

        fn play(&mut self) {
            self.playing = true;
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn is_drained(&self) -> bool {
            self.source.is_none() || self.drained
        }

        fn clear(&mut self) {
            self.source = None;
            self.playing = false;
        }
    }

    fn controller() -> PlaybackController<FakeOutput> {
        PlaybackController::new(FakeOutput::default(), VisualizerConfig::default())
    }

    #[test]
    fn play_without_source_does_nothing() {
        let mut player = controller();
        assert_eq!(player.play(), None);
        assert!(!player.is_playing());
    }

    #[test]
    fn mount_loads_paused_and_toggles() {
        let mut player = controller();
        let (_, transition) = player.mount("https://x/a.wav", sine_wav(440.0, 0.1)).unwrap();
        assert_eq!(transition, None);
        assert_eq!(player.source_url(), Some("https://x/a.wav"));
        assert!(!player.is_playing());

        assert_eq!(player.toggle(), Some(Transition::Started));
        assert_eq!(player.play(), None);
        assert_eq!(player.toggle(), Some(Transition::Stopped));
        assert_eq!(player.pause(), None);
    }

    #[test]
    fn remount_while_playing_reports_stop() {
        let mut player = controller();
        player.mount("https://x/a.wav", sine_wav(440.0, 0.1)).unwrap();
        player.play();

        let (_, transition) = player.mount("https://x/b.wav", sine_wav(880.0, 0.1)).unwrap();
        assert_eq!(transition, Some(Transition::Stopped));
        assert_eq!(player.output.loads, 2);
        assert!(!player.is_playing());
    }

    #[test]
    fn undecodable_bytes_keep_previous_source() {
        let mut player = controller();
        player.mount("https://x/a.wav", sine_wav(440.0, 0.1)).unwrap();

        let err = player.mount("https://x/bad.mp3", b"not audio".to_vec());
        assert!(matches!(err, Err(StudioError::Audio(_))));
        assert_eq!(player.source_url(), Some("https://x/a.wav"));
    }

    #[test]
    fn eject_stops_and_forgets_the_source() {
        let mut player = controller();
        player.mount("https://x/a.wav", sine_wav(440.0, 0.1)).unwrap();
        player.play();

        assert_eq!(player.eject(), Some(Transition::Stopped));
        assert_eq!(player.source_url(), None);
        assert!(player.output.source.is_none());
        assert_eq!(player.play(), None);
        assert_eq!(player.eject(), None);
    }

    #[test]
    fn playing_feeds_the_analyser() {
        let mut player = controller();
        let (analyser, _) = player.mount("https://x/a.wav", sine_wav(1500.0, 0.1)).unwrap();
        player.play();
        player.output.render(1024);

        let mut bins = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().any(|&b| b > 0));
    }

    #[test]
    fn end_of_track_reports_stop_once_and_rewinds() {
        let mut player = controller();
        player.mount("https://x/a.wav", sine_wav(440.0, 0.1)).unwrap();
        player.play();
        player.output.render(1024);
        assert_eq!(player.poll(), None);

        // 0.1s at 24kHz is 2400 samples.
        player.output.render(4096);
        assert_eq!(player.poll(), Some(Transition::Stopped));
        assert_eq!(player.poll(), None);
        assert_eq!(player.source_url(), Some("https://x/a.wav"));
        assert_eq!(player.output.loads, 2);
        assert_eq!(player.play(), Some(Transition::Started));
    }
}
