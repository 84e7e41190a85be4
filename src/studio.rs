//! Application controller.
//!
//! Holds the session, the voice directory and the submitter, and runs
//! network calls on a tokio runtime. Completions come back over a channel
//! and are applied by `poll()` on the owning thread, so state has a
//! single owner and needs no locks.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{VerbatikClient, Voice};
use crate::directory::{FetchOutcome, FetchTicket, VoiceDirectory};
use crate::error::StudioError;
use crate::export;
use crate::session::{KeyValueStore, Session, SessionState};
use crate::submitter::SpeechSubmitter;

enum StudioEvent {
    VoicesFetched {
        ticket: FetchTicket,
        result: Result<Vec<Voice>, StudioError>,
    },
    SpeechFinished(Result<String, StudioError>),
    AudioFetched {
        url: String,
        result: Result<Vec<u8>, StudioError>,
    },
    AudioSaved(Result<PathBuf, StudioError>),
}

/// Encoded audio ready to be mounted by a playback controller.
#[derive(Debug)]
pub struct LoadedAudio {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// Progress of the last "save audio" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Saving,
    Saved(PathBuf),
    Failed(String),
}

pub struct Studio<S: KeyValueStore> {
    session: Session<S>,
    directory: VoiceDirectory,
    submitter: SpeechSubmitter,
    client: Arc<VerbatikClient>,
    runtime: Handle,
    tx: mpsc::UnboundedSender<StudioEvent>,
    rx: mpsc::UnboundedReceiver<StudioEvent>,
    error: String,
    pending_fetches: usize,
    loaded_audio: Option<LoadedAudio>,
    /// URL of the last asset handed over through `loaded_audio`.
    delivered_url: Option<String>,
    audio_error: Option<String>,
    export_status: Option<ExportStatus>,
}

impl<S: KeyValueStore> Studio<S> {
    /// Build the controller and kick off the startup fetches for whatever
    /// the session restored (voices for the API key, the last audio asset).
    pub fn new(session: Session<S>, client: VerbatikClient, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut studio = Self {
            session,
            directory: VoiceDirectory::default(),
            submitter: SpeechSubmitter::default(),
            client: Arc::new(client),
            runtime,
            tx,
            rx,
            error: String::new(),
            pending_fetches: 0,
            loaded_audio: None,
            delivered_url: None,
            audio_error: None,
            export_status: None,
        };
        studio.fetch_voices();
        studio.fetch_audio();
        studio
    }

    pub fn session(&self) -> &SessionState {
        self.session.state()
    }

    pub fn voices(&self) -> &[Voice] {
        self.directory.voices()
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_loading(&self) -> bool {
        self.submitter.is_loading()
    }

    /// Why the asset behind the current audio URL could not be loaded.
    pub fn audio_error(&self) -> Option<&str> {
        self.audio_error.as_deref()
    }

    pub fn export_status(&self) -> Option<&ExportStatus> {
        self.export_status.as_ref()
    }

    /// True while any request has not been applied yet.
    pub fn has_pending_work(&self) -> bool {
        self.submitter.is_loading() || self.pending_fetches > 0
    }

    pub fn set_api_key(&mut self, api_key: &str) {
        if self.session.state().api_key == api_key {
            return;
        }
        self.session.set_api_key(api_key);
        self.fetch_voices();
    }

    pub fn set_text(&mut self, text: &str) {
        if self.session.state().text != text {
            self.session.set_text(text);
        }
    }

    pub fn select_voice(&mut self, voice: &str) {
        if self.session.state().selected_voice != voice {
            self.session.set_selected_voice(voice);
        }
    }

    /// Submit the current text. Validation failures are reported right
    /// away and send nothing.
    pub fn generate(&mut self) {
        let request = match self.submitter.begin(&self.session) {
            Ok(request) => request,
            Err(e) => {
                warn!("Not submitting: {e}");
                self.error = e.user_message();
                return;
            }
        };
        self.error.clear();

        info!(
            "Submitting {} chars with voice {}",
            request.text.chars().count(),
            request.voice
        );
        let client = self.client.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = client
                .synthesize(&request.api_key, &request.voice, &request.text)
                .await;
            let _ = tx.send(StudioEvent::SpeechFinished(result));
        });
    }

    /// Download the current audio asset to `target` (a file, or a directory
    /// that gets the asset's own file name).
    pub fn save_audio(&mut self, target: PathBuf) {
        let url = self.session.state().audio_url.clone();
        if url.is_empty() {
            self.export_status = Some(ExportStatus::Failed("No audio to save".into()));
            return;
        }
        if self.export_status == Some(ExportStatus::Saving) {
            return;
        }
        self.export_status = Some(ExportStatus::Saving);
        self.pending_fetches += 1;

        let client = self.client.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = export::save_audio(&client, &url, &target).await;
            let _ = tx.send(StudioEvent::AudioSaved(result));
        });
    }

    /// Apply every completion that has arrived. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Hand over the most recently downloaded audio, once.
    pub fn take_loaded_audio(&mut self) -> Option<LoadedAudio> {
        self.loaded_audio.take()
    }

    fn apply(&mut self, event: StudioEvent) {
        match event {
            StudioEvent::VoicesFetched { ticket, result } => {
                self.pending_fetches = self.pending_fetches.saturating_sub(1);
                if let FetchOutcome::Failed(message) = self.directory.apply(ticket, result, &mut self.session) {
                    self.error = message;
                }
            }
            StudioEvent::SpeechFinished(result) => match self.submitter.finish(result, &mut self.session) {
                Ok(url) => {
                    self.error.clear();
                    if self.delivered_url.as_deref() == Some(url.as_str()) {
                        debug!("Audio for {url} is already loaded");
                    } else {
                        self.fetch_audio();
                    }
                }
                Err(message) => self.error = message,
            },
            StudioEvent::AudioFetched { url, result } => {
                self.pending_fetches = self.pending_fetches.saturating_sub(1);
                if url != self.session.state().audio_url {
                    debug!("Discarding audio for superseded URL {url}");
                    return;
                }
                match result {
                    Ok(bytes) => {
                        debug!("Downloaded {} bytes of audio", bytes.len());
                        self.audio_error = None;
                        self.delivered_url = Some(url.clone());
                        self.loaded_audio = Some(LoadedAudio { url, bytes });
                    }
                    Err(e) => {
                        warn!("Failed to download audio from {url}: {e}");
                        self.audio_error = Some(format!("Failed to load audio: {}", e.user_message()));
                        self.delivered_url = None;
                        self.loaded_audio = None;
                    }
                }
            }
            StudioEvent::AudioSaved(result) => {
                self.pending_fetches = self.pending_fetches.saturating_sub(1);
                self.export_status = Some(match result {
                    Ok(path) => ExportStatus::Saved(path),
                    Err(e) => {
                        warn!("Failed to save audio: {e}");
                        ExportStatus::Failed(format!("Failed to save audio: {}", e.user_message()))
                    }
                });
            }
        }
    }

    fn fetch_voices(&mut self) {
        let api_key = self.session.state().api_key.clone();
        let Some(ticket) = self.directory.begin_fetch(&api_key) else {
            return;
        };
        self.pending_fetches += 1;

        let client = self.client.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = client.list_voices(&api_key).await;
            let _ = tx.send(StudioEvent::VoicesFetched { ticket, result });
        });
    }

    fn fetch_audio(&mut self) {
        let url = self.session.state().audio_url.clone();
        if url.is_empty() {
            return;
        }
        self.pending_fetches += 1;

        let client = self.client.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_audio(&url).await;
            let _ = tx.send(StudioEvent::AudioFetched { url, result });
        });
    }
}
