//! Speech request submission: validation, the in-flight guard, and
//! folding the provider's answer back into the session.

use tracing::{error, info};

use crate::error::StudioError;
use crate::session::{KeyValueStore, Session};

pub const MISSING_INPUT: &str = "Please provide API key, text, and select a voice";

/// Everything one synthesis call needs, captured at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub api_key: String,
    pub voice: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct SpeechSubmitter {
    in_flight: bool,
}

impl SpeechSubmitter {
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Validate the session and mark a request in flight.
    ///
    /// Fails without side effects when any input is empty or a request
    /// is already outstanding.
    pub fn begin<S: KeyValueStore>(&mut self, session: &Session<S>) -> Result<SpeechRequest, StudioError> {
        let state = session.state();
        if state.api_key.is_empty() || state.text.is_empty() || state.selected_voice.is_empty() {
            return Err(StudioError::Validation(MISSING_INPUT.into()));
        }
        if self.in_flight {
            return Err(StudioError::Validation("A speech request is already running".into()));
        }

        self.in_flight = true;
        Ok(SpeechRequest {
            api_key: state.api_key.clone(),
            voice: state.selected_voice.clone(),
            text: state.text.clone(),
        })
    }

    /// Finish the outstanding request. On success the new audio URL is
    /// written to the session; on failure it is left as it was.
    pub fn finish<S: KeyValueStore>(
        &mut self,
        result: Result<String, StudioError>,
        session: &mut Session<S>,
    ) -> Result<String, String> {
        self.in_flight = false;
        match result {
            Ok(url) => {
                info!("Speech ready at {url}");
                session.set_audio_url(&url);
                Ok(url)
            }
            Err(e) => {
                error!("Speech request failed: {e}");
                Err(format!("Failed to generate speech: {}", e.user_message()))
            }
        }
    }
}
