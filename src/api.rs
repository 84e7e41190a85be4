//! HTTP client for the Verbatik text-to-speech API.
//!
//! Two authenticated calls (voice listing and synthesis) plus a plain
//! download of the stored audio asset. No retries: every failure is
//! handed back to the caller as a `StudioError`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{Result, StudioError};

/// A synthetic speaker offered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Voice {
    pub name: String,
    pub gender: String,
    pub language_code: String,
}

impl Voice {
    pub fn label(&self) -> String {
        format!("{} ({}, {})", self.name, self.gender, self.language_code)
    }
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct VerbatikClient {
    config: ApiConfig,
    client: Client,
}

impl VerbatikClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// GET /voices
    pub async fn list_voices(&self, api_key: &str) -> Result<Vec<Voice>> {
        let resp = self
            .client
            .get(self.endpoint("voices"))
            .bearer_auth(api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StudioError::Http {
                status: status.as_u16(),
                message: None,
            });
        }

        let bytes = resp.bytes().await?;
        let voices: Vec<Voice> = serde_json::from_slice(&bytes)
            .map_err(|e| StudioError::Contract(format!("Malformed voice list: {e}")))?;
        debug!("Fetched {} voices", voices.len());
        Ok(voices)
    }

    /// POST /tts with the raw text as body. Returns the stored audio URL.
    pub async fn synthesize(&self, api_key: &str, voice: &str, text: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("tts"))
            .bearer_auth(api_key)
            .header("X-Voice-ID", voice)
            .header("X-Store-Audio", self.config.store_audio.to_string())
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(text.to_string())
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(|b| b.message);
            warn!("Synthesis returned status {status}");
            return Err(StudioError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: SpeechResponse = serde_json::from_slice(&bytes)
            .map_err(|e| StudioError::Contract(format!("Malformed synthesis response: {e}")))?;

        match body.audio_url {
            Some(url) if body.success && !url.is_empty() => Ok(url),
            _ => {
                if let Some(message) = body.message {
                    debug!("Synthesis reported: {message}");
                }
                Err(StudioError::Contract("No audio URL returned".into()))
            }
        }
    }

    /// Download the audio asset behind a URL returned by `synthesize`.
    pub async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StudioError::Http {
                status: status.as_u16(),
                message: None,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
