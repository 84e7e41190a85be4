//! In-process stand-in for the Verbatik API, plus audio fixtures.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct TtsCall {
    pub voice: String,
    pub store_audio: String,
    pub content_type: String,
    pub body: String,
}

struct MockState {
    voices_status: u16,
    tts_status: u16,
    tts_body: String,
    last_auth: Option<String>,
    last_tts: Option<TtsCall>,
    voice_calls: usize,
    tts_calls: usize,
    audio_calls: usize,
}

/// Keys starting with `slow` answer late with a single `Stale` voice.
#[derive(Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                voices_status: 200,
                tts_status: 200,
                tts_body: r#"{"success": true, "audio_url": "https://x/a.mp3"}"#.into(),
                last_auth: None,
                last_tts: None,
                voice_calls: 0,
                tts_calls: 0,
                audio_calls: 0,
            })),
        }
    }
}

impl MockProvider {
    pub fn with_voices_status(self, status: u16) -> Self {
        self.state.lock().unwrap().voices_status = status;
        self
    }

    pub fn with_tts_reply(self, status: u16, body: impl Into<String>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.tts_status = status;
            state.tts_body = body.into();
        }
        self
    }

    pub fn last_auth(&self) -> Option<String> {
        self.state.lock().unwrap().last_auth.clone()
    }

    pub fn last_tts(&self) -> Option<TtsCall> {
        self.state.lock().unwrap().last_tts.clone()
    }

    pub fn voice_calls(&self) -> usize {
        self.state.lock().unwrap().voice_calls
    }

    pub fn tts_calls(&self) -> usize {
        self.state.lock().unwrap().tts_calls
    }

    pub fn audio_calls(&self) -> usize {
        self.state.lock().unwrap().audio_calls
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn handle_voices(State(mock): State<MockProvider>, headers: HeaderMap) -> impl IntoResponse {
    let auth = header_str(&headers, "authorization");
    let status = {
        let mut state = mock.state.lock().unwrap();
        state.voice_calls += 1;
        state.last_auth = Some(auth.clone());
        state.voices_status
    };

    if auth.starts_with("Bearer slow") {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let body = json!([{ "name": "Stale", "gender": "Male", "language_code": "de-DE" }]);
        return (StatusCode::OK, body.to_string());
    }

    let body = json!([
        { "name": "Aria", "gender": "Female", "language_code": "en-US" },
        { "name": "Ryan", "gender": "Male", "language_code": "en-GB" }
    ]);
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, body.to_string())
}

async fn handle_tts(
    State(mock): State<MockProvider>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let mut state = mock.state.lock().unwrap();
    state.tts_calls += 1;
    state.last_auth = Some(header_str(&headers, "authorization"));
    state.last_tts = Some(TtsCall {
        voice: header_str(&headers, "x-voice-id"),
        store_audio: header_str(&headers, "x-store-audio"),
        content_type: header_str(&headers, "content-type"),
        body,
    });
    let code = StatusCode::from_u16(state.tts_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, state.tts_body.clone())
}

/// Assets named `missing*` are gone (404); everything else is a short tone.
async fn handle_audio(State(mock): State<MockProvider>, Path(name): Path<String>) -> impl IntoResponse {
    mock.state.lock().unwrap().audio_calls += 1;
    if name.starts_with("missing") {
        return (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], b"gone".to_vec());
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav")], sine_wav(1000.0, 0.25))
}

/// Serve the mock on an ephemeral port and return its base URL.
pub async fn mock_provider(mock: MockProvider) -> String {
    let app = Router::new()
        .route("/voices", get(handle_voices))
        .route("/tts", post(handle_tts))
        .route("/audio/{name}", get(handle_audio))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on, for connection failures.
pub async fn unreachable_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Mono 16-bit WAV holding a sine tone.
pub fn sine_wav(freq: f32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total = (seconds * spec.sample_rate as f32) as usize;
        for n in 0..total {
            let t = n as f32 / spec.sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.8;
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
