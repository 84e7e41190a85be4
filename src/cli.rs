//! Headless commands: list voices, synthesize text, then optionally save
//! and play the result.
//!
//! These go through the same directory, submitter and session types as
//! the window, so validation and persisted state behave identically.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::info;

use crate::api::VerbatikClient;
use crate::config::VisualizerConfig;
use crate::directory::{FetchOutcome, VoiceDirectory};
use crate::export;
use crate::playback::{PlaybackController, RodioOutput};
use crate::session::{KeyValueStore, Session};
use crate::submitter::SpeechSubmitter;

pub async fn list_voices<S: KeyValueStore>(
    client: &VerbatikClient,
    session: &mut Session<S>,
) -> Result<(), Box<dyn Error>> {
    let api_key = session.state().api_key.clone();
    let mut directory = VoiceDirectory::default();
    let ticket = directory
        .begin_fetch(&api_key)
        .ok_or("No API key: pass --api-key or set VERBATIK_API_KEY")?;

    let result = client.list_voices(&api_key).await;
    if let FetchOutcome::Failed(message) = directory.apply(ticket, result, session) {
        return Err(message.into());
    }

    let selected = &session.state().selected_voice;
    for voice in directory.voices() {
        let marker = if &voice.name == selected { "*" } else { " " };
        println!("{marker} {}", voice.label());
    }
    Ok(())
}

/// What `speak` does with the audio once it has a URL.
#[derive(Debug, Default)]
pub struct Output {
    pub play: bool,
    pub save_to: Option<PathBuf>,
}

pub async fn speak<S: KeyValueStore>(
    client: &VerbatikClient,
    session: &mut Session<S>,
    text: Option<String>,
    voice: Option<String>,
    output: Output,
    visualizer: &VisualizerConfig,
) -> Result<(), Box<dyn Error>> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    session.set_text(&text);
    if let Some(voice) = voice {
        session.set_selected_voice(&voice);
    }

    let mut submitter = SpeechSubmitter::default();
    let request = submitter.begin(session).map_err(|e| e.user_message())?;
    info!("Synthesizing {} chars with voice {}", request.text.chars().count(), request.voice);

    let result = client
        .synthesize(&request.api_key, &request.voice, &request.text)
        .await;
    let url = submitter.finish(result, session)?;
    println!("{url}");

    if !output.play && output.save_to.is_none() {
        return Ok(());
    }
    let bytes = client.fetch_audio(&url).await?;
    if let Some(target) = &output.save_to {
        let path = export::write_audio(target, &url, &bytes).await?;
        println!("Saved to {}", path.display());
    }
    if output.play {
        play_to_end(url, bytes, visualizer.clone()).await?;
    }
    Ok(())
}

/// Play one asset on the default device and return when it has finished.
async fn play_to_end(url: String, bytes: Vec<u8>, config: VisualizerConfig) -> Result<(), Box<dyn Error>> {
    tokio::task::spawn_blocking(move || {
        let mut player = PlaybackController::new(RodioOutput::open_default()?, config);
        player.mount(&url, bytes)?;
        player.play();
        info!("Playing {url}");
        while player.poll().is_none() {
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok::<_, crate::error::StudioError>(())
    })
    .await??;
    Ok(())
}
