//! verbatik-studio: desktop and CLI client for the Verbatik text-to-speech API.

mod analyser;
mod api;
mod cli;
mod config;
mod directory;
mod error;
mod export;
#[cfg(feature = "gui")]
mod gui;
mod playback;
mod session;
mod studio;
mod submitter;
#[cfg(test)]
mod test_support;
mod visualizer;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "verbatik-studio", about = "Text-to-speech studio for the Verbatik API")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API key to use (and remember) instead of the stored one
    #[arg(long, env = "VERBATIK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the studio window (default)
    Gui,
    /// List the voices available to the API key
    Voices,
    /// Synthesize text (argument or stdin) and print the audio URL
    Speak {
        text: Option<String>,

        /// Voice name; defaults to the remembered selection
        #[arg(long)]
        voice: Option<String>,

        /// Play the result on the default output device
        #[arg(long)]
        play: bool,

        /// Save the audio to this file (or into this directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (keep windowing and HTTP internals quiet)
    let filter = if args.verbose {
        EnvFilter::new("debug,eframe=info,egui_glow=info,winit=info,reqwest=info,hyper=info")
    } else {
        EnvFilter::new("info,eframe=warn,egui_glow=warn,winit=warn,reqwest=warn,hyper=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("verbatik-studio starting");

    let config = config::Config::load(args.config.as_deref());
    info!("API endpoint: {}", config.api.base_url);

    let store = session::FileStore::open(config.storage.resolved_state_path());
    info!("Session file: {}", store.path().display());
    let mut session = session::Session::load(store);
    if let Some(key) = args.api_key.as_deref() {
        session.set_api_key(key.trim());
    }

    let client = api::VerbatikClient::new(config.api.clone())?;

    match args.command.unwrap_or(Command::Gui) {
        Command::Gui => run_gui(config, session, client),
        Command::Voices => cli::list_voices(&client, &mut session).await,
        Command::Speak {
            text,
            voice,
            play,
            output,
        } => {
            let output = cli::Output {
                play,
                save_to: output,
            };
            cli::speak(&client, &mut session, text, voice, output, &config.visualizer).await
        }
    }
}

#[cfg(feature = "gui")]
fn run_gui(
    config: config::Config,
    session: session::Session<session::FileStore>,
    client: api::VerbatikClient,
) -> Result<(), Box<dyn std::error::Error>> {
    use eframe::egui;

    let studio = studio::Studio::new(session, client, tokio::runtime::Handle::current());
    let app = gui::StudioApp::new(studio, &config);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title("Verbatik Studio"),
        ..Default::default()
    };

    // The window owns this thread until it closes; requests keep running
    // on the other runtime workers.
    tokio::task::block_in_place(|| {
        eframe::run_native(
            "verbatik-studio",
            options,
            Box::new(move |cc| {
                cc.egui_ctx.set_visuals(egui::Visuals::light());
                Ok(Box::new(app))
            }),
        )
    })?;
    Ok(())
}

#[cfg(not(feature = "gui"))]
fn run_gui(
    _config: config::Config,
    _session: session::Session<session::FileStore>,
    _client: api::VerbatikClient,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `gui` feature; use `voices` or `speak`".into())
}
