//! egui window: form, player controls and the spectrum canvas.

use std::time::Duration;

use eframe::egui;
use tracing::warn;

use crate::config::{Config, VisualizerConfig};
use crate::export;
use crate::playback::{PlaybackController, RodioOutput, Transition};
use crate::session::FileStore;
use crate::studio::{ExportStatus, Studio};
use crate::visualizer::{Bar, Gradient, Rgb, SpectrumVisualizer};

const CANVAS_BG: egui::Color32 = egui::Color32::from_rgb(0xF3, 0xF4, 0xF6);
const ERROR_FG: egui::Color32 = egui::Color32::from_rgb(0xDC, 0x26, 0x26);

pub struct StudioApp {
    studio: Studio<FileStore>,
    player: Option<PlaybackController<RodioOutput>>,
    visualizer: SpectrumVisualizer,
    visualizer_config: VisualizerConfig,
    api_key: String,
    text: String,
    audio_error: Option<String>,
}

impl StudioApp {
    pub fn new(studio: Studio<FileStore>, config: &Config) -> Self {
        let player = match RodioOutput::open_default() {
            Ok(output) => Some(PlaybackController::new(output, config.visualizer.clone())),
            Err(e) => {
                warn!("Playback disabled: {e}");
                None
            }
        };

        Self {
            api_key: studio.session().api_key.clone(),
            text: studio.session().text.clone(),
            studio,
            player,
            visualizer: SpectrumVisualizer::new(config.visualizer.clone()),
            visualizer_config: config.visualizer.clone(),
            audio_error: None,
        }
    }

    fn on_transition(&mut self, transition: Transition) {
        self.visualizer.set_playing(transition == Transition::Started);
    }

    fn mount_loaded_audio(&mut self) {
        let Some(audio) = self.studio.take_loaded_audio() else {
            return;
        };
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if player.source_url() == Some(audio.url.as_str()) {
            return;
        }
        match player.mount(&audio.url, audio.bytes) {
            Ok((analyser, transition)) => {
                self.audio_error = None;
                self.visualizer.attach(&audio.url, analyser);
                if let Some(t) = transition {
                    self.on_transition(t);
                }
            }
            Err(e) => {
                warn!("{e}");
                self.audio_error = Some(e.user_message());
            }
        }
    }

    /// A source the session has moved away from is not offered for play.
    fn drop_superseded_source(&mut self) {
        if self.studio.audio_error().is_none() {
            return;
        }
        let current = self.studio.session().audio_url.as_str();
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if player.source_url().is_some_and(|url| url != current) {
            let transition = player.eject();
            self.visualizer.teardown();
            if let Some(t) = transition {
                self.on_transition(t);
            }
        }
    }

    fn choose_save_target(&mut self) {
        let suggested = export::suggested_file_name(&self.studio.session().audio_url);
        let Some(path) = rfd::FileDialog::new()
            .set_title("Save audio")
            .set_file_name(suggested)
            .save_file()
        else {
            return;
        };
        self.studio.save_audio(path);
    }

    fn render_form(&mut self, ui: &mut egui::Ui) {
        ui.label("API Key");
        let key = ui.add(
            egui::TextEdit::singleline(&mut self.api_key)
                .password(true)
                .hint_text("Enter your Verbatik API key")
                .desired_width(f32::INFINITY),
        );
        if key.changed() {
            self.studio.set_api_key(self.api_key.trim());
        }
        ui.add_space(12.0);

        self.render_voice_selector(ui);
        ui.add_space(12.0);

        ui.label("Text to Convert");
        let text = ui.add(
            egui::TextEdit::multiline(&mut self.text)
                .hint_text("Enter the text you want to convert to speech...")
                .desired_rows(5)
                .desired_width(f32::INFINITY),
        );
        if text.changed() {
            self.studio.set_text(&self.text);
        }
        ui.add_space(8.0);

        let loading = self.studio.is_loading();
        ui.horizontal(|ui| {
            let label = if loading { "Generating..." } else { "Generate Speech" };
            if ui.add_enabled(!loading, egui::Button::new(label)).clicked() {
                self.studio.generate();
            }
            if loading {
                ui.add(egui::Spinner::new());
            }
        });

        if !self.studio.error().is_empty() {
            ui.add_space(8.0);
            ui.colored_label(ERROR_FG, self.studio.error());
        }
    }

    fn render_voice_selector(&mut self, ui: &mut egui::Ui) {
        ui.label("Select Voice");
        if self.studio.voices().is_empty() {
            ui.weak("Voices load once an API key is entered");
            return;
        }

        let mut selected = self.studio.session().selected_voice.clone();
        let current = self
            .studio
            .voices()
            .iter()
            .find(|v| v.name == selected)
            .map(|v| v.label())
            .unwrap_or_else(|| selected.clone());

        egui::ComboBox::from_id_salt("voice-select")
            .selected_text(current)
            .width(ui.available_width())
            .show_ui(ui, |ui| {
                for voice in self.studio.voices() {
                    ui.selectable_value(&mut selected, voice.name.clone(), voice.label());
                }
            });
        self.studio.select_voice(&selected);
    }

    fn render_player(&mut self, ui: &mut egui::Ui) {
        if self.studio.session().audio_url.is_empty() {
            return;
        }
        ui.separator();

        let mut transition = None;
        let mut save_clicked = false;
        let audio_failed = self.studio.audio_error().is_some();
        let saving = self.studio.export_status() == Some(&ExportStatus::Saving);
        ui.horizontal(|ui| {
            match self.player.as_mut() {
                Some(player) if player.source_url().is_some() => {
                    let label = if player.is_playing() { "Pause" } else { "Play" };
                    if ui.button(label).clicked() {
                        transition = player.toggle();
                    }
                }
                Some(_) if audio_failed => {}
                Some(_) => {
                    ui.weak("Loading audio...");
                }
                None => {
                    ui.weak("No audio output device");
                }
            }
            let label = if saving { "Saving..." } else { "Download" };
            save_clicked = ui.add_enabled(!saving, egui::Button::new(label)).clicked();
        });
        if let Some(t) = transition {
            self.on_transition(t);
        }
        if save_clicked {
            self.choose_save_target();
        }
        if let Some(message) = self.studio.audio_error().or(self.audio_error.as_deref()) {
            ui.colored_label(ERROR_FG, message);
        }
        match self.studio.export_status() {
            Some(ExportStatus::Saved(path)) => {
                ui.weak(format!("Saved to {}", path.display()));
            }
            Some(ExportStatus::Failed(message)) => {
                ui.colored_label(ERROR_FG, message);
            }
            _ => {}
        }

        ui.add_space(8.0);
        let size = egui::vec2(
            ui.available_width().min(self.visualizer_config.width),
            self.visualizer_config.height,
        );
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 8.0, CANVAS_BG);

        match self.visualizer.next_frame(rect.width(), rect.height()) {
            Some(bars) => paint_bars(&painter, rect, &bars, self.visualizer.gradient()),
            None => paint_bars(&painter, rect, self.visualizer.last_frame(), self.visualizer.gradient()),
        }
    }
}

fn color(rgb: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(rgb.0, rgb.1, rgb.2)
}

/// Bars as one mesh; vertex colours sample the surface-wide gradient.
fn paint_bars(painter: &egui::Painter, rect: egui::Rect, bars: &[Bar], gradient: Gradient) {
    let height = rect.height();
    let mut mesh = egui::Mesh::default();
    for bar in bars.iter().filter(|b| b.height > 0.0 && b.x < rect.width()) {
        let top = color(gradient.at(bar.y, height));
        let bottom = color(gradient.at(height, height));
        let min = rect.min + egui::vec2(bar.x, bar.y);
        let max = min + egui::vec2(bar.width, bar.height);

        let base = mesh.vertices.len() as u32;
        mesh.colored_vertex(min, top);
        mesh.colored_vertex(egui::pos2(max.x, min.y), top);
        mesh.colored_vertex(max, bottom);
        mesh.colored_vertex(egui::pos2(min.x, max.y), bottom);
        mesh.add_triangle(base, base + 1, base + 2);
        mesh.add_triangle(base, base + 2, base + 3);
    }
    painter.add(egui::Shape::mesh(mesh));
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.studio.poll();
        self.mount_loaded_audio();
        self.drop_superseded_source();
        if let Some(t) = self.player.as_mut().and_then(PlaybackController::poll) {
            self.on_transition(t);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Text to Speech");
                ui.add_space(12.0);
                self.render_form(ui);
                ui.add_space(12.0);
                self.render_player(ui);
            });
        });

        if self.visualizer.is_scheduled() {
            ctx.request_repaint();
        } else if self.studio.has_pending_work() || self.player.as_ref().is_some_and(|p| p.is_playing()) {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.visualizer.teardown();
        if let Some(player) = self.player.as_mut() {
            player.pause();
        }
    }
}
