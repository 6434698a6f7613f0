use eframe::egui;

use crate::constants::BEATS_PER_BAR;
use crate::model::LoopSession;
use crate::playback::PlaybackEngine;
use crate::time_utils::format_bars_beats_sixteenths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    ToggleRecording,
    TogglePlayback,
}

/// What the transport bar shows besides the session itself.
pub struct TransportStatus<'a> {
    pub connected: bool,
    pub decoding: usize,
    pub message: Option<&'a str>,
}

#[derive(Default)]
pub struct TransportUI;

impl TransportUI {
    pub fn new() -> Self {
        Self
    }

    pub fn show<E: PlaybackEngine>(
        &mut self,
        ctx: &egui::Context,
        session: &LoopSession<E>,
        status: TransportStatus<'_>,
    ) -> Option<TransportAction> {
        let mut action = None;
        egui::TopBottomPanel::top("transport_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                action = self.draw_transport_controls(ui, session);
                ui.separator();
                self.draw_time_display(ui, session);
                ui.separator();
                self.draw_status(ui, &status);
            });
        });
        action
    }

    fn draw_transport_controls<E: PlaybackEngine>(
        &mut self,
        ui: &mut egui::Ui,
        session: &LoopSession<E>,
    ) -> Option<TransportAction> {
        let mut action = None;

        let is_recording = session.is_recording();
        if ui
            .button(if is_recording { "⏺ Stop Recording" } else { "⏺ Record" })
            .on_hover_text("Record a clip into the loop")
            .clicked()
        {
            action = Some(TransportAction::ToggleRecording);
        }

        let is_playing = session.is_playing();
        if ui
            .button(if is_playing { "⏸ Pause" } else { "▶ Play" })
            .on_hover_text("Play/Pause")
            .clicked()
        {
            action = Some(TransportAction::TogglePlayback);
        }

        action
    }

    fn draw_time_display<E: PlaybackEngine>(&self, ui: &mut egui::Ui, session: &LoopSession<E>) {
        let timing = session.timing();
        let position = session.loop_position_seconds().unwrap_or(0.0);
        ui.monospace(format_bars_beats_sixteenths(
            timing.seconds_to_beats(position),
            BEATS_PER_BAR,
        ));
        ui.label(format!(
            "{} BPM · {} beats · {:.1}s",
            timing.bpm(),
            timing.beats_per_loop(),
            timing.loop_duration_seconds()
        ));
    }

    fn draw_status(&self, ui: &mut egui::Ui, status: &TransportStatus<'_>) {
        if status.connected {
            ui.label("🟢 relay");
        } else {
            ui.label("🔴 offline");
        }
        if status.decoding > 0 {
            ui.spinner();
            ui.label(format!("decoding {}", status.decoding));
        }
        if let Some(message) = status.message {
            ui.weak(message);
        }
    }
}
