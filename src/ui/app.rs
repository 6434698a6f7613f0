use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use eframe::egui;

use crate::audio::CpalPlayback;
use crate::bridge::CaptureBridge;
use crate::capture::{CaptureHandle, MicCapture};
use crate::config::Config;
use crate::constants::{FALLBACK_SAMPLE_RATE, TRACK_LIST_WIDTH, UI_POLL_INTERVAL_MS};
use crate::decode::SymphoniaDecoder;
use crate::messages::NetEvent;
use crate::model::LoopSession;
use crate::playback::{PlaybackEngine, SilentPlayback};
use crate::relay::RelayClient;

use super::timeline::{TimelineAction, TimelineView, show_track_list};
use super::transport::{TransportAction, TransportStatus, TransportUI};

pub struct LoopJamApp {
    // Core state
    session: LoopSession<Box<dyn PlaybackEngine>>,
    bridge: CaptureBridge,
    net_rx: Receiver<NetEvent>,

    // Recording
    capture: MicCapture,
    capture_handle: Option<CaptureHandle>,

    // UI Components
    transport_ui: TransportUI,
    timeline_ui: TimelineView,

    status: Option<String>,
}

impl LoopJamApp {
    pub fn new(config: &Config, relay: Option<RelayClient>, net_rx: Receiver<NetEvent>) -> Self {
        let engine: Box<dyn PlaybackEngine> =
            match CpalPlayback::open(config.audio.preferred_output_device.as_deref()) {
                Ok(engine) => Box::new(engine),
                Err(e) => {
                    log::warn!("Audio output unavailable, running silent: {}", e);
                    Box::new(SilentPlayback::new(FALLBACK_SAMPLE_RATE))
                }
            };

        let session = LoopSession::new(
            config.loop_settings.timing(),
            config.loop_settings.overlength,
            engine,
        );

        let status = relay.is_none().then(|| "Not connected, recordings stay local".to_string());
        let link = relay.map(|client| Box::new(client) as Box<dyn crate::bridge::RelayLink>);
        let bridge = CaptureBridge::new(Arc::new(SymphoniaDecoder), link);

        Self {
            session,
            bridge,
            net_rx,
            capture: MicCapture::new(config.audio.preferred_input_device.clone()),
            capture_handle: None,
            transport_ui: TransportUI::new(),
            timeline_ui: TimelineView::new(),
            status,
        }
    }

    fn process_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::ClipReceived(blob) => self.bridge.on_remote_clip(blob),
            NetEvent::Disconnected(reason) => {
                self.bridge.set_link(None);
                self.status = Some(format!("Relay disconnected: {}", reason));
            }
        }
    }

    fn toggle_recording(&mut self) {
        match self.capture_handle.take() {
            Some(handle) => match self.capture.stop(handle) {
                Ok(blob) => self.bridge.on_local_clip(blob),
                Err(e) => {
                    log::error!("Recording failed: {}", e);
                    self.status = Some(format!("Recording failed: {}", e));
                }
            },
            None => match self.capture.start() {
                Ok(handle) => self.capture_handle = Some(handle),
                Err(e) => {
                    log::error!("Could not start recording: {}", e);
                    self.status = Some(format!("Could not start recording: {}", e));
                }
            },
        }
        self.session.set_recording(self.capture.is_active());
    }

    fn apply_timeline_action(&mut self, action: TimelineAction) {
        match action {
            TimelineAction::BeginDrag {
                index,
                pointer_x,
                track_left_x,
            } => self.session.begin_drag(index, pointer_x, track_left_x),
            TimelineAction::UpdateDrag {
                index,
                pointer_x,
                track_left_x,
            } => self.session.update_drag(index, pointer_x, track_left_x),
            TimelineAction::EndDrag => self.session.end_drag(),
            TimelineAction::Delete(index) => {
                if let Err(e) = self.session.delete_track(index) {
                    log::warn!("Delete ignored: {}", e);
                }
            }
        }
    }
}

impl eframe::App for LoopJamApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Network arrivals, then finished decodes
        while let Ok(event) = self.net_rx.try_recv() {
            self.process_net_event(event);
        }
        self.bridge.pump(&mut self.session);

        let status = TransportStatus {
            connected: self.bridge.has_link(),
            decoding: self.bridge.pending(),
            message: self.status.as_deref(),
        };
        match self.transport_ui.show(ctx, &self.session, status) {
            Some(TransportAction::ToggleRecording) => self.toggle_recording(),
            Some(TransportAction::TogglePlayback) => self.session.toggle(),
            None => {}
        }

        let mut actions = Vec::new();
        egui::SidePanel::left("tracks_panel")
            .default_width(TRACK_LIST_WIDTH)
            .resizable(true)
            .show(ctx, |ui| {
                actions.extend(show_track_list(ui, &self.session));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            actions.extend(self.timeline_ui.show(ui, &self.session));
        });

        for action in actions {
            self.apply_timeline_action(action);
        }

        // Clips can arrive at any time, keep polling
        ctx.request_repaint_after(Duration::from_millis(UI_POLL_INTERVAL_MS));
    }
}
