use eframe::egui;

use crate::constants::{
    BEATS_PER_BAR, COLOR_GRID_BAR, COLOR_GRID_BEAT, COLOR_PLAYHEAD, COLOR_RULER_BG,
    COLOR_TRACK_DRAGGING, COLOR_TRACK_LOCAL, COLOR_TRACK_REMOTE, TRACK_CORNER_RADIUS, TRACK_HEIGHT,
};
use crate::model::{ClipOrigin, LoopSession};
use crate::playback::PlaybackEngine;

/// Pointer input on the ruler, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineAction {
    BeginDrag {
        index: usize,
        pointer_x: f32,
        track_left_x: f32,
    },
    UpdateDrag {
        index: usize,
        pointer_x: f32,
        track_left_x: f32,
    },
    EndDrag,
    Delete(usize),
}

#[derive(Default)]
pub struct TimelineView;

impl TimelineView {
    pub fn new() -> Self {
        Self
    }

    /// Draw the loop ruler and its tracks; returns the pointer actions for
    /// the caller to apply to the session.
    pub fn show<E: PlaybackEngine>(
        &mut self,
        ui: &mut egui::Ui,
        session: &LoopSession<E>,
    ) -> Vec<TimelineAction> {
        let mut actions = Vec::new();
        let timing = *session.timing();
        let ruler_width = timing.ruler_width_px();
        let height = TRACK_HEIGHT * session.tracks().len().max(4) as f32;

        let (response, painter) =
            ui.allocate_painter(egui::vec2(ruler_width, height), egui::Sense::hover());
        let rect = response.rect;

        painter.rect_filled(rect, 0.0, COLOR_RULER_BG);
        self.draw_grid(&painter, rect, timing.beats_per_loop(), timing.beat_width_px());

        for view in session.track_views() {
            let track_rect = egui::Rect::from_min_size(
                egui::pos2(
                    rect.left() + view.offset_px,
                    rect.top() + TRACK_HEIGHT * view.index as f32,
                ),
                egui::vec2(view.width_px.max(1.0), TRACK_HEIGHT),
            );

            let response = ui.interact(
                track_rect,
                ui.id().with(("loop_track", view.id)),
                egui::Sense::drag(),
            );

            if response.drag_started() {
                if let Some(pos) = response.interact_pointer_pos() {
                    actions.push(TimelineAction::BeginDrag {
                        index: view.index,
                        pointer_x: pos.x,
                        track_left_x: track_rect.left(),
                    });
                }
            } else if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    actions.push(TimelineAction::UpdateDrag {
                        index: view.index,
                        pointer_x: pos.x,
                        track_left_x: track_rect.left(),
                    });
                }
            }

            let fill = if view.dragging {
                COLOR_TRACK_DRAGGING
            } else {
                match view.origin {
                    ClipOrigin::Local => COLOR_TRACK_LOCAL,
                    ClipOrigin::Remote => COLOR_TRACK_REMOTE,
                }
            };
            painter.rect_filled(track_rect.shrink(1.0), TRACK_CORNER_RADIUS, fill);
            painter.text(
                track_rect.left_center() + egui::vec2(6.0, 0.0),
                egui::Align2::LEFT_CENTER,
                format!("#{}", view.id),
                egui::FontId::proportional(12.0),
                egui::Color32::BLACK,
            );
        }

        if let Some(position) = session.loop_position_seconds() {
            let x = rect.left() + timing.seconds_to_pixels(position);
            painter.line_segment(
                [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
                egui::Stroke::new(2.0, COLOR_PLAYHEAD),
            );
        }

        // Releasing anywhere ends whatever drag is in progress
        if ui.input(|i| i.pointer.any_released()) {
            actions.push(TimelineAction::EndDrag);
        }

        actions
    }

    fn draw_grid(&self, painter: &egui::Painter, rect: egui::Rect, beats: u32, beat_width: f32) {
        for beat in 0..=beats {
            let x = rect.left() + beat as f32 * beat_width;
            let stroke = if beat % BEATS_PER_BAR == 0 {
                egui::Stroke::new(1.0, COLOR_GRID_BAR)
            } else {
                egui::Stroke::new(0.5, COLOR_GRID_BEAT)
            };
            painter.line_segment([egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())], stroke);
        }

        let mut y = rect.top();
        while y <= rect.bottom() {
            painter.line_segment(
                [egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)],
                egui::Stroke::new(0.5, COLOR_GRID_BEAT),
            );
            y += TRACK_HEIGHT;
        }
    }
}

/// Track list with per-track delete buttons.
pub fn show_track_list<E: PlaybackEngine>(
    ui: &mut egui::Ui,
    session: &LoopSession<E>,
) -> Option<TimelineAction> {
    let mut action = None;
    ui.heading("Tracks");
    ui.separator();

    if session.tracks().is_empty() {
        ui.weak("Nothing recorded yet");
    }

    for (index, track) in session.tracks().iter().enumerate() {
        ui.horizontal(|ui| {
            let who = match track.origin() {
                ClipOrigin::Local => "mine",
                ClipOrigin::Remote => "shared",
            };
            ui.label(format!(
                "#{} {:.1}s ({})",
                track.id(),
                track.buffer().duration_seconds(),
                who
            ));
            if ui.small_button("✖").on_hover_text("Delete track").clicked() {
                action = Some(TimelineAction::Delete(index));
            }
        });
    }
    action
}
