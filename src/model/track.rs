use serde::{Deserialize, Serialize};

use crate::model::clip::{ClipBuffer, ClipOrigin, DecodedClip};
use crate::time_utils::LoopTiming;

/// What to do with a clip that is longer than the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlengthPolicy {
    /// Cut the audio at the loop length so it repeats on the loop boundary.
    #[default]
    Truncate,
    /// Keep the full recording; it repeats at its own length.
    AllowDrift,
}

/// One recorded clip placed on the loop ruler.
#[derive(Debug, Clone)]
pub struct Track {
    id: u64,
    origin: ClipOrigin,
    offset_px: f32,
    width_px: f32,
    dragging: bool,
    drag_anchor_px: f32,
    buffer: ClipBuffer,
}

/// Geometry handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackView {
    pub index: usize,
    pub id: u64,
    pub offset_px: f32,
    pub width_px: f32,
    pub dragging: bool,
    pub origin: ClipOrigin,
}

impl Track {
    pub fn new(
        id: u64,
        clip: DecodedClip,
        origin: ClipOrigin,
        timing: &LoopTiming,
        policy: OverlengthPolicy,
    ) -> Self {
        let loop_len = timing.loop_duration_seconds();
        let buffer = match policy {
            OverlengthPolicy::Truncate if clip.duration_seconds > loop_len => {
                clip.buffer.truncated(loop_len)
            }
            _ => clip.buffer,
        };
        let width_px = timing
            .seconds_to_pixels(clip.duration_seconds)
            .clamp(0.0, timing.ruler_width_px());

        Self {
            id,
            origin,
            offset_px: 0.0,
            width_px,
            dragging: false,
            drag_anchor_px: 0.0,
            buffer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> ClipOrigin {
        self.origin
    }

    pub fn offset_px(&self) -> f32 {
        self.offset_px
    }

    pub fn width_px(&self) -> f32 {
        self.width_px
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn drag_anchor_px(&self) -> f32 {
        self.drag_anchor_px
    }

    pub fn buffer(&self) -> &ClipBuffer {
        &self.buffer
    }

    pub(crate) fn begin_drag(&mut self, pointer_x: f32, track_left_x: f32) {
        self.dragging = true;
        self.drag_anchor_px = pointer_x - track_left_x;
    }

    pub(crate) fn update_drag(&mut self, pointer_x: f32, track_left_x: f32, ruler_width_px: f32) {
        if !self.dragging {
            return;
        }
        self.offset_px = dragged_offset(
            self.offset_px,
            self.drag_anchor_px,
            pointer_x - track_left_x,
            ruler_width_px - self.width_px,
        );
    }

    pub(crate) fn end_drag(&mut self) {
        self.dragging = false;
        self.drag_anchor_px = 0.0;
    }
}

/// New offset for a dragged track.
///
/// `pointer_rel_px` is the pointer position relative to the track's current
/// left edge; the track moves by however far the pointer has slid away from
/// the anchor captured at drag start, then is clamped to `[0, max_offset_px]`.
#[inline]
pub fn dragged_offset(
    current_offset_px: f32,
    anchor_px: f32,
    pointer_rel_px: f32,
    max_offset_px: f32,
) -> f32 {
    (current_offset_px - (anchor_px - pointer_rel_px)).clamp(0.0, max_offset_px.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> LoopTiming {
        LoopTiming::new(100.0, 16, 800.0)
    }

    fn clip(seconds: f64) -> DecodedClip {
        let rate = 1000;
        DecodedClip::new(ClipBuffer::new(
            vec![0.0; (seconds * rate as f64) as usize],
            rate,
        ))
    }

    #[test]
    fn width_is_proportional_to_duration() {
        let track = Track::new(1, clip(4.8), ClipOrigin::Local, &timing(), OverlengthPolicy::Truncate);
        assert!((track.width_px() - 400.0).abs() < 1e-3);
        assert_eq!(track.offset_px(), 0.0);
        assert!(!track.is_dragging());
    }

    #[test]
    fn overlength_clip_is_clamped_to_ruler() {
        let truncated =
            Track::new(1, clip(12.0), ClipOrigin::Remote, &timing(), OverlengthPolicy::Truncate);
        assert_eq!(truncated.width_px(), 800.0);
        assert_eq!(truncated.buffer().frames(), 9600);

        let drifting =
            Track::new(2, clip(12.0), ClipOrigin::Remote, &timing(), OverlengthPolicy::AllowDrift);
        assert_eq!(drifting.width_px(), 800.0);
        assert_eq!(drifting.buffer().frames(), 12_000);
    }

    #[test]
    fn dragged_offset_is_relative_and_clamped() {
        // anchor 10px into the track, pointer now 60px into it: move right by 50
        assert_eq!(dragged_offset(100.0, 10.0, 60.0, 500.0), 150.0);
        assert_eq!(dragged_offset(100.0, 10.0, 510.0, 500.0), 500.0);
        assert_eq!(dragged_offset(100.0, 10.0, -200.0, 500.0), 0.0);
        // pointer back on the anchor: no movement
        assert_eq!(dragged_offset(42.0, 7.0, 7.0, 500.0), 42.0);
    }

    #[test]
    fn update_without_begin_is_ignored() {
        let mut track =
            Track::new(1, clip(2.4), ClipOrigin::Local, &timing(), OverlengthPolicy::Truncate);
        track.update_drag(300.0, 0.0, 800.0);
        assert_eq!(track.offset_px(), 0.0);

        track.begin_drag(20.0, 0.0);
        assert_eq!(track.drag_anchor_px(), 20.0);
        track.update_drag(120.0, 0.0, 800.0);
        assert_eq!(track.offset_px(), 100.0);

        track.end_drag();
        assert!(!track.is_dragging());
        assert_eq!(track.drag_anchor_px(), 0.0);
    }
}
