use crate::error::{LoopError, Result};
use crate::model::clip::{ClipOrigin, DecodedClip};
use crate::model::track::{OverlengthPolicy, Track, TrackView};
use crate::playback::{PlaybackEngine, VoiceHandle};
use crate::time_utils::LoopTiming;

/// Per-participant loop state: the tracks on the ruler and the voices
/// currently playing them.
///
/// Every mutation goes through `&mut self`; the owner (the UI thread) is the
/// only place events are applied, one at a time.
pub struct LoopSession<E: PlaybackEngine> {
    timing: LoopTiming,
    overlength: OverlengthPolicy,
    tracks: Vec<Track>,
    // One slot per track while playing, empty while paused. A slot is `None`
    // for a track that arrived mid-playback or whose voice failed to start.
    active_sources: Vec<Option<VoiceHandle>>,
    playing: bool,
    recording: bool,
    transport_origin: Option<u64>,
    next_track_id: u64,
    engine: E,
}

impl<E: PlaybackEngine> LoopSession<E> {
    pub fn new(timing: LoopTiming, overlength: OverlengthPolicy, engine: E) -> Self {
        Self {
            timing,
            overlength,
            tracks: Vec::new(),
            active_sources: Vec::new(),
            playing: false,
            recording: false,
            transport_origin: None,
            next_track_id: 1,
            engine,
        }
    }

    pub fn timing(&self) -> &LoopTiming {
        &self.timing
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn active_sources(&self) -> &[Option<VoiceHandle>] {
        &self.active_sources
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn track_views(&self) -> Vec<TrackView> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackView {
                index,
                id: track.id(),
                offset_px: track.offset_px(),
                width_px: track.width_px(),
                dragging: track.is_dragging(),
                origin: track.origin(),
            })
            .collect()
    }

    /// Append a decoded clip. While playing the new track stays silent until
    /// the next `play()`.
    pub fn add_clip(&mut self, clip: DecodedClip, origin: ClipOrigin) -> usize {
        let id = self.next_track_id;
        self.next_track_id += 1;
        self.tracks
            .push(Track::new(id, clip, origin, &self.timing, self.overlength));
        if self.playing {
            self.active_sources.push(None);
        }
        log::info!(
            "Added {:?} track {} ({} tracks on the loop)",
            origin,
            id,
            self.tracks.len()
        );
        self.tracks.len() - 1
    }

    // Drag

    pub fn begin_drag(&mut self, index: usize, pointer_x: f32, track_left_x: f32) {
        match self.tracks.get_mut(index) {
            Some(track) => track.begin_drag(pointer_x, track_left_x),
            None => log::debug!("begin_drag ignored: {}", LoopError::InvalidIndex(index)),
        }
    }

    pub fn update_drag(&mut self, index: usize, pointer_x: f32, track_left_x: f32) {
        let ruler_width_px = self.timing.ruler_width_px();
        if let Some(track) = self.tracks.get_mut(index) {
            track.update_drag(pointer_x, track_left_x, ruler_width_px);
        }
    }

    /// Pointer released anywhere: no track is dragging afterwards.
    pub fn end_drag(&mut self) {
        for track in &mut self.tracks {
            track.end_drag();
        }
    }

    // Transport

    pub fn pause(&mut self) {
        self.stop_all();
        self.playing = false;
        self.transport_origin = None;
    }

    pub fn play(&mut self) {
        self.stop_all();

        let start_frame = self.engine.transport_frame();
        for track in &self.tracks {
            let slot = match self.engine.start_loop(track.buffer(), start_frame) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("Failed to start track {}: {}", track.id(), e);
                    None
                }
            };
            self.active_sources.push(slot);
        }

        self.playing = true;
        self.transport_origin = Some(start_frame);
    }

    pub fn toggle(&mut self) {
        if self.playing {
            log::info!("pause");
            self.pause();
        } else {
            log::info!("play");
            self.play();
        }
    }

    fn stop_all(&mut self) {
        for handle in self.active_sources.drain(..).flatten() {
            self.engine.stop(handle);
        }
    }

    /// Stop the track's voice (if playing) and remove it. Every other voice
    /// keeps running.
    pub fn delete_track(&mut self, index: usize) -> Result<()> {
        if index >= self.tracks.len() {
            return Err(LoopError::InvalidIndex(index));
        }

        if self.playing {
            if index < self.active_sources.len() {
                if let Some(handle) = self.active_sources.remove(index) {
                    self.engine.stop(handle);
                }
            } else {
                log::error!(
                    "Track {} has no playback slot ({} slots for {} tracks)",
                    index,
                    self.active_sources.len(),
                    self.tracks.len()
                );
            }
        }

        let track = self.tracks.remove(index);
        log::info!("Deleted track {}", track.id());
        Ok(())
    }

    /// Seconds into the loop that are being heard, if playing. Zero until
    /// the voices actually start.
    pub fn loop_position_seconds(&self) -> Option<f64> {
        let origin = self.transport_origin?;
        let rate = self.engine.sample_rate();
        if rate == 0 {
            return None;
        }
        let now = self.engine.played_frame();
        let elapsed = now.saturating_sub(origin) as f64 / rate as f64;
        Some(self.timing.loop_position_seconds(elapsed))
    }
}
