use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::ClipBuffer;

/// Identifies one started looping voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceHandle(pub u64);

/// Low-level audio output the loop session drives.
pub trait PlaybackEngine {
    /// Output sample rate of the transport clock.
    fn sample_rate(&self) -> u32;

    /// Earliest transport frame a voice can still be scheduled at.
    fn transport_frame(&self) -> u64;

    /// Transport frame being heard right now. Trails `transport_frame` by
    /// the engine's scheduling lead.
    fn played_frame(&self) -> u64 {
        self.transport_frame()
    }

    /// Start `buffer` looping forever from `start_frame` on the transport clock.
    fn start_loop(&mut self, buffer: &ClipBuffer, start_frame: u64) -> Result<VoiceHandle>;

    fn stop(&mut self, handle: VoiceHandle);
}

impl<E: PlaybackEngine + ?Sized> PlaybackEngine for Box<E> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn transport_frame(&self) -> u64 {
        (**self).transport_frame()
    }

    fn played_frame(&self) -> u64 {
        (**self).played_frame()
    }

    fn start_loop(&mut self, buffer: &ClipBuffer, start_frame: u64) -> Result<VoiceHandle> {
        (**self).start_loop(buffer, start_frame)
    }

    fn stop(&mut self, handle: VoiceHandle) {
        (**self).stop(handle)
    }
}

/// Engine without an output device. Keeps handle bookkeeping and a manually
/// advanced transport clock so the session behaves the same headless.
#[derive(Debug)]
pub struct SilentPlayback {
    sample_rate: u32,
    frame: u64,
    lead_frames: u64,
    next_handle: u64,
    running: BTreeSet<VoiceHandle>,
    start_frames: Vec<(VoiceHandle, u64)>,
}

impl SilentPlayback {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame: 0,
            lead_frames: 0,
            next_handle: 1,
            running: BTreeSet::new(),
            start_frames: Vec::new(),
        }
    }

    /// Schedule voices `lead_frames` ahead of the played frame, like a real
    /// output device does.
    pub fn with_lead(mut self, lead_frames: u64) -> Self {
        self.lead_frames = lead_frames;
        self
    }

    pub fn advance(&mut self, frames: u64) {
        self.frame += frames;
    }

    pub fn running(&self) -> &BTreeSet<VoiceHandle> {
        &self.running
    }

    pub fn is_running(&self, handle: VoiceHandle) -> bool {
        self.running.contains(&handle)
    }

    /// Every voice ever started, with the frame it was scheduled at.
    pub fn start_frames(&self) -> &[(VoiceHandle, u64)] {
        &self.start_frames
    }
}

impl PlaybackEngine for SilentPlayback {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn transport_frame(&self) -> u64 {
        self.frame + self.lead_frames
    }

    fn played_frame(&self) -> u64 {
        self.frame
    }

    fn start_loop(&mut self, _buffer: &ClipBuffer, start_frame: u64) -> Result<VoiceHandle> {
        let handle = VoiceHandle(self.next_handle);
        self.next_handle += 1;
        self.running.insert(handle);
        self.start_frames.push((handle, start_frame));
        Ok(handle)
    }

    fn stop(&mut self, handle: VoiceHandle) {
        if !self.running.remove(&handle) {
            log::debug!("Stop for voice {:?} that is not running", handle);
        }
    }
}
