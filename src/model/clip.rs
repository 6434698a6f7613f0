use std::sync::Arc;

/// Decoded mono audio for one recorded clip.
///
/// The samples are immutable once decoded; clones hand out read-only views
/// of the same data (the playback engine reads them from the audio thread).
#[derive(Debug, Clone)]
pub struct ClipBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl ClipBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn shared_samples(&self) -> Arc<[f32]> {
        self.samples.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }

    /// A copy holding at most `seconds` of audio.
    pub fn truncated(&self, seconds: f64) -> ClipBuffer {
        let max_frames = (seconds * self.sample_rate as f64).round().max(0.0) as usize;
        if max_frames >= self.samples.len() {
            return self.clone();
        }
        ClipBuffer::new(self.samples[..max_frames].to_vec(), self.sample_rate)
    }
}

/// Output of the decode collaborator.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub duration_seconds: f64,
    pub buffer: ClipBuffer,
}

impl DecodedClip {
    pub fn new(buffer: ClipBuffer) -> Self {
        Self {
            duration_seconds: buffer.duration_seconds(),
            buffer,
        }
    }
}

/// Where a clip came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    Local,
    Remote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_frames_and_rate() {
        let buffer = ClipBuffer::new(vec![0.0; 24_000], 48_000);
        assert_eq!(buffer.duration_seconds(), 0.5);
        assert_eq!(ClipBuffer::new(vec![0.1; 10], 0).duration_seconds(), 0.0);
    }

    #[test]
    fn truncation_keeps_the_head() {
        let buffer = ClipBuffer::new((0..100).map(|i| i as f32).collect(), 10);
        let short = buffer.truncated(2.5);
        assert_eq!(short.frames(), 25);
        assert_eq!(short.samples()[24], 24.0);
        assert_eq!(buffer.truncated(20.0).frames(), 100);
    }
}
