use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::constants::{SCHEDULE_LEAD_SECONDS, VOICE_CAPACITY};
use crate::error::LoopError;
use crate::model::ClipBuffer;
use crate::playback::{PlaybackEngine, VoiceHandle};

/// Commands from the session to the audio callback
#[derive(Debug, Clone)]
pub enum VoiceCommand {
    Start {
        handle: VoiceHandle,
        samples: Arc<[f32]>,
        clip_rate: u32,
        start_frame: u64,
    },
    Stop(VoiceHandle),
}

struct Voice {
    handle: VoiceHandle,
    samples: Arc<[f32]>,
    // clip frames advanced per output frame
    step: f64,
    start_frame: u64,
}

impl Voice {
    #[inline]
    fn sample_at(&self, frame: u64) -> f32 {
        if frame < self.start_frame || self.samples.is_empty() {
            return 0.0;
        }
        let elapsed = (frame - self.start_frame) as f64 * self.step;
        let idx = (elapsed as u64 % self.samples.len() as u64) as usize;
        self.samples[idx]
    }
}

/// Mixes looping voices against an absolute frame counter.
///
/// A voice's read position depends only on how many frames have passed since
/// its start frame, so voices started on the same frame stay phase-locked no
/// matter how long each buffer is.
pub struct VoiceMixer {
    device_rate: u32,
    frame: u64,
    voices: Vec<Voice>,
    retired: Option<Sender<Arc<[f32]>>>,
}

impl VoiceMixer {
    pub fn new(device_rate: u32) -> Self {
        Self {
            device_rate,
            frame: 0,
            voices: Vec::with_capacity(VOICE_CAPACITY),
            retired: None,
        }
    }

    /// Hand buffers of stopped voices to `retired` instead of freeing them
    /// inside the audio callback.
    pub fn with_retired(mut self, retired: Sender<Arc<[f32]>>) -> Self {
        self.retired = Some(retired);
        self
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn apply(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Start {
                handle,
                samples,
                clip_rate,
                start_frame,
            } => {
                let step = if self.device_rate == 0 {
                    1.0
                } else {
                    clip_rate as f64 / self.device_rate as f64
                };
                self.voices.push(Voice {
                    handle,
                    samples,
                    step,
                    start_frame,
                });
            }
            VoiceCommand::Stop(handle) => {
                if let Some(pos) = self.voices.iter().position(|v| v.handle == handle) {
                    let voice = self.voices.swap_remove(pos);
                    if let Some(retired) = &self.retired {
                        let _ = retired.try_send(voice.samples);
                    }
                }
            }
        }
    }

    /// Fill an interleaved output buffer and advance the clock.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for out_frame in data.chunks_mut(channels) {
            let mixed: f32 = self
                .voices
                .iter()
                .map(|voice| voice.sample_at(self.frame))
                .sum();
            let mixed = mixed.clamp(-1.0, 1.0);
            for sample in out_frame.iter_mut() {
                *sample = mixed;
            }
            self.frame += 1;
        }
    }
}

/// Output through the default (or preferred) cpal device.
pub struct CpalPlayback {
    _stream: cpal::Stream,
    commands: Sender<VoiceCommand>,
    retired: Receiver<Arc<[f32]>>,
    frame: Arc<AtomicU64>,
    device_rate: u32,
    lead_frames: u64,
    next_handle: u64,
}

impl CpalPlayback {
    pub fn open(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => host
                .output_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .or_else(|| {
                    log::warn!("Output device '{}' not found, using default", name);
                    host.default_output_device()
                }),
            None => host.default_output_device(),
        }
        .ok_or_else(|| anyhow!("No output device"))?;

        let supported = device
            .default_output_config()
            .context("No default output config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "Unsupported output sample format {:?}",
                supported.sample_format()
            ));
        }

        let config: cpal::StreamConfig = supported.config();
        let device_rate = config.sample_rate.0;
        let channels = config.channels as usize;

        let (commands, command_rx): (Sender<VoiceCommand>, Receiver<VoiceCommand>) =
            crossbeam_channel::unbounded();
        let (retired_tx, retired) = crossbeam_channel::unbounded::<Arc<[f32]>>();
        let frame = Arc::new(AtomicU64::new(0));
        let frame_clone = frame.clone();
        let mut mixer = VoiceMixer::new(device_rate).with_retired(retired_tx);

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = command_rx.try_recv() {
                    mixer.apply(cmd);
                }
                mixer.render(data, channels);
                frame_clone.store(mixer.frame(), Ordering::Relaxed);
            },
            |err| log::error!("Output stream error: {}", err),
            None,
        )?;
        stream.play()?;

        log::info!(
            "Audio output on '{}' at {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown".into()),
            device_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            commands,
            retired,
            frame,
            device_rate,
            lead_frames: (device_rate as f64 * SCHEDULE_LEAD_SECONDS) as u64,
            next_handle: 1,
        })
    }
}

impl CpalPlayback {
    /// Free buffers the callback has let go of, on this thread.
    fn drop_retired(&self) {
        for samples in self.retired.try_iter() {
            drop(samples);
        }
    }
}

impl PlaybackEngine for CpalPlayback {
    fn sample_rate(&self) -> u32 {
        self.device_rate
    }

    fn transport_frame(&self) -> u64 {
        self.played_frame() + self.lead_frames
    }

    fn played_frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    fn start_loop(
        &mut self,
        buffer: &ClipBuffer,
        start_frame: u64,
    ) -> crate::error::Result<VoiceHandle> {
        self.drop_retired();
        let handle = VoiceHandle(self.next_handle);
        self.next_handle += 1;
        self.commands
            .send(VoiceCommand::Start {
                handle,
                samples: buffer.shared_samples(),
                clip_rate: buffer.sample_rate(),
                start_frame,
            })
            .map_err(|_| LoopError::Audio("audio callback is gone".into()))?;
        Ok(handle)
    }

    fn stop(&mut self, handle: VoiceHandle) {
        let _ = self.commands.send(VoiceCommand::Stop(handle));
        self.drop_retired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(handle: u64, samples: Vec<f32>, start_frame: u64) -> VoiceCommand {
        VoiceCommand::Start {
            handle: VoiceHandle(handle),
            samples: samples.into(),
            clip_rate: 100,
            start_frame,
        }
    }

    #[test]
    fn voices_wait_for_their_start_frame() {
        let mut mixer = VoiceMixer::new(100);
        mixer.apply(start(1, vec![0.5], 2));
        let mut out = [1.0f32; 4];
        mixer.render(&mut out, 1);
        assert_eq!(out, [0.0, 0.0, 0.5, 0.5]);
        assert_eq!(mixer.frame(), 4);
    }

    #[test]
    fn voices_of_different_lengths_share_a_phase() {
        let mut mixer = VoiceMixer::new(100);
        // impulse at the head of each buffer: lengths 2 and 4
        mixer.apply(start(1, vec![0.25, 0.0], 0));
        mixer.apply(start(2, vec![0.5, 0.0, 0.0, 0.0], 0));
        let mut out = [0.0f32; 8];
        mixer.render(&mut out, 1);
        assert_eq!(out, [0.75, 0.0, 0.25, 0.0, 0.75, 0.0, 0.25, 0.0]);
    }

    #[test]
    fn stop_removes_only_that_voice() {
        let mut mixer = VoiceMixer::new(100);
        mixer.apply(start(1, vec![0.25], 0));
        mixer.apply(start(2, vec![0.5], 0));
        mixer.apply(VoiceCommand::Stop(VoiceHandle(1)));
        assert_eq!(mixer.voice_count(), 1);
        let mut out = [0.0f32; 4];
        mixer.render(&mut out, 2);
        assert_eq!(out, [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn clip_rate_is_resampled_by_stepping() {
        // clip at half the device rate advances every other frame
        let mut mixer = VoiceMixer::new(200);
        mixer.apply(start(1, vec![0.1, 0.2, 0.3], 0));
        let mut out = [0.0f32; 6];
        mixer.render(&mut out, 1);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn voice_count_is_not_capped() {
        let mut mixer = VoiceMixer::new(100);
        let voices = VOICE_CAPACITY + 1;
        for handle in 0..voices as u64 {
            mixer.apply(start(handle, vec![0.01], 0));
        }
        assert_eq!(mixer.voice_count(), voices);

        let mut out = [0.0f32; 1];
        mixer.render(&mut out, 1);
        assert!((out[0] - 0.01 * voices as f32).abs() < 1e-4);
    }

    #[test]
    fn stopped_buffers_are_handed_back() {
        let (retired_tx, retired_rx) = crossbeam_channel::unbounded();
        let mut mixer = VoiceMixer::new(100).with_retired(retired_tx);
        let samples: Arc<[f32]> = vec![0.5, 0.25].into();
        mixer.apply(VoiceCommand::Start {
            handle: VoiceHandle(1),
            samples: samples.clone(),
            clip_rate: 100,
            start_frame: 0,
        });
        drop(samples);

        mixer.apply(VoiceCommand::Stop(VoiceHandle(1)));
        assert_eq!(mixer.voice_count(), 0);

        let returned = retired_rx.try_recv().unwrap();
        assert_eq!(&returned[..], &[0.5, 0.25]);
        // the mixer kept no reference of its own
        assert_eq!(Arc::strong_count(&returned), 1);

        // unknown handles hand nothing back
        mixer.apply(VoiceCommand::Stop(VoiceHandle(9)));
        assert!(retired_rx.try_recv().is_err());
    }

    #[test]
    fn mix_is_clamped() {
        let mut mixer = VoiceMixer::new(100);
        mixer.apply(start(1, vec![0.9], 0));
        mixer.apply(start(2, vec![0.9], 0));
        let mut out = [0.0f32; 1];
        mixer.render(&mut out, 1);
        assert_eq!(out, [1.0]);
    }
}
