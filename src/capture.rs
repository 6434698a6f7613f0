use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

/// Token for the one capture that may be running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHandle(u64);

struct ActiveCapture {
    handle: CaptureHandle,
    stream: cpal::Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

/// Microphone recorder producing finished WAV blobs.
pub struct MicCapture {
    preferred_device: Option<String>,
    active: Option<ActiveCapture>,
    next_handle: u64,
}

impl MicCapture {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            active: None,
            next_handle: 1,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self) -> Result<CaptureHandle> {
        if self.active.is_some() {
            return Err(anyhow!("A recording is already in progress"));
        }

        let host = cpal::default_host();
        let device = match self.preferred_device.as_deref() {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .or_else(|| {
                    log::warn!("Input device '{}' not found, using default", name);
                    host.default_input_device()
                }),
            None => host.default_input_device(),
        }
        .ok_or_else(|| anyhow!("No input device available"))?;

        let input_config = device
            .default_input_config()
            .context("Failed to get input config")?;
        if input_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(anyhow!(
                "Unsupported input sample format {:?}",
                input_config.sample_format()
            ));
        }

        let channels = input_config.channels() as usize;
        let sample_rate = input_config.sample_rate().0;
        let samples = Arc::new(Mutex::new(Vec::new()));
        let samples_clone = samples.clone();

        let stream = device.build_input_stream(
            &input_config.config(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut recorded = samples_clone.lock();
                // Record mono by averaging channels
                for frame in data.chunks(channels.max(1)) {
                    recorded.push(frame.iter().sum::<f32>() / frame.len() as f32);
                }
            },
            |err| log::error!("Input stream error: {}", err),
            None,
        )?;
        stream.play()?;

        let handle = CaptureHandle(self.next_handle);
        self.next_handle += 1;
        self.active = Some(ActiveCapture {
            handle,
            stream,
            samples,
            sample_rate,
        });
        log::info!("recording");
        Ok(handle)
    }

    /// Stop the capture and return the finished clip.
    pub fn stop(&mut self, handle: CaptureHandle) -> Result<Bytes> {
        let active = match self.active.take() {
            Some(active) if active.handle == handle => active,
            Some(other) => {
                self.active = Some(other);
                return Err(anyhow!("Stale capture handle {:?}", handle));
            }
            None => return Err(anyhow!("No recording in progress")),
        };

        if let Err(e) = active.stream.pause() {
            log::warn!("Failed to pause input stream: {}", e);
        }
        drop(active.stream);

        let samples = std::mem::take(&mut *active.samples.lock());
        log::info!(
            "stopped ({:.2}s captured)",
            samples.len() as f64 / active.sample_rate.max(1) as f64
        );
        encode_wav(&samples, active.sample_rate)
    }
}

/// Encode mono samples as a 16-bit PCM WAV blob.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Bytes> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut blob = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut blob), spec)?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{ClipDecoder, SymphoniaDecoder};

    #[test]
    fn encoded_clip_is_understood_by_the_decoder() {
        let samples: Vec<f32> = (0..4410).map(|i| ((i as f32) * 0.01).sin() * 0.5).collect();
        let blob = encode_wav(&samples, 44100).unwrap();
        let clip = SymphoniaDecoder.decode(&blob).unwrap();
        assert_eq!(clip.buffer.frames(), 4410);
        assert!((clip.duration_seconds - 0.1).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let blob = encode_wav(&[2.0, -2.0], 8000).unwrap();
        let clip = SymphoniaDecoder.decode(&blob).unwrap();
        assert!(clip.buffer.samples()[0] > 0.99);
        assert!(clip.buffer.samples()[1] < -0.99);
    }

    #[test]
    fn stop_without_start_is_an_error() {
        let mut capture = MicCapture::new(None);
        assert!(!capture.is_active());
        assert!(capture.stop(CaptureHandle(7)).is_err());
    }
}
