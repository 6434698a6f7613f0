use std::io::Cursor;

use bytes::Bytes;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{LoopError, Result};
use crate::model::{ClipBuffer, DecodedClip};

/// Turns a recorded blob into samples the timeline can play.
pub trait ClipDecoder: Send + Sync {
    fn decode(&self, blob: &[u8]) -> Result<DecodedClip>;
}

/// Decodes any container/codec symphonia can probe (WAV, Ogg Vorbis, FLAC,
/// MP3, ...) and folds it to mono.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl ClipDecoder for SymphoniaDecoder {
    fn decode(&self, blob: &[u8]) -> Result<DecodedClip> {
        if blob.is_empty() {
            return Err(LoopError::Decode("empty clip".into()));
        }

        let (samples, sample_rate, channels) = decode_interleaved(Bytes::copy_from_slice(blob))?;

        let mono_samples = fold_to_mono(samples, channels);
        if mono_samples.is_empty() {
            return Err(LoopError::Decode("clip contains no audio frames".into()));
        }

        Ok(DecodedClip::new(ClipBuffer::new(mono_samples, sample_rate)))
    }
}

fn decode_interleaved(blob: Bytes) -> Result<(Vec<f32>, u32, usize)> {
    let decode_err = |e: symphonia::core::errors::Error| LoopError::Decode(e.to_string());

    let mss = MediaSourceStream::new(Box::new(Cursor::new(blob)), Default::default());

    // Blobs carry no file name, so the probe works from content alone
    let hint = Hint::new();
    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(decode_err)?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| LoopError::Decode("no audio tracks found".into()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| LoopError::Decode("unknown sample rate".into()))?;

    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut all_samples = Vec::new();
    let mut sample_buf = None;

    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }

                match decoder.decode(&packet) {
                    Ok(decoded) => {
                        if sample_buf.is_none() {
                            let spec = *decoded.spec();
                            sample_buf =
                                Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
                        }

                        if let Some(buf) = &mut sample_buf {
                            buf.copy_interleaved_ref(decoded);
                            all_samples.extend_from_slice(buf.samples());
                        }
                    }
                    Err(symphonia::core::errors::Error::DecodeError(_)) => {
                        // Corrupt packet; keep the rest of the clip
                        continue;
                    }
                    Err(e) => return Err(decode_err(e)),
                }
            }
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(symphonia::core::errors::Error::ResetRequired) => {
                break;
            }
            Err(e) => return Err(decode_err(e)),
        }
    }

    Ok((all_samples, sample_rate, channels))
}

fn fold_to_mono(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
