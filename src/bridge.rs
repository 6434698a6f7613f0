use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};

use crate::decode::ClipDecoder;
use crate::error::Result;
use crate::model::{ClipOrigin, DecodedClip, LoopSession};
use crate::playback::PlaybackEngine;

/// Outbound half of the relay connection as seen by the bridge.
pub trait RelayLink {
    fn send_clip(&self, blob: Bytes) -> Result<()>;
}

struct DecodeDone {
    seq: u64,
    origin: ClipOrigin,
    result: Result<DecodedClip>,
}

/// Routes finished clips to the relay and onto the local timeline.
///
/// Decoding runs on the rayon pool; results are appended to the session by
/// [`CaptureBridge::pump`] on the thread that owns the session, in the order
/// the blobs arrived.
pub struct CaptureBridge {
    decoder: Arc<dyn ClipDecoder>,
    link: Option<Box<dyn RelayLink>>,
    done_tx: Sender<DecodeDone>,
    done_rx: Receiver<DecodeDone>,
    next_seq: u64,
    next_to_append: u64,
    // Finished decodes waiting for an earlier blob; `None` marks a failure.
    finished: BTreeMap<u64, Option<(DecodedClip, ClipOrigin)>>,
}

impl CaptureBridge {
    pub fn new(decoder: Arc<dyn ClipDecoder>, link: Option<Box<dyn RelayLink>>) -> Self {
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        Self {
            decoder,
            link,
            done_tx,
            done_rx,
            next_seq: 0,
            next_to_append: 0,
            finished: BTreeMap::new(),
        }
    }

    /// Replace the relay connection; `None` after a disconnect keeps later
    /// recordings local.
    pub fn set_link(&mut self, link: Option<Box<dyn RelayLink>>) {
        self.link = link;
    }

    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    /// Blobs handed over whose track has not been appended yet.
    pub fn pending(&self) -> usize {
        (self.next_seq - self.next_to_append) as usize
    }

    /// A clip recorded here: broadcast it and put it on our own timeline.
    pub fn on_local_clip(&mut self, blob: Bytes) {
        match &self.link {
            Some(link) => {
                if let Err(e) = link.send_clip(blob.clone()) {
                    log::warn!("Could not broadcast clip, keeping it local: {}", e);
                }
            }
            None => log::warn!("Not connected to a relay, keeping clip local"),
        }
        self.schedule_decode(blob, ClipOrigin::Local);
    }

    /// A clip another participant recorded. Never re-broadcast.
    pub fn on_remote_clip(&mut self, blob: Bytes) {
        self.schedule_decode(blob, ClipOrigin::Remote);
    }

    fn schedule_decode(&mut self, blob: Bytes, origin: ClipOrigin) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let decoder = self.decoder.clone();
        let done_tx = self.done_tx.clone();
        rayon::spawn(move || {
            let result = decoder.decode(&blob);
            let _ = done_tx.send(DecodeDone {
                seq,
                origin,
                result,
            });
        });
    }

    /// Append every finished decode that is next in arrival order. Returns
    /// how many tracks were added.
    pub fn pump<E: PlaybackEngine>(&mut self, session: &mut LoopSession<E>) -> usize {
        while let Ok(done) = self.done_rx.try_recv() {
            self.record(done);
        }
        self.append_ready(session)
    }

    /// Block until every handed-over blob is decoded and appended, or the
    /// timeout passes. Returns true when nothing is pending.
    pub fn flush<E: PlaybackEngine>(
        &mut self,
        session: &mut LoopSession<E>,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump(session);
        while self.pending() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(done) => {
                    self.record(done);
                    self.append_ready(session);
                }
                Err(_) => break,
            }
        }
        self.pending() == 0
    }

    fn record(&mut self, done: DecodeDone) {
        let entry = match done.result {
            Ok(clip) => Some((clip, done.origin)),
            Err(e) => {
                log::warn!("Dropping {:?} clip: {}", done.origin, e);
                None
            }
        };
        self.finished.insert(done.seq, entry);
    }

    fn append_ready<E: PlaybackEngine>(&mut self, session: &mut LoopSession<E>) -> usize {
        let mut added = 0;
        while let Some(entry) = self.finished.remove(&self.next_to_append) {
            self.next_to_append += 1;
            if let Some((clip, origin)) = entry {
                session.add_clip(clip, origin);
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoopError;
    use crate::model::{ClipBuffer, OverlengthPolicy};
    use crate::playback::SilentPlayback;
    use crate::time_utils::LoopTiming;
    use parking_lot::Mutex;

    /// Blob is "<delay ms>/<seconds>": sleeps, then yields a silent clip.
    struct ScriptedDecoder;

    impl ClipDecoder for ScriptedDecoder {
        fn decode(&self, blob: &[u8]) -> Result<DecodedClip> {
            let text = std::str::from_utf8(blob).map_err(|e| LoopError::Decode(e.to_string()))?;
            let (delay_ms, seconds) = text
                .split_once('/')
                .ok_or_else(|| LoopError::Decode("not a scripted clip".into()))?;
            let delay_ms: u64 = delay_ms.parse().map_err(|_| LoopError::Decode("bad delay".into()))?;
            let seconds: f64 = seconds.parse().map_err(|_| LoopError::Decode("bad length".into()))?;
            std::thread::sleep(Duration::from_millis(delay_ms));
            Ok(DecodedClip::new(ClipBuffer::new(
                vec![0.0; (seconds * 100.0) as usize],
                100,
            )))
        }
    }

    struct RecordingLink {
        sent: Arc<Mutex<Vec<Bytes>>>,
        fail: bool,
    }

    impl RelayLink for RecordingLink {
        fn send_clip(&self, blob: Bytes) -> Result<()> {
            if self.fail {
                return Err(LoopError::Connection("socket closed".into()));
            }
            self.sent.lock().push(blob);
            Ok(())
        }
    }

    fn session() -> LoopSession<SilentPlayback> {
        LoopSession::new(
            LoopTiming::new(100.0, 16, 800.0),
            OverlengthPolicy::Truncate,
            SilentPlayback::new(100),
        )
    }

    #[test]
    fn local_clip_is_sent_and_added() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let link = RecordingLink {
            sent: sent.clone(),
            fail: false,
        };
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), Some(Box::new(link)));
        let mut session = session();

        bridge.on_local_clip(Bytes::from_static(b"0/4.8"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));

        assert_eq!(sent.lock().as_slice(), &[Bytes::from_static(b"0/4.8")]);
        assert_eq!(session.tracks().len(), 1);
        assert_eq!(session.tracks()[0].origin(), ClipOrigin::Local);
        assert!((session.tracks()[0].width_px() - 400.0).abs() < 1e-3);
    }

    #[test]
    fn send_failure_still_plays_locally() {
        let link = RecordingLink {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        };
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), Some(Box::new(link)));
        let mut session = session();

        bridge.on_local_clip(Bytes::from_static(b"0/1.0"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));
        assert_eq!(session.tracks().len(), 1);
    }

    #[test]
    fn remote_clip_is_not_rebroadcast() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let link = RecordingLink {
            sent: sent.clone(),
            fail: false,
        };
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), Some(Box::new(link)));
        let mut session = session();

        bridge.on_remote_clip(Bytes::from_static(b"0/2.0"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));

        assert!(sent.lock().is_empty());
        assert_eq!(session.tracks()[0].origin(), ClipOrigin::Remote);
    }

    #[test]
    fn failed_decode_is_dropped_and_later_clips_still_land() {
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), None);
        let mut session = session();

        bridge.on_remote_clip(Bytes::from_static(b"garbage"));
        bridge.on_remote_clip(Bytes::from_static(b"0/1.0"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));

        assert_eq!(session.tracks().len(), 1);
        assert_eq!(bridge.pending(), 0);
    }

    #[test]
    fn tracks_keep_arrival_order_when_decodes_finish_out_of_order() {
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), None);
        let mut session = session();

        // the first blob takes longest to decode
        bridge.on_remote_clip(Bytes::from_static(b"150/1.2"));
        bridge.on_remote_clip(Bytes::from_static(b"0/2.4"));
        bridge.on_remote_clip(Bytes::from_static(b"0/4.8"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));

        let widths: Vec<f32> = session.tracks().iter().map(|t| t.width_px().round()).collect();
        assert_eq!(widths, vec![100.0, 200.0, 400.0]);
    }

    #[test]
    fn dropped_link_keeps_recordings_local() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let link = RecordingLink {
            sent: sent.clone(),
            fail: false,
        };
        let mut bridge = CaptureBridge::new(Arc::new(ScriptedDecoder), Some(Box::new(link)));
        let mut session = session();
        assert!(bridge.has_link());

        bridge.on_local_clip(Bytes::from_static(b"0/1.0"));
        bridge.set_link(None);
        assert!(!bridge.has_link());
        bridge.on_local_clip(Bytes::from_static(b"0/2.0"));
        assert!(bridge.flush(&mut session, Duration::from_secs(5)));

        assert_eq!(sent.lock().as_slice(), &[Bytes::from_static(b"0/1.0")]);
        assert_eq!(session.tracks().len(), 2);
    }
}
