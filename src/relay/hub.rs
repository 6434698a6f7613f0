use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionId = u64;

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Queued for a peer's writer.
    pub delivered: usize,
    /// Peer queue full; this payload is lost for that peer.
    pub dropped: usize,
    /// Peer already closing.
    pub skipped: usize,
}

/// The live connection set. Holds nothing but one bounded outbound queue per
/// open connection; there is no history.
pub struct RelayHub {
    peers: Mutex<HashMap<ConnectionId, mpsc::Sender<Bytes>>>,
    queue_depth: usize,
    next_id: AtomicU64,
}

impl RelayHub {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            queue_depth: queue_depth.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection; the receiver feeds that connection's writer.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Bytes>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.peers.lock().insert(id, tx);
        (id, rx)
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.peers.lock().remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Hand `payload` to every other ready connection without waiting on any
    /// of them.
    pub fn broadcast(&self, from: ConnectionId, payload: Bytes) -> FanOut {
        let mut fan_out = FanOut::default();
        let peers = self.peers.lock();
        for (&id, tx) in peers.iter() {
            if id == from {
                continue;
            }
            match tx.try_send(payload.clone()) {
                Ok(()) => fan_out.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Connection {} is not keeping up, dropping payload", id);
                    fan_out.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => fan_out.skipped += 1,
            }
        }
        fan_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_everyone_but_the_sender() {
        let hub = RelayHub::new(4);
        let (a, mut a_rx) = hub.connect();
        let (_b, mut b_rx) = hub.connect();
        let (_c, mut c_rx) = hub.connect();

        let payload = Bytes::from_static(b"\x00\x01clip\xff");
        let fan_out = hub.broadcast(a, payload.clone());

        assert_eq!(fan_out.delivered, 2);
        assert_eq!(b_rx.try_recv().unwrap(), payload);
        assert_eq!(c_rx.try_recv().unwrap(), payload);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn n_clients_one_sender_means_n_minus_one_deliveries() {
        let hub = RelayHub::new(4);
        let receivers: Vec<_> = (0..6).map(|_| hub.connect()).collect();
        let sender = receivers[3].0;
        let fan_out = hub.broadcast(sender, Bytes::from_static(b"x"));
        assert_eq!(fan_out.delivered, 5);
        assert_eq!(fan_out.dropped + fan_out.skipped, 0);
    }

    #[test]
    fn closed_peer_is_skipped_without_affecting_others() {
        let hub = RelayHub::new(4);
        let (a, _a_rx) = hub.connect();
        let (_b, b_rx) = hub.connect();
        let (_c, mut c_rx) = hub.connect();
        drop(b_rx);

        let fan_out = hub.broadcast(a, Bytes::from_static(b"y"));
        assert_eq!(fan_out.skipped, 1);
        assert_eq!(fan_out.delivered, 1);
        assert_eq!(c_rx.try_recv().unwrap(), Bytes::from_static(b"y"));
    }

    #[test]
    fn slow_peer_loses_messages_instead_of_queueing() {
        let hub = RelayHub::new(2);
        let (a, _a_rx) = hub.connect();
        let (_slow, mut slow_rx) = hub.connect();
        let (_fast, mut fast_rx) = hub.connect();

        for i in 0..3u8 {
            hub.broadcast(a, Bytes::from(vec![i]));
            assert_eq!(fast_rx.try_recv().unwrap(), Bytes::from(vec![i]));
        }

        // first two kept in order, third dropped
        assert_eq!(slow_rx.try_recv().unwrap(), Bytes::from(vec![0u8]));
        assert_eq!(slow_rx.try_recv().unwrap(), Bytes::from(vec![1u8]));
        assert!(slow_rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_peers_leave_the_set() {
        let hub = RelayHub::new(4);
        let (a, _a_rx) = hub.connect();
        let (b, _b_rx) = hub.connect();
        hub.disconnect(b);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.broadcast(a, Bytes::from_static(b"z")).delivered, 0);
    }
}
