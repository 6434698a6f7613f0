use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::bridge::RelayLink;
use crate::error::{LoopError, Result};
use crate::messages::NetEvent;

/// Participant side of the relay connection.
///
/// The socket lives on its own thread with a single-threaded tokio runtime;
/// inbound clips are pushed to `events`, outbound clips are queued with
/// [`RelayClient::send_clip`].
pub struct RelayClient {
    outbound: mpsc::UnboundedSender<Bytes>,
    connected: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl RelayClient {
    /// Connect to `url`, waiting at most `timeout` for the handshake.
    pub fn connect(url: &str, timeout: Duration, events: Sender<NetEvent>) -> Result<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let connected = Arc::new(AtomicBool::new(false));

        let url = url.to_string();
        let connected_clone = connected.clone();
        let worker = std::thread::Builder::new()
            .name("relay-client".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(LoopError::Connection(e.to_string())));
                        return;
                    }
                };
                runtime.block_on(run_connection(
                    url,
                    timeout,
                    outbound_rx,
                    shutdown_rx,
                    events,
                    connected_clone,
                    ready_tx,
                ));
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                outbound,
                connected,
                shutdown: Some(shutdown_tx),
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(LoopError::Connection(
                "relay client thread exited during connect".into(),
            )),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl RelayLink for RelayClient {
    fn send_clip(&self, blob: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(LoopError::Connection("relay connection is closed".into()));
        }
        self.outbound
            .send(blob)
            .map_err(|_| LoopError::Connection("relay writer has stopped".into()))
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

async fn run_connection(
    url: String,
    timeout: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    mut shutdown_rx: oneshot::Receiver<()>,
    events: Sender<NetEvent>,
    connected: Arc<AtomicBool>,
    ready_tx: crossbeam_channel::Sender<Result<()>>,
) {
    let socket = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => {
            let _ = ready_tx.send(Err(LoopError::Connection(format!("{}: {}", url, e))));
            return;
        }
        Err(_) => {
            let _ = ready_tx.send(Err(LoopError::Connection(format!(
                "{}: timed out after {:?}",
                url, timeout
            ))));
            return;
        }
    };

    connected.store(true, Ordering::Relaxed);
    let _ = ready_tx.send(Ok(()));
    log::info!("Connected to relay at {}", url);

    let (mut sink, mut stream) = socket.split();
    let reason = loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                let _ = sink.send(Message::Close(None)).await;
                break "client shut down".to_string();
            }
            Some(blob) = outbound_rx.recv() => {
                let len = blob.len();
                if let Err(e) = sink.send(Message::Binary(blob)).await {
                    break format!("send failed: {}", e);
                }
                log::debug!("Sent {} byte clip to relay", len);
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Binary(blob))) => {
                    log::debug!("received {} byte clip", blob.len());
                    if events.send(NetEvent::ClipReceived(blob)).is_err() {
                        break "event receiver dropped".to_string();
                    }
                }
                Some(Ok(Message::Close(_))) | None => break "relay closed the connection".to_string(),
                Some(Ok(_)) => {}
                Some(Err(e)) => break format!("read failed: {}", e),
            },
        }
    };

    connected.store(false, Ordering::Relaxed);
    log::info!("Relay connection ended: {}", reason);
    let _ = events.send(NetEvent::Disconnected(reason));
}
