use bytes::Bytes;

/// Events from the relay connection to the UI thread.
#[derive(Debug, Clone)]
pub enum NetEvent {
    ClipReceived(Bytes),
    Disconnected(String),
}
