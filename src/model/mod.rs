pub mod clip;
pub mod session;
pub mod track;

pub use clip::{ClipBuffer, ClipOrigin, DecodedClip};
pub use session::LoopSession;
pub use track::{OverlengthPolicy, Track, TrackView, dragged_offset};
