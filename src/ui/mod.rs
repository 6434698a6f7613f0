mod app;
mod timeline;
mod transport;

pub use app::LoopJamApp;
pub use timeline::TimelineAction;
pub use transport::TransportAction;
