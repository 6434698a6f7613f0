pub mod audio;
pub mod bridge;
pub mod capture;
pub mod config;
pub mod constants;
pub mod decode;
pub mod entry;
pub mod error;
pub mod messages;
pub mod model;
pub mod paths;
pub mod playback;
pub mod relay;
pub mod time_utils;
pub mod ui;
