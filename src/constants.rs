use eframe::egui;

// Loop Constants
pub const DEFAULT_BPM: f32 = 100.0;
pub const DEFAULT_BEATS_PER_LOOP: u32 = 16;
pub const BEATS_PER_BAR: u32 = 4;
pub const DEFAULT_RULER_WIDTH_PX: f32 = 800.0;

// Audio Engine Constants
pub const SCHEDULE_LEAD_SECONDS: f64 = 0.05; // headroom so every voice lands in the same callback
pub const VOICE_CAPACITY: usize = 64; // preallocated, grows past this
pub const FALLBACK_SAMPLE_RATE: u32 = 48000;

// Relay Constants
pub const DEFAULT_RELAY_BIND: &str = "0.0.0.0";
pub const DEFAULT_RELAY_PORT: u16 = 8080;
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8080";
pub const DEFAULT_OUTBOUND_QUEUE_DEPTH: usize = 32;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

// UI Layout Constants
pub const TRACK_HEIGHT: f32 = 50.0;
pub const TRACK_CORNER_RADIUS: f32 = 5.0;
pub const TRACK_LIST_WIDTH: f32 = 180.0;
pub const UI_POLL_INTERVAL_MS: u64 = 33;

// Colors
pub const COLOR_RULER_BG: egui::Color32 = egui::Color32::from_gray(17);
pub const COLOR_GRID_BAR: egui::Color32 = egui::Color32::from_gray(128);
pub const COLOR_GRID_BEAT: egui::Color32 = egui::Color32::from_gray(60);
pub const COLOR_TRACK_LOCAL: egui::Color32 = egui::Color32::from_rgb(255, 190, 40);
pub const COLOR_TRACK_REMOTE: egui::Color32 = egui::Color32::from_rgb(230, 80, 50);
pub const COLOR_TRACK_DRAGGING: egui::Color32 = egui::Color32::from_rgb(255, 230, 120);
pub const COLOR_PLAYHEAD: egui::Color32 = egui::Color32::from_rgb(255, 100, 100);
