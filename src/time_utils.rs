/// Fixed timing and geometry of the shared loop.
///
/// Every conversion between seconds, beats and ruler pixels goes through
/// here so the tempo, beat count and ruler width stay consistent for the
/// whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    bpm: f32,
    beats_per_loop: u32,
    ruler_width_px: f32,
}

impl LoopTiming {
    pub fn new(bpm: f32, beats_per_loop: u32, ruler_width_px: f32) -> Self {
        Self {
            bpm,
            beats_per_loop,
            ruler_width_px,
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn beats_per_loop(&self) -> u32 {
        self.beats_per_loop
    }

    pub fn ruler_width_px(&self) -> f32 {
        self.ruler_width_px
    }

    /// Length of one pass through the loop.
    #[inline]
    pub fn loop_duration_seconds(&self) -> f64 {
        self.beats_per_loop as f64 * 60.0 / self.bpm as f64
    }

    /// Convert a clip duration to its width on the ruler
    #[inline]
    pub fn seconds_to_pixels(&self, seconds: f64) -> f32 {
        (seconds / self.loop_duration_seconds() * self.ruler_width_px as f64) as f32
    }

    /// Convert a ruler position back to seconds into the loop
    #[inline]
    pub fn pixels_to_seconds(&self, pixels: f32) -> f64 {
        pixels as f64 / self.ruler_width_px as f64 * self.loop_duration_seconds()
    }

    #[inline]
    pub fn beat_width_px(&self) -> f32 {
        self.ruler_width_px / self.beats_per_loop as f32
    }

    /// Convert seconds to beats
    #[inline]
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * (self.bpm as f64 / 60.0)
    }

    /// Wrap an elapsed transport time into the loop.
    #[inline]
    pub fn loop_position_seconds(&self, elapsed_seconds: f64) -> f64 {
        let loop_len = self.loop_duration_seconds();
        if loop_len > 0.0 {
            elapsed_seconds.rem_euclid(loop_len)
        } else {
            0.0
        }
    }
}

/// Format a position in the loop as bars:beats:sixteenths
pub fn format_bars_beats_sixteenths(beats: f64, beats_per_bar: u32) -> String {
    let bars = (beats / beats_per_bar as f64) as i32 + 1;
    let beat = (beats % beats_per_bar as f64) as i32 + 1;
    let sixteenth = ((beats % 1.0) * 4.0) as i32 + 1;
    format!("{:03}:{:02}:{:02}", bars, beat, sixteenth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_bpm_sixteen_beats_is_nine_point_six_seconds() {
        let timing = LoopTiming::new(100.0, 16, 800.0);
        assert!((timing.loop_duration_seconds() - 9.6).abs() < 1e-9);
    }

    #[test]
    fn half_loop_clip_covers_half_the_ruler() {
        let timing = LoopTiming::new(100.0, 16, 800.0);
        assert!((timing.seconds_to_pixels(4.8) - 400.0).abs() < 1e-3);
        assert!((timing.pixels_to_seconds(400.0) - 4.8).abs() < 1e-6);
        assert_eq!(timing.beat_width_px(), 50.0);
    }

    #[test]
    fn loop_position_wraps() {
        let timing = LoopTiming::new(100.0, 16, 800.0);
        assert!((timing.loop_position_seconds(10.6) - 1.0).abs() < 1e-9);
        assert!((timing.loop_position_seconds(3.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn formats_positions() {
        assert_eq!(format_bars_beats_sixteenths(0.0, 4), "001:01:01");
        assert_eq!(format_bars_beats_sixteenths(5.5, 4), "002:02:03");
    }
}
