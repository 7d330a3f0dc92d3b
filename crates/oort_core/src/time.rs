//! Per-frame timing for the render-driven simulation loop.
//!
//! The render engine hands the frame callback a raw elapsed delta. The
//! simulation never consumes that value directly: `begin_frame` clamps it to
//! `max_dt` so a stalled frame (window drag, debugger break, disk hitch)
//! produces one ordinary-sized step instead of a tunneling-sized one.

use std::time::Instant;

const FPS_SAMPLE_COUNT: usize = 60;

pub struct FrameClock {
    pub max_dt: f32,
    pub total_time: f64,
    pub frame_count: u64,
    /// Unclamped delta reported for the current frame.
    pub real_dt: f64,
    /// Clamped delta handed to the simulation for the current frame.
    pub dt: f32,
    pub clamped_frames: u64,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            max_dt,
            total_time: 0.0,
            frame_count: 0,
            real_dt: 0.0,
            dt: 0.0,
            clamped_frames: 0,
            last_instant: Instant::now(),
            fps_samples: [1.0 / 60.0; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: 60.0,
            smoothed_frame_time_ms: 16.667,
        }
    }

    /// Wall-clock seconds since the previous call. The binary feeds this into
    /// the frame callback; tests feed synthetic deltas instead.
    pub fn measure(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_instant).as_secs_f64();
        self.last_instant = now;
        elapsed
    }

    /// Record a new frame and return the clamped simulation delta.
    pub fn begin_frame(&mut self, elapsed: f64) -> f32 {
        let elapsed = if elapsed.is_finite() && elapsed > 0.0 {
            elapsed
        } else {
            0.0
        };
        self.real_dt = elapsed;
        self.frame_count += 1;

        let max_dt = f64::from(self.max_dt);
        let clamped = if elapsed > max_dt {
            self.clamped_frames += 1;
            log::warn!(
                "Frame took {:.1}ms, clamping simulation step to {:.1}ms",
                elapsed * 1000.0,
                max_dt * 1000.0
            );
            max_dt
        } else {
            elapsed
        };
        self.dt = clamped as f32;
        self.total_time += clamped;

        if elapsed > 0.0 {
            self.fps_samples[self.fps_sample_index] = elapsed;
            self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
            let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
            self.smoothed_frame_time_ms = avg_dt * 1000.0;
            self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
        }

        self.dt
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(1.0 / 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frames_pass_through_unclamped() {
        let mut clock = FrameClock::new(1.0 / 30.0);
        let dt = clock.begin_frame(1.0 / 120.0);
        assert!((dt - 1.0 / 120.0).abs() < 1e-6);
        assert_eq!(clock.clamped_frames, 0);
        assert_eq!(clock.frame_count, 1);
    }

    #[test]
    fn long_frames_are_clamped_to_max_dt() {
        let mut clock = FrameClock::new(1.0 / 30.0);
        let dt = clock.begin_frame(0.5);
        assert!((dt - 1.0 / 30.0).abs() < 1e-6);
        assert!((clock.real_dt - 0.5).abs() < f64::EPSILON);
        assert_eq!(clock.clamped_frames, 1);
    }

    #[test]
    fn negative_and_nan_deltas_become_zero() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.begin_frame(-1.0), 0.0);
        assert_eq!(clock.begin_frame(f64::NAN), 0.0);
        assert_eq!(clock.frame_count, 2);
        assert_eq!(clock.total_time, 0.0);
    }

    #[test]
    fn total_time_accumulates_clamped_deltas() {
        let mut clock = FrameClock::new(0.1);
        clock.begin_frame(0.05);
        clock.begin_frame(2.0);
        assert!((clock.total_time - 0.15).abs() < 1e-6);
    }
}
