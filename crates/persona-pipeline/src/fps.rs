//! Throughput instrumentation for the frame loop.

use std::time::{Duration, Instant};

/// Cumulative frames-per-second counter: started when the loop enters
/// `Running`, ticked once per completed iteration.
#[derive(Debug, Default)]
pub struct FpsCounter {
    started: Option<Instant>,
    frames: u64,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn tick(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn fps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_accumulate() {
        let mut fps = FpsCounter::new();
        fps.start();
        for _ in 0..5 {
            fps.tick();
        }
        assert_eq!(fps.frames(), 5);
    }

    #[test]
    fn unstarted_counter_reports_zero() {
        let fps = FpsCounter::new();
        assert_eq!(fps.frames(), 0);
        assert_eq!(fps.fps(), 0.0);
    }

    #[test]
    fn fps_is_finite_and_non_negative() {
        let mut fps = FpsCounter::new();
        fps.start();
        fps.tick();
        std::thread::sleep(Duration::from_millis(5));
        let value = fps.fps();
        assert!(value.is_finite());
        assert!(value > 0.0);
    }
}
