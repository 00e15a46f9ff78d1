//! Bar visualizer shown under the current title
//!
//! Each bar swings from rest to two random targets and back to rest, on its
//! own period. Nothing here reads the audio; it only follows `is_playing`.

use std::time::{Duration, Instant};

use rand::Rng;

pub const BAR_COUNT: usize = 14;

/// Height of a bar when nothing is playing.
pub const REST_LEVEL: f64 = 0.2;

/// Upper bound (exclusive) of a random target.
pub const MAX_LEVEL: f64 = 1.1;

/// Quadratic in-out easing over `t` in `[0, 1]`.
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bar {
    first: f64,
    second: f64,
    first_duration: Duration,
    second_duration: Duration,
}

impl Bar {
    fn at_rest(index: usize) -> Self {
        Self {
            first: REST_LEVEL,
            second: REST_LEVEL,
            first_duration: Duration::from_millis(280 + index as u64 * 18),
            second_duration: Duration::from_millis(280 + index as u64 * 20),
        }
    }

    /// rest → first → second, then the cycle starts over from rest
    fn level(&self, elapsed: Duration) -> f64 {
        let cycle = self.first_duration + self.second_duration;
        let phase = Duration::from_nanos((elapsed.as_nanos() % cycle.as_nanos()) as u64);

        if phase < self.first_duration {
            let t = phase.as_secs_f64() / self.first_duration.as_secs_f64();
            REST_LEVEL + (self.first - REST_LEVEL) * ease_in_out_quad(t)
        } else {
            let t = (phase - self.first_duration).as_secs_f64()
                / self.second_duration.as_secs_f64();
            self.first + (self.second - self.first) * ease_in_out_quad(t)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Visualizer {
    bars: Vec<Bar>,
    started: Option<Instant>,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            bars: (0..BAR_COUNT).map(Bar::at_rest).collect(),
            started: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.started.is_some()
    }

    /// Follow the playing flag; new targets are drawn each time playback starts.
    pub fn set_playing<R: Rng + ?Sized>(&mut self, playing: bool, now: Instant, rng: &mut R) {
        match (playing, self.started) {
            (true, None) => {
                for bar in &mut self.bars {
                    bar.first = rng.random_range(REST_LEVEL..MAX_LEVEL);
                    bar.second = rng.random_range(REST_LEVEL..MAX_LEVEL);
                }
                self.started = Some(now);
            }
            (false, Some(_)) => self.started = None,
            _ => {}
        }
    }

    /// Bar heights at `now`, each in `[REST_LEVEL, MAX_LEVEL)`.
    pub fn levels(&self, now: Instant) -> Vec<f64> {
        match self.started {
            Some(started) => {
                let elapsed = now.saturating_duration_since(started);
                self.bars.iter().map(|bar| bar.level(elapsed)).collect()
            }
            None => vec![REST_LEVEL; self.bars.len()],
        }
    }
}
