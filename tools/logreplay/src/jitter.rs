use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Floor for every inter-line delay so a large negative offset never busy-loops.
pub const MIN_DELAY_SECONDS: f64 = 0.1;

/// Shared source of jittered inter-line delays.
///
/// Clones share one generator, so a seeded clock yields a reproducible
/// sequence across all tasks that draw from it.
#[derive(Debug, Clone)]
pub struct JitterClock {
    rng: Arc<Mutex<StdRng>>,
}

impl JitterClock {
    pub fn from_entropy() -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn next_delay(&self, interval_seconds: f64, jitter_seconds: f64) -> Duration {
        let offset = self.draw_offset(jitter_seconds);
        Duration::try_from_secs_f64(clamp_delay(interval_seconds, offset))
            .unwrap_or(Duration::MAX)
    }

    fn draw_offset(&self, jitter_seconds: f64) -> f64 {
        if jitter_seconds <= 0.0 || !jitter_seconds.is_finite() {
            return 0.0;
        }
        // A poisoned lock still holds a usable generator.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Scaled rather than `gen_range(-j..=j)`, whose span overflows for huge bounds.
        jitter_seconds * (rng.gen::<f64>() * 2.0 - 1.0)
    }
}

impl Default for JitterClock {
    fn default() -> Self {
        Self::from_entropy()
    }
}

pub fn clamp_delay(interval_seconds: f64, offset_seconds: f64) -> f64 {
    let delay = interval_seconds + offset_seconds;
    if delay.is_nan() {
        return MIN_DELAY_SECONDS;
    }
    delay.max(MIN_DELAY_SECONDS)
}
