use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonic time source shared by the render loop, the audio context and the auto-stop timer.
///
/// Every component that needs "now" reads the same clock, so the render loop and the audio
/// schedule stay coupled only through absolute times taken at session start.
pub trait Clock: Send + Sync + Debug {
    /// Seconds since the clock's epoch.
    fn now(&self) -> f64;

    /// Wall-clock time it takes this clock to advance by `secs`.
    fn real_duration(&self, secs: f64) -> Duration;
}

/// Real time.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn real_duration(&self, secs: f64) -> Duration {
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Real time running `speed` times faster. Used for dry runs and tests.
#[derive(Debug)]
pub struct ScaledClock {
    epoch: Instant,
    speed: f64,
}

impl ScaledClock {
    /// Non-positive or non-finite speeds fall back to real time.
    pub fn new(speed: f64) -> Self {
        Self {
            epoch: Instant::now(),
            speed: if speed.is_finite() && speed > 0.0 {
                speed
            } else {
                1.0
            },
        }
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * self.speed
    }

    fn real_duration(&self, secs: f64) -> Duration {
        Duration::from_secs_f64((secs / self.speed).max(0.0))
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = t;
        }
    }

    pub fn advance(&self, dt: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += dt;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|t| *t).unwrap_or(0.0)
    }

    fn real_duration(&self, _secs: f64) -> Duration {
        Duration::ZERO
    }
}
