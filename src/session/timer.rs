use std::sync::Arc;
use std::thread::JoinHandle;

use crate::{
    foundation::{
        clock::Clock,
        error::{PeekabooError, PeekabooResult},
    },
    session::{
        cancel::CancelToken,
        render_loop::{LiveGuard, MIN_TICK_WAIT},
    },
};

/// Sleep on `token` until `deadline` on `clock`. Returns `true` if the deadline was reached.
pub fn wait_until(clock: &dyn Clock, token: &CancelToken, deadline: f64) -> bool {
    loop {
        if token.is_cancelled() {
            return false;
        }
        let remaining = deadline - clock.now();
        if remaining <= 0.0 {
            return true;
        }
        if token.wait_timeout(clock.real_duration(remaining).max(MIN_TICK_WAIT)) {
            return false;
        }
    }
}

/// One-shot timer that runs a callback at a clock deadline unless its token is cancelled first.
#[derive(Debug)]
pub struct AutoStopTimer {
    handle: Option<JoinHandle<()>>,
}

impl AutoStopTimer {
    /// Start the timer thread. `guard` is released once the wait ends, before `on_fire` runs.
    pub fn spawn(
        clock: Arc<dyn Clock>,
        token: CancelToken,
        deadline: f64,
        guard: LiveGuard,
        on_fire: impl FnOnce() + Send + 'static,
    ) -> PeekabooResult<Self> {
        let handle = std::thread::Builder::new()
            .name("peekaboo-autostop".to_string())
            .spawn(move || {
                let fired = wait_until(clock.as_ref(), &token, deadline);
                // The timer stops counting as live once its wait is over; `on_fire` may run long.
                drop(guard);
                if fired {
                    tracing::debug!(deadline, "auto-stop timer fired");
                    on_fire();
                }
            })
            .map_err(|e| {
                PeekabooError::Other(anyhow::anyhow!("failed to spawn auto-stop timer: {e}"))
            })?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Wait for the timer thread to exit. A no-op when called from the timer thread itself.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != std::thread::current().id()
            && handle.join().is_err()
        {
            tracing::warn!("auto-stop timer thread panicked");
        }
    }
}
