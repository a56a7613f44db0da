use crate::foundation::error::{PeekabooError, PeekabooResult};

/// Lifecycle of one capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

impl CaptureState {
    /// `Idle -> Recording`.
    pub fn begin(&mut self) -> PeekabooResult<()> {
        self.transition(CaptureState::Idle, CaptureState::Recording)
    }

    /// `Recording -> Finalizing`.
    pub fn finalize(&mut self) -> PeekabooResult<()> {
        self.transition(CaptureState::Recording, CaptureState::Finalizing)
    }

    /// `Finalizing -> Idle`.
    pub fn complete(&mut self) -> PeekabooResult<()> {
        self.transition(CaptureState::Finalizing, CaptureState::Idle)
    }

    /// Drop back to `Idle` from anywhere, e.g. after a failed start.
    pub fn abort(&mut self) {
        *self = CaptureState::Idle;
    }

    pub fn is_recording(self) -> bool {
        self == CaptureState::Recording
    }

    fn transition(&mut self, from: CaptureState, to: CaptureState) -> PeekabooResult<()> {
        if *self != from {
            return Err(PeekabooError::capture(format!(
                "illegal capture transition {self:?} -> {to:?}"
            )));
        }
        *self = to;
        Ok(())
    }
}
