/// Crate-wide result type.
pub type PeekabooResult<T> = Result<T, PeekabooError>;

/// Error type shared by every stage of the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PeekabooError {
    /// Invalid configuration or input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Audio context misuse or synthesis failure.
    #[error("audio error: {0}")]
    Audio(String),

    /// Rasterization failure.
    #[error("render error: {0}")]
    Render(String),

    /// Capture setup or recorder failure. Fatal to the recording attempt.
    #[error("capture error: {0}")]
    Capture(String),

    /// Config (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else, usually IO with context attached.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PeekabooError {
    /// Build a [`PeekabooError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PeekabooError::Audio`] value.
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Build a [`PeekabooError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`PeekabooError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`PeekabooError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
