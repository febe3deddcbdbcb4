use thiserror::Error;

/// Top-level error type used across the entire workspace.
///
/// Every buffer-level variant is local and recoverable: the operation that
/// produced it was refused and left the buffer untouched.
#[derive(Debug, Error)]
pub enum HeliError {
    #[error("segment starts {offset} samples before the end of stored data")]
    OutOfOrder { offset: i64 },

    #[error("invalid hole patch: {0}")]
    InvalidHolePatch(String),

    #[error("discontinuous hole patch: {provided} samples provided for a {expected}-sample hole")]
    DiscontinuousPatch { provided: usize, expected: usize },

    #[error("no unresolved hole to patch")]
    NoHole,

    #[error("sample rate mismatch: buffer runs at {expected} Hz, packet at {got} Hz")]
    SampleRateMismatch { expected: f64, got: f64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl HeliError {
    /// Short machine-readable tag, used when a rejection is reported downstream.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfOrder { .. } => "out_of_order",
            Self::InvalidHolePatch(_) => "invalid_hole_patch",
            Self::DiscontinuousPatch { .. } => "discontinuous_patch",
            Self::NoHole => "no_hole",
            Self::SampleRateMismatch { .. } => "sample_rate_mismatch",
            Self::Config(_) => "config",
            Self::Stream(_) => "stream",
            Self::Io { .. } => "io",
        }
    }
}

pub type Result<T, E = HeliError> = std::result::Result<T, E>;
