use thiserror::Error;

use crate::analysis::StatusCode;
use crate::driver::DriverState;
use crate::texture::{TextureLayout, MAX_FREQUENCY_BIN};

/// Invalid construction parameters. Fatal: raised before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "invalid frequency range [{min}, {max}): need 0 <= min < max <= {}",
        MAX_FREQUENCY_BIN
    )]
    InvalidFrequencyRange { min: i32, max: i32 },

    #[error("texture layout '{0}' is reserved and cannot be built")]
    ReservedLayout(TextureLayout),

    #[error("frame rate must be between 1 and {max} fps, got {fps}")]
    InvalidFrameRate { fps: u32, max: u32 },
}

/// Reasons a tick produced no texture. None of these are fatal; the
/// presentation side keeps showing its previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("analysis source unavailable ({0})")]
    Unavailable(StatusCode),

    #[error("builder was deactivated while the fetch was in flight")]
    Detached,

    #[error("a fetch is already in flight for this builder")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("cannot {action} frame driver in state {from:?}")]
    InvalidTransition {
        from: DriverState,
        action: &'static str,
    },
}
