//! Domain-specific errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("invalid frame range {start}..{end}")]
    InvalidFrameRange { start: f64, end: f64 },
    #[error("frame {0} is outside the accepted range -9999..9999")]
    FrameOutOfBounds(f64),
    #[error("frame range is read-only unless the manual mode is active")]
    ReadOnlyFrameRange,
    #[error("unknown frame range mode '{0}'")]
    UnknownFrameMode(String),
    #[error("unknown failure policy '{0}'")]
    UnknownFailurePolicy(String),
    #[error("no output directory selected")]
    NoOutputDir,
    #[error("loader script needs at least one layer")]
    NoLayers,
}
