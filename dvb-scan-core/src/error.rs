//! Error types for the scan engine.

use thiserror::Error;

/// Failure modes surfaced while parsing a PSI/SI section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    #[error("section too short for header")]
    TooShort,
    #[error("section length field too small")]
    LengthTooSmall,
    #[error("incomplete section data")]
    Incomplete,
    #[error("unexpected table id {0:#04x}")]
    WrongTable(u8),
    #[error("descriptor loop truncated")]
    TruncatedDescriptorLoop,
    #[error("CRC mismatch")]
    CrcMismatch,
}

/// Failure modes of the scan engine proper. These never propagate across the
/// scan driver's public surface uncaught; the driver converts each into an
/// observer event or a state transition at its boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("tuning failed: {0}")]
    TuneFailed(String),
    #[error("filter timed out after {0:?}")]
    FilterTimeout(std::time::Duration),
    #[error("no demux available")]
    NoDemux,
    #[error("section parse error: {0}")]
    Section(#[from] SectionError),
    #[error("lcn file error: {0}")]
    Lcn(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
