//! Errors raised by the control and test-pin interfaces.
//!
//! Classification failures are never errors: a device that cannot be
//! identified is published as [`Classification::ERROR`] and the port keeps
//! watching for the unplug.
//!
//! [`Classification::ERROR`]: crate::Classification::ERROR

use thiserror::Error;

/// Rejected control, raw-pin or test-pin request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// Nothing to parse.
    #[error("empty control buffer")]
    Empty,

    /// The buffer does not cover every port.
    #[error("control buffer too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length.
        expected: usize,
        /// Received length.
        actual: usize,
    },

    /// First byte is not a known command.
    #[error("unknown control command {0:#04x}")]
    UnknownCommand(u8),

    /// Test-pin port number outside the input and output ranges.
    #[error("port {0} out of range")]
    PortOutOfRange(u8),

    /// Test-pin length outside the accepted range.
    #[error("invalid length {0}")]
    InvalidLength(usize),
}
