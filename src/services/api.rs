//! API request and response types for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::controller::BrickSnapshot;
use crate::device::TestPinRequest;

// ============================================================================
// Response Types
// ============================================================================

/// API response wrapper for consistent JSON structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (present when success=true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present when success=false)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Port snapshot plus the controller clock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsResponse {
    /// Controller clock in microseconds
    pub now_us: u64,
    /// Every port
    #[serde(flatten)]
    pub brick: BrickSnapshot,
}

/// Result of a byte-stream write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    /// Bytes consumed
    pub accepted: usize,
}

/// Result of a test-pin request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPinResponse {
    /// Pin characters, without the terminator (reads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pins: Option<String>,
}

// ============================================================================
// Request Types
// ============================================================================

/// Test-pin request body.
///
/// `{"op": "read", "port": 4, "length": 6}` or
/// `{"op": "write", "port": 0, "data": "x1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TestPinBody {
    /// Leave test mode
    Off,
    /// Enter test mode
    On,
    /// Read pin levels
    Read {
        /// Port number (outputs from 4)
        port: u8,
        /// Reply length, terminator included
        length: usize,
    },
    /// Drive pins
    Write {
        /// Port number (outputs from 4)
        port: u8,
        /// `0`, `1` or `x` per pin role
        data: String,
    },
}

impl TestPinBody {
    /// Borrow as a controller request.
    pub fn as_request(&self) -> TestPinRequest<'_> {
        match self {
            TestPinBody::Off => TestPinRequest::Off,
            TestPinBody::On => TestPinRequest::On,
            TestPinBody::Read { port, length } => TestPinRequest::Read {
                port: *port,
                length: *length,
            },
            TestPinBody::Write { port, data } => TestPinRequest::Write {
                port: *port,
                data: data.as_bytes(),
            },
        }
    }
}
