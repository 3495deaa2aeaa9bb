//! Wire encoding and reply classification.
//!
//! A request goes out as one line, `[<id>, <arg>, ...]`, and the firmware
//! answers with one JSON object. Two firmware families disagree on the
//! reply's field names; [`Dialect`] selects which convention a connection
//! speaks and [`Correlator`] applies it.

pub mod dialect;
pub mod request;
pub mod response;

pub use dialect::{Correlator, Dialect, StatusCodes};
pub use request::{Argument, Request};
pub use response::decode_response;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure the firmware reported about a call it received and understood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFault {
    /// Name of the status code in the device's response-code table, when known
    pub tag: Option<String>,
    pub message: String,
    pub code: Value,
    pub data: Value,
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}: ", tag)?;
        }
        write!(f, "{}", self.message)?;
        if !self.code.is_null() {
            write!(f, " (code {})", self.code)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response carries no echoed id")]
    MissingEchoedId,

    #[error("Response carries no status")]
    MissingStatus,

    #[error("Response carries neither result nor error")]
    MissingResult,

    #[error("Response id mismatch: sent {sent}, received {received}")]
    IdMismatch { sent: u16, received: Value },

    #[error("Device error: {0}")]
    DeviceError(DeviceFault),

    #[error("Unsupported argument type at position {position}: {kind}")]
    UnsupportedArgumentType { position: usize, kind: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
