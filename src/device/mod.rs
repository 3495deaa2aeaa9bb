pub mod client;
pub mod reply;
pub mod table;

pub use client::DeviceClient;
pub use reply::Reply;
pub use table::{CommandDescriptor, CommandTable};

use crate::protocol::{DeviceFault, ProtocolError};
use crate::serial::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Device not connected")]
    NotOpen,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command discovery failed: {0}")]
    DiscoveryFailed(#[source] Box<ClientError>),

    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("Serial link error: {0}")]
    Link(#[from] LinkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Link(LinkError::Timeout(_)) => true,
            ClientError::DiscoveryFailed(inner) => inner.is_timeout(),
            _ => false,
        }
    }

    /// The failure the firmware itself reported, if that is what this is
    pub fn device_fault(&self) -> Option<&DeviceFault> {
        match self {
            ClientError::Protocol(ProtocolError::DeviceError(fault)) => Some(fault),
            ClientError::DiscoveryFailed(inner) => inner.device_fault(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
