//! Host-side client for numbered remote calls to microcontroller firmware
//! over a serial link.
//!
//! On connect the client asks the firmware for its command table, after
//! which every command can be invoked by name:
//!
//! ```no_run
//! use serial_rpc::{args, ConnectionConfig, DeviceClient};
//!
//! let mut client = DeviceClient::new(ConnectionConfig::new("/dev/ttyACM0"));
//! client.open()?;
//! let reply = client.call("setValue", args![5])?;
//! # Ok::<(), serial_rpc::ClientError>(())
//! ```
pub mod config;
pub mod device;
pub mod protocol;
pub mod serial;

pub use config::{ConfigError, ConnectionConfig, Parity};
pub use device::{ClientError, CommandDescriptor, CommandTable, DeviceClient, Reply};
pub use protocol::{Argument, DeviceFault, Dialect, ProtocolError, Request};
pub use serial::{LinkError, ScriptedLink, SerialInterface, SerialLink};
