pub mod connection;

pub use connection::{ConfigError, ConnectionConfig, Parity};
