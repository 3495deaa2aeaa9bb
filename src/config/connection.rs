use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::Dialect;

pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;
// Most boards reset when the port is opened; give the firmware time to boot
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
pub const DEFAULT_DISCOVERY_ID: u16 = 1;
pub const DEFAULT_STATUS_CODES_ID: u16 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid connection config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Everything needed to open a link to one device and talk to its firmware.
///
/// All fields have defaults, so a JSON document only needs to name the
/// fields that differ, usually just `port_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub port_name: String,
    pub baud_rate: u32,
    /// Byte size, 5 through 8
    pub data_bits: u8,
    /// 1 or 2
    pub stop_bits: u8,
    pub parity: Parity,
    pub line_terminator: String,
    pub read_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub dialect: Dialect,
    /// Reserved command that enumerates every other command
    pub discovery_id: u16,
    /// Status-code dialect only: reserved command returning the response-code table
    pub status_codes_id: u16,
    /// Status-code dialect only: name of the success entry in that table
    pub success_status_name: String,
    /// Status-code dialect only: success code used until the table is known
    pub success_status: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            line_terminator: "\n".to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            dialect: Dialect::ResultError,
            discovery_id: DEFAULT_DISCOVERY_ID,
            status_codes_id: DEFAULT_STATUS_CODES_ID,
            success_status_name: "SUCCESS".to_string(),
            success_status: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Sub-millisecond timeouts round up to 1 ms rather than down to zero
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = millis_rounded_up(timeout);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = millis_rounded_up(delay);
        self
    }

    pub fn with_discovery_id(mut self, id: u16) -> Self {
        self.discovery_id = id;
        self
    }

    pub fn with_status_codes_id(mut self, id: u16) -> Self {
        self.status_codes_id = id;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check the framing parameters a serial port can actually be opened with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(ConfigError::Invalid(format!(
                "unsupported byte size {} (expected 5-8)",
                self.data_bits
            )));
        }
        if self.stop_bits != 1 && self.stop_bits != 2 {
            return Err(ConfigError::Invalid(format!(
                "unsupported stop bits {} (expected 1 or 2)",
                self.stop_bits
            )));
        }
        if self.line_terminator.is_empty() {
            return Err(ConfigError::Invalid("line terminator must not be empty".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read timeout must be at least 1 ms".to_string()));
        }
        Ok(())
    }
}

fn millis_rounded_up(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
