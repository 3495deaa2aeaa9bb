use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, SerialPort, StopBits};

use super::{LinkError, Result, SerialLink};
use crate::config::{ConnectionConfig, Parity};

const READ_CHUNK: usize = 256;

/// A [`SerialLink`] over a real serial port.
pub struct SerialInterface {
    config: ConnectionConfig,
    port: Option<Box<dyn SerialPort>>,
    // Bytes received past the last terminator, kept for the next read
    pending: Vec<u8>,
}

impl SerialInterface {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            port: None,
            pending: Vec::new(),
        }
    }

    /// Wrap a port that was opened elsewhere, e.g. one end of a pty pair
    pub fn from_port(config: ConnectionConfig, port: Box<dyn SerialPort>) -> Self {
        Self {
            config,
            port: Some(port),
            pending: Vec::new(),
        }
    }

    fn data_bits(&self) -> DataBits {
        match self.config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn stop_bits(&self) -> StopBits {
        match self.config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }

    fn parity(&self) -> serialport::Parity {
        match self.config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl SerialLink for SerialInterface {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        self.config
            .validate()
            .map_err(|e| LinkError::Unavailable(e.to_string()))?;

        let port = serialport::new(self.config.port_name.as_str(), self.config.baud_rate)
            .data_bits(self.data_bits())
            .stop_bits(self.stop_bits())
            .parity(self.parity())
            .timeout(self.config.read_timeout())
            .open()
            .map_err(|e| LinkError::Unavailable(format!("{}: {}", self.config.port_name, e)))?;

        self.port = Some(port);
        self.pending.clear();

        log::info!(
            "Opened {} at {} baud",
            self.config.port_name,
            self.config.baud_rate
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed {}", self.config.port_name);
        }
        self.pending.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| LinkError::Write("port is not open".to_string()))?;

        let mut frame = Vec::with_capacity(line.len() + self.config.line_terminator.len());
        frame.extend_from_slice(line.as_bytes());
        frame.extend_from_slice(self.config.line_terminator.as_bytes());

        port.write_all(&frame)
            .map_err(|e| LinkError::Write(e.to_string()))?;
        port.flush().map_err(|e| LinkError::Write(e.to_string()))?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| LinkError::Read("port is not open".to_string()))?;
        let terminator = self.config.line_terminator.as_bytes();
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = take_line(&mut self.pending, terminator) {
                return Ok(line);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LinkError::Timeout(timeout));
            }
            port.set_timeout(deadline - now)
                .map_err(|e| LinkError::Read(e.to_string()))?;

            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(ref e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(LinkError::Read(e.to_string())),
            }
        }
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.close();
    }
}

/// Split the first complete line off the front of `buffer`.
///
/// A `\r` left in front of a `\n` terminator is dropped as well, so
/// firmware printing CRLF still yields clean lines. Bytes are not checked
/// for UTF-8 here; a corrupted line must still reach the decoder whole.
pub fn take_line(buffer: &mut Vec<u8>, terminator: &[u8]) -> Option<Vec<u8>> {
    if terminator.is_empty() || buffer.len() < terminator.len() {
        return None;
    }
    let end = buffer
        .windows(terminator.len())
        .position(|window| window == terminator)?;

    let mut line: Vec<u8> = buffer.drain(..end + terminator.len()).collect();
    line.truncate(end);
    if terminator == b"\n" && line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_response, ProtocolError};

    #[test]
    fn test_take_line_splits_on_terminator() {
        let mut buffer = b"{\"id\":1}\n{\"id\":2}\n".to_vec();
        assert_eq!(take_line(&mut buffer, b"\n"), Some(b"{\"id\":1}".to_vec()));
        assert_eq!(take_line(&mut buffer, b"\n"), Some(b"{\"id\":2}".to_vec()));
        assert_eq!(take_line(&mut buffer, b"\n"), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_line_keeps_invalid_utf8_for_decoder() {
        let mut buffer = b"{\"id\":0,\"result\":\"ab\xff\xfe\"}\n{\"id\":1}\n".to_vec();
        let line = take_line(&mut buffer, b"\n").unwrap();
        assert_eq!(line, b"{\"id\":0,\"result\":\"ab\xff\xfe\"}".to_vec());
        assert!(matches!(
            decode_response(&line),
            Err(ProtocolError::MalformedResponse(_))
        ));
        // The corrupted line is consumed whole; framing stays in sync
        assert_eq!(take_line(&mut buffer, b"\n"), Some(b"{\"id\":1}".to_vec()));
    }

    #[test]
    fn test_take_line_waits_for_partial_line() {
        let mut buffer = b"{\"id\":".to_vec();
        assert_eq!(take_line(&mut buffer, b"\n"), None);
        buffer.extend_from_slice(b"3}\r\n{\"id\"");
        assert_eq!(take_line(&mut buffer, b"\n"), Some(b"{\"id\":3}".to_vec()));
        assert_eq!(buffer, b"{\"id\"".to_vec());
    }

    #[test]
    fn test_take_line_multibyte_terminator() {
        let mut buffer = b"first\r\nsecond\r".to_vec();
        assert_eq!(take_line(&mut buffer, b"\r\n"), Some(b"first".to_vec()));
        assert_eq!(take_line(&mut buffer, b"\r\n"), None);
        buffer.push(b'\n');
        assert_eq!(take_line(&mut buffer, b"\r\n"), Some(b"second".to_vec()));
    }

    #[test]
    fn test_closed_interface_rejects_io() {
        let mut interface = SerialInterface::new(ConnectionConfig::new("/dev/does-not-exist"));
        assert!(!interface.is_open());
        assert!(matches!(interface.write_line("[0]"), Err(LinkError::Write(_))));
        assert!(matches!(
            interface.read_line(Duration::from_millis(1)),
            Err(LinkError::Read(_))
        ));
        interface.close();
        interface.close();
        assert!(!interface.is_open());
    }

    #[test]
    fn test_open_invalid_config_is_unavailable() {
        let mut config = ConnectionConfig::new("/dev/does-not-exist");
        config.stop_bits = 3;
        let mut interface = SerialInterface::new(config);
        assert!(matches!(interface.open(), Err(LinkError::Unavailable(_))));
        assert!(!interface.is_open());
    }

    #[cfg(unix)]
    fn pty_interface() -> (SerialInterface, serialport::TTYPort) {
        let (device, host) = serialport::TTYPort::pair().expect("pty pair");
        let interface = SerialInterface::from_port(ConnectionConfig::new("pty"), Box::new(host));
        (interface, device)
    }

    #[cfg(unix)]
    #[test]
    fn test_read_line_times_out_then_completes_partial_line() {
        let (mut interface, mut device) = pty_interface();

        device.write_all(b"{\"id\":").unwrap();
        device.flush().unwrap();
        let started = Instant::now();
        assert!(matches!(
            interface.read_line(Duration::from_millis(100)),
            Err(LinkError::Timeout(_))
        ));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(interface.is_open());

        device.write_all(b"4}\n{\"id\":5}\n").unwrap();
        device.flush().unwrap();
        assert_eq!(
            interface.read_line(Duration::from_secs(2)).unwrap(),
            b"{\"id\":4}".to_vec()
        );
        assert_eq!(
            interface.read_line(Duration::from_secs(2)).unwrap(),
            b"{\"id\":5}".to_vec()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_write_line_appends_terminator() {
        let (mut interface, mut device) = pty_interface();

        interface.write_line("[3, 5]").unwrap();
        device.set_timeout(Duration::from_secs(2)).unwrap();
        let mut received = Vec::new();
        let mut chunk = [0u8; 64];
        while !received.ends_with(b"\n") {
            let n = device.read(&mut chunk).expect("read from pty");
            received.extend_from_slice(&chunk[..n]);
        }
        assert!(received.starts_with(b"[3, 5]"));
    }
}
