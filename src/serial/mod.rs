pub mod interface;
pub mod scripted;

pub use interface::SerialInterface;
pub use scripted::ScriptedLink;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Link unavailable: {0}")]
    Unavailable(String),

    #[error("Link write failed: {0}")]
    Write(String),

    #[error("Link read failed: {0}")]
    Read(String),

    #[error("Link timed out after {0:?} waiting for a line")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Line-oriented byte transport the protocol runs over.
///
/// One line out, one line back. Implementations own the endpoint while
/// open and must tolerate `close()` being called any number of times.
pub trait SerialLink {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Send one line; the terminator is appended by the link
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Block until one full line arrives, returned without its terminator.
    ///
    /// The bytes are passed on as received; judging whether they form a
    /// valid reply is left to the decoder.
    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>>;
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_line(timeout)
    }
}
