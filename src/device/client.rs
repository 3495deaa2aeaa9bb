use std::thread;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{ClientError, CommandTable, Reply, Result};
use crate::config::ConnectionConfig;
use crate::protocol::{decode_response, Argument, Correlator, Dialect, Request, StatusCodes};
use crate::serial::{SerialInterface, SerialLink};

/// Connection to one device and the commands its firmware advertises.
///
/// The client owns the link exclusively. Calls take `&mut self`, so only one
/// request can be in flight; callers sharing a client across threads should
/// put the whole client behind a single `Mutex`. The link is closed when the
/// client is dropped.
pub struct DeviceClient<L: SerialLink = SerialInterface> {
    link: L,
    config: ConnectionConfig,
    correlator: Correlator,
    commands: CommandTable,
}

impl DeviceClient<SerialInterface> {
    /// Client for the serial port named in `config`; call [`open`](Self::open) to connect
    pub fn new(config: ConnectionConfig) -> Self {
        let link = SerialInterface::new(config.clone());
        Self::with_link(link, config)
    }
}

impl<L: SerialLink> DeviceClient<L> {
    pub fn with_link(link: L, config: ConnectionConfig) -> Self {
        let correlator = Correlator::new(config.dialect, StatusCodes::new(config.success_status));
        Self {
            link,
            config,
            correlator,
            commands: CommandTable::new(),
        }
    }

    /// Open the link, wait for the device to settle and discover its commands.
    ///
    /// Does nothing when already open. If discovery fails the link stays
    /// open with whatever was discovered; closing and retrying is up to the
    /// caller.
    pub fn open(&mut self) -> Result<()> {
        if self.link.is_open() {
            return Ok(());
        }

        self.link.open()?;
        self.commands = CommandTable::new();
        self.correlator
            .set_codes(StatusCodes::new(self.config.success_status));

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            log::debug!("Waiting {:?} for device to settle", settle);
            thread::sleep(settle);
        }

        self.discover().map_err(|e| {
            log::warn!("Discovery failed: {}", e);
            ClientError::DiscoveryFailed(Box::new(e))
        })
    }

    fn discover(&mut self) -> Result<()> {
        let payload = self.call_id(self.config.discovery_id, Vec::new())?;
        self.commands = CommandTable::from_payload(&payload)?;
        log::info!("Discovered {} commands: {:?}", self.commands.len(), self.commands.names());

        // The code table sits at a reserved id whether or not the device lists it
        if self.correlator.dialect() == Dialect::StatusCode {
            let id = self.config.status_codes_id;
            let response = self.exchange(id, Vec::new())?;
            let codes = self.correlator.correlate_status_codes(
                id,
                response,
                &self.config.success_status_name,
                self.config.success_status,
            )?;
            log::info!(
                "Discovered {} response codes, success = {}",
                codes.len(),
                codes.success()
            );
            self.correlator.set_codes(codes);
        }
        Ok(())
    }

    /// Close the link and forget the discovered commands. Safe to repeat.
    pub fn close(&mut self) {
        if self.link.is_open() {
            log::info!("Closing device connection");
        }
        self.link.close();
        self.commands = CommandTable::new();
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Invoke a discovered command by name and shape its reply.
    pub fn call(&mut self, name: &str, args: Vec<Argument>) -> Result<Reply> {
        if !self.link.is_open() {
            return Err(ClientError::NotOpen);
        }
        let id = self
            .commands
            .id_of(name)
            .ok_or_else(|| ClientError::UnknownCommand(name.to_string()))?;

        log::debug!("Calling {} (id {})", name, id);
        let payload = self.call_id(id, args)?;
        Ok(Reply::from_payload(payload))
    }

    /// Invoke a command by name and deserialize its shaped reply into `T`
    pub fn call_as<T: DeserializeOwned>(&mut self, name: &str, args: Vec<Argument>) -> Result<T> {
        let value = self.call(name, args)?.into_value();
        serde_json::from_value(value).map_err(|e| ClientError::UnexpectedPayload(e.to_string()))
    }

    /// Invoke a command by number, bypassing the command table.
    ///
    /// Returns the correlated payload without any shaping.
    pub fn call_id(&mut self, id: u16, args: Vec<Argument>) -> Result<Value> {
        let response = self.exchange(id, args)?;
        match self.correlator.correlate(id, response) {
            Ok(payload) => Ok(payload),
            Err(e) => {
                log::warn!("Call {} failed: {}", id, e);
                Err(e.into())
            }
        }
    }

    // One request line out, one decoded reply back
    fn exchange(&mut self, id: u16, args: Vec<Argument>) -> Result<Map<String, Value>> {
        if !self.link.is_open() {
            return Err(ClientError::NotOpen);
        }
        let line = Request::new(id, args).encode()?;

        log::trace!("-> {}", line);
        self.link.write_line(&line)?;
        let reply = self.link.read_line(self.config.read_timeout())?;
        log::trace!("<- {}", String::from_utf8_lossy(&reply));

        Ok(decode_response(&reply)?)
    }

    /// Names of the discovered commands, in the order the device listed them
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.names()
    }

    pub fn command_table(&self) -> &CommandTable {
        &self.commands
    }

    pub fn status_codes(&self) -> &StatusCodes {
        self.correlator.codes()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

impl<L: SerialLink> Drop for DeviceClient<L> {
    fn drop(&mut self) {
        self.close();
    }
}
