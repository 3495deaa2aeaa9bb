//! In-memory link that replays canned firmware replies.
//!
//! Exposed outside `cfg(test)` so integration tests and downstream crates can
//! drive a client without hardware attached.
use std::collections::VecDeque;
use std::time::Duration;

use super::{LinkError, Result, SerialLink};

#[derive(Debug, Clone)]
enum ScriptedReply {
    Line(Vec<u8>),
    ReadError(String),
}

#[derive(Debug, Default)]
pub struct ScriptedLink {
    open: bool,
    refuse_open: bool,
    replies: VecDeque<ScriptedReply>,
    writes: Vec<String>,
    reads: usize,
    opens: usize,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a link that answers with `lines` in order
    pub fn with_replies<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut link = Self::new();
        for line in lines {
            link.push_reply(line);
        }
        link
    }

    pub fn push_reply(&mut self, line: impl Into<String>) {
        self.replies
            .push_back(ScriptedReply::Line(line.into().into_bytes()));
    }

    /// Queue a reply that need not be valid UTF-8, e.g. a line garbled on the wire
    pub fn push_reply_bytes(&mut self, line: impl Into<Vec<u8>>) {
        self.replies.push_back(ScriptedReply::Line(line.into()));
    }

    /// Queue an I/O failure for the next read
    pub fn push_read_error(&mut self, reason: impl Into<String>) {
        self.replies.push_back(ScriptedReply::ReadError(reason.into()));
    }

    /// Make every subsequent `open()` fail as if the port were busy
    pub fn refuse_open(&mut self, refuse: bool) {
        self.refuse_open = refuse;
    }

    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn opens(&self) -> usize {
        self.opens
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl SerialLink for ScriptedLink {
    fn open(&mut self) -> Result<()> {
        if self.refuse_open {
            return Err(LinkError::Unavailable("scripted port refused to open".to_string()));
        }
        if !self.open {
            self.open = true;
            self.opens += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        if !self.open {
            return Err(LinkError::Write("port is not open".to_string()));
        }
        self.writes.push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if !self.open {
            return Err(LinkError::Read("port is not open".to_string()));
        }
        self.reads += 1;
        match self.replies.pop_front() {
            Some(ScriptedReply::Line(line)) => Ok(line),
            Some(ScriptedReply::ReadError(reason)) => Err(LinkError::Read(reason)),
            None => Err(LinkError::Timeout(timeout)),
        }
    }
}
