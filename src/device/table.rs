use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::ProtocolError;

/// A remote operation as the firmware names and numbers it.
///
/// Ids are only meaningful for the firmware build that reported them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub name: String,
    pub id: u16,
}

/// Name to id mapping discovered from the device, in the order it was listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTable {
    commands: Vec<CommandDescriptor>,
    index: HashMap<String, u16>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret a discovery payload: a flat object of name to integer id.
    pub fn from_payload(payload: &Value) -> Result<Self, ProtocolError> {
        let entries = payload.as_object().ok_or_else(|| {
            ProtocolError::MalformedResponse(format!("command table is not an object: {}", payload))
        })?;

        let mut table = Self::new();
        for (name, id) in entries {
            let id = id
                .as_u64()
                .and_then(|id| u16::try_from(id).ok())
                .ok_or_else(|| {
                    ProtocolError::MalformedResponse(format!(
                        "command {:?} has invalid id {}",
                        name, id
                    ))
                })?;
            table.index.insert(name.clone(), id);
            table.commands.push(CommandDescriptor {
                name: name.clone(),
                id,
            });
        }
        Ok(table)
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
