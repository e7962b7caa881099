//! Fully-qualified protocol names.

use crate::error::RegistryError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// `(database, task, protocol)` triple identifying one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProtocolKey {
    pub database: String,
    pub task: String,
    pub protocol: String,
}

impl ProtocolKey {
    pub fn new(
        database: impl Into<String>,
        task: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            task: task.into(),
            protocol: protocol.into(),
        }
    }

    /// `(task, protocol)` pair used as key inside a database.
    pub fn local(&self) -> (String, String) {
        (self.task.clone(), self.protocol.clone())
    }
}

impl fmt::Display for ProtocolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.task, self.protocol)
    }
}

impl FromStr for ProtocolKey {
    type Err = RegistryError;

    /// Parse `Database.Task.Protocol`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [database, task, protocol]
                if !database.is_empty() && !task.is_empty() && !protocol.is_empty() =>
            {
                Ok(Self::new(*database, *task, *protocol))
            }
            _ => Err(RegistryError::InvalidProtocolName {
                name: name.to_string(),
            }),
        }
    }
}
