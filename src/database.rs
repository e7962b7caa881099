//! Per-database protocol collections.

use crate::error::{RegistryError, RegistryResult};
use crate::protocol::Protocol;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// `(task, protocol)` pair identifying a protocol within one database.
pub type LocalKey = (String, String);

/// Merged protocols of one database.
///
/// A `Database` is a snapshot: the registry replaces it with a new value
/// whenever its protocol set changes, so a handle obtained earlier keeps
/// seeing the protocols it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    name: String,
    protocols: IndexMap<LocalKey, Arc<Protocol>>,
}

impl Database {
    pub fn new(name: impl Into<String>, protocols: IndexMap<LocalKey, Arc<Protocol>>) -> Self {
        Self {
            name: name.into(),
            protocols,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks with at least one protocol, sorted.
    pub fn tasks(&self) -> Vec<&str> {
        self.protocols
            .keys()
            .map(|(task, _)| task.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Protocol names available for `task`, sorted.
    pub fn protocols(&self, task: &str) -> RegistryResult<Vec<&str>> {
        let names: BTreeSet<&str> = self
            .protocols
            .keys()
            .filter(|(t, _)| t == task)
            .map(|(_, p)| p.as_str())
            .collect();

        if names.is_empty() {
            return Err(RegistryError::UnknownProtocol {
                database: self.name.clone(),
                task: task.to_string(),
                protocol: "*".to_string(),
            });
        }
        Ok(names.into_iter().collect())
    }

    pub fn get_protocol(&self, task: &str, protocol: &str) -> RegistryResult<Arc<Protocol>> {
        self.protocols
            .get(&(task.to_string(), protocol.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::unknown_protocol(&self.name, task, protocol))
    }

    /// Protocols in merge order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocalKey, &Arc<Protocol>)> {
        self.protocols.iter()
    }

    pub(crate) fn protocol_map(&self) -> &IndexMap<LocalKey, Arc<Protocol>> {
        &self.protocols
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolKey;

    fn database() -> Database {
        let mut protocols = IndexMap::new();
        for (task, name) in [
            ("SpeakerDiarization", "B"),
            ("SpeakerDiarization", "A"),
            ("Collection", "All"),
        ] {
            let key = ProtocolKey::new("AMI", task, name);
            protocols.insert(
                key.local(),
                Arc::new(Protocol::new(key, "/cfg/database.yml", IndexMap::new())),
            );
        }
        Database::new("AMI", protocols)
    }

    #[test]
    fn test_tasks_sorted_and_unique() {
        assert_eq!(database().tasks(), vec!["Collection", "SpeakerDiarization"]);
    }

    #[test]
    fn test_protocols_for_task() {
        let db = database();
        assert_eq!(db.protocols("SpeakerDiarization").unwrap(), vec!["A", "B"]);
        assert!(db.protocols("SpeakerVerification").is_err());
    }

    #[test]
    fn test_get_protocol() {
        let db = database();
        let p = db.get_protocol("Collection", "All").unwrap();
        assert_eq!(p.name(), "AMI.Collection.All");

        let err = db.get_protocol("Collection", "Missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not find protocol \"Missing\" for task \"Collection\" of database \"AMI\""
        );
    }
}
