//! Merging a database's freshly built protocols into the ones already registered.
//!
//! The merge works on the *new* map: keys only present in the old map are
//! copied in, and for conflicting keys the policy decides whether the new
//! value stays or the old one is written back over it.

use crate::database::LocalKey;
use crate::protocol::{Protocol, ProtocolKey};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// How to treat a protocol declared by more than one configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverridePolicy {
    /// Replace the existing protocol silently.
    Override,
    /// Replace the existing protocol and warn.
    WarnOverride,
    /// Keep the existing protocol and warn.
    #[default]
    WarnKeep,
    /// Keep the existing protocol silently.
    Keep,
}

impl OverridePolicy {
    /// Whether the newest definition wins a conflict.
    pub fn replaces(self) -> bool {
        matches!(self, OverridePolicy::Override | OverridePolicy::WarnOverride)
    }

    /// Whether conflicts are reported.
    pub fn warns(self) -> bool {
        matches!(self, OverridePolicy::WarnOverride | OverridePolicy::WarnKeep)
    }
}

impl std::fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverridePolicy::Override => write!(f, "override"),
            OverridePolicy::WarnOverride => write!(f, "warn-override"),
            OverridePolicy::WarnKeep => write!(f, "warn-keep"),
            OverridePolicy::Keep => write!(f, "keep"),
        }
    }
}

/// Which definition survived a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kept {
    Old,
    New,
}

/// A protocol declared again by a later configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideConflict {
    pub key: ProtocolKey,
    /// File carrying the new definition.
    pub config_path: PathBuf,
    pub policy: OverridePolicy,
    pub kept: Kept,
}

impl std::fmt::Display for OverrideConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kept {
            Kept::New => write!(
                f,
                "Overriding protocol {}, the new definition is from {}.",
                self.key,
                self.config_path.display()
            ),
            Kept::Old => write!(
                f,
                "Couldn't override already loaded protocol {}, redefined in {}.",
                self.key,
                self.config_path.display()
            ),
        }
    }
}

/// Merge `old` into `new` according to `policy`.
///
/// Returns every conflict encountered; under a warning policy each one is
/// also logged.
pub fn merge_protocols(
    new: &mut IndexMap<LocalKey, Arc<Protocol>>,
    old: &IndexMap<LocalKey, Arc<Protocol>>,
    policy: OverridePolicy,
    database: &str,
    config_path: &Path,
) -> Vec<OverrideConflict> {
    let mut conflicts = Vec::new();

    for (local, old_protocol) in old {
        let Some(new_protocol) = new.get_mut(local) else {
            // no conflict: carry over
            new.insert(local.clone(), Arc::clone(old_protocol));
            continue;
        };

        let kept = if policy.replaces() {
            Kept::New
        } else {
            *new_protocol = Arc::clone(old_protocol);
            Kept::Old
        };

        let conflict = OverrideConflict {
            key: ProtocolKey::new(database, local.0.as_str(), local.1.as_str()),
            config_path: config_path.to_path_buf(),
            policy,
            kept,
        };
        if policy.warns() {
            warn!(protocol = %conflict.key, policy = %policy, "{}", conflict);
        }
        conflicts.push(conflict);
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(task: &str, name: &str, origin: &str) -> Arc<Protocol> {
        Arc::new(Protocol::new(
            ProtocolKey::new("DB", task, name),
            origin,
            IndexMap::new(),
        ))
    }

    fn map(entries: Vec<(&str, &str, &str)>) -> IndexMap<LocalKey, Arc<Protocol>> {
        entries
            .into_iter()
            .map(|(task, name, origin)| {
                ((task.to_string(), name.to_string()), protocol(task, name, origin))
            })
            .collect()
    }

    fn origin_of(protocols: &IndexMap<LocalKey, Arc<Protocol>>, task: &str, name: &str) -> PathBuf {
        protocols[&(task.to_string(), name.to_string())]
            .config_path()
            .to_path_buf()
    }

    #[test]
    fn test_merge_disjoint() {
        for policy in [
            OverridePolicy::Override,
            OverridePolicy::WarnOverride,
            OverridePolicy::WarnKeep,
            OverridePolicy::Keep,
        ] {
            let mut new = map(vec![("Task1", "Protocol1", "/new.yml")]);
            let old = map(vec![("OtherTask", "Protocol1", "/old.yml")]);

            let conflicts = merge_protocols(&mut new, &old, policy, "DB", Path::new("/new.yml"));

            assert!(conflicts.is_empty());
            assert_eq!(new.len(), 2);
            assert!(new.contains_key(&("OtherTask".to_string(), "Protocol1".to_string())));
        }
    }

    #[test]
    fn test_merge_identical_keys() {
        let cases = [
            (OverridePolicy::Keep, "/old.yml", Kept::Old),
            (OverridePolicy::WarnKeep, "/old.yml", Kept::Old),
            (OverridePolicy::WarnOverride, "/new.yml", Kept::New),
            (OverridePolicy::Override, "/new.yml", Kept::New),
        ];

        for (policy, expected_origin, expected_kept) in cases {
            let mut new = map(vec![("Task1", "Protocol1", "/new.yml")]);
            let old = map(vec![("Task1", "Protocol1", "/old.yml")]);

            let conflicts = merge_protocols(&mut new, &old, policy, "DB", Path::new("/new.yml"));

            assert_eq!(new.len(), 1, "{policy}");
            assert_eq!(origin_of(&new, "Task1", "Protocol1"), PathBuf::from(expected_origin));
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].kept, expected_kept);
            assert_eq!(conflicts[0].key.to_string(), "DB.Task1.Protocol1");
        }
    }

    #[test]
    fn test_new_keys_come_first() {
        let mut new = map(vec![("T", "B", "/new.yml")]);
        let old = map(vec![("T", "A", "/old.yml"), ("T", "B", "/old.yml")]);
        merge_protocols(&mut new, &old, OverridePolicy::Override, "DB", Path::new("/new.yml"));

        let order: Vec<&str> = new.keys().map(|(_, p)| p.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn test_conflict_messages() {
        let conflict = OverrideConflict {
            key: ProtocolKey::new("DB", "T", "P"),
            config_path: PathBuf::from("/b.yml"),
            policy: OverridePolicy::WarnKeep,
            kept: Kept::Old,
        };
        assert_eq!(
            conflict.to_string(),
            "Couldn't override already loaded protocol DB.T.P, redefined in /b.yml."
        );
    }
}
