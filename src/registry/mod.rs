//! The protocol registry.
//!
//! Loading happens in two phases:
//! 1. every configuration file is processed in order; its databases are built
//!    and merged into the registry under the requested [`OverridePolicy`]
//! 2. the meta-database `X` is discarded and rebuilt from every loaded file,
//!    because meta-protocols may reference protocols from any of them
//!
//! ## Usage
//! ```no_run
//! use protocol_registry::{OverridePolicy, Registry};
//!
//! let mut registry = Registry::new();
//! registry.load_databases(["/path/to/first/database.yml"], OverridePolicy::WarnKeep)?;
//! registry.load_databases(["/path/to/second/database.yml"], OverridePolicy::WarnKeep)?;
//! let protocol = registry.get_protocol("AMI.SpeakerDiarization.only_words")?;
//! # Ok::<(), protocol_registry::RegistryError>(())
//! ```

pub mod global;
mod merge;

pub use merge::{Kept, OverrideConflict, OverridePolicy, merge_protocols};

use crate::META_DATABASE;
use crate::config::{ConfigFile, ConfigPaths, TaskEntries, resolve_config_path};
use crate::database::Database;
use crate::error::{RegistryError, RegistryResult};
use crate::protocol::{
    BuildContext, DefaultProtocolFactory, Protocol, ProtocolFactory, ProtocolKey, ProtocolLookup,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a successful [`Registry::load_databases`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Canonical paths of the files loaded, in order.
    pub loaded: Vec<PathBuf>,
    /// Protocols declared more than once, in both phases.
    pub conflicts: Vec<OverrideConflict>,
}

/// How unresolved meta-protocol references are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaMode {
    /// Per-file pass: references may point to files not loaded yet.
    Provisional,
    /// Final pass: every reference must resolve.
    Strict,
}

/// Databases, tasks and protocols merged from any number of configuration files.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Loaded files, keyed by canonical path, in first-load order.
    configs: IndexMap<PathBuf, Arc<ConfigFile>>,
    /// Media path templates per database (`Databases` section).
    sources: BTreeMap<String, Vec<String>>,
    /// File that last declared each entry of `sources`.
    source_origins: BTreeMap<String, PathBuf>,
    databases: BTreeMap<String, Arc<Database>>,
    /// Task -> databases with at least one protocol for it.
    tasks: BTreeMap<String, BTreeSet<String>>,
    factory: Arc<dyn ProtocolFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry using the [`DefaultProtocolFactory`].
    pub fn new() -> Self {
        Self::with_factory(Arc::new(DefaultProtocolFactory))
    }

    /// Empty registry building protocols with `factory`.
    pub fn with_factory(factory: Arc<dyn ProtocolFactory>) -> Self {
        Self {
            configs: IndexMap::new(),
            sources: BTreeMap::new(),
            source_origins: BTreeMap::new(),
            databases: BTreeMap::new(),
            tasks: BTreeMap::new(),
            factory,
        }
    }

    /// Load configuration files in order, then rebuild meta-protocols.
    ///
    /// Loading a path that was loaded before first removes everything that
    /// file contributed, then merges its new content (its place in load order
    /// is kept). On error, files processed earlier in the same call stay
    /// loaded and meta-protocols are not rebuilt.
    pub fn load_databases<I, P>(&mut self, paths: I, policy: OverridePolicy) -> RegistryResult<LoadReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = LoadReport::default();

        for path in paths {
            let canonical = resolve_config_path(path.as_ref())?;
            let config = Arc::new(ConfigFile::load(&canonical)?);
            debug!(path = %canonical.display(), databases = config.protocols().len(), "Processing configuration file");

            if self.configs.contains_key(&canonical) {
                self.remove_contribution(&canonical);
            }
            self.configs.insert(canonical.clone(), Arc::clone(&config));
            report.conflicts.extend(self.process_config(&config, policy)?);
            report.loaded.push(canonical);
        }

        report.conflicts.extend(self.reload_meta_protocols()?);

        info!(
            files = report.loaded.len(),
            databases = self.databases.len(),
            conflicts = report.conflicts.len(),
            "Loaded protocol databases"
        );
        Ok(report)
    }

    /// Load every existing default configuration file.
    pub fn load_default_databases(&mut self, paths: &ConfigPaths, policy: OverridePolicy) -> RegistryResult<LoadReport> {
        let files = paths.existing_files();
        for (tier, path) in &files {
            debug!(tier = %tier, path = %path.display(), "Found default configuration file");
        }
        self.load_databases(files.into_iter().map(|(_, path)| path), policy)
    }

    /// Phase 1 for one file: its databases (`X` last), then its sources.
    fn process_config(&mut self, config: &ConfigFile, policy: OverridePolicy) -> RegistryResult<Vec<OverrideConflict>> {
        let mut conflicts = Vec::new();

        for (name, entries) in config.protocols() {
            if name != META_DATABASE {
                conflicts.extend(self.process_database(name, entries, config.path(), policy, MetaMode::Strict)?);
            }
        }
        // Provisional: `X` is rebuilt by the meta pass, which reports its conflicts
        if let Some(entries) = config.database_protocols(META_DATABASE) {
            self.process_database(
                META_DATABASE,
                entries,
                config.path(),
                OverridePolicy::Override,
                MetaMode::Provisional,
            )?;
        }

        // Sources are replaced whatever the override policy
        for (name, templates) in config.sources() {
            self.sources.insert(name.to_string(), templates);
            self.source_origins
                .insert(name.to_string(), config.path().to_path_buf());
        }

        Ok(conflicts)
    }

    /// Drop the protocols and sources that `path` contributed, then rebuild
    /// the task index from what is left.
    fn remove_contribution(&mut self, path: &Path) {
        let databases = std::mem::take(&mut self.databases);
        for (name, database) in databases {
            if database.iter().all(|(_, protocol)| protocol.config_path() != path) {
                self.databases.insert(name, database);
                continue;
            }

            let remaining: IndexMap<(String, String), Arc<Protocol>> = database
                .iter()
                .filter(|(_, protocol)| protocol.config_path() != path)
                .map(|(key, protocol)| (key.clone(), Arc::clone(protocol)))
                .collect();
            debug!(
                database = %name,
                removed = database.len() - remaining.len(),
                path = %path.display(),
                "Removed protocols of reloaded file"
            );
            if !remaining.is_empty() {
                self.databases
                    .insert(name.clone(), Arc::new(Database::new(name, remaining)));
            }
        }

        let stale: Vec<String> = self
            .source_origins
            .iter()
            .filter(|(_, origin)| origin.as_path() == path)
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            self.sources.remove(&name);
            self.source_origins.remove(&name);
        }

        self.tasks.clear();
        for (name, database) in &self.databases {
            for task in database.tasks() {
                self.tasks
                    .entry(task.to_string())
                    .or_default()
                    .insert(name.clone());
            }
        }
    }

    /// Build every protocol of one database block and merge it into the registry.
    fn process_database(
        &mut self,
        name: &str,
        entries: &TaskEntries,
        config_path: &Path,
        policy: OverridePolicy,
        mode: MetaMode,
    ) -> RegistryResult<Vec<OverrideConflict>> {
        let mut protocols: IndexMap<(String, String), Arc<Protocol>> = IndexMap::new();
        let mut tasks = Vec::new();

        for (task, task_entries) in entries {
            for (protocol, spec) in task_entries {
                let key = ProtocolKey::new(name, task.as_str(), protocol.as_str());
                let ctx = BuildContext {
                    key: &key,
                    config_path,
                    lookup: &*self,
                };

                let built = match self.factory.build(&ctx, spec) {
                    Ok(built) => built,
                    Err(RegistryError::MetaResolution { reference, .. }) if mode == MetaMode::Provisional => {
                        debug!(protocol = %key, reference = %reference, "Deferring meta-protocol until all files are loaded");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let Some(built) = built else {
                    debug!(protocol = %key, "Skipping empty protocol specification");
                    continue;
                };

                protocols.insert(key.local(), Arc::new(built));
                tasks.push(task.clone());
            }
        }

        for task in tasks {
            self.tasks.entry(task).or_default().insert(name.to_string());
        }

        let conflicts = match self.databases.get(name) {
            Some(existing) => merge_protocols(&mut protocols, existing.protocol_map(), policy, name, config_path),
            None => Vec::new(),
        };

        if protocols.is_empty() {
            return Ok(conflicts);
        }

        debug!(database = %name, protocols = protocols.len(), "Registered database");
        self.databases
            .insert(name.to_string(), Arc::new(Database::new(name, protocols)));
        Ok(conflicts)
    }

    /// Phase 2: discard `X` and rebuild it from every loaded file, in load order.
    ///
    /// Conflicts between files are resolved with [`OverridePolicy::WarnOverride`].
    pub fn reload_meta_protocols(&mut self) -> RegistryResult<Vec<OverrideConflict>> {
        self.databases.remove(META_DATABASE);
        for databases in self.tasks.values_mut() {
            databases.remove(META_DATABASE);
        }
        self.tasks.retain(|_, databases| !databases.is_empty());

        let configs: Vec<Arc<ConfigFile>> = self.configs.values().cloned().collect();
        let mut conflicts = Vec::new();
        for config in configs {
            if let Some(entries) = config.database_protocols(META_DATABASE) {
                conflicts.extend(self.process_database(
                    META_DATABASE,
                    entries,
                    config.path(),
                    OverridePolicy::WarnOverride,
                    MetaMode::Strict,
                )?);
            }
        }

        Ok(conflicts)
    }

    /// Database names, sorted.
    pub fn list_databases(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    /// Task names, sorted.
    pub fn list_tasks(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// Databases providing at least one protocol for `task`, sorted.
    pub fn databases_for_task(&self, task: &str) -> Vec<String> {
        self.tasks
            .get(task)
            .map(|databases| databases.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Tasks supported by `database`, sorted.
    pub fn tasks_supported_by(&self, database: &str) -> RegistryResult<Vec<String>> {
        Ok(self
            .get_database(database)?
            .tasks()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    pub fn get_database(&self, name: &str) -> RegistryResult<Arc<Database>> {
        self.databases
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::unknown_database(name))
    }

    /// Look up a protocol by fully-qualified name (`Database.Task.Protocol`).
    pub fn get_protocol(&self, name: &str) -> RegistryResult<Arc<Protocol>> {
        let key: ProtocolKey = name.parse()?;
        self.get_database(&key.database)?
            .get_protocol(&key.task, &key.protocol)
    }

    pub fn databases(&self) -> impl Iterator<Item = &Arc<Database>> {
        self.databases.values()
    }

    /// Media path templates of `database`.
    pub fn sources(&self, database: &str) -> Option<&[String]> {
        self.sources.get(database).map(Vec::as_slice)
    }

    pub fn all_sources(&self) -> &BTreeMap<String, Vec<String>> {
        &self.sources
    }

    /// Loaded configuration files, in first-load order.
    pub fn configs(&self) -> impl Iterator<Item = &ConfigFile> {
        self.configs.values().map(|c| c.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl ProtocolLookup for Registry {
    fn lookup(&self, key: &ProtocolKey) -> Option<Arc<Protocol>> {
        self.databases
            .get(&key.database)?
            .get_protocol(&key.task, &key.protocol)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.list_databases().is_empty());
        assert!(matches!(
            registry.get_database("X").unwrap_err(),
            RegistryError::UnknownDatabase { .. }
        ));
    }

    #[test]
    fn test_database_with_only_empty_specs_is_not_registered() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "database.yml",
            "Protocols:\n  Empty:\n    SpeakerDiarization:\n      Nothing: {}\n",
        );

        let mut registry = Registry::new();
        registry.load_databases([&path], OverridePolicy::Override).unwrap();
        assert!(registry.list_databases().is_empty());
        assert!(registry.list_tasks().is_empty());
    }

    #[test]
    fn test_meta_database_removed_from_task_index_on_reload() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "database.yml",
            r#"
Protocols:
  A:
    SpeakerDiarization:
      P: {train: {uri: [a1, a2]}}
  X:
    SpeakerDiarization:
      Meta:
        train:
          A.SpeakerDiarization.P: [train]
"#,
        );

        let mut registry = Registry::new();
        registry.load_databases([&path], OverridePolicy::Override).unwrap();
        assert_eq!(registry.databases_for_task("SpeakerDiarization"), vec!["A", "X"]);

        // drop X from the file and reload it
        write(
            temp.path(),
            "database.yml",
            "Protocols:\n  A:\n    SpeakerDiarization:\n      P: {train: {uri: [a1, a2]}}\n",
        );
        registry.load_databases([&path], OverridePolicy::Override).unwrap();
        assert_eq!(registry.databases_for_task("SpeakerDiarization"), vec!["A"]);
        assert!(registry.get_database("X").is_err());
    }

    #[test]
    fn test_failed_build_leaves_task_index_untouched() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "database.yml",
            "Protocols:\n  A:\n    SpeakerDiarization:\n      Good: {train: {uri: [a]}}\n      Bad: 42\n",
        );

        let mut registry = Registry::new();
        let err = registry
            .load_databases([&path], OverridePolicy::Override)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSpec { .. }));
        assert!(registry.list_tasks().is_empty());
        assert!(registry.list_databases().is_empty());
    }

    #[test]
    fn test_lookup_trait() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "database.yml",
            "Protocols:\n  A:\n    T:\n      P: {uri: [a]}\n",
        );
        let mut registry = Registry::new();
        registry.load_databases([&path], OverridePolicy::Override).unwrap();

        assert!(registry.lookup(&ProtocolKey::new("A", "T", "P")).is_some());
        assert!(registry.lookup(&ProtocolKey::new("A", "T", "Q")).is_none());
        assert!(registry.lookup(&ProtocolKey::new("B", "T", "P")).is_none());
    }
}
