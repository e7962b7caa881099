//! Parsed `database.yml` documents.

use crate::error::{RegistryError, RegistryResult};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Top-level key holding protocol definitions.
pub const PROTOCOLS_KEY: &str = "Protocols";

/// Top-level key holding media source templates.
pub const DATABASES_KEY: &str = "Databases";

/// Protocol specifications of one database: task -> protocol -> raw spec.
pub type TaskEntries = IndexMap<String, IndexMap<String, Value>>;

/// One loaded configuration file.
///
/// Sections keep their declaration order, which drives the order in which
/// protocols are built and merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    path: PathBuf,
    protocols: IndexMap<String, TaskEntries>,
    databases: IndexMap<String, Vec<String>>,
}

impl ConfigFile {
    /// Read and parse the file at `path`.
    ///
    /// `path` is expected to be canonical already (see [`super::resolve_config_path`]).
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse `content` as if it had been read from `path`.
    pub fn parse(path: &Path, content: &str) -> RegistryResult<Self> {
        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| RegistryError::parse(path, e.to_string()))?;

        let raw = match document {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            other => {
                return Err(RegistryError::parse(
                    path,
                    format!("expected a mapping at top level, found {}", kind(&other)),
                ));
            }
        };

        let protocols = match raw.get(PROTOCOLS_KEY) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(section) => parse_protocols(path, section)?,
        };

        let databases = match raw.get(DATABASES_KEY) {
            None | Some(Value::Null) => IndexMap::new(),
            Some(section) => parse_databases(path, section)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            protocols,
            databases,
        })
    }

    /// Canonical path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths in this file are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// `Protocols` section: database -> task -> protocol -> spec.
    pub fn protocols(&self) -> &IndexMap<String, TaskEntries> {
        &self.protocols
    }

    /// Protocols of a single database, if this file declares it.
    pub fn database_protocols(&self, database: &str) -> Option<&TaskEntries> {
        self.protocols.get(database)
    }

    /// `Databases` section with relative templates joined onto [`Self::base_dir`].
    pub fn sources(&self) -> impl Iterator<Item = (&str, Vec<String>)> + '_ {
        let base = self.base_dir();
        self.databases.iter().map(move |(name, templates)| {
            let resolved = templates
                .iter()
                .map(|template| {
                    let p = Path::new(template);
                    if p.is_absolute() {
                        template.clone()
                    } else {
                        base.join(p).to_string_lossy().into_owned()
                    }
                })
                .collect();
            (name.as_str(), resolved)
        })
    }
}

fn parse_protocols(path: &Path, section: &Value) -> RegistryResult<IndexMap<String, TaskEntries>> {
    let databases = expect_mapping(path, section, PROTOCOLS_KEY)?;
    let mut out = IndexMap::with_capacity(databases.len());

    for (db_key, db_value) in databases {
        let db_name = key_to_string(path, db_key)?;
        let mut tasks = TaskEntries::new();

        if !db_value.is_null() {
            let where_ = format!("{}.{}", PROTOCOLS_KEY, db_name);
            for (task_key, task_value) in expect_mapping(path, db_value, &where_)? {
                let task_name = key_to_string(path, task_key)?;
                let mut protocols = IndexMap::new();

                if !task_value.is_null() {
                    let where_ = format!("{}.{}.{}", PROTOCOLS_KEY, db_name, task_name);
                    for (proto_key, spec) in expect_mapping(path, task_value, &where_)? {
                        protocols.insert(key_to_string(path, proto_key)?, spec.clone());
                    }
                }
                tasks.insert(task_name, protocols);
            }
        }
        out.insert(db_name, tasks);
    }

    Ok(out)
}

fn parse_databases(path: &Path, section: &Value) -> RegistryResult<IndexMap<String, Vec<String>>> {
    let entries = expect_mapping(path, section, DATABASES_KEY)?;
    let mut out = IndexMap::with_capacity(entries.len());

    for (key, value) in entries {
        let name = key_to_string(path, key)?;
        let templates = match value {
            Value::String(s) => vec![s.clone()],
            Value::Sequence(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(RegistryError::parse(
                        path,
                        format!(
                            "{}.{} must contain path strings, found {}",
                            DATABASES_KEY,
                            name,
                            kind(other)
                        ),
                    )),
                })
                .collect::<RegistryResult<Vec<_>>>()?,
            other => {
                return Err(RegistryError::parse(
                    path,
                    format!(
                        "{}.{} must be a path or a list of paths, found {}",
                        DATABASES_KEY,
                        name,
                        kind(other)
                    ),
                ));
            }
        };
        // last occurrence wins, as with any later write
        out.insert(name, templates);
    }

    Ok(out)
}

fn expect_mapping<'a>(path: &Path, value: &'a Value, where_: &str) -> RegistryResult<&'a Mapping> {
    value.as_mapping().ok_or_else(|| {
        RegistryError::parse(
            path,
            format!("{} must be a mapping, found {}", where_, kind(value)),
        )
    })
}

/// Stringify a scalar mapping key (`2020:` and `true:` are valid names).
fn key_to_string(path: &Path, key: &Value) -> RegistryResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RegistryError::parse(
            path,
            format!("expected a scalar key, found {}", kind(other)),
        )),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> RegistryResult<ConfigFile> {
        ConfigFile::parse(Path::new("/data/config/database.yml"), content)
    }

    #[test]
    fn test_empty_document_is_empty_config() {
        let config = parse("").unwrap();
        assert!(config.protocols().is_empty());
        assert!(config.sources().next().is_none());
    }

    #[test]
    fn test_protocols_keep_declaration_order() {
        let config = parse(
            r#"
Protocols:
  Zeta:
    SpeakerDiarization:
      B: {train: {uri: b.lst}}
      A: {train: {uri: a.lst}}
  Alpha:
    Collection:
      Everything: {uri: all.lst}
"#,
        )
        .unwrap();

        let dbs: Vec<&str> = config.protocols().keys().map(String::as_str).collect();
        assert_eq!(dbs, vec!["Zeta", "Alpha"]);

        let protos: Vec<&str> = config.protocols()["Zeta"]["SpeakerDiarization"]
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(protos, vec!["B", "A"]);
    }

    #[test]
    fn test_numeric_keys_are_stringified() {
        let config = parse(
            r#"
Protocols:
  Etape:
    SpeakerDiarization:
      2011: {train: {uri: trn.lst}}
"#,
        )
        .unwrap();
        assert!(config.protocols()["Etape"]["SpeakerDiarization"].contains_key("2011"));
    }

    #[test]
    fn test_sources_resolved_against_config_dir() {
        let config = parse(
            r#"
Databases:
  A:
    - relative/trn/{uri}.wav
    - /absolute/dev/{uri}.wav
  B: other/{uri}.wav
"#,
        )
        .unwrap();

        let sources: IndexMap<&str, Vec<String>> = config.sources().collect();
        assert_eq!(
            sources["A"],
            vec![
                "/data/config/relative/trn/{uri}.wav".to_string(),
                "/absolute/dev/{uri}.wav".to_string(),
            ]
        );
        assert_eq!(sources["B"], vec!["/data/config/other/{uri}.wav".to_string()]);
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = parse("Protocols: [unclosed").unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn test_wrong_section_shape_is_parse_error() {
        let err = parse("Protocols:\n  - A\n  - B\n").unwrap_err();
        assert!(err.to_string().contains("Protocols must be a mapping"));

        let err = parse("Databases:\n  A: 42\n").unwrap_err();
        assert!(err.to_string().contains("Databases.A"));
    }

    #[test]
    fn test_null_task_block_is_empty() {
        let config = parse("Protocols:\n  A:\n    SpeakerDiarization:\n").unwrap();
        assert!(config.protocols()["A"]["SpeakerDiarization"].is_empty());
    }
}
