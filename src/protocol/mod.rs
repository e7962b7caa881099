//! Protocols: named groups of dataset subsets for one task of one database.
//!
//! A protocol never holds its items in memory. Each call to [`Protocol::subset`]
//! re-reads the underlying URI lists, so a protocol object stays cheap to build
//! and clone even for large corpora.

mod factory;
mod key;

pub use factory::{BuildContext, DefaultProtocolFactory, ProtocolFactory, ProtocolLookup};
pub use key::ProtocolKey;

use crate::error::{RegistryError, RegistryResult};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Training subset.
pub const TRAIN: &str = "train";
/// Development (validation) subset.
pub const DEVELOPMENT: &str = "development";
/// Test subset.
pub const TEST: &str = "test";
/// Single subset of protocols declared without train/development/test split.
pub const FILES: &str = "files";

/// Subset names that mark a split protocol.
pub const STANDARD_SUBSETS: [&str; 3] = [TRAIN, DEVELOPMENT, TEST];

/// One item yielded by a protocol.
///
/// Apart from `uri` and `database`, fields are copied verbatim from the
/// subset specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolFile {
    pub uri: String,
    pub database: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

impl ProtocolFile {
    /// `{database}/{uri}`, unique across databases.
    pub fn unique_identifier(&self) -> String {
        format!("{}/{}", self.database, self.uri)
    }
}

/// Where the URIs of a subset come from.
#[derive(Debug, Clone, PartialEq)]
pub enum UriSource {
    /// Text file with one URI per line.
    ListFile(PathBuf),
    /// URIs written directly in the configuration file.
    Inline(Vec<String>),
}

impl UriSource {
    fn read(&self) -> RegistryResult<Vec<String>> {
        match self {
            UriSource::Inline(uris) => Ok(uris.clone()),
            UriSource::ListFile(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
                Ok(parse_uri_list(&content))
            }
        }
    }
}

/// Parse a URI list: one per line, blank lines and `#` comments skipped.
pub fn parse_uri_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Subset backed by a URI list.
#[derive(Debug, Clone, PartialEq)]
pub struct FileListSubset {
    pub uris: UriSource,
    pub fields: IndexMap<String, Value>,
}

/// Part of a meta-protocol subset: some subsets of another protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaPart {
    pub protocol: Arc<Protocol>,
    pub subsets: Vec<String>,
}

/// How a subset produces its items.
#[derive(Debug, Clone, PartialEq)]
pub enum Subset {
    FileList(FileListSubset),
    Meta(Vec<MetaPart>),
}

/// A protocol built from one configuration file entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    key: ProtocolKey,
    config_path: PathBuf,
    subsets: IndexMap<String, Subset>,
}

impl Protocol {
    pub fn new(key: ProtocolKey, config_path: impl Into<PathBuf>, subsets: IndexMap<String, Subset>) -> Self {
        Self {
            key,
            config_path: config_path.into(),
            subsets,
        }
    }

    pub fn key(&self) -> &ProtocolKey {
        &self.key
    }

    /// Fully-qualified name (`Database.Task.Protocol`).
    pub fn name(&self) -> String {
        self.key.to_string()
    }

    pub fn database(&self) -> &str {
        &self.key.database
    }

    pub fn task(&self) -> &str {
        &self.key.task
    }

    /// Configuration file this protocol was defined in.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// True for protocols aggregating other protocols.
    pub fn is_meta(&self) -> bool {
        self.subsets.values().any(|s| matches!(s, Subset::Meta(_)))
    }

    pub fn subset_names(&self) -> impl Iterator<Item = &str> {
        self.subsets.keys().map(String::as_str)
    }

    pub fn has_subset(&self, name: &str) -> bool {
        self.subsets.contains_key(name)
    }

    pub fn subsets(&self) -> &IndexMap<String, Subset> {
        &self.subsets
    }

    /// Items of one subset, in declaration order.
    pub fn subset(&self, name: &str) -> RegistryResult<Vec<ProtocolFile>> {
        let subset = self
            .subsets
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSubset {
                protocol: self.name(),
                subset: name.to_string(),
            })?;

        match subset {
            Subset::FileList(list) => Ok(list
                .uris
                .read()?
                .into_iter()
                .map(|uri| ProtocolFile {
                    uri,
                    database: self.key.database.clone(),
                    fields: list.fields.clone(),
                })
                .collect()),
            Subset::Meta(parts) => {
                let mut items = Vec::new();
                for part in parts {
                    for subset in &part.subsets {
                        items.extend(part.protocol.subset(subset)?);
                    }
                }
                Ok(items)
            }
        }
    }

    pub fn train(&self) -> RegistryResult<Vec<ProtocolFile>> {
        self.subset(TRAIN)
    }

    pub fn development(&self) -> RegistryResult<Vec<ProtocolFile>> {
        self.subset(DEVELOPMENT)
    }

    pub fn test(&self) -> RegistryResult<Vec<ProtocolFile>> {
        self.subset(TEST)
    }

    /// Every item of every subset, each unique identifier yielded once.
    pub fn files(&self) -> RegistryResult<Vec<ProtocolFile>> {
        let mut seen = IndexSet::new();
        let mut items = Vec::new();
        for name in self.subsets.keys() {
            for item in self.subset(name)? {
                if seen.insert(item.unique_identifier()) {
                    items.push(item);
                }
            }
        }
        Ok(items)
    }
}
