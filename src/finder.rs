//! Locating media files of protocol items.
//!
//! Each database in the `Databases` section maps to one or more path
//! templates, e.g.
//!
//! ```yaml
//! Databases:
//!   AMI: /corpora/ami/{uri}.wav
//!   VoxCeleb:
//!     - /corpora/voxceleb/dev/*/{uri}.wav
//!     - /corpora/voxceleb/test/**/{uri}.wav
//! ```
//!
//! `{uri}` and `{database}` are substituted from the item; templates with `*`
//! are expanded with glob patterns, other templates must name an existing file.

use crate::error::{RegistryError, RegistryResult};
use crate::protocol::ProtocolFile;
use crate::registry::Registry;
use std::path::PathBuf;
use tracing::debug;

/// Resolves protocol items to media file paths using a registry's sources.
#[derive(Debug, Clone, Copy)]
pub struct FileFinder<'a> {
    registry: &'a Registry,
}

impl<'a> FileFinder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Path of the single file matching `item`.
    pub fn find(&self, item: &ProtocolFile) -> RegistryResult<PathBuf> {
        let templates = self
            .registry
            .sources(&item.database)
            .ok_or_else(|| RegistryError::unknown_database(&item.database))?;

        let mut searched = Vec::new();
        let mut found = Vec::new();

        for template in templates {
            let candidate = expand_template(template, &item.uri, &item.database);
            searched.push(PathBuf::from(&candidate));

            if candidate.contains('*') {
                match glob::glob(&candidate) {
                    Ok(paths) => found.extend(paths.filter_map(Result::ok).filter(|p| p.is_file())),
                    Err(e) => debug!(pattern = %candidate, error = %e, "Ignoring invalid glob pattern"),
                }
            } else {
                let path = PathBuf::from(candidate);
                if path.is_file() {
                    found.push(path);
                }
            }
        }

        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(RegistryError::FileNotFound {
                uri: item.uri.clone(),
                searched,
            }),
            _ => Err(RegistryError::AmbiguousFile {
                uri: item.uri.clone(),
                found,
            }),
        }
    }
}

/// Substitute `{uri}` and `{database}` placeholders.
pub fn expand_template(template: &str, uri: &str, database: &str) -> String {
    template.replace("{uri}", uri).replace("{database}", database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OverridePolicy;
    use indexmap::IndexMap;
    use std::fs;
    use tempfile::TempDir;

    fn item(database: &str, uri: &str) -> ProtocolFile {
        ProtocolFile {
            uri: uri.to_string(),
            database: database.to_string(),
            fields: IndexMap::new(),
        }
    }

    fn registry_with_sources(dir: &std::path::Path, databases: &str) -> Registry {
        let config = dir.join("database.yml");
        fs::write(&config, format!("Databases:\n{}", databases)).unwrap();
        let mut registry = Registry::new();
        registry
            .load_databases([&config], OverridePolicy::WarnKeep)
            .unwrap();
        registry
    }

    #[test]
    fn test_expand_template() {
        assert_eq!(
            expand_template("/data/{database}/{uri}.wav", "file1", "AMI"),
            "/data/AMI/file1.wav"
        );
    }

    #[test]
    fn test_finds_relative_template() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("wav")).unwrap();
        fs::write(temp.path().join("wav/file1.wav"), b"").unwrap();

        let registry = registry_with_sources(temp.path(), "  AMI: wav/{uri}.wav\n");
        let path = FileFinder::new(&registry).find(&item("AMI", "file1")).unwrap();
        assert_eq!(path, temp.path().join("wav/file1.wav"));
    }

    #[test]
    fn test_glob_template() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("wav/speaker1")).unwrap();
        fs::write(temp.path().join("wav/speaker1/file1.wav"), b"").unwrap();

        let registry = registry_with_sources(temp.path(), "  Vox: wav/*/{uri}.wav\n");
        let path = FileFinder::new(&registry).find(&item("Vox", "file1")).unwrap();
        assert_eq!(path, temp.path().join("wav/speaker1/file1.wav"));
    }

    #[test]
    fn test_not_found_and_ambiguous() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("a/file1.wav"), b"").unwrap();
        fs::write(temp.path().join("b/file1.wav"), b"").unwrap();

        let registry =
            registry_with_sources(temp.path(), "  AMI:\n    - a/{uri}.wav\n    - b/{uri}.wav\n");
        let finder = FileFinder::new(&registry);

        match finder.find(&item("AMI", "file1")).unwrap_err() {
            RegistryError::AmbiguousFile { found, .. } => assert_eq!(found.len(), 2),
            other => panic!("unexpected error {:?}", other),
        }
        match finder.find(&item("AMI", "file2")).unwrap_err() {
            RegistryError::FileNotFound { searched, .. } => assert_eq!(searched.len(), 2),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(
            finder.find(&item("Unknown", "file1")).unwrap_err(),
            RegistryError::UnknownDatabase { .. }
        ));
    }
}
