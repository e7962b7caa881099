//! Configuration file discovery and path resolution.
//!
//! Default configuration files are looked up in this order:
//! 1. **User** - `$PROTOCOL_REGISTRY_HOME/database.yml` (default `~/.protocol-registry/`)
//! 2. **Project** - `$CWD/database.yml`
//! 3. **Environment** - every `;`-separated path in `$PROTOCOL_REGISTRY_CONFIG`

use crate::error::{RegistryError, RegistryResult};
use std::path::{Component, Path, PathBuf};

/// File name looked up in the user and project directories.
pub const DATABASE_YML: &str = "database.yml";

/// Environment variable listing extra configuration files.
pub const CONFIG_ENV: &str = "PROTOCOL_REGISTRY_CONFIG";

/// Environment variable overriding the user configuration directory.
pub const HOME_ENV: &str = "PROTOCOL_REGISTRY_HOME";

/// Where a discovered configuration file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// User-level config (~/.protocol-registry/database.yml)
    User = 0,
    /// Project-level config ($CWD/database.yml)
    Project = 1,
    /// Listed in $PROTOCOL_REGISTRY_CONFIG
    Environment = 2,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Locations searched for default configuration files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// Explicit files from the environment
    pub env_files: Vec<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration locations from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var(HOME_ENV)
            .ok()
            .map(|dir| expand_tilde(Path::new(&dir)))
            .or_else(|| dirs::home_dir().map(|h| h.join(".protocol-registry")));

        let project_dir = std::env::current_dir().ok();

        let env_files = std::env::var(CONFIG_ENV)
            .map(|value| split_env_paths(&value))
            .unwrap_or_default();

        Self {
            user_dir,
            project_dir,
            env_files,
        }
    }

    /// Create paths with explicit directories and no environment files.
    pub fn with_dirs(user_dir: Option<PathBuf>, project_dir: Option<PathBuf>) -> Self {
        Self {
            user_dir,
            project_dir,
            env_files: Vec::new(),
        }
    }

    /// Add an explicit file, as if listed in the environment.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_files.push(path.into());
        self
    }

    /// Existing configuration files, in load order.
    pub fn existing_files(&self) -> Vec<(ConfigTier, PathBuf)> {
        let mut found = Vec::new();

        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(DATABASE_YML);
            if path.is_file() {
                found.push((ConfigTier::User, path));
            }
        }

        if let Some(ref project_dir) = self.project_dir {
            let path = project_dir.join(DATABASE_YML);
            if path.is_file() {
                found.push((ConfigTier::Project, path));
            }
        }

        for path in &self.env_files {
            if path.is_file() {
                found.push((ConfigTier::Environment, path.clone()));
            } else {
                tracing::debug!(path = %path.display(), "Skipping missing configuration file from {}", CONFIG_ENV);
            }
        }

        found
    }
}

/// Split a `;`-separated list of paths, expanding `~` and dropping empty entries.
pub fn split_env_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| expand_tilde(Path::new(s)))
        .collect()
}

/// Resolve a user-supplied configuration path to its canonical form.
///
/// Only `~` is expanded; the path is made absolute against the current
/// directory and `.`/`..` components are folded lexically. The file must exist.
pub fn resolve_config_path(path: &Path) -> RegistryResult<PathBuf> {
    let expanded = expand_tilde(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|e| RegistryError::io(&expanded, e))?
            .join(expanded)
    };
    let canonical = normalize_path_components(&absolute);

    if !canonical.is_file() {
        return Err(RegistryError::io(
            &canonical,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        ));
    }

    Ok(canonical)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    // Can't go up from root, keep the component
                    components.push(Component::ParentDir);
                }
            }
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_folds_dot_components() {
        let normalized = normalize_path_components(Path::new("/data/./config/../lists/a.lst"));
        assert_eq!(normalized, PathBuf::from("/data/lists/a.lst"));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/db.yml")), home.join("db.yml"));
        }
        assert_eq!(expand_tilde(Path::new("/abs/~/x")), PathBuf::from("/abs/~/x"));
    }

    #[test]
    fn test_split_env_paths() {
        let paths = split_env_paths("/a/database.yml; /b/database.yml;;");
        assert_eq!(
            paths,
            vec![PathBuf::from("/a/database.yml"), PathBuf::from("/b/database.yml")]
        );
    }

    #[test]
    fn test_resolve_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = resolve_config_path(&temp.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }

    #[test]
    fn test_resolve_existing_file_is_normalized() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join(DATABASE_YML), "").unwrap();

        let resolved = resolve_config_path(&temp.path().join("sub/../database.yml")).unwrap();
        assert_eq!(resolved, temp.path().join(DATABASE_YML));
    }

    #[test]
    fn test_existing_files_in_tier_order() {
        let temp = TempDir::new().unwrap();
        let user_dir = temp.path().join("user");
        let project_dir = temp.path().join("project");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(user_dir.join(DATABASE_YML), "").unwrap();
        std::fs::write(project_dir.join(DATABASE_YML), "").unwrap();
        let extra = temp.path().join("extra.yml");
        std::fs::write(&extra, "").unwrap();

        let paths = ConfigPaths::with_dirs(Some(user_dir.clone()), Some(project_dir.clone()))
            .with_env_file(&extra)
            .with_env_file(temp.path().join("missing.yml"));

        let found = paths.existing_files();
        assert_eq!(
            found,
            vec![
                (ConfigTier::User, user_dir.join(DATABASE_YML)),
                (ConfigTier::Project, project_dir.join(DATABASE_YML)),
                (ConfigTier::Environment, extra),
            ]
        );
    }
}
