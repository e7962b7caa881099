//! Configuration sources.
//!
//! A configuration source is a `database.yml` file with two top-level sections:
//! - `Protocols` - database -> task -> protocol -> specification
//! - `Databases` - database -> path template(s) where its media files live
//!
//! ## Environment Variables
//! - `PROTOCOL_REGISTRY_CONFIG` - `;`-separated list of extra configuration files
//! - `PROTOCOL_REGISTRY_HOME` - User config dir (default: `~/.protocol-registry`)

mod loader;
mod types;

pub use loader::{
    CONFIG_ENV, ConfigPaths, ConfigTier, DATABASE_YML, HOME_ENV, expand_tilde,
    normalize_path_components, resolve_config_path, split_env_paths,
};
pub use types::{ConfigFile, DATABASES_KEY, PROTOCOLS_KEY, TaskEntries};
pub(crate) use types::kind;
