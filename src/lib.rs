//! Protocol Registry Library
//!
//! Loads dataset protocol definitions from `database.yml` files, merges them
//! across files under an override policy, and resolves meta-protocols that
//! aggregate subsets of other protocols.

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod finder;
pub mod format;
pub mod logging;
pub mod protocol;
pub mod registry;

/// Name of the database holding meta-protocols.
pub const META_DATABASE: &str = "X";

pub use database::Database;
pub use error::{ErrorCode, RegistryError, RegistryResult};
pub use finder::FileFinder;
pub use protocol::{Protocol, ProtocolFile, ProtocolKey};
pub use registry::{LoadReport, OverrideConflict, OverridePolicy, Registry};
