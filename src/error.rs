//! Structured error types for registry operations.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Loading errors
    IoError,
    ParseError,
    InvalidSpec,
    MetaResolutionError,

    // Lookup errors
    UnknownDatabase,
    UnknownProtocol,
    UnknownSubset,
    InvalidProtocolName,

    // File finder errors
    FileNotFound,
    AmbiguousFile,
}

/// Errors raised while loading configuration files or querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid specification for protocol {protocol}: {message}")]
    InvalidSpec { protocol: String, message: String },

    #[error("meta-protocol {protocol} references unknown protocol {reference}")]
    MetaResolution { protocol: String, reference: String },

    #[error("{}", unknown_database_message(name))]
    UnknownDatabase { name: String },

    #[error("could not find protocol \"{protocol}\" for task \"{task}\" of database \"{database}\"")]
    UnknownProtocol {
        database: String,
        task: String,
        protocol: String,
    },

    #[error("protocol {protocol} has no \"{subset}\" subset")]
    UnknownSubset { protocol: String, subset: String },

    #[error("invalid protocol name \"{name}\" (expected Database.Task.Protocol)")]
    InvalidProtocolName { name: String },

    #[error("could not find file \"{uri}\" in the following location(s):{}", bullet_list(searched))]
    FileNotFound { uri: String, searched: Vec<PathBuf> },

    #[error("looked for file \"{uri}\" and found more than one ({}) matching locations:{}", found.len(), bullet_list(found))]
    AmbiguousFile { uri: String, found: Vec<PathBuf> },
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::Io { .. } => ErrorCode::IoError,
            RegistryError::Parse { .. } => ErrorCode::ParseError,
            RegistryError::InvalidSpec { .. } => ErrorCode::InvalidSpec,
            RegistryError::MetaResolution { .. } => ErrorCode::MetaResolutionError,
            RegistryError::UnknownDatabase { .. } => ErrorCode::UnknownDatabase,
            RegistryError::UnknownProtocol { .. } => ErrorCode::UnknownProtocol,
            RegistryError::UnknownSubset { .. } => ErrorCode::UnknownSubset,
            RegistryError::InvalidProtocolName { .. } => ErrorCode::InvalidProtocolName,
            RegistryError::FileNotFound { .. } => ErrorCode::FileNotFound,
            RegistryError::AmbiguousFile { .. } => ErrorCode::AmbiguousFile,
        }
    }

    // Convenience constructors

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_spec(protocol: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            protocol: protocol.to_string(),
            message: message.into(),
        }
    }

    pub fn unknown_database(name: &str) -> Self {
        Self::UnknownDatabase {
            name: name.to_string(),
        }
    }

    pub fn unknown_protocol(database: &str, task: &str, protocol: &str) -> Self {
        Self::UnknownProtocol {
            database: database.to_string(),
            task: task.to_string(),
            protocol: protocol.to_string(),
        }
    }
}

fn unknown_database_message(name: &str) -> String {
    if name == crate::META_DATABASE {
        "could not find any meta-protocol (database \"X\" is not defined in any loaded configuration file)".to_string()
    } else {
        format!("could not find any protocol for \"{}\" database", name)
    }
}

fn bullet_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("\n - {}", p.display()))
        .collect()
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
