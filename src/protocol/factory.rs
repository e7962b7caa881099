//! Building protocols from configuration entries.

use super::{
    FILES, FileListSubset, MetaPart, Protocol, ProtocolKey, STANDARD_SUBSETS, Subset, UriSource,
};
use crate::META_DATABASE;
use crate::config::kind;
use crate::error::{RegistryError, RegistryResult};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Read access to protocols that are already registered.
pub trait ProtocolLookup {
    fn lookup(&self, key: &ProtocolKey) -> Option<Arc<Protocol>>;
}

/// Everything a factory knows about the entry it is building.
pub struct BuildContext<'a> {
    pub key: &'a ProtocolKey,
    /// Configuration file declaring the entry.
    pub config_path: &'a Path,
    /// Current merged registry state, for meta-protocol references.
    pub lookup: &'a dyn ProtocolLookup,
}

impl BuildContext<'_> {
    /// Directory relative paths in the entry are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// Turns a raw protocol specification into a [`Protocol`].
///
/// `Ok(None)` means the specification is structurally empty and the entry is
/// skipped; any other malformed specification must be reported as an error.
pub trait ProtocolFactory: fmt::Debug + Send + Sync {
    fn build(&self, ctx: &BuildContext<'_>, spec: &Value) -> RegistryResult<Option<Protocol>>;
}

/// Builds list-file protocols, and meta-protocols for database `X`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProtocolFactory;

impl ProtocolFactory for DefaultProtocolFactory {
    fn build(&self, ctx: &BuildContext<'_>, spec: &Value) -> RegistryResult<Option<Protocol>> {
        let entries = match spec {
            Value::Null => return Ok(None),
            Value::Mapping(map) if map.is_empty() => return Ok(None),
            Value::Mapping(map) => map,
            other => {
                return Err(RegistryError::invalid_spec(
                    ctx.key,
                    format!("expected a mapping, found {}", kind(other)),
                ));
            }
        };

        let subsets = if ctx.key.database == META_DATABASE {
            build_meta_subsets(ctx, entries)?
        } else {
            build_file_list_subsets(ctx, entries)?
        };

        Ok(Some(Protocol::new(ctx.key.clone(), ctx.config_path, subsets)))
    }
}

fn build_file_list_subsets(
    ctx: &BuildContext<'_>,
    entries: &Mapping,
) -> RegistryResult<IndexMap<String, Subset>> {
    let is_split = entries
        .keys()
        .any(|k| k.as_str().is_some_and(|k| STANDARD_SUBSETS.contains(&k)));

    let mut subsets = IndexMap::new();
    if is_split {
        for (name, value) in entries {
            let name = subset_name(ctx, name)?;
            let subset = file_list_subset(ctx, &name, value)?;
            subsets.insert(name, Subset::FileList(subset));
        }
    } else {
        let subset = file_list_subset(ctx, FILES, &Value::Mapping(entries.clone()))?;
        subsets.insert(FILES.to_string(), Subset::FileList(subset));
    }
    Ok(subsets)
}

fn file_list_subset(
    ctx: &BuildContext<'_>,
    subset: &str,
    value: &Value,
) -> RegistryResult<FileListSubset> {
    let entries = value.as_mapping().ok_or_else(|| {
        RegistryError::invalid_spec(
            ctx.key,
            format!("subset \"{}\" must be a mapping, found {}", subset, kind(value)),
        )
    })?;

    let mut uris = None;
    let mut fields = IndexMap::new();
    for (key, value) in entries {
        let key = subset_name(ctx, key)?;
        if key == "uri" {
            uris = Some(uri_source(ctx, subset, value)?);
        } else {
            fields.insert(key, value.clone());
        }
    }

    let uris = uris.ok_or_else(|| {
        RegistryError::invalid_spec(ctx.key, format!("subset \"{}\" has no \"uri\" entry", subset))
    })?;

    Ok(FileListSubset { uris, fields })
}

fn uri_source(ctx: &BuildContext<'_>, subset: &str, value: &Value) -> RegistryResult<UriSource> {
    match value {
        Value::String(path) => Ok(UriSource::ListFile(ctx.base_dir().join(path))),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(RegistryError::invalid_spec(
                    ctx.key,
                    format!("subset \"{}\" lists a uri that is {}", subset, kind(other)),
                )),
            })
            .collect::<RegistryResult<Vec<_>>>()
            .map(UriSource::Inline),
        other => Err(RegistryError::invalid_spec(
            ctx.key,
            format!(
                "\"uri\" of subset \"{}\" must be a path or a list, found {}",
                subset,
                kind(other)
            ),
        )),
    }
}

fn build_meta_subsets(
    ctx: &BuildContext<'_>,
    entries: &Mapping,
) -> RegistryResult<IndexMap<String, Subset>> {
    let mut subsets = IndexMap::new();

    for (name, value) in entries {
        let name = subset_name(ctx, name)?;
        let references = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map.clone(),
            other => {
                return Err(RegistryError::invalid_spec(
                    ctx.key,
                    format!("subset \"{}\" must be a mapping, found {}", name, kind(other)),
                ));
            }
        };

        let mut parts = Vec::with_capacity(references.len());
        for (reference, wanted) in &references {
            let reference = reference.as_str().ok_or_else(|| {
                RegistryError::invalid_spec(
                    ctx.key,
                    format!("subset \"{}\" references a non-string protocol name", name),
                )
            })?;
            parts.push(meta_part(ctx, &name, reference, wanted)?);
        }
        subsets.insert(name, Subset::Meta(parts));
    }

    Ok(subsets)
}

fn meta_part(
    ctx: &BuildContext<'_>,
    subset: &str,
    reference: &str,
    wanted: &Value,
) -> RegistryResult<MetaPart> {
    let key: ProtocolKey = reference
        .parse()
        .map_err(|e: RegistryError| RegistryError::invalid_spec(ctx.key, e.to_string()))?;

    let protocol = ctx
        .lookup
        .lookup(&key)
        .ok_or_else(|| RegistryError::MetaResolution {
            protocol: ctx.key.to_string(),
            reference: reference.to_string(),
        })?;

    let subsets: Vec<String> = match wanted {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    RegistryError::invalid_spec(
                        ctx.key,
                        format!("subset \"{}\" lists a non-string subset of {}", subset, reference),
                    )
                })
            })
            .collect::<RegistryResult<_>>()?,
        other => {
            return Err(RegistryError::invalid_spec(
                ctx.key,
                format!(
                    "subsets of {} in \"{}\" must be a name or a list, found {}",
                    reference,
                    subset,
                    kind(other)
                ),
            ));
        }
    };

    if let Some(missing) = subsets.iter().find(|s| !protocol.has_subset(s)) {
        return Err(RegistryError::invalid_spec(
            ctx.key,
            format!("{} has no \"{}\" subset", reference, missing),
        ));
    }

    Ok(MetaPart { protocol, subsets })
}

fn subset_name(ctx: &BuildContext<'_>, key: &Value) -> RegistryResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(RegistryError::invalid_spec(
            ctx.key,
            format!("expected a scalar key, found {}", kind(other)),
        )),
    }
}
