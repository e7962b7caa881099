//! Process-wide registry for applications that want a single shared instance.
//!
//! The library itself never touches this instance; it only exists for callers
//! at the application boundary (the CLI, scripts). Readers get an immutable
//! snapshot, and every load swaps in a new registry.
//!
//! Loads are serialized: each one starts from the registry published by the
//! previous load, so concurrent loads from several threads all land.

use super::{LoadReport, OverridePolicy, Registry};
use crate::config::ConfigPaths;
use crate::error::RegistryResult;
use crate::protocol::Protocol;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};

static REGISTRY: LazyLock<ArcSwap<Registry>> =
    LazyLock::new(|| ArcSwap::from_pointee(Registry::new()));

/// Held from clone to store.
static LOAD_LOCK: Mutex<()> = Mutex::new(());

/// Snapshot of the process-wide registry.
pub fn registry() -> Arc<Registry> {
    REGISTRY.load_full()
}

/// Run `load` on a copy of the current registry and publish the copy.
///
/// Whatever was committed before an error is still published.
fn update<F>(load: F) -> RegistryResult<LoadReport>
where
    F: FnOnce(&mut Registry) -> RegistryResult<LoadReport>,
{
    let _guard = LOAD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut next = Registry::clone(&REGISTRY.load());
    let result = load(&mut next);
    REGISTRY.store(Arc::new(next));
    result
}

/// Load files into the process-wide registry.
pub fn load_databases<I, P>(paths: I, policy: OverridePolicy) -> RegistryResult<LoadReport>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    update(|registry| registry.load_databases(paths, policy))
}

/// Load the default configuration files (home, cwd, environment).
pub fn load_default_databases() -> RegistryResult<LoadReport> {
    load_default_databases_from(&ConfigPaths::discover())
}

/// Load the existing files among `paths`; later files override earlier ones.
pub fn load_default_databases_from(paths: &ConfigPaths) -> RegistryResult<LoadReport> {
    update(|registry| registry.load_default_databases(paths, OverridePolicy::WarnOverride))
}

/// Look up a protocol in the process-wide registry.
pub fn get_protocol(name: &str) -> RegistryResult<Arc<Protocol>> {
    registry().get_protocol(name)
}
