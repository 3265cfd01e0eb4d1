//! Building, restoring and saving a session's object tree.

use std::fs;
use std::path::Path;

use tracing::{info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{walker, BomStore, NodeRef};
use crate::sample::{build_sample_bom, register_sample_types};

/// Creates the session described by `settings`.
///
/// The built-in sample wins over an input file; without either there is
/// nothing to build.
#[instrument(level = "debug", skip(settings))]
pub fn load_session(settings: &Settings) -> ApplicationResult<BomStore> {
    let mut store = BomStore::new();
    register_sample_types(&mut store)?;

    if settings.builtin {
        build_sample_bom(&mut store)?;
        info!("built-in sample BOM loaded");
        return Ok(store);
    }
    let input = settings.input.as_deref().ok_or(ApplicationError::NoSource)?;
    restore_session(&mut store, input)?;
    Ok(store)
}

/// Reads a serialized tree from `path` into `store`.
pub fn restore_session(store: &mut BomStore, path: &Path) -> ApplicationResult<NodeRef> {
    if !path.exists() {
        return Err(ApplicationError::InputNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).with_path_context("read object stream", path)?;
    let root = walker::deserialize(store, &bytes)?;
    info!("restored object tree from {}", path.display());
    Ok(root)
}

/// Writes the whole tree of `store` to `path`.
pub fn save_session(store: &BomStore, path: &Path) -> ApplicationResult<()> {
    let bytes = walker::serialize(store, &store.root_ref())?;
    fs::write(path, bytes).with_path_context("write object stream", path)?;
    info!("saved object tree to {}", path.display());
    Ok(())
}
