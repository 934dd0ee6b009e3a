//! Subcommand implementations shared by the `oracular` binary.

pub mod oraclize;
pub mod predict;
pub mod tune;

use anyhow::{Context, Result};

use oracular_core::store::{store_for, ModelStore};

/// Environment variable naming the default artifact store root.
pub const STORE_ENV: &str = "ORACULAR_STORE_ROOT";

/// Open the model store from `--store`, falling back to the environment.
pub fn open_store(flag: Option<&String>) -> Result<ModelStore> {
    let location = match flag {
        Some(location) => location.clone(),
        None => std::env::var(STORE_ENV)
            .with_context(|| format!("pass --store or set {}", STORE_ENV))?,
    };
    log::debug!("[Oracular] artifact store at '{}'", location);
    Ok(ModelStore::new(store_for(&location)?))
}
