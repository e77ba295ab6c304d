//! Locations of the per-user `.hogtrain` folder.
//!
//! The folder sits under the OS config directory unless
//! `HOGTRAIN_CONFIG_HOME` names another base.

use std::{ffi::OsString, path::PathBuf};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the per-user application folder.
pub const APP_DIR_NAME: &str = ".hogtrain";

/// Environment variable that replaces the OS config directory.
pub const CONFIG_HOME_ENV: &str = "HOGTRAIN_CONFIG_HOME";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory could be determined; set HOGTRAIN_CONFIG_HOME")]
    NoBaseDir,
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.hogtrain` folder, created on first use.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = resolve_base(std::env::var_os(CONFIG_HOME_ENV)).ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// `.hogtrain/logs`, created on first use.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("logs"))
}

/// An empty override counts as unset.
fn resolve_base(override_value: Option<OsString>) -> Option<PathBuf> {
    match override_value {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()),
    }
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
