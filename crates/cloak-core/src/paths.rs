use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::{CloakError, Result};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "cloak";
pub const APP_NAME: &str = "calculator";

pub const DATA_DIR_ENV: &str = "CLOAK_DATA_DIR";

pub fn data_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(override_path));
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or(CloakError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn bulk_store_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("store.json")
}

pub fn settings_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("settings.json")
}
