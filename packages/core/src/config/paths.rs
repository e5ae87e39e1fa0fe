//! Config file location

use directories::ProjectDirs;
use std::path::PathBuf;

/// Env var pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "EPS_DEPLOY_CONFIG";

const CONFIG_FILE_NAME: &str = "config.json";

/// Per-user config directory, e.g. `~/.config/eps-deploy`
pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "eps-deploy").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Resolve the config file path
///
/// Resolution order: explicit path, `EPS_DEPLOY_CONFIG`, the per-user
/// config directory.
pub fn get_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| {
            std::env::var_os(CONFIG_PATH_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
