//! Config init subcommand
//!
//! Runs before the existing config is loaded, so it can replace a file that
//! no longer parses or validates.

use anyhow::{Result, bail};
use console::style;
use eps_deploy_core::{Config, save_config};
use std::path::Path;

/// Write a default config file at the resolved config path
pub fn cmd_config_init(path: &Path, force: bool, quiet: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!(
            "Config file already exists at {}\n\n  Use {} to overwrite it.",
            path.display(),
            style("eps-deploy config init --force").green()
        );
    }

    save_config(&Config::default(), path)?;
    if !quiet {
        println!(
            "{} Wrote default config to {}",
            style("Success:").green().bold(),
            style(path.display()).cyan()
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eps_deploy_core::config::load_config_from;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eps-deploy").join("config.json");
        assert_eq!(cmd_config_init(&path, false, true).unwrap(), 0);
        assert_eq!(load_config_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        cmd_config_init(&path, false, true).unwrap();
        assert!(cmd_config_init(&path, false, true).is_err());
        assert_eq!(cmd_config_init(&path, true, true).unwrap(), 0);
    }

    #[test]
    fn force_replaces_unloadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ports": [1]}"#).unwrap();
        assert!(load_config_from(&path).is_err());

        assert_eq!(cmd_config_init(&path, true, true).unwrap(), 0);
        assert_eq!(load_config_from(&path).unwrap(), Config::default());
    }
}
