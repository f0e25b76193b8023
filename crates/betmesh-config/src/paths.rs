//! Where a node keeps its files.
//!
//! A node directory looks like:
//!
//! ```text
//! node-0/
//! ├── betmesh.toml         committed node config
//! ├── betmesh.local.toml   untracked overrides
//! └── data/                record store journal
//! ```
//!
//! The per-user config lives in the XDG config directory.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Node config file name.
pub const NODE_CONFIG_FILE: &str = "betmesh.toml";

/// Untracked overrides layered on top of [`NODE_CONFIG_FILE`].
pub const NODE_LOCAL_CONFIG_FILE: &str = "betmesh.local.toml";

/// Store directory, relative to the node directory.
pub const NODE_DATA_DIR: &str = "data";

pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("org", "betmesh", "betmesh"),
        }
    }

    /// `~/.config/betmesh/` on Linux.
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::XdgError("no home directory for user config".to_string()))
    }

    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    pub fn project_config_file(node_dir: impl AsRef<Path>) -> PathBuf {
        node_dir.as_ref().join(NODE_CONFIG_FILE)
    }

    pub fn local_config_file(node_dir: impl AsRef<Path>) -> PathBuf {
        node_dir.as_ref().join(NODE_LOCAL_CONFIG_FILE)
    }

    /// The store directory a freshly initialized node should use, relative
    /// so the node directory can be moved.
    pub fn node_data_dir() -> PathBuf {
        PathBuf::from(NODE_DATA_DIR)
    }

    /// `.gitignore` contents for a node directory: the store and local
    /// overrides stay out of version control, the node config does not.
    pub fn node_gitignore() -> String {
        format!("# betmesh local state\n{NODE_DATA_DIR}/\n.betmesh/\n{NODE_LOCAL_CONFIG_FILE}\n")
    }

    /// True once `betmesh init` (or `cluster init`) has written a config.
    pub fn is_initialized(node_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(node_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_xdg_paths() {
        // Not every environment has a home directory.
        if let Ok(config_file) = Paths::new().user_config_file() {
            assert!(config_file.to_string_lossy().contains("betmesh"));
            assert!(config_file.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_node_dir_layout() {
        let temp_dir = tempdir().unwrap();
        let node_dir = temp_dir.path();

        let config_file = Paths::project_config_file(node_dir);
        assert_eq!(config_file, node_dir.join("betmesh.toml"));
        assert_eq!(
            Paths::local_config_file(node_dir),
            node_dir.join("betmesh.local.toml")
        );
        assert!(Paths::node_data_dir().is_relative());

        assert!(!Paths::is_initialized(node_dir));
        std::fs::write(&config_file, "[node]\nid = 1\n").unwrap();
        assert!(Paths::is_initialized(node_dir));
    }

    #[test]
    fn test_gitignore_keeps_state_but_not_config() {
        let ignore = Paths::node_gitignore();
        assert!(ignore.lines().any(|l| l == "data/"));
        assert!(ignore.lines().any(|l| l == NODE_LOCAL_CONFIG_FILE));
        assert!(!ignore.lines().any(|l| l == NODE_CONFIG_FILE));
    }
}
