//! Configuration loader with multi-source merging

use crate::{BetmeshConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "BETMESH".to_string(),
            user_config: true,
        }
    }

    /// Set the node directory holding `betmesh.toml`
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "BETMESH")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip `~/.config/betmesh/config.toml`
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<BetmeshConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = BetmeshConfig::default();
        builder = builder.add_source(
            config::Config::try_from(&defaults).context("Failed to encode default configuration")?,
        );

        // 2. User config (~/.config/betmesh/config.toml)
        if self.user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Node config (betmesh.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (betmesh.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (BETMESH_NODE__HTTP_ADDR and friends)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut betmesh_config: BetmeshConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        betmesh_config.resolve_paths(&self.project_dir);
        betmesh_config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", self.project_dir.display()))?;

        Ok(betmesh_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> BetmeshConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
