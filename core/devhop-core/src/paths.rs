//! Path management for devhop.
//!
//! Every file devhop reads or rewrites is located through [`Paths`], so tests
//! can point the whole crate at a temp directory with [`Paths::with_home`].

use crate::error::{HopError, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "DEVHOP_CONFIG";

#[derive(Debug, Clone)]
pub struct Paths {
    home: PathBuf,
    config_file: PathBuf,
}

impl Paths {
    /// Resolves paths for the current user, honoring `$DEVHOP_CONFIG`.
    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| HopError::Io {
            context: "resolving home directory".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "HOME is not set"),
        })?;
        let mut paths = Self::with_home(home);
        if let Some(custom) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            paths.config_file = PathBuf::from(custom);
        }
        Ok(paths)
    }

    /// Creates paths rooted at a custom home directory.
    /// Used for testing with temp directories.
    pub fn with_home(home: PathBuf) -> Self {
        let config_file = home.join(".config").join("devhop").join("config");
        Self { home, config_file }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Managed files
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn ssh_config_file(&self) -> PathBuf {
        self.home.join(".ssh").join("config")
    }

    pub fn bashrc_file(&self) -> PathBuf {
        self.home.join(".bashrc")
    }

    pub fn zshrc_file(&self) -> PathBuf {
        self.home.join(".zshrc")
    }

    pub fn tmux_conf_file(&self) -> PathBuf {
        self.home.join(".tmux.conf")
    }

    /// Directory for rolling log files (`~/.local/state/devhop/logs`).
    pub fn log_dir(&self) -> PathBuf {
        self.home
            .join(".local")
            .join("state")
            .join("devhop")
            .join("logs")
    }

    /// Expands a leading `~` or `~/` against the home directory.
    pub fn expand_home(&self, path: &str) -> PathBuf {
        if path == "~" {
            return self.home.clone();
        }
        match path.strip_prefix("~/") {
            Some(rest) => self.home.join(rest),
            None => PathBuf::from(path),
        }
    }
}
