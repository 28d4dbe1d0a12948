//! Integrations: the managed blocks devhop maintains in user dotfiles.
//!
//! | key          | block                       | file(s)                   |
//! |--------------|-----------------------------|---------------------------|
//! | `ssh-config` | `devhop-managed-hosts`      | `~/.ssh/config` (0600)    |
//! | `shell-rc`   | `devhop-managed-shell`      | `~/.bashrc`, `~/.zshrc`   |
//! | `tmux-conf`  | `devhop-managed-tmux`       | `~/.tmux.conf`            |
//!
//! Everything outside the blocks belongs to the user and is never touched.

use crate::config::HopConfig;
use crate::error::{HopError, Result};
use crate::managed_block::{self, FileMode, ManagedBlock, MergeOutcome};
use crate::paths::Paths;
use fs_err as fs;
use std::env;
use std::fmt;
use std::path::PathBuf;

pub const NAMESPACE: &str = "devhop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integration {
    SshConfig,
    ShellRc,
    TmuxConf,
}

impl Integration {
    pub const ALL: [Integration; 3] = [
        Integration::SshConfig,
        Integration::ShellRc,
        Integration::TmuxConf,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Integration::SshConfig => "ssh-config",
            Integration::ShellRc => "shell-rc",
            Integration::TmuxConf => "tmux-conf",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.key() == key)
    }

    /// Menu text for the settings picker.
    pub fn label(self) -> &'static str {
        match self {
            Integration::SshConfig => "ssh-config: host entries with keepalive and connection sharing",
            Integration::ShellRc => "shell-rc: ~/.local/bin on PATH and the `dh` alias",
            Integration::TmuxConf => "tmux-conf: mouse, scrollback and session-name titles",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.label() == label)
    }

    fn suffix(self) -> &'static str {
        match self {
            Integration::SshConfig => "hosts",
            Integration::ShellRc => "shell",
            Integration::TmuxConf => "tmux",
        }
    }

    pub fn block(self) -> ManagedBlock {
        ManagedBlock::new(NAMESPACE, Some(self.suffix()))
    }

    fn file_mode(self) -> FileMode {
        match self {
            Integration::SshConfig => FileMode::Private,
            Integration::ShellRc | Integration::TmuxConf => FileMode::Preserve,
        }
    }

    /// Files this integration writes to. For `shell-rc` that is every rc file
    /// that exists, or the one matching `login_shell` when none do.
    pub fn targets(self, paths: &Paths, login_shell: Option<&str>) -> Vec<PathBuf> {
        match self {
            Integration::SshConfig => vec![paths.ssh_config_file()],
            Integration::TmuxConf => vec![paths.tmux_conf_file()],
            Integration::ShellRc => {
                let existing: Vec<PathBuf> = [paths.bashrc_file(), paths.zshrc_file()]
                    .into_iter()
                    .filter(|path| path.exists())
                    .collect();
                if !existing.is_empty() {
                    return existing;
                }
                let is_zsh = login_shell
                    .map(|shell| shell.rsplit('/').next() == Some("zsh"))
                    .unwrap_or(false);
                vec![if is_zsh {
                    paths.zshrc_file()
                } else {
                    paths.bashrc_file()
                }]
            }
        }
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Parses integration keys from the command line.
pub fn parse_keys(keys: &[String]) -> Result<Vec<Integration>> {
    keys.iter()
        .map(|key| {
            Integration::from_key(key).ok_or_else(|| {
                let known: Vec<&str> = Integration::ALL.iter().map(|i| i.key()).collect();
                HopError::Usage(format!(
                    "unknown integration '{key}' (expected one of: {})",
                    known.join(", ")
                ))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationReport {
    pub integration: Integration,
    pub path: PathBuf,
    pub outcome: MergeOutcome,
}

impl fmt::Display for IntegrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.outcome {
            MergeOutcome::Created => "created",
            MergeOutcome::Updated => "updated",
            MergeOutcome::Unchanged => "already up to date",
            MergeOutcome::Removed => "removed",
            MergeOutcome::Absent => "not installed",
        };
        write!(f, "{}: {} {}", self.integration, self.path.display(), verb)
    }
}

/// Writes the integration's block into each of its target files.
/// `ssh-config` needs the host table; the others ignore `config`.
pub fn install(
    integration: Integration,
    paths: &Paths,
    config: Option<&HopConfig>,
) -> Result<Vec<IntegrationReport>> {
    let content = match integration {
        Integration::SshConfig => {
            let config = config.ok_or_else(|| {
                HopError::Usage("ssh-config needs a devhop config with HOSTS".to_string())
            })?;
            ssh_config_content(config)
        }
        Integration::ShellRc => shell_rc_content(),
        Integration::TmuxConf => tmux_conf_content(),
    };

    let shell = env::var("SHELL").ok();
    let block = integration.block();
    let mut reports = Vec::new();
    for path in integration.targets(paths, shell.as_deref()) {
        let outcome = managed_block::write_block(&path, &block, &content, integration.file_mode())?;
        tracing::info!(integration = %integration, path = %path.display(), ?outcome, "Installed integration");
        reports.push(IntegrationReport {
            integration,
            path,
            outcome,
        });
    }
    Ok(reports)
}

/// True when any candidate file already carries the integration's block.
pub fn is_installed(integration: Integration, paths: &Paths) -> bool {
    let block = integration.block();
    candidate_files(integration, paths).iter().any(|path| {
        fs::read(path)
            .map(|bytes| managed_block::contains_block(&bytes, &block))
            .unwrap_or(false)
    })
}

fn candidate_files(integration: Integration, paths: &Paths) -> Vec<PathBuf> {
    match integration {
        Integration::ShellRc => vec![paths.bashrc_file(), paths.zshrc_file()],
        other => other.targets(paths, None),
    }
}

/// Removes the integration's block wherever it may have been written.
pub fn uninstall(integration: Integration, paths: &Paths) -> Result<Vec<IntegrationReport>> {
    let block = integration.block();
    let mut reports = Vec::new();
    for path in candidate_files(integration, paths) {
        let outcome = managed_block::remove_block(&path, &block, integration.file_mode())?;
        if outcome == MergeOutcome::Absent && !path.exists() {
            continue;
        }
        tracing::info!(integration = %integration, path = %path.display(), ?outcome, "Removed integration");
        reports.push(IntegrationReport {
            integration,
            path,
            outcome,
        });
    }
    Ok(reports)
}

// ─────────────────────────────────────────────────────────────────────────────
// Block contents
// ─────────────────────────────────────────────────────────────────────────────

/// One `Host` stanza per distinct SSH target.
pub fn ssh_config_content(config: &HopConfig) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut out = String::new();
    for host in config.hosts() {
        if seen.contains(&host.ssh_target.as_str()) {
            continue;
        }
        seen.push(&host.ssh_target);

        let (user, name) = match host.ssh_target.split_once('@') {
            Some((user, name)) => (Some(user), name),
            None => (None, host.ssh_target.as_str()),
        };
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("# devhop host '{}'\n", host.key));
        out.push_str(&format!("Host {name}\n"));
        if let Some(user) = user {
            out.push_str(&format!("    User {user}\n"));
        }
        out.push_str("    ServerAliveInterval 30\n");
        out.push_str("    ServerAliveCountMax 3\n");
        out.push_str("    ControlMaster auto\n");
        out.push_str("    ControlPath ~/.ssh/devhop-%r@%h-%p\n");
        out.push_str("    ControlPersist 10m\n");
    }
    out
}

pub fn shell_rc_content() -> String {
    [
        r#"case ":$PATH:" in"#,
        r#"    *":$HOME/.local/bin:"*) ;;"#,
        r#"    *) export PATH="$HOME/.local/bin:$PATH" ;;"#,
        "esac",
        "alias dh='devhop'",
        "",
    ]
    .join("\n")
}

pub fn tmux_conf_content() -> String {
    [
        "set -g mouse on",
        "set -g history-limit 50000",
        "set -g set-titles on",
        r##"set -g set-titles-string "#S""##,
        "",
    ]
    .join("\n")
}
