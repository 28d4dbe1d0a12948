//! Host and tool configuration.
//!
//! The config file is the sole source of host/tool identity. It is parsed and
//! validated once into an immutable [`HopConfig`] which is then passed by
//! reference to the picker, dispatcher and integrations.

mod parse;

pub use parse::{parse, ParseError, Value, Vars};

use crate::error::{HopError, Result};
use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_PROJECTS_ROOT: &str = "~/projects";
pub const DEFAULT_TOOL: &str = "shell";

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));

/// Written by `devhop --settings` when no config exists yet.
pub const CONFIG_TEMPLATE: &str = r#"# devhop configuration
#
# Hosts you can hop to. Each key needs HOST_<key>_SSH (an ssh alias or user@host).
HOSTS=("home")
HOST_home_SSH="home-pc"
# Optional: command that enters a nested environment first (e.g. WSL).
# HOST_home_WSL_PREFIX="wsl.exe -d Ubuntu --"
# Optional: linux | termux | windows-wsl | macos
# HOST_home_OS="linux"
# Optional: where projects live on that host.
# HOST_home_PROJECTS="~/projects"

# Tools to run inside the session. An empty command opens a plain shell.
TOOLS=("shell" "claude")
TOOL_shell_CMD=""
TOOL_claude_CMD="claude"

# PROJECTS_ROOT="~/projects"
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsClass {
    Linux,
    Termux,
    WindowsWsl,
    Macos,
}

impl FromStr for OsClass {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "linux" => Ok(OsClass::Linux),
            "termux" => Ok(OsClass::Termux),
            "windows-wsl" => Ok(OsClass::WindowsWsl),
            "macos" => Ok(OsClass::Macos),
            other => Err(format!(
                "unknown OS class '{other}' (expected linux, termux, windows-wsl or macos)"
            )),
        }
    }
}

impl fmt::Display for OsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OsClass::Linux => "linux",
            OsClass::Termux => "termux",
            OsClass::WindowsWsl => "windows-wsl",
            OsClass::Macos => "macos",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub key: String,
    /// ssh alias or `user@host`.
    pub ssh_target: String,
    /// Empty when commands run directly in the landing shell.
    pub shell_prefix: String,
    pub os: OsClass,
    pub projects_root: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub key: String,
    /// Empty means a plain interactive shell.
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct HopConfig {
    source: PathBuf,
    hosts: Vec<Host>,
    tools: Vec<Tool>,
}

impl HopConfig {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn host(&self, key: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.key == key)
    }

    pub fn tool(&self, key: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.key == key)
    }

    pub fn host_keys(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.key.clone()).collect()
    }

    pub fn tool_keys(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.key.clone()).collect()
    }
}

/// Reads, parses and validates the config at `path`.
pub fn load(path: &Path) -> Result<HopConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(HopError::ConfigMissing(path.to_path_buf()))
        }
        Err(err) => return Err(HopError::io("reading config", err)),
    };
    let vars = parse(&text).map_err(|e| HopError::invalid(path, e.to_string()))?;
    resolve(&vars, path)
}

/// Builds the typed host/tool tables from parsed variables.
pub fn resolve(vars: &Vars, source: &Path) -> Result<HopConfig> {
    let invalid = |details: String| HopError::invalid(source, details);

    let host_keys = match vars.get("HOSTS") {
        Some(Value::Array(keys)) => keys.clone(),
        Some(Value::Scalar(key)) if !key.is_empty() => vec![key.clone()],
        Some(Value::Scalar(_)) => Vec::new(),
        None => return Err(invalid("HOSTS is not defined".to_string())),
    };
    check_keys("HOSTS", &host_keys).map_err(invalid)?;

    let default_root = scalar(vars, "PROJECTS_ROOT")
        .filter(|root| !root.is_empty())
        .unwrap_or(DEFAULT_PROJECTS_ROOT)
        .to_string();

    let mut hosts = Vec::with_capacity(host_keys.len());
    for key in host_keys {
        let ssh_target = scalar(vars, &format!("HOST_{key}_SSH"))
            .map(str::trim)
            .unwrap_or_default();
        if ssh_target.is_empty() {
            return Err(invalid(format!("host '{key}' has no HOST_{key}_SSH")));
        }
        let shell_prefix = scalar(vars, &format!("HOST_{key}_WSL_PREFIX"))
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let os = match scalar(vars, &format!("HOST_{key}_OS")).filter(|v| !v.is_empty()) {
            Some(value) => value
                .parse::<OsClass>()
                .map_err(|e| invalid(format!("host '{key}': {e}")))?,
            None if !shell_prefix.is_empty() => OsClass::WindowsWsl,
            None => OsClass::Linux,
        };
        if os == OsClass::WindowsWsl && shell_prefix.is_empty() {
            return Err(invalid(format!(
                "host '{key}' is windows-wsl but HOST_{key}_WSL_PREFIX is empty"
            )));
        }
        let projects_root = scalar(vars, &format!("HOST_{key}_PROJECTS"))
            .filter(|root| !root.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_root.clone());

        hosts.push(Host {
            ssh_target: ssh_target.to_string(),
            key,
            shell_prefix,
            os,
            projects_root,
        });
    }

    let tool_keys = match vars.get("TOOLS") {
        Some(Value::Array(keys)) => keys.clone(),
        Some(Value::Scalar(key)) if !key.is_empty() => vec![key.clone()],
        Some(Value::Scalar(_)) => Vec::new(),
        None => vec![DEFAULT_TOOL.to_string()],
    };
    check_keys("TOOLS", &tool_keys).map_err(invalid)?;

    let tools = tool_keys
        .into_iter()
        .map(|key| {
            let var = format!("TOOL_{key}_CMD");
            let command = match scalar(vars, &var) {
                Some(command) => command.trim().to_string(),
                None => {
                    tracing::debug!(tool = %key, "No {var}; using a plain shell");
                    String::new()
                }
            };
            Tool { key, command }
        })
        .collect();

    Ok(HopConfig {
        source: source.to_path_buf(),
        hosts,
        tools,
    })
}

fn scalar<'a>(vars: &'a Vars, name: &str) -> Option<&'a str> {
    match vars.get(name) {
        Some(Value::Scalar(value)) => Some(value.as_str()),
        _ => None,
    }
}

fn check_keys(list: &str, keys: &[String]) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for key in keys {
        if !KEY_PATTERN.is_match(key) {
            return Err(format!("{list} entry '{key}' must be letters, digits or '_'"));
        }
        if !seen.insert(key.as_str()) {
            return Err(format!("{list} lists '{key}' twice"));
        }
    }
    Ok(())
}
