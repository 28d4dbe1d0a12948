//! Dispatch protocol shared by the devhop client and `devhop-host`.
//!
//! The client never talks to tmux directly. It renders a [`DispatchRequest`]
//! into a `devhop-host` command line, wraps it for the remote login shell, and
//! hands the resulting string to the remote-execution channel. Keeping flag
//! names and quoting here prevents the two sides from drifting apart.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Name of the orchestrator binary expected on the host's `PATH`.
pub const HOST_BINARY: &str = "devhop-host";

/// Flag names understood by `devhop-host`.
pub mod flags {
    pub const PROJECT: &str = "--project";
    pub const TOOL: &str = "--tool";
    pub const COMMAND: &str = "--command";
    pub const SESSION: &str = "--session";
    pub const MODE: &str = "--mode";
    pub const ROOT: &str = "--root";
    pub const LIST_PROJECTS: &str = "--list-projects";
    pub const LIST_SESSIONS: &str = "--list-sessions";
    pub const PREFIX: &str = "--prefix";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Reattach to `<tool>:<project>`, creating it on first use.
    #[default]
    Resume,
    /// Always start a fresh `<tool>:<project>:<epoch>` session.
    New,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Resume => "resume",
            SessionMode::New => "new",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session mode '{}' (expected resume or new)", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for SessionMode {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "resume" => Ok(SessionMode::Resume),
            "new" => Ok(SessionMode::New),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Everything the host needs to resolve or create one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRequest {
    pub project: String,
    /// Tool key, used for naming.
    pub tool: String,
    /// Tool command line. Empty means a plain interactive shell.
    pub command: String,
    /// Pre-minted session name. The host trusts it when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub mode: SessionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects_root: Option<String>,
}

impl DispatchRequest {
    /// Renders the request as `devhop-host` arguments (binary name excluded).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            flags::PROJECT.to_string(),
            self.project.clone(),
            flags::TOOL.to_string(),
            self.tool.clone(),
            flags::COMMAND.to_string(),
            self.command.clone(),
            flags::MODE.to_string(),
            self.mode.as_str().to_string(),
        ];
        if let Some(session) = &self.session {
            args.push(flags::SESSION.to_string());
            args.push(session.clone());
        }
        if let Some(root) = &self.projects_root {
            args.push(flags::ROOT.to_string());
            args.push(root.clone());
        }
        args
    }
}

pub fn list_projects_args(projects_root: Option<&str>) -> Vec<String> {
    let mut args = vec![flags::LIST_PROJECTS.to_string()];
    if let Some(root) = projects_root {
        args.push(flags::ROOT.to_string());
        args.push(root.to_string());
    }
    args
}

pub fn list_sessions_args(prefix: &str) -> Vec<String> {
    vec![
        flags::LIST_SESSIONS.to_string(),
        flags::PREFIX.to_string(),
        prefix.to_string(),
    ]
}

/// Builds the single command line run by the remote landing shell.
///
/// The host binary runs under `sh -lc` so the login profile sets `PATH`. A
/// non-empty shell prefix (e.g. `wsl.exe -d Ubuntu --`) is placed in front
/// verbatim so it can enter the nested environment first.
pub fn render_remote_command(shell_prefix: &str, args: &[String]) -> String {
    let words = std::iter::once(HOST_BINARY).chain(args.iter().map(String::as_str));
    let inner = shell_words::join(words);
    let wrapped = format!("sh -lc {}", shell_words::quote(&inner));
    let prefix = shell_prefix.trim();
    if prefix.is_empty() {
        wrapped
    } else {
        format!("{prefix} {wrapped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(session: Option<&str>, mode: SessionMode) -> DispatchRequest {
        DispatchRequest {
            project: "demo".to_string(),
            tool: "claude".to_string(),
            command: "claude --continue".to_string(),
            session: session.map(str::to_string),
            mode,
            projects_root: None,
        }
    }

    #[test]
    fn args_carry_mode_and_preminted_name() {
        let args = request(Some("claude:demo:1700000000"), SessionMode::New).to_args();
        assert_eq!(
            args,
            vec![
                "--project",
                "demo",
                "--tool",
                "claude",
                "--command",
                "claude --continue",
                "--mode",
                "new",
                "--session",
                "claude:demo:1700000000",
            ]
        );
    }

    #[test]
    fn args_omit_absent_optionals() {
        let args = request(None, SessionMode::Resume).to_args();
        assert!(!args.iter().any(|a| a == flags::SESSION));
        assert!(!args.iter().any(|a| a == flags::ROOT));
    }

    #[test]
    fn remote_command_splits_back_into_host_args() {
        let sent = DispatchRequest {
            project: "it's mine".to_string(),
            tool: "claude".to_string(),
            command: String::new(),
            session: Some("claude:it's mine:1700000000".to_string()),
            mode: SessionMode::New,
            projects_root: Some("~/src; rm -rf /".to_string()),
        };
        let rendered = render_remote_command("", &sent.to_args());

        let outer = shell_words::split(&rendered).unwrap();
        assert_eq!(outer[..2], ["sh", "-lc"]);
        assert_eq!(outer.len(), 3);

        let inner = shell_words::split(&outer[2]).unwrap();
        assert_eq!(inner[0], HOST_BINARY);
        assert_eq!(inner[1..], sent.to_args()[..]);
    }

    #[test]
    fn remote_command_without_prefix() {
        let args = vec!["--project".to_string(), "my app".to_string()];
        assert_eq!(
            render_remote_command("", &args),
            "sh -lc 'devhop-host --project '\\''my app'\\'''"
        );
    }

    #[test]
    fn remote_command_with_shell_prefix() {
        let args = list_projects_args(None);
        assert_eq!(
            render_remote_command("  wsl.exe -d Ubuntu -- ", &args),
            "wsl.exe -d Ubuntu -- sh -lc 'devhop-host --list-projects'"
        );
    }

    #[test]
    fn mode_parses_and_rejects() {
        assert_eq!("new".parse::<SessionMode>(), Ok(SessionMode::New));
        assert_eq!("resume".parse::<SessionMode>(), Ok(SessionMode::Resume));
        assert!("later".parse::<SessionMode>().is_err());
    }

    #[test]
    fn request_serializes_mode_in_snake_case() {
        let json = serde_json::to_value(request(None, SessionMode::New)).unwrap();
        assert_eq!(json["mode"], "new");
        assert!(json.get("session").is_none());
    }
}
