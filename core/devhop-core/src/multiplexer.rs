//! The multiplexer's live session table, treated as an external oracle.
//!
//! devhop keeps no session state of its own. Everything it knows about
//! sessions comes from asking tmux, through the narrow [`Multiplexer`] trait.

use crate::error::{HopError, Result};
use crate::session::SessionName;
use std::env;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};

pub trait Multiplexer {
    fn session_exists(&self, name: &SessionName) -> Result<bool>;

    /// Creates a detached session rooted at `cwd`. An empty `command` starts
    /// the default shell.
    fn create_session(&self, name: &SessionName, cwd: &Path, command: &str) -> Result<()>;

    /// Hands the terminal to the session. Blocks (or never returns) until the
    /// user detaches or the session ends.
    fn attach(&self, name: &SessionName) -> Result<()>;

    fn list_sessions(&self) -> Result<Vec<SessionName>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Session name encoding
// ─────────────────────────────────────────────────────────────────────────────

/// tmux rewrites `:` and `.` in session names, so canonical names are encoded
/// before reaching it. `:` becomes `/` (tool keys and directory names never
/// contain `/`); `%` and `.` are percent-escaped. The mapping is injective.
pub fn encode_tmux_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '.' => out.push_str("%2E"),
            ':' => out.push('/'),
            other => out.push(other),
        }
    }
    out
}

pub fn decode_tmux_name(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("%25") {
            out.push('%');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("%2E") {
            out.push('.');
            rest = tail;
        } else {
            out.push(if c == '/' { ':' } else { c });
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

fn exact_target(name: &SessionName) -> String {
    format!("={}", encode_tmux_name(name.as_str()))
}

/// Wraps a tool command so the pane falls back to a login shell when the
/// tool exits, keeping the session alive for later resumes.
pub fn keep_alive_command(command: &str) -> Option<String> {
    let command = command.trim();
    if command.is_empty() {
        None
    } else {
        Some(format!("{command}; exec \"${{SHELL:-/bin/sh}}\" -l"))
    }
}

#[derive(Debug, Clone)]
pub struct TmuxMultiplexer {
    binary: String,
}

impl Default for TmuxMultiplexer {
    fn default() -> Self {
        Self {
            binary: "tmux".to_string(),
        }
    }
}

impl TmuxMultiplexer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Fails with a clear message when tmux is not installed.
    pub fn ensure_available(&self) -> Result<()> {
        let output = self.run(&["-V"])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HopError::RemoteExecution {
                details: format!("{} -V failed", self.binary),
            })
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        self.command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HopError::RemoteExecution {
                details: format!("cannot run {}: {e} (is tmux installed?)", self.binary),
            })
    }
}

impl Multiplexer for TmuxMultiplexer {
    fn session_exists(&self, name: &SessionName) -> Result<bool> {
        let output = self.run(&["has-session", "-t", exact_target(name).as_str()])?;
        Ok(output.status.success())
    }

    fn create_session(&self, name: &SessionName, cwd: &Path, command: &str) -> Result<()> {
        let encoded = encode_tmux_name(name.as_str());
        let cwd = cwd.to_string_lossy().into_owned();
        let mut args = vec!["new-session", "-d", "-s", encoded.as_str(), "-c", cwd.as_str()];
        let wrapped = keep_alive_command(command);
        if let Some(wrapped) = wrapped.as_deref() {
            args.push(wrapped);
        }

        let output = self.run(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HopError::RemoteExecution {
                details: format!("tmux new-session failed: {}", stderr.trim()),
            });
        }
        tracing::info!(session = %name, cwd = %cwd, "Created tmux session");
        Ok(())
    }

    fn attach(&self, name: &SessionName) -> Result<()> {
        let target = exact_target(name);

        if env::var_os("TMUX").is_some() {
            let status = self
                .command()
                .args(["switch-client", "-t", target.as_str()])
                .status()
                .map_err(|e| HopError::RemoteExecution {
                    details: format!("cannot run {}: {e}", self.binary),
                })?;
            return if status.success() {
                Ok(())
            } else {
                Err(HopError::RemoteExecution {
                    details: format!("tmux switch-client to {name} failed"),
                })
            };
        }

        // exec only returns on failure.
        let err = self
            .command()
            .args(["attach-session", "-t", target.as_str()])
            .exec();
        Err(HopError::RemoteExecution {
            details: format!("cannot attach to {name}: {err}"),
        })
    }

    fn list_sessions(&self) -> Result<Vec<SessionName>> {
        let output = self.run(&["list-sessions", "-F", "#{session_name}"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("no server running") || stderr.contains("no sessions") {
                return Ok(Vec::new());
            }
            return Err(HopError::RemoteExecution {
                details: format!("tmux list-sessions failed: {}", stderr.trim()),
            });
        }
        let mut names: Vec<SessionName> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| SessionName::named(decode_tmux_name(line)))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A stand-in tmux that records its argv, prints canned output and exits
    /// with `code`.
    fn fake_tmux(dir: &Path, stdout: &str, stderr: &str, code: i32) -> (TmuxMultiplexer, PathBuf) {
        let argv = dir.join("argv");
        let script = dir.join("tmux");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\nprintf '{stdout}'\nprintf '%s' '{stderr}' >&2\nexit {code}\n",
                argv.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (TmuxMultiplexer::new(script.to_string_lossy()), argv)
    }

    fn recorded(argv: &Path) -> Vec<String> {
        fs::read_to_string(argv)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn encoding_avoids_tmux_separators() {
        let encoded = encode_tmux_name("claude:my.app:1700000000");
        assert_eq!(encoded, "claude/my%2Eapp/1700000000");
        assert!(!encoded.contains(':') && !encoded.contains('.'));
    }

    #[test]
    fn encoding_round_trips() {
        for name in ["shell:demo", "a:100%.done:1", "x:%2E:y", "tool:proj%25"] {
            assert_eq!(decode_tmux_name(&encode_tmux_name(name)), name);
        }
    }

    #[test]
    fn encoding_is_injective_for_lookalikes() {
        assert_ne!(encode_tmux_name("a:b.c"), encode_tmux_name("a:b%2Ec"));
        assert_ne!(encode_tmux_name("a_b:c"), encode_tmux_name("a:b_c"));
    }

    #[test]
    fn keep_alive_wraps_only_real_commands() {
        assert_eq!(keep_alive_command("  "), None);
        assert_eq!(
            keep_alive_command("claude").as_deref(),
            Some("claude; exec \"${SHELL:-/bin/sh}\" -l")
        );
    }

    #[test]
    fn missing_binary_is_remote_execution_error() {
        let tmux = TmuxMultiplexer::new("/nonexistent/devhop-tmux");
        assert!(matches!(
            tmux.ensure_available(),
            Err(HopError::RemoteExecution { .. })
        ));
        assert!(tmux.session_exists(&SessionName::named("x")).is_err());
    }

    #[test]
    fn has_session_uses_exact_match_target() {
        let temp = TempDir::new().unwrap();
        let name = SessionName::named("claude:my.app");

        let (tmux, argv) = fake_tmux(temp.path(), "", "", 0);
        assert!(tmux.session_exists(&name).unwrap());
        assert_eq!(recorded(&argv), ["has-session", "-t", "=claude/my%2Eapp"]);

        let (tmux, _) = fake_tmux(temp.path(), "", "session not found", 1);
        assert!(!tmux.session_exists(&name).unwrap());
    }

    #[test]
    fn new_session_is_detached_rooted_and_kept_alive() {
        let temp = TempDir::new().unwrap();
        let (tmux, argv) = fake_tmux(temp.path(), "", "", 0);
        let name = SessionName::named("claude:my.app:1700000000");

        tmux.create_session(&name, Path::new("/work/my.app"), "claude --continue")
            .unwrap();
        assert_eq!(
            recorded(&argv),
            [
                "new-session",
                "-d",
                "-s",
                "claude/my%2Eapp/1700000000",
                "-c",
                "/work/my.app",
                "claude --continue; exec \"${SHELL:-/bin/sh}\" -l",
            ]
        );

        tmux.create_session(&SessionName::named("shell:demo"), Path::new("/work/demo"), "")
            .unwrap();
        assert_eq!(
            recorded(&argv),
            ["new-session", "-d", "-s", "shell/demo", "-c", "/work/demo"]
        );
    }

    #[test]
    fn failed_new_session_carries_tmux_stderr() {
        let temp = TempDir::new().unwrap();
        let (tmux, _) = fake_tmux(temp.path(), "", "duplicate session: shell/demo", 1);
        let err = tmux
            .create_session(&SessionName::named("shell:demo"), Path::new("/work"), "")
            .unwrap_err();
        assert!(matches!(err, HopError::RemoteExecution { .. }));
        assert!(err.to_string().contains("duplicate session"));
    }

    #[test]
    fn no_server_running_means_no_sessions() {
        let temp = TempDir::new().unwrap();
        let (tmux, argv) = fake_tmux(
            temp.path(),
            "",
            "no server running on /tmp/tmux-1000/default",
            1,
        );
        assert!(tmux.list_sessions().unwrap().is_empty());
        assert_eq!(recorded(&argv), ["list-sessions", "-F", "#{session_name}"]);
    }

    #[test]
    fn other_list_failures_are_errors() {
        let temp = TempDir::new().unwrap();
        let (tmux, _) = fake_tmux(temp.path(), "", "permission denied", 1);
        assert!(matches!(
            tmux.list_sessions(),
            Err(HopError::RemoteExecution { .. })
        ));
    }

    #[test]
    fn listed_names_are_decoded_and_sorted() {
        let temp = TempDir::new().unwrap();
        let (tmux, _) = fake_tmux(
            temp.path(),
            "shell/demo\\nclaude/my%%2Eapp/1700000000\\n",
            "",
            0,
        );
        let names: Vec<String> = tmux
            .list_sessions()
            .unwrap()
            .iter()
            .map(|name| name.as_str().to_string())
            .collect();
        assert_eq!(names, ["claude:my.app:1700000000", "shell:demo"]);
    }
}
