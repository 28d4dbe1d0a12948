//! Remote-execution channel.
//!
//! The dispatcher only needs "run one command line on that host". [`SshChannel`]
//! is the production binding; tests substitute their own [`RemoteChannel`].

use crate::error::{HopError, Result};
use std::process::{Command, Stdio};

/// ssh reserves 255 for its own failures (resolve, connect, auth).
const SSH_FAILURE_STATUS: i32 = 255;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait RemoteChannel {
    /// Confirms the host accepts a non-interactive login, with a short
    /// connect timeout.
    fn probe(&self, target: &str) -> Result<()>;

    /// Runs `command` and captures its output.
    fn capture(&self, target: &str, command: &str) -> Result<RemoteOutput>;

    /// Runs `command` on a remote tty with local stdio attached. Blocks until
    /// the remote side exits and returns its status.
    fn interactive(&self, target: &str, command: &str) -> Result<i32>;
}

#[derive(Debug, Clone)]
pub struct SshChannel {
    binary: String,
    connect_timeout_secs: u32,
}

impl Default for SshChannel {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl SshChannel {
    pub fn new(binary: impl Into<String>, connect_timeout_secs: u32) -> Self {
        Self {
            binary: binary.into(),
            connect_timeout_secs,
        }
    }

    fn batch_command(&self, target: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(["-o", "BatchMode=yes"]).arg(target);
        command
    }

    fn unreachable(target: &str, details: impl Into<String>) -> HopError {
        HopError::RemoteUnreachable {
            target: target.to_string(),
            details: details.into(),
        }
    }
}

impl RemoteChannel for SshChannel {
    fn probe(&self, target: &str) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(target)
            .arg("true")
            .stdin(Stdio::null());
        let output = command
            .output()
            .map_err(|e| Self::unreachable(target, format!("cannot run {}: {e}", self.binary)))?;
        if output.status.success() {
            tracing::debug!(ssh_target = target, "Reachability probe succeeded");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Self::unreachable(target, last_line(&stderr, "connection failed")))
    }

    fn capture(&self, target: &str, command_line: &str) -> Result<RemoteOutput> {
        let mut command = self.batch_command(target);
        command.arg(command_line).stdin(Stdio::null());
        tracing::debug!(ssh_target = target, command = command_line, "Running remote command");

        let output = command
            .output()
            .map_err(|e| Self::unreachable(target, format!("cannot run {}: {e}", self.binary)))?;
        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if status == SSH_FAILURE_STATUS {
            return Err(Self::unreachable(target, last_line(&stderr, "connection failed")));
        }
        Ok(RemoteOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }

    fn interactive(&self, target: &str, command_line: &str) -> Result<i32> {
        let mut command = Command::new(&self.binary);
        command.arg("-t").arg(target).arg(command_line);
        tracing::debug!(ssh_target = target, command = command_line, "Starting interactive session");

        let status = command
            .status()
            .map_err(|e| Self::unreachable(target, format!("cannot run {}: {e}", self.binary)))?;
        let code = status.code().unwrap_or(-1);
        if code == SSH_FAILURE_STATUS {
            return Err(Self::unreachable(
                target,
                "ssh could not connect (see message above)",
            ));
        }
        Ok(code)
    }
}

/// Runs a listing command and returns its non-empty stdout lines. A non-zero
/// exit is a [`HopError::RemoteExecution`] carrying the remote stderr.
pub fn capture_lines(
    channel: &dyn RemoteChannel,
    target: &str,
    command_line: &str,
) -> Result<Vec<String>> {
    let output = channel.capture(target, command_line)?;
    if !output.success() {
        return Err(HopError::RemoteExecution {
            details: format!(
                "{} (exit {})",
                last_line(&output.stderr, "remote command failed"),
                output.status
            ),
        });
    }
    Ok(output
        .stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn last_line(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Canned(RemoteOutput);

    impl RemoteChannel for Canned {
        fn probe(&self, _target: &str) -> Result<()> {
            Ok(())
        }

        fn capture(&self, _target: &str, _command: &str) -> Result<RemoteOutput> {
            Ok(self.0.clone())
        }

        fn interactive(&self, _target: &str, _command: &str) -> Result<i32> {
            Ok(0)
        }
    }

    #[test]
    fn capture_lines_skips_blank_lines() {
        let channel = Canned(RemoteOutput {
            status: 0,
            stdout: "alpha\n\nbeta  \n".to_string(),
            stderr: String::new(),
        });
        assert_eq!(
            capture_lines(&channel, "home", "ls").unwrap(),
            vec!["alpha", "beta"]
        );
    }

    #[test]
    fn capture_lines_surfaces_remote_stderr() {
        let channel = Canned(RemoteOutput {
            status: 2,
            stdout: String::new(),
            stderr: "warning\nerror: projects root /x does not exist\n".to_string(),
        });
        let err = capture_lines(&channel, "home", "ls").unwrap_err();
        assert!(matches!(err, HopError::RemoteExecution { .. }));
        assert!(err.to_string().contains("projects root /x does not exist"));
        assert!(err.to_string().contains("exit 2"));
    }

    #[test]
    fn missing_ssh_binary_is_unreachable() {
        let channel = SshChannel::new("/nonexistent/devhop-ssh", 1);
        assert!(matches!(
            channel.probe("home"),
            Err(HopError::RemoteUnreachable { .. })
        ));
        assert!(matches!(
            channel.capture("home", "true"),
            Err(HopError::RemoteUnreachable { .. })
        ));
    }

    /// A stand-in ssh that records its argv, prints canned output and exits
    /// with `code`.
    fn fake_ssh(dir: &Path, stdout: &str, stderr: &str, code: i32) -> (SshChannel, PathBuf) {
        let argv = dir.join("argv");
        let script = dir.join("ssh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\nprintf '{stdout}'\nprintf '%s' '{stderr}' >&2\nexit {code}\n",
                argv.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (SshChannel::new(script.to_string_lossy(), 3), argv)
    }

    fn recorded(argv: &Path) -> Vec<String> {
        fs::read_to_string(argv)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn capture_runs_in_batch_mode() {
        let temp = TempDir::new().unwrap();
        let (channel, argv) = fake_ssh(temp.path(), "alpha\\nbeta\\n", "", 0);

        let lines = capture_lines(&channel, "me@work", "sh -lc 'devhop-host --list-projects'")
            .unwrap();
        assert_eq!(lines, ["alpha", "beta"]);
        assert_eq!(
            recorded(&argv),
            [
                "-o",
                "BatchMode=yes",
                "me@work",
                "sh -lc 'devhop-host --list-projects'",
            ]
        );
    }

    #[test]
    fn probe_uses_connect_timeout() {
        let temp = TempDir::new().unwrap();
        let (channel, argv) = fake_ssh(temp.path(), "", "", 0);

        channel.probe("home").unwrap();
        assert_eq!(
            recorded(&argv),
            ["-o", "BatchMode=yes", "-o", "ConnectTimeout=3", "home", "true"]
        );
    }

    #[test]
    fn ssh_failure_status_is_unreachable() {
        let temp = TempDir::new().unwrap();
        let (channel, _) = fake_ssh(
            temp.path(),
            "",
            "ssh: connect to host home port 22: Connection refused",
            255,
        );

        match channel.capture("home", "true") {
            Err(HopError::RemoteUnreachable { target, details }) => {
                assert_eq!(target, "home");
                assert!(details.contains("Connection refused"));
            }
            other => panic!("expected RemoteUnreachable, got {other:?}"),
        }
        assert!(matches!(
            channel.probe("home"),
            Err(HopError::RemoteUnreachable { .. })
        ));
        assert!(matches!(
            channel.interactive("home", "true"),
            Err(HopError::RemoteUnreachable { .. })
        ));
    }

    #[test]
    fn remote_failure_is_remote_execution() {
        let temp = TempDir::new().unwrap();
        let (channel, argv) = fake_ssh(
            temp.path(),
            "",
            "error: projects root /srv/none does not exist",
            2,
        );

        let output = channel.capture("home", "ls").unwrap();
        assert_eq!(output.status, 2);
        assert!(!output.success());

        let err = capture_lines(&channel, "home", "ls").unwrap_err();
        assert!(matches!(err, HopError::RemoteExecution { .. }));
        assert!(err.to_string().contains("/srv/none does not exist"));

        assert_eq!(channel.interactive("home", "attach").unwrap(), 2);
        assert_eq!(recorded(&argv), ["-t", "home", "attach"]);
    }
}
