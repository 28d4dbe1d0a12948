//! Backends that shell out to an installed chooser.
//!
//! Each one draws on the tty or stderr and writes the answer to its stdout,
//! which we capture. Failure to spawn means [`Outcome::Unavailable`]; a
//! non-zero exit after a successful spawn means the user backed out.

use super::{Outcome, PickerBackend};
use serde::Deserialize;
use std::env;
use std::io::{IsTerminal, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Looks `binary` up on `$PATH`, returning the first executable match.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| {
            candidate
                .metadata()
                .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
}

fn interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Spawns `command` with stdout captured and, optionally, newline-separated
/// items fed on stdin. `None` when the process cannot be started.
fn run_captured(mut command: Command, stdin_items: Option<&[String]>) -> Option<Output> {
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .stdin(if stdin_items.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!(error = %err, ?command, "Failed to spawn picker");
            return None;
        }
    };

    if let (Some(items), Some(mut stdin)) = (stdin_items, child.stdin.take()) {
        let payload = items.join("\n") + "\n";
        if let Err(err) = stdin.write_all(payload.as_bytes()) {
            tracing::debug!(error = %err, "Failed to feed picker items");
        }
    }

    child.wait_with_output().ok()
}

fn selected_lines(output: &Output) -> Outcome {
    if !output.status.success() {
        return Outcome::Cancelled;
    }
    let picked: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    Outcome::Selected(picked)
}

/// `gum choose`: styled full-screen list.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gum;

impl PickerBackend for Gum {
    fn name(&self) -> &'static str {
        "gum"
    }

    fn probe(&self) -> bool {
        interactive_terminal() && find_in_path("gum").is_some()
    }

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Outcome {
        let mut command = Command::new("gum");
        command.arg("choose").arg("--header").arg(prompt);
        if multi {
            command.arg("--no-limit");
        }
        command.arg("--").args(items);
        match run_captured(command, None) {
            Some(output) => selected_lines(&output),
            None => Outcome::Unavailable,
        }
    }
}

/// `fzf`: fuzzy filter, items on stdin, UI on /dev/tty.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fzf;

impl PickerBackend for Fzf {
    fn name(&self) -> &'static str {
        "fzf"
    }

    fn probe(&self) -> bool {
        interactive_terminal() && find_in_path("fzf").is_some()
    }

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Outcome {
        let mut command = Command::new("fzf");
        command
            .arg("--prompt")
            .arg(format!("{prompt}> "))
            .arg("--height")
            .arg("40%")
            .arg("--reverse");
        if multi {
            command.arg("--multi");
        }
        match run_captured(command, Some(items)) {
            Some(output) => selected_lines(&output),
            None => Outcome::Unavailable,
        }
    }
}

/// `termux-dialog`: Android touch dialog over a text-only terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermuxDialog;

#[derive(Debug, Deserialize)]
struct DialogResult {
    code: i32,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    values: Option<Vec<DialogValue>>,
}

#[derive(Debug, Deserialize)]
struct DialogValue {
    text: String,
}

/// Android's RESULT_OK.
const DIALOG_OK: i32 = -1;

fn on_termux() -> bool {
    env::var_os("TERMUX_VERSION").is_some()
        || env::var("PREFIX")
            .map(|prefix| prefix.contains("com.termux"))
            .unwrap_or(false)
}

impl PickerBackend for TermuxDialog {
    fn name(&self) -> &'static str {
        "termux-dialog"
    }

    fn probe(&self) -> bool {
        on_termux() && find_in_path("termux-dialog").is_some()
    }

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Outcome {
        // Items travel comma-joined; a comma inside an item cannot be expressed.
        if items.iter().any(|item| item.contains(',')) {
            return Outcome::Unavailable;
        }
        let mut command = Command::new("termux-dialog");
        command
            .arg(if multi { "checkbox" } else { "radio" })
            .arg("-t")
            .arg(prompt)
            .arg("-v")
            .arg(items.join(","));
        let Some(output) = run_captured(command, None) else {
            return Outcome::Unavailable;
        };
        if !output.status.success() {
            return Outcome::Unavailable;
        }
        parse_dialog(&output.stdout, multi)
    }
}

fn parse_dialog(stdout: &[u8], multi: bool) -> Outcome {
    let result: DialogResult = match serde_json::from_slice(stdout) {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!(error = %err, "Unreadable termux-dialog output");
            return Outcome::Unavailable;
        }
    };
    if result.code != DIALOG_OK {
        return Outcome::Cancelled;
    }
    if multi {
        let picked = result
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.text)
            .collect();
        return Outcome::Selected(picked);
    }
    match result.text.filter(|t| !t.is_empty()) {
        Some(text) => Outcome::Selected(vec![text]),
        None => Outcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_radio_answer() {
        let out = br#"{"code":-1,"text":"work","index":1}"#;
        assert_eq!(
            parse_dialog(out, false),
            Outcome::Selected(vec!["work".to_string()])
        );
    }

    #[test]
    fn dialog_checkbox_answer() {
        let out = br#"{"code":-1,"text":"[home, lab]","values":[{"index":0,"text":"home"},{"index":2,"text":"lab"}]}"#;
        assert_eq!(
            parse_dialog(out, true),
            Outcome::Selected(vec!["home".to_string(), "lab".to_string()])
        );
    }

    #[test]
    fn dialog_cancel_and_garbage() {
        assert_eq!(parse_dialog(br#"{"code":-2}"#, false), Outcome::Cancelled);
        assert_eq!(parse_dialog(b"not json", false), Outcome::Unavailable);
    }

    #[test]
    fn comma_items_skip_termux() {
        let mut dialog = TermuxDialog;
        let items = vec!["a,b".to_string(), "c".to_string()];
        assert_eq!(dialog.run("Pick", &items, false), Outcome::Unavailable);
    }

    #[test]
    fn find_in_path_rejects_missing_binaries() {
        assert!(find_in_path("definitely-not-a-real-binary-devhop").is_none());
    }
}
