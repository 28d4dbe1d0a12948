//! Client-side session dispatch.
//!
//! One invocation walks `Selecting → Resolved → Dispatched → Attached`:
//!
//! - **Selecting**: host, project, tool and session mode, each from a flag or
//!   the picker. Projects are listed live on the host every time.
//! - **Resolved**: the canonical session name is minted here, so the host
//!   never has to consult its own clock.
//! - **Dispatched**: the rendered `devhop-host` command runs over `ssh -t`.
//! - **Attached**: the remote side returned, i.e. the user detached or the
//!   session ended.

use crate::config::{HopConfig, Host, Tool};
use crate::error::{HopError, Result};
use crate::picker::Picker;
use crate::remote::{capture_lines, RemoteChannel};
use crate::session::{canonical_name, pair_prefix, SessionChoice, SessionName};
use chrono::{DateTime, Utc};
use devhop_protocol::{
    list_projects_args, list_sessions_args, render_remote_command, DispatchRequest, SessionMode,
};
use serde::Serialize;
use std::fmt;

const RESUME_ITEM: &str = "resume";
const NEW_ITEM: &str = "new";

/// Flag overrides. `None` fields are picked interactively.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub host: Option<String>,
    pub project: Option<String>,
    pub tool: Option<String>,
    pub session: Option<SessionChoice>,
    /// Skip the reachability preflight.
    pub fast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Selecting,
    Resolved,
    Dispatched,
    Attached,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchState::Selecting => "selecting",
            DispatchState::Resolved => "resolved",
            DispatchState::Dispatched => "dispatched",
            DispatchState::Attached => "attached",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub host: Host,
    pub project: String,
    pub tool: Tool,
    pub choice: SessionChoice,
}

/// Everything needed to reach the session, printed as-is by `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    pub host: String,
    pub ssh_target: String,
    pub session: String,
    pub remote_command: String,
    pub request: DispatchRequest,
}

pub struct Dispatcher<'a> {
    config: &'a HopConfig,
    channel: &'a dyn RemoteChannel,
    picker: &'a mut Picker,
    state: DispatchState,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a HopConfig, channel: &'a dyn RemoteChannel, picker: &'a mut Picker) -> Self {
        Self {
            config,
            channel,
            picker,
            state: DispatchState::Selecting,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    fn advance(&mut self, next: DispatchState) {
        tracing::debug!(from = %self.state, state = %next, "Dispatch state change");
        self.state = next;
    }

    pub fn select(&mut self, options: &DispatchOptions) -> Result<Selection> {
        let host = match options.host.as_deref() {
            Some(key) => self
                .config
                .host(key)
                .ok_or_else(|| unknown_key("host", key, &self.config.host_keys()))?,
            None => {
                let key = self.picker.pick_one("Host", &self.config.host_keys())?;
                self.config
                    .host(&key)
                    .ok_or_else(|| unknown_key("host", &key, &self.config.host_keys()))?
            }
        }
        .clone();
        tracing::debug!(host = %host.key, ssh_target = %host.ssh_target, "Host selected");

        if options.fast {
            tracing::debug!(host = %host.key, "Skipping reachability preflight");
        } else {
            self.channel.probe(&host.ssh_target)?;
        }

        let project = match options.project.as_deref() {
            Some(project) => {
                check_project_name(project)?;
                project.to_string()
            }
            None => {
                let projects = self.list_projects(&host)?;
                self.picker.pick_one("Project", &projects)?
            }
        };

        let tool = match options.tool.as_deref() {
            Some(key) => self
                .config
                .tool(key)
                .ok_or_else(|| unknown_key("tool", key, &self.config.tool_keys()))?,
            None => {
                let key = self.picker.pick_one("Tool", &self.config.tool_keys())?;
                self.config
                    .tool(&key)
                    .ok_or_else(|| unknown_key("tool", &key, &self.config.tool_keys()))?
            }
        }
        .clone();

        let choice = match &options.session {
            Some(choice) => choice.clone(),
            None => self.pick_session(&host, &tool, &project)?,
        };

        Ok(Selection {
            host,
            project,
            tool,
            choice,
        })
    }

    /// Mints the session name and renders the remote command line.
    pub fn resolve(&mut self, selection: &Selection, now: DateTime<Utc>) -> Result<DispatchPlan> {
        let Selection {
            host,
            project,
            tool,
            choice,
        } = selection;

        let (mode, session) = match choice {
            SessionChoice::Resume => (
                SessionMode::Resume,
                canonical_name(&tool.key, project, SessionMode::Resume, || now),
            ),
            SessionChoice::New => (
                SessionMode::New,
                canonical_name(&tool.key, project, SessionMode::New, || now),
            ),
            SessionChoice::Named(name) => {
                if name.contains('/') {
                    return Err(HopError::Usage(format!(
                        "session name '{name}' must not contain '/'"
                    )));
                }
                (SessionMode::Resume, SessionName::named(name.as_str()))
            }
        };

        let request = DispatchRequest {
            project: project.clone(),
            tool: tool.key.clone(),
            command: tool.command.clone(),
            session: Some(session.to_string()),
            mode,
            projects_root: Some(host.projects_root.clone()),
        };
        let remote_command = render_remote_command(&host.shell_prefix, &request.to_args());

        self.advance(DispatchState::Resolved);
        Ok(DispatchPlan {
            host: host.key.clone(),
            ssh_target: host.ssh_target.clone(),
            session: session.into_string(),
            remote_command,
            request,
        })
    }

    /// Hands the terminal to the remote session. Returns once the user
    /// detaches or the session ends.
    pub fn dispatch(&mut self, plan: &DispatchPlan) -> Result<()> {
        self.advance(DispatchState::Dispatched);
        tracing::info!(host = %plan.host, session = %plan.session, "Dispatching");

        let status = self
            .channel
            .interactive(&plan.ssh_target, &plan.remote_command)?;
        if status != 0 {
            return Err(HopError::RemoteExecution {
                details: format!(
                    "devhop-host on {} exited with status {status}",
                    plan.host
                ),
            });
        }

        self.advance(DispatchState::Attached);
        Ok(())
    }

    /// Runs all three stages with the current wall-clock time.
    pub fn run(&mut self, options: &DispatchOptions) -> Result<DispatchPlan> {
        let selection = self.select(options)?;
        let plan = self.resolve(&selection, Utc::now())?;
        self.dispatch(&plan)?;
        Ok(plan)
    }

    /// Project directories on `host`, fetched fresh.
    pub fn list_projects(&self, host: &Host) -> Result<Vec<String>> {
        let command =
            render_remote_command(&host.shell_prefix, &list_projects_args(Some(&host.projects_root)));
        capture_lines(self.channel, &host.ssh_target, &command)
    }

    pub fn list_sessions(&self, host: &Host, prefix: &str) -> Result<Vec<String>> {
        let command = render_remote_command(&host.shell_prefix, &list_sessions_args(prefix));
        capture_lines(self.channel, &host.ssh_target, &command)
    }

    fn pick_session(&mut self, host: &Host, tool: &Tool, project: &str) -> Result<SessionChoice> {
        let prefix = pair_prefix(&tool.key, project);
        let existing = match self.list_sessions(host, &prefix) {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(error = %err, "Could not list existing sessions");
                Vec::new()
            }
        };

        let mut items = vec![RESUME_ITEM.to_string(), NEW_ITEM.to_string()];
        items.extend(existing.into_iter().filter(|name| *name != prefix));
        let picked = self.picker.pick_one("Session", &items)?;
        Ok(SessionChoice::parse(&picked))
    }
}

fn unknown_key(kind: &str, key: &str, known: &[String]) -> HopError {
    HopError::Usage(format!(
        "unknown {kind} '{key}' (configured: {})",
        if known.is_empty() {
            "none".to_string()
        } else {
            known.join(", ")
        }
    ))
}

fn check_project_name(project: &str) -> Result<()> {
    if project.is_empty() || project == "." || project == ".." || project.contains('/') {
        return Err(HopError::Usage(format!(
            "invalid project name '{project}' (expected a directory name)"
        )));
    }
    Ok(())
}
