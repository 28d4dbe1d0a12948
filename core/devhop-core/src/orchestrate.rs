//! Host-side session orchestration.
//!
//! Receives a [`DispatchRequest`], settles on a session name, and performs
//! "attach if it exists, else create then attach" against the multiplexer.
//! A missing project directory fails before the multiplexer is touched.

use crate::error::{HopError, Result};
use crate::multiplexer::Multiplexer;
use crate::paths::Paths;
use crate::session::{canonical_name, sessions_for_pair, SessionName};
use chrono::{DateTime, Utc};
use devhop_protocol::DispatchRequest;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// The session already existed; the tool was not relaunched.
    Resumed,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub session: SessionName,
    pub project_dir: PathBuf,
    pub attachment: Attachment,
}

pub struct Orchestrator<'a> {
    paths: &'a Paths,
    mux: &'a dyn Multiplexer,
}

impl<'a> Orchestrator<'a> {
    pub fn new(paths: &'a Paths, mux: &'a dyn Multiplexer) -> Self {
        Self { paths, mux }
    }

    /// Ensures the addressed session exists, without attaching.
    pub fn prepare(&self, request: &DispatchRequest, now: DateTime<Utc>) -> Result<Prepared> {
        validate_project_name(&request.project)?;
        let root = projects_root(self.paths, request.projects_root.as_deref());
        let project_dir = root.join(&request.project);
        if !project_dir.is_dir() {
            return Err(HopError::RemoteExecution {
                details: format!("project directory {} does not exist", project_dir.display()),
            });
        }

        let session = match request.session.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                validate_session_name(name)?;
                SessionName::named(name)
            }
            _ => canonical_name(&request.tool, &request.project, request.mode, || now),
        };

        let attachment = if self.mux.session_exists(&session)? {
            tracing::info!(session = %session, "Resuming existing session");
            Attachment::Resumed
        } else {
            self.mux
                .create_session(&session, &project_dir, &request.command)?;
            Attachment::Created
        };

        Ok(Prepared {
            session,
            project_dir,
            attachment,
        })
    }

    /// Prepares the session and hands the terminal over to it.
    pub fn open(&self, request: &DispatchRequest, now: DateTime<Utc>) -> Result<Prepared> {
        let prepared = self.prepare(request, now)?;
        self.mux.attach(&prepared.session)?;
        Ok(prepared)
    }

    /// Session names for one (tool, project) pair, resume name first.
    pub fn list_sessions(&self, prefix: &str) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .mux
            .list_sessions()?
            .into_iter()
            .map(SessionName::into_string)
            .collect();
        if prefix.is_empty() {
            return Ok(names);
        }
        Ok(sessions_for_pair(&names, prefix)
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

pub fn projects_root(paths: &Paths, root: Option<&str>) -> PathBuf {
    let root = root
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(crate::config::DEFAULT_PROJECTS_ROOT);
    paths.expand_home(root.trim())
}

/// Lists project directories directly under `root`: no hidden entries,
/// sorted by name. Symlinked directories count.
pub fn list_projects(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(HopError::RemoteExecution {
            details: format!("projects root {} does not exist", root.display()),
        });
    }

    let mut projects = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        projects.push(name);
    }
    Ok(projects)
}

fn validate_project_name(project: &str) -> Result<()> {
    if project.is_empty() || project == "." || project == ".." || project.contains('/') {
        return Err(HopError::RemoteExecution {
            details: format!("invalid project name '{project}'"),
        });
    }
    Ok(())
}

fn validate_session_name(name: &str) -> Result<()> {
    if name.contains('/') {
        return Err(HopError::RemoteExecution {
            details: format!("session name '{name}' must not contain '/'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use tempfile::TempDir;

    #[test]
    fn lists_visible_directories_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for dir in ["zeta", "alpha", ".hidden", "mid"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("README.md"), "x").unwrap();

        assert_eq!(list_projects(root).unwrap(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn missing_root_is_remote_failure() {
        let temp = TempDir::new().unwrap();
        let err = list_projects(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, HopError::RemoteExecution { .. }));
    }

    #[test]
    fn root_defaults_to_projects_under_home() {
        let paths = Paths::with_home(PathBuf::from("/home/op"));
        assert_eq!(
            projects_root(&paths, None),
            PathBuf::from("/home/op/projects")
        );
        assert_eq!(
            projects_root(&paths, Some("~/src")),
            PathBuf::from("/home/op/src")
        );
    }

    #[test]
    fn project_names_cannot_escape_the_root() {
        for bad in ["", ".", "..", "a/b", "../etc"] {
            assert!(validate_project_name(bad).is_err(), "{bad} accepted");
        }
        assert!(validate_project_name("my.app").is_ok());
    }
}
