//! Canonical session addressing.
//!
//! - resume: `<tool>:<project>`
//! - new:    `<tool>:<project>:<epoch seconds>`
//!
//! Two `new` dispatches for the same pair within one second produce the same
//! name; the second one attaches to the first. That race is accepted.

use chrono::{DateTime, Utc};
use devhop_protocol::SessionMode;
use std::fmt;

/// How the user asked to address the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChoice {
    Resume,
    New,
    /// Explicit name, attached if present and created otherwise.
    Named(String),
}

impl SessionChoice {
    /// Parses the `--session` flag value: `new`, `resume`, or a name.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "resume" => SessionChoice::Resume,
            "new" => SessionChoice::New,
            name => SessionChoice::Named(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionName(String);

impl SessionName {
    pub fn resume(tool: &str, project: &str) -> Self {
        Self(format!("{tool}:{project}"))
    }

    pub fn new_at(tool: &str, project: &str, at: DateTime<Utc>) -> Self {
        Self(format!("{tool}:{project}:{}", at.timestamp()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the canonical name. The clock is only read in `new` mode.
pub fn canonical_name(
    tool: &str,
    project: &str,
    mode: SessionMode,
    now: impl FnOnce() -> DateTime<Utc>,
) -> SessionName {
    match mode {
        SessionMode::Resume => SessionName::resume(tool, project),
        SessionMode::New => SessionName::new_at(tool, project, now()),
    }
}

/// Prefix shared by every session of a (tool, project) pair.
pub fn pair_prefix(tool: &str, project: &str) -> String {
    format!("{tool}:{project}")
}

/// Keeps the sessions that belong to `prefix`: the resume name itself and any
/// `<prefix>:<digits>` name.
pub fn sessions_for_pair<'a>(names: &'a [String], prefix: &str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| {
            *name == prefix
                || name
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .is_some_and(|stamp| {
                        !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit())
                    })
        })
        .collect()
}
