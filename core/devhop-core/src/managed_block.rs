//! Managed-block merging for user-owned text files.
//!
//! devhop never owns `~/.ssh/config`, `~/.bashrc` or `~/.tmux.conf`; it only
//! owns one labeled region inside them:
//!
//! ```text
//! # BEGIN devhop-managed-hosts
//! ...content...
//! # END devhop-managed-hosts
//! ```
//!
//! Every write strips all lines belonging to that exact marker pair, keeps the
//! rest verbatim, and re-appends the block at the end of the file. Removal is
//! the same pass without the re-append. Files are replaced atomically
//! (temp file in the same directory + rename).
//!
//! An unterminated begin marker swallows everything up to EOF. That is the
//! line-scanning contract, not a bug.

use crate::error::{HopError, Result};
use fs_err as fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;

const DEFAULT_FILE_MODE: u32 = 0o644;
const PRIVATE_FILE_MODE: u32 = 0o600;

/// Identifies one block: `<namespace>-managed[-<suffix>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedBlock {
    namespace: String,
    suffix: Option<String>,
}

impl ManagedBlock {
    pub fn new(namespace: impl Into<String>, suffix: Option<&str>) -> Self {
        Self {
            namespace: namespace.into(),
            suffix: suffix.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    fn label(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}-managed-{}", self.namespace, suffix),
            None => format!("{}-managed", self.namespace),
        }
    }

    pub fn begin_marker(&self) -> String {
        format!("# BEGIN {}", self.label())
    }

    pub fn end_marker(&self) -> String {
        format!("# END {}", self.label())
    }
}

/// Permission policy for the rewritten file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Keep the existing file's mode (0644 for new files).
    Preserve,
    /// Owner read/write only. For SSH config and similar credential files.
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
    Unchanged,
    Removed,
    /// Nothing to remove (file or block absent).
    Absent,
}

/// Strips every line of `block` from `existing`, then appends the block with
/// `content` when given. Pure; the file-level functions wrap it.
///
/// Works on raw bytes: user files need not be UTF-8 and every byte outside
/// the block is carried over untouched.
pub fn merge(existing: &[u8], block: &ManagedBlock, content: Option<&str>) -> Vec<u8> {
    let begin = block.begin_marker();
    let end = block.end_marker();

    let mut out = Vec::with_capacity(existing.len() + content.map_or(0, str::len) + 64);
    let mut in_block = false;
    for line in existing.split_inclusive(|b| *b == b'\n') {
        let bare = line.strip_suffix(b"\n").unwrap_or(line);
        if bare == begin.as_bytes() {
            in_block = true;
            continue;
        }
        if bare == end.as_bytes() {
            in_block = false;
            continue;
        }
        if !in_block {
            out.extend_from_slice(line);
        }
    }

    let Some(content) = content else {
        return out;
    };

    if out.last().is_some_and(|b| *b != b'\n') {
        out.push(b'\n');
    }
    out.extend_from_slice(begin.as_bytes());
    out.push(b'\n');
    if !content.is_empty() {
        out.extend_from_slice(content.as_bytes());
        if !content.ends_with('\n') {
            out.push(b'\n');
        }
    }
    out.extend_from_slice(end.as_bytes());
    out.push(b'\n');
    out
}

/// Returns true if `text` contains the begin marker of `block`.
pub fn contains_block(text: &[u8], block: &ManagedBlock) -> bool {
    let begin = block.begin_marker();
    text.split(|b| *b == b'\n')
        .any(|line| line == begin.as_bytes())
}

/// Inserts or replaces `block` in the file at `path`.
///
/// With [`FileMode::Private`] the file ends up 0600 even when its content
/// was already current.
pub fn write_block(
    path: &Path,
    block: &ManagedBlock,
    content: &str,
    mode: FileMode,
) -> Result<MergeOutcome> {
    let existing = read_existing(path)?;
    let merged = merge(existing.as_deref().unwrap_or_default(), block, Some(content));

    let outcome = match &existing {
        None => MergeOutcome::Created,
        Some(bytes) if *bytes == merged => MergeOutcome::Unchanged,
        Some(_) => MergeOutcome::Updated,
    };
    match outcome {
        MergeOutcome::Unchanged if mode == FileMode::Private => restrict(path)?,
        MergeOutcome::Unchanged => {}
        _ => persist(path, &merged, mode)?,
    }
    tracing::debug!(path = %path.display(), block = %block.label(), ?outcome, "Wrote managed block");
    Ok(outcome)
}

/// Removes every trace of `block` from the file at `path`.
pub fn remove_block(path: &Path, block: &ManagedBlock, mode: FileMode) -> Result<MergeOutcome> {
    let Some(existing) = read_existing(path)? else {
        return Ok(MergeOutcome::Absent);
    };
    let stripped = merge(&existing, block, None);
    if stripped == existing {
        return Ok(MergeOutcome::Absent);
    }
    persist(path, &stripped, mode)?;
    tracing::debug!(path = %path.display(), block = %block.label(), "Removed managed block");
    Ok(MergeOutcome::Removed)
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(merge_io(path, source)),
    }
}

fn restrict(path: &Path) -> Result<()> {
    fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_FILE_MODE))
        .map_err(|e| merge_io(path, e))
}

fn persist(path: &Path, contents: &[u8], mode: FileMode) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| merge_io(path, e))?;

    let permissions = match mode {
        FileMode::Private => PRIVATE_FILE_MODE,
        FileMode::Preserve => fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o7777)
            .unwrap_or(DEFAULT_FILE_MODE),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| merge_io(path, e))?;
    temp.write_all(contents).map_err(|e| merge_io(path, e))?;
    temp.flush().map_err(|e| merge_io(path, e))?;
    temp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(permissions))
        .map_err(|e| merge_io(path, e))?;
    temp.persist(path).map_err(|e| merge_io(path, e.error))?;
    Ok(())
}

fn merge_io(path: &Path, source: std::io::Error) -> HopError {
    HopError::MergeIo {
        path: path.to_path_buf(),
        source,
    }
}
