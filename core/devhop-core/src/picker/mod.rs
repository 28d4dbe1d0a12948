//! Capability picker.
//!
//! `pick_one` / `pick_many` walk an ordered list of backends and use the first
//! one that probes as available and actually runs:
//!
//! 1. `gum choose` (full-screen styled chooser)
//! 2. `fzf` (fuzzy filter)
//! 3. `termux-dialog` (touch dialog, Termux only)
//! 4. numbered menu on stdin/stderr (always available)
//!
//! Probing happens on every call. Prompts and menus only ever go to stderr or
//! the tty; stdout is reserved for whatever the caller prints as the result.

mod external;
mod menu;

pub use external::{find_in_path, Fzf, Gum, TermuxDialog};
pub use menu::NumberedMenu;

use crate::error::{HopError, Result};

/// Result of running one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Selected(Vec<String>),
    /// The user backed out (Esc, Ctrl-C, EOF).
    Cancelled,
    /// The backend could not run; try the next one.
    Unavailable,
}

pub trait PickerBackend {
    fn name(&self) -> &'static str;

    fn probe(&self) -> bool;

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Outcome;
}

pub struct Picker {
    backends: Vec<Box<dyn PickerBackend>>,
}

impl Picker {
    pub fn new(backends: Vec<Box<dyn PickerBackend>>) -> Self {
        Self { backends }
    }

    /// The production chain, in fixed order.
    pub fn system() -> Self {
        Self::new(vec![
            Box::new(Gum),
            Box::new(Fzf),
            Box::new(TermuxDialog),
            Box::new(NumberedMenu::stdio()),
        ])
    }

    /// Picks exactly one item. A single candidate is returned without
    /// prompting; an empty list is [`HopError::NoItems`].
    pub fn pick_one(&mut self, prompt: &str, items: &[String]) -> Result<String> {
        match items {
            [] => Err(HopError::NoItems {
                prompt: prompt.to_string(),
            }),
            [only] => Ok(only.clone()),
            _ => match self.run(prompt, items, false) {
                Some(mut picked) if !picked.is_empty() => Ok(picked.swap_remove(0)),
                _ => Err(HopError::SelectionCancelled {
                    prompt: prompt.to_string(),
                }),
            },
        }
    }

    /// Picks any subset, in list order. Cancelling yields the empty set.
    pub fn pick_many(&mut self, prompt: &str, items: &[String]) -> Result<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.run(prompt, items, true).unwrap_or_default())
    }

    fn run(&mut self, prompt: &str, items: &[String], multi: bool) -> Option<Vec<String>> {
        for backend in self.backends.iter_mut() {
            if !backend.probe() {
                continue;
            }
            match backend.run(prompt, items, multi) {
                Outcome::Unavailable => {
                    tracing::debug!(backend = backend.name(), "Picker backend unavailable");
                }
                Outcome::Cancelled => {
                    tracing::debug!(backend = backend.name(), prompt, "Selection cancelled");
                    return None;
                }
                Outcome::Selected(picked) => {
                    let picked = normalize(items, picked, multi);
                    match picked {
                        Some(picked) => {
                            tracing::debug!(backend = backend.name(), ?picked, "Selection made");
                            return Some(picked);
                        }
                        None => {
                            tracing::debug!(
                                backend = backend.name(),
                                "Backend returned an unknown item; falling back"
                            );
                        }
                    }
                }
            }
        }
        tracing::warn!(prompt, "No picker backend could run");
        None
    }
}

/// Maps a backend's answer back onto `items`: list order, no duplicates.
/// Returns `None` if the answer names something that was not offered.
fn normalize(items: &[String], picked: Vec<String>, multi: bool) -> Option<Vec<String>> {
    if picked.iter().any(|p| !items.contains(p)) {
        return None;
    }
    if !multi && picked.len() != 1 {
        return None;
    }
    Some(
        items
            .iter()
            .filter(|item| picked.contains(item))
            .cloned()
            .collect(),
    )
}
