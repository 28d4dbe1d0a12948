//! `devhop --settings`: integrations and the config file.

use devhop_core::config::{self, CONFIG_TEMPLATE};
use devhop_core::integrations::{self, Integration};
use devhop_core::{HopError, Paths, Picker, Result};
use fs_err as fs;
use std::env;
use std::process::Command;

const INSTALL: &str = "Install integrations";
const REMOVE: &str = "Remove integrations";
const EDIT: &str = "Edit config";
const SHOW: &str = "Show config path";

const DEFAULT_EDITOR: &str = "vi";

pub fn run(paths: &Paths, picker: &mut Picker) -> Result<()> {
    let actions: Vec<String> = [INSTALL, REMOVE, EDIT, SHOW]
        .into_iter()
        .map(str::to_string)
        .collect();

    match picker.pick_one("Settings", &actions)?.as_str() {
        INSTALL => install(paths, picker),
        REMOVE => remove(paths, picker),
        EDIT => {
            let editor = env::var("EDITOR")
                .ok()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
            edit_config(paths, &editor)
        }
        SHOW => {
            println!("{}", paths.config_file().display());
            Ok(())
        }
        other => Err(HopError::Usage(format!("unknown settings action '{other}'"))),
    }
}

fn choose(picker: &mut Picker, prompt: &str, offered: &[Integration]) -> Result<Vec<Integration>> {
    let labels: Vec<String> = offered.iter().map(|i| i.label().to_string()).collect();
    let picked = picker.pick_many(prompt, &labels)?;
    Ok(picked
        .iter()
        .filter_map(|label| Integration::from_label(label))
        .collect())
}

fn install(paths: &Paths, picker: &mut Picker) -> Result<()> {
    let chosen = choose(picker, "Install which integrations?", &Integration::ALL)?;
    if chosen.is_empty() {
        eprintln!("Nothing selected.");
        return Ok(());
    }

    let config = if chosen.contains(&Integration::SshConfig) {
        Some(config::load(paths.config_file())?)
    } else {
        None
    };
    for integration in chosen {
        for report in integrations::install(integration, paths, config.as_ref())? {
            eprintln!("{report}");
        }
    }
    Ok(())
}

fn remove(paths: &Paths, picker: &mut Picker) -> Result<()> {
    let installed: Vec<Integration> = Integration::ALL
        .into_iter()
        .filter(|integration| integrations::is_installed(*integration, paths))
        .collect();
    if installed.is_empty() {
        eprintln!("No integrations are installed.");
        return Ok(());
    }

    let chosen = choose(picker, "Remove which integrations?", &installed)?;
    if chosen.is_empty() {
        eprintln!("Nothing selected.");
        return Ok(());
    }
    for integration in chosen {
        let reports = integrations::uninstall(integration, paths)?;
        if reports.is_empty() {
            eprintln!("{integration}: not installed");
        }
        for report in reports {
            eprintln!("{report}");
        }
    }
    Ok(())
}

/// Seeds the config from the template when missing, opens it in `editor`,
/// then re-validates it.
fn edit_config(paths: &Paths, editor: &str) -> Result<()> {
    let path = paths.config_file();
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| HopError::Io {
                context: "creating config directory".to_string(),
                source: e,
            })?;
        }
        fs::write(path, CONFIG_TEMPLATE).map_err(|e| HopError::Io {
            context: "writing config template".to_string(),
            source: e,
        })?;
        eprintln!("Wrote a starter config to {}", path.display());
    }

    // $EDITOR may carry arguments, e.g. "code --wait".
    let words = shell_words::split(editor)
        .map_err(|e| HopError::Usage(format!("cannot parse editor '{editor}': {e}")))?;
    let (program, args) = match words.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => (DEFAULT_EDITOR, &[][..]),
    };
    let status = Command::new(program)
        .args(args)
        .arg(path)
        .status()
        .map_err(|e| HopError::Io {
            context: format!("launching editor '{program}'"),
            source: e,
        })?;
    if !status.success() {
        return Err(HopError::Usage(format!("editor '{editor}' exited with {status}")));
    }

    let config = config::load(path)?;
    eprintln!(
        "Config OK: {} host(s), {} tool(s) in {}",
        config.hosts().len(),
        config.tools().len(),
        config.source().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn edit_seeds_template_and_validates() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_home(temp.path().to_path_buf());

        edit_config(&paths, "true").unwrap();

        let written = fs::read_to_string(paths.config_file()).unwrap();
        assert_eq!(written, CONFIG_TEMPLATE);
    }

    #[test]
    fn edit_keeps_existing_config() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_home(temp.path().to_path_buf());
        fs::create_dir_all(paths.config_file().parent().unwrap()).unwrap();
        fs::write(paths.config_file(), "HOSTS=(box)\nHOST_box_SSH=box\n").unwrap();

        edit_config(&paths, "true").unwrap();
        assert!(fs::read_to_string(paths.config_file())
            .unwrap()
            .starts_with("HOSTS=(box)"));
    }

    #[test]
    fn editor_path_with_spaces_is_honored() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let paths = Paths::with_home(temp.path().to_path_buf());
        let script_dir = temp.path().join("my editor");
        fs::create_dir_all(&script_dir).unwrap();
        let script = script_dir.join("ed");
        let seen = temp.path().join("seen-args");
        fs::write(
            &script,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", seen.display()),
        )
        .unwrap();
        fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let editor = format!("{} --wait", shell_words::quote(&script.to_string_lossy()));
        edit_config(&paths, &editor).unwrap();

        let args = fs::read_to_string(&seen).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            ["--wait", paths.config_file().to_str().unwrap()]
        );
    }

    #[test]
    fn unbalanced_editor_quotes_are_a_usage_error() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_home(temp.path().to_path_buf());
        assert!(matches!(
            edit_config(&paths, "'vi --wait"),
            Err(HopError::Usage(_))
        ));
    }

    #[test]
    fn failing_editor_is_reported() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_home(temp.path().to_path_buf());
        assert!(matches!(
            edit_config(&paths, "false"),
            Err(HopError::Usage(_))
        ));
    }
}
