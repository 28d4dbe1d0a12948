//! devhop: pick a host, project and tool, then land in a persistent tmux
//! session on that host.
//!
//! Any of `--host`, `--project`, `--tool` and `--session` can be given up
//! front; whatever is omitted is picked interactively. Menus go to stderr,
//! so `--dry-run` output on stdout stays machine-readable.

mod settings;

use chrono::Utc;
use clap::Parser;
use devhop_core::error::EXIT_USAGE;
use devhop_core::{
    config, logging, DispatchOptions, Dispatcher, HopError, Paths, Picker, Result,
    SessionChoice, SshChannel,
};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "devhop")]
#[command(about = "Hop into a persistent tmux session on a remote dev host")]
#[command(version)]
struct Cli {
    /// Host key from the config (skips the host picker)
    #[arg(long, value_name = "KEY")]
    host: Option<String>,

    /// Project directory name on the host (skips the project picker)
    #[arg(long, value_name = "NAME", allow_hyphen_values = true)]
    project: Option<String>,

    /// `new` for a fresh session, `resume` (default), or an explicit name
    #[arg(long, value_name = "NAME|new")]
    session: Option<String>,

    /// Tool key from the config (skips the tool picker)
    #[arg(long, value_name = "KEY")]
    tool: Option<String>,

    /// Manage integrations and the config file
    #[arg(long, conflicts_with_all = ["host", "project", "session", "tool", "dry_run"])]
    settings: bool,

    /// Skip the reachability preflight
    #[arg(long)]
    fast: bool,

    /// Print the dispatch plan as JSON instead of connecting
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            host: self.host.clone(),
            project: self.project.clone(),
            tool: self.tool.clone(),
            session: self.session.as_deref().map(SessionChoice::parse),
            fast: self.fast,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too.
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let _logging_guard = logging::init("devhop");

    if let Err(err) = run(&cli) {
        tracing::debug!(error = ?err, "devhop failed");
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn run(cli: &Cli) -> Result<()> {
    let paths = Paths::from_env()?;
    let mut picker = Picker::system();

    if cli.settings {
        return settings::run(&paths, &mut picker);
    }

    let config = config::load(paths.config_file())?;
    let channel = SshChannel::default();
    let options = cli.dispatch_options();
    let mut dispatcher = Dispatcher::new(&config, &channel, &mut picker);

    if cli.dry_run {
        let selection = dispatcher.select(&options)?;
        let plan = dispatcher.resolve(&selection, Utc::now())?;
        let json = serde_json::to_string_pretty(&plan).map_err(|e| HopError::Io {
            context: "rendering dispatch plan".to_string(),
            source: e.into(),
        })?;
        println!("{json}");
        return Ok(());
    }

    dispatcher.run(&options)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_dispatch_options() {
        let cli = Cli::try_parse_from([
            "devhop", "--host", "home", "--project", "demo", "--tool", "shell", "--session",
            "new", "--fast",
        ])
        .unwrap();
        let options = cli.dispatch_options();
        assert_eq!(options.host.as_deref(), Some("home"));
        assert_eq!(options.session, Some(SessionChoice::New));
        assert!(options.fast);
    }

    #[test]
    fn omitted_flags_stay_open_for_picking() {
        let options = Cli::try_parse_from(["devhop"]).unwrap().dispatch_options();
        assert!(options.host.is_none() && options.project.is_none());
        assert!(options.session.is_none());
    }

    #[test]
    fn settings_conflicts_with_selection_flags() {
        assert!(Cli::try_parse_from(["devhop", "--settings", "--host", "home"]).is_err());
    }

    #[test]
    fn help_is_not_a_usage_error() {
        let err = Cli::try_parse_from(["devhop", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
        let err = Cli::try_parse_from(["devhop", "--bogus"]).unwrap_err();
        assert!(err.use_stderr());
    }
}
