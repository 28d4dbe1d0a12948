//! devhop-host: the host side of a devhop dispatch.
//!
//! Invoked over ssh by the `devhop` client, never by hand in normal use.
//!
//! ## Modes
//!
//! - default: attach to the named session, creating it in the project
//!   directory first if it does not exist
//! - `--list-projects`: print project directory names, one per line
//! - `--list-sessions --prefix <tool>:<project>`: print live session names
//! - `--install` / `--uninstall`: manage the host-side dotfile integrations

use chrono::Utc;
use clap::Parser;
use devhop_core::config::{self, DEFAULT_TOOL};
use devhop_core::error::EXIT_USAGE;
use devhop_core::integrations::{self, Integration};
use devhop_core::{logging, orchestrate, HopError, Orchestrator, Paths, Result, TmuxMultiplexer};
use devhop_protocol::{DispatchRequest, SessionMode};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "devhop-host")]
#[command(about = "Attach to or create a devhop tmux session on this host")]
#[command(version)]
struct Cli {
    /// Project directory name under the projects root
    #[arg(
        long,
        value_name = "NAME",
        allow_hyphen_values = true,
        required_unless_present_any = ["list_projects", "list_sessions", "install", "uninstall"]
    )]
    project: Option<String>,

    /// Tool key, used to name the session
    #[arg(long, value_name = "KEY", default_value = DEFAULT_TOOL)]
    tool: String,

    /// Initial command for a new session (empty for a login shell)
    #[arg(long, value_name = "COMMAND", default_value = "", allow_hyphen_values = true)]
    command: String,

    /// Exact session name; computed from tool, project and mode when absent
    #[arg(long, value_name = "NAME", allow_hyphen_values = true)]
    session: Option<String>,

    /// `resume` or `new`
    #[arg(long, value_name = "MODE", default_value = "resume")]
    mode: SessionMode,

    /// Projects root (default ~/projects)
    #[arg(long, value_name = "DIR")]
    root: Option<String>,

    /// List project directories and exit
    #[arg(long, conflicts_with_all = ["list_sessions", "install", "uninstall"])]
    list_projects: bool,

    /// List live sessions and exit
    #[arg(long, conflicts_with_all = ["install", "uninstall"])]
    list_sessions: bool,

    /// Only list sessions of this `<tool>:<project>` pair
    #[arg(long, value_name = "PREFIX", default_value = "", allow_hyphen_values = true)]
    prefix: String,

    /// Install integrations (shell-rc, tmux-conf, ssh-config)
    #[arg(long, value_name = "INTEGRATION", num_args = 1..)]
    install: Vec<String>,

    /// Remove integrations
    #[arg(long, value_name = "INTEGRATION", num_args = 1..)]
    uninstall: Vec<String>,
}

impl Cli {
    fn request(&self) -> Result<DispatchRequest> {
        let project = self
            .project
            .clone()
            .ok_or_else(|| HopError::Usage("--project is required".to_string()))?;
        Ok(DispatchRequest {
            project,
            tool: self.tool.clone(),
            command: self.command.clone(),
            session: self.session.clone().filter(|s| !s.trim().is_empty()),
            mode: self.mode,
            projects_root: self.root.clone(),
        })
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let _logging_guard = logging::init("devhop-host");

    if let Err(err) = run(&cli) {
        tracing::debug!(error = ?err, "devhop-host failed");
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn run(cli: &Cli) -> Result<()> {
    let paths = Paths::from_env()?;

    if !cli.install.is_empty() || !cli.uninstall.is_empty() {
        return manage_integrations(&paths, &cli.install, &cli.uninstall);
    }

    if cli.list_projects {
        let root = orchestrate::projects_root(&paths, cli.root.as_deref());
        for project in orchestrate::list_projects(&root)? {
            println!("{project}");
        }
        return Ok(());
    }

    let tmux = TmuxMultiplexer::default();
    let orchestrator = Orchestrator::new(&paths, &tmux);

    if cli.list_sessions {
        for name in orchestrator.list_sessions(&cli.prefix)? {
            println!("{name}");
        }
        return Ok(());
    }

    let request = cli.request()?;
    tmux.ensure_available()?;
    let prepared = orchestrator.open(&request, Utc::now())?;
    tracing::debug!(session = %prepared.session, attachment = ?prepared.attachment, "Session closed or detached");
    Ok(())
}

fn manage_integrations(paths: &Paths, install: &[String], uninstall: &[String]) -> Result<()> {
    let to_install = integrations::parse_keys(install)?;
    let to_remove = integrations::parse_keys(uninstall)?;

    let config = if to_install.contains(&Integration::SshConfig) {
        Some(config::load(paths.config_file())?)
    } else {
        None
    };

    for integration in to_install {
        for report in integrations::install(integration, paths, config.as_ref())? {
            println!("{report}");
        }
    }
    for integration in to_remove {
        for report in integrations::uninstall(integration, paths)? {
            println!("{report}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use devhop_protocol::{list_projects_args, list_sessions_args, HOST_BINARY};

    fn parse(args: Vec<String>) -> Cli {
        Cli::try_parse_from(std::iter::once(HOST_BINARY.to_string()).chain(args)).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn accepts_what_the_client_renders() {
        let sent = DispatchRequest {
            project: "my app".to_string(),
            tool: "claude".to_string(),
            command: "claude --continue".to_string(),
            session: Some("claude:my app:1700000000".to_string()),
            mode: SessionMode::New,
            projects_root: Some("~/src".to_string()),
        };
        assert_eq!(parse(sent.to_args()).request().unwrap(), sent);

        let dashed = DispatchRequest {
            project: "-scratch".to_string(),
            session: Some("claude:-scratch".to_string()),
            mode: SessionMode::Resume,
            projects_root: None,
            ..sent
        };
        assert_eq!(parse(dashed.to_args()).request().unwrap(), dashed);
    }

    #[test]
    fn empty_command_survives_the_round_trip() {
        let sent = DispatchRequest {
            project: "demo".to_string(),
            tool: "shell".to_string(),
            command: String::new(),
            session: Some("shell:demo".to_string()),
            mode: SessionMode::Resume,
            projects_root: None,
        };
        assert_eq!(parse(sent.to_args()).request().unwrap(), sent);
    }

    #[test]
    fn listing_flags_parse() {
        assert!(parse(list_projects_args(Some("~/projects"))).list_projects);
        let cli = parse(list_sessions_args("shell:demo"));
        assert!(cli.list_sessions);
        assert_eq!(cli.prefix, "shell:demo");

        let cli = parse(list_sessions_args("shell:-scratch"));
        assert_eq!(cli.prefix, "shell:-scratch");
    }

    #[test]
    fn project_required_for_dispatch() {
        assert!(Cli::try_parse_from([HOST_BINARY]).is_err());
        assert!(Cli::try_parse_from([HOST_BINARY, "--mode", "later", "--project", "x"]).is_err());
    }

    #[test]
    fn integrations_take_several_keys() {
        let cli = Cli::try_parse_from([HOST_BINARY, "--install", "shell-rc", "tmux-conf"]).unwrap();
        assert_eq!(cli.install, vec!["shell-rc", "tmux-conf"]);
    }
}
