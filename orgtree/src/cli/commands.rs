//! Command dispatch

use std::io;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument, warn};

use crate::application::services::{EditorSession, MutationOutcome, TreeService};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::cli::render::{render_forest, report_lines};
use crate::cli::shell;
use crate::config::{global_config_path, Settings};
use crate::domain::{NodeId, NodeType};
use crate::infrastructure::di::ServiceContainer;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, try 'orgtree --help'".into(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(cli, command),
        Commands::Tree { all, expand } => {
            let container = build_container(cli)?;
            cmd_tree(container.tree_service(), *all, expand)
        }
        Commands::Add {
            parent,
            name,
            description,
            node_type,
        } => {
            let container = build_container(cli)?;
            cmd_add(
                container.editor_session(),
                *parent,
                name,
                description,
                *node_type,
            )
        }
        Commands::Edit {
            id,
            name,
            description,
            node_type,
        } => {
            let container = build_container(cli)?;
            cmd_edit(
                container.editor_session(),
                *id,
                name.as_deref(),
                description.as_deref(),
                *node_type,
            )
        }
        Commands::Delete { id } => {
            let container = build_container(cli)?;
            cmd_delete(container.tree_service(), *id)
        }
        Commands::Check => {
            let container = build_container(cli)?;
            cmd_check(container.tree_service())
        }
        Commands::Shell => {
            let container = build_container(cli)?;
            cmd_shell(container.editor_session())
        }
    }
}

/// Settings from every layer, command line flags last.
pub fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_overrides(cli.url.as_deref(), cli.policy);
    settings.validate()?;
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn build_container(cli: &Cli) -> CliResult<ServiceContainer> {
    Ok(ServiceContainer::new(load_settings(cli)?)?)
}

/// Wait for background writes and turn failures into an error.
fn finish(service: &mut TreeService) -> CliResult<()> {
    service.flush();
    let failures = service.take_failures();
    if failures.is_empty() {
        return Ok(());
    }
    for f in &failures {
        output::failure(&format!(
            "{} #{}: {}{}",
            f.kind,
            f.id,
            f.error,
            if f.rolled_back { " (rolled back)" } else { "" }
        ));
    }
    Err(CliError::SyncFailed {
        count: failures.len(),
    })
}

#[instrument(level = "debug", skip(service))]
fn cmd_tree(mut service: TreeService, all: bool, expand: &[NodeId]) -> CliResult<()> {
    service.load()?;
    if all {
        service.expand_all();
    }
    for &id in expand {
        if !service.is_expanded(id) {
            service.toggle_expand(id);
        }
    }

    print!("{}", render_forest(&service.hierarchy(), service.expansion()));

    let report = service.report();
    if !report.is_consistent() {
        output::warning(&format!(
            "{} node(s) not shown, run 'orgtree check'",
            report.hidden().len() + report.duplicates.len()
        ));
    }
    Ok(())
}

#[instrument(level = "debug", skip(session, description))]
fn cmd_add(
    mut session: EditorSession,
    parent: Option<NodeId>,
    name: &str,
    description: &str,
    node_type: Option<NodeType>,
) -> CliResult<()> {
    session.service_mut().load()?;

    let mut form = session.on_add(parent)?;
    form.name = name.to_string();
    form.description = description.to_string();
    if let Some(node_type) = node_type {
        form.node_type = node_type.to_string();
    }
    session.submit(&form)?;

    let mut service = session.into_service();
    if let Some(node) = service.nodes().last() {
        output::success(&format!("added {node}"));
    }
    finish(&mut service)
}

#[instrument(level = "debug", skip(session, description))]
fn cmd_edit(
    mut session: EditorSession,
    id: NodeId,
    name: Option<&str>,
    description: Option<&str>,
    node_type: Option<NodeType>,
) -> CliResult<()> {
    if name.is_none() && description.is_none() && node_type.is_none() {
        return Err(CliError::InvalidArgs(
            "nothing to change, give --name, --description or --type".into(),
        ));
    }
    session.service_mut().load()?;

    let mut form = session
        .on_edit(id)
        .ok_or(crate::application::ApplicationError::NodeNotFound(id))?;
    if let Some(name) = name {
        form.name = name.to_string();
    }
    if let Some(description) = description {
        form.description = description.to_string();
    }
    if let Some(node_type) = node_type {
        form.node_type = node_type.to_string();
    }
    session.submit(&form)?;

    let mut service = session.into_service();
    if let Some(node) = service.get(id) {
        output::success(&format!("updated {node}"));
    }
    finish(&mut service)
}

#[instrument(level = "debug", skip(service))]
fn cmd_delete(mut service: TreeService, id: NodeId) -> CliResult<()> {
    service.load()?;
    let orphans = service.store().children_of(id).count();

    match service.delete(id)? {
        MutationOutcome::Applied => {
            output::success(&format!("deleted #{id}"));
            if orphans > 0 {
                output::warning(&format!("{orphans} child node(s) of #{id} are now orphans"));
            }
        }
        MutationOutcome::NoOp => output::warning(&format!("no node #{id}, nothing deleted")),
    }
    finish(&mut service)
}

#[instrument(level = "debug", skip(service))]
fn cmd_check(mut service: TreeService) -> CliResult<()> {
    service.load()?;
    let report = service.report();

    output::info(&format!(
        "{} node(s), {} root(s), {} shown",
        service.nodes().len(),
        report.roots.len(),
        report.visible
    ));
    let lines = report_lines(&report);
    if lines.is_empty() {
        output::success("tree is consistent");
        return Ok(());
    }
    for line in &lines {
        output::failure(line);
    }
    Err(CliError::Inconsistent(format!(
        "{} problem(s) found",
        lines.len()
    )))
}

fn cmd_shell(mut session: EditorSession) -> CliResult<()> {
    if let Err(e) = session.service_mut().load() {
        warn!("starting with an empty tree: {}", e);
        output::warning(&format!("could not load tree: {e}"));
    }
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    shell::run(&mut session, &mut input, &mut out)
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            print!("{}", settings.to_toml()?);
        }
        ConfigCommands::Template => print!("{}", Settings::template()),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => {
                    let state = if path.exists() { "" } else { " (not found)" };
                    output::info(&format!("global: {}{}", path.display(), state));
                }
                None => output::info("global: (no config directory on this system)"),
            }
            if let Some(path) = &cli.config {
                output::info(&format!("explicit: {}", path.display()));
            }
        }
    }
    Ok(())
}
