//! Interactive line editor over an [`EditorSession`].
//!
//! Reads commands from any `BufRead` and writes to any `Write`, so the
//! same loop serves the terminal and tests.

use std::io::{BufRead, Write};

use tracing::{debug, instrument};

use crate::application::services::{EditorSession, MutationOutcome, SyncFailure};
use crate::application::ApplicationError;
use crate::cli::error::{CliError, CliResult};
use crate::cli::render::{render_forest, report_lines};
use crate::domain::{NodeForm, NodeId};

const PROMPT: &str = "orgtree> ";

const HELP: &str = "\
commands:
  ls                 show the tree
  toggle ID          expand or collapse a node
  expand-all         expand every node
  collapse-all       collapse every node
  add [PARENT]       add a node (below PARENT, or a new root)
  edit ID            change a node
  rm ID              delete a node (children become orphans)
  check              report orphans, cycles and duplicates
  sync               wait for pending remote writes
  help               this text
  quit               sync and leave";

enum Flow {
    Continue,
    Quit,
}

/// Run the shell until `quit` or end of input; pending writes are flushed on exit.
#[instrument(level = "debug", skip_all)]
pub fn run<R: BufRead, W: Write>(
    session: &mut EditorSession,
    input: &mut R,
    out: &mut W,
) -> CliResult<()> {
    writeln!(out, "type 'help' for commands")?;
    loop {
        session.service_mut().reconcile();
        print_failures(session.service_mut().take_failures(), out)?;

        write!(out, "{PROMPT}")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            writeln!(out)?;
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        debug!("shell: {} {:?}", command, args);

        match execute(session, command, &args, input, out) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(CliError::Io(e)) => return Err(CliError::Io(e)),
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }

    let applied = session.service_mut().flush();
    debug!("shell: {} outcomes applied on exit", applied);
    print_failures(session.service_mut().take_failures(), out)?;
    Ok(())
}

fn execute<R: BufRead, W: Write>(
    session: &mut EditorSession,
    command: &str,
    args: &[&str],
    input: &mut R,
    out: &mut W,
) -> CliResult<Flow> {
    match command {
        "quit" | "exit" | "q" => return Ok(Flow::Quit),
        "help" | "?" => writeln!(out, "{HELP}")?,
        "ls" => write!(
            out,
            "{}",
            render_forest(&session.hierarchy(), session.expansion())
        )?,
        "toggle" => {
            let id = required_id(args)?;
            if session.service().get(id).is_none() {
                return Err(ApplicationError::NodeNotFound(id).into());
            }
            let expanded = session.on_toggle_expand(id);
            writeln!(out, "#{id} {}", if expanded { "expanded" } else { "collapsed" })?;
        }
        "expand-all" => session.service_mut().expand_all(),
        "collapse-all" => session.service_mut().collapse_all(),
        "add" => {
            let parent = optional_id(args)?;
            let form = session.on_add(parent)?;
            let Some(form) = fill_form(form, input, out)? else {
                session.cancel();
                return Ok(Flow::Continue);
            };
            submit(session, &form, out, "added")?;
        }
        "edit" => {
            let id = required_id(args)?;
            let form = session
                .on_edit(id)
                .ok_or(ApplicationError::NodeNotFound(id))?;
            let Some(form) = fill_form(form, input, out)? else {
                session.cancel();
                return Ok(Flow::Continue);
            };
            submit(session, &form, out, "updated")?;
        }
        "rm" | "delete" => {
            let id = required_id(args)?;
            match session.on_delete(id)? {
                MutationOutcome::Applied => writeln!(out, "deleted #{id}")?,
                MutationOutcome::NoOp => writeln!(out, "no node #{id}")?,
            }
        }
        "check" => {
            let lines = report_lines(&session.service().report());
            if lines.is_empty() {
                writeln!(out, "tree is consistent")?;
            }
            for line in lines {
                writeln!(out, "{line}")?;
            }
        }
        "sync" => {
            let applied = session.service_mut().flush();
            writeln!(out, "{applied} remote write(s) settled")?;
        }
        other => {
            return Err(CliError::Usage(format!(
                "unknown command '{other}', try 'help'"
            )))
        }
    }
    Ok(Flow::Continue)
}

/// Submit the open form; a rejected form is closed so the next command starts clean.
fn submit<W: Write>(
    session: &mut EditorSession,
    form: &NodeForm,
    out: &mut W,
    verb: &str,
) -> CliResult<()> {
    match session.submit(form) {
        Ok(MutationOutcome::Applied) => {
            // Adds append, so the new node is the last one
            match session.service().nodes().last() {
                Some(node) if verb == "added" => writeln!(out, "{verb} {node}")?,
                _ => writeln!(out, "{verb}")?,
            }
            Ok(())
        }
        Ok(MutationOutcome::NoOp) => {
            writeln!(out, "nothing changed")?;
            Ok(())
        }
        Err(e) => {
            session.cancel();
            Err(e.into())
        }
    }
}

/// Prompt for each field; empty input keeps the shown value.
fn fill_form<R: BufRead, W: Write>(
    mut form: NodeForm,
    input: &mut R,
    out: &mut W,
) -> CliResult<Option<NodeForm>> {
    for (label, value) in [
        ("name", &mut form.name),
        ("description", &mut form.description),
        ("type", &mut form.node_type),
    ] {
        write!(out, "  {label} [{value}]: ")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        let line = line.trim();
        if !line.is_empty() {
            *value = line.to_string();
        }
    }
    Ok(Some(form))
}

fn read_line<R: BufRead>(input: &mut R) -> CliResult<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn parse_id(raw: &str) -> CliResult<NodeId> {
    raw.trim_start_matches('#')
        .parse::<NodeId>()
        .map_err(|_| CliError::InvalidArgs(format!("not a node id: '{raw}'")))
}

fn required_id(args: &[&str]) -> CliResult<NodeId> {
    match args.first() {
        Some(raw) => parse_id(raw),
        None => Err(CliError::Usage("missing node id".into())),
    }
}

fn optional_id(args: &[&str]) -> CliResult<Option<NodeId>> {
    args.first().map(|raw| parse_id(raw)).transpose()
}

pub fn print_failures<W: Write>(failures: Vec<SyncFailure>, out: &mut W) -> CliResult<()> {
    for f in failures {
        writeln!(
            out,
            "! {} #{} failed{}: {}",
            f.kind,
            f.id,
            if f.rolled_back { " (rolled back)" } else { "" },
            f.error
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_hash_prefix_when_parsing_id_then_accepted() {
        assert_eq!(parse_id("#42").unwrap(), 42);
        assert!(matches!(parse_id("x"), Err(CliError::InvalidArgs(_))));
    }

    #[test]
    fn given_no_args_when_requiring_id_then_usage_error() {
        assert!(matches!(required_id(&[]), Err(CliError::Usage(_))));
    }
}
