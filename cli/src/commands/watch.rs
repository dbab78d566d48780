use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tollgate_core::{HitlError, IngressMessage, InteractionId};
use tollgate_runtime::{EventIngress, HitlController, RuntimeConfig, SessionTracker, WsChannel};
use tracing::{info, warn};

use crate::terminal::{LineRouter, TerminalReload, collaborators};
use crate::util::{EXIT_OK, report_error};

const HELP: &str = "\
commands:
  list                      show pending interactions
  approve <id>              run the proposed command
  reject <id>               refuse the proposed command
  modify <id>               edit the command before running it
  edit <id> <command>       submit the edited command
  cancel <id>               leave the editor without submitting
  input <id> <text>         answer a text prompt (empty keeps the default)
  confirm <id> yes|no       answer a confirmation
  feedback <id> <text>      send feedback
  dismiss <id>              close without answering
  quit";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Approve(InteractionId),
    Reject(InteractionId),
    Modify(InteractionId),
    Edit(InteractionId, String),
    Cancel(InteractionId),
    Input(InteractionId, String),
    Confirm(InteractionId, bool),
    Feedback(InteractionId, String),
    Dismiss(InteractionId),
    List,
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    let (target, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let text = text.trim().to_string();
    let id = || {
        if target.is_empty() {
            Err(format!("usage: {verb} <id>"))
        } else {
            Ok(InteractionId::from(target))
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls" => ReplCommand::List,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        "approve" => ReplCommand::Approve(id()?),
        "reject" => ReplCommand::Reject(id()?),
        "modify" => ReplCommand::Modify(id()?),
        "cancel" => ReplCommand::Cancel(id()?),
        "dismiss" => ReplCommand::Dismiss(id()?),
        "input" => ReplCommand::Input(id()?, text),
        "edit" if text.is_empty() => return Err("usage: edit <id> <command>".to_string()),
        "edit" => ReplCommand::Edit(id()?, text),
        "feedback" if text.is_empty() => return Err("usage: feedback <id> <text>".to_string()),
        "feedback" => ReplCommand::Feedback(id()?, text),
        "confirm" => {
            let confirmed = match text.to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" => true,
                "n" | "no" | "false" => false,
                _ => return Err("usage: confirm <id> yes|no".to_string()),
            };
            ReplCommand::Confirm(id()?, confirmed)
        }
        other => return Err(format!("unknown command '{other}', type `help`")),
    };
    Ok(Some(command))
}

struct Session {
    controller: HitlController,
    ingress: EventIngress,
    channel: Arc<WsChannel>,
    messages: mpsc::UnboundedReceiver<IngressMessage>,
}

async fn connect(
    config: &RuntimeConfig,
    workflow_id: &str,
    tracker: SessionTracker,
    lines: &LineRouter,
    reload: &TerminalReload,
) -> Result<Session, HitlError> {
    let (channel, messages) = WsChannel::connect(&config.ws_base_url(), workflow_id).await?;
    let channel = Arc::new(channel);
    let controller =
        HitlController::builder(config.clone(), collaborators(lines.clone(), reload.clone()))
            .channel(channel.clone())
            .session_tracker(tracker)
            .build();
    Ok(Session {
        ingress: EventIngress::new(controller.clone()),
        controller,
        channel,
        messages,
    })
}

enum Exit {
    Quit,
    Reload,
}

pub async fn run(config: RuntimeConfig, workflow_id: String, session_id: Option<String>) -> i32 {
    let lines = LineRouter::default();
    let reload = TerminalReload::default();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut active_session = session_id;

    loop {
        // Everything client-side is rebuilt on reload; only the server-confirmed
        // active session carries over.
        let tracker = SessionTracker::new(active_session.clone());
        let mut active = tracker.subscribe();
        let mut session =
            match connect(&config, &workflow_id, tracker.clone(), &lines, &reload).await {
                Ok(session) => session,
                Err(e) => {
                    return report_error(
                        &e,
                        Some("Is the workflow engine running? Check TOLLGATE_WS_URL."),
                    );
                }
            };
        println!("watching workflow {workflow_id}; type `help` for commands");

        let mut ingress_open = true;
        let exit = loop {
            tokio::select! {
                line = stdin.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(line) = lines.offer(line) {
                            if handle_line(&session.controller, &line) {
                                break Exit::Quit;
                            }
                        }
                    }
                    Ok(None) | Err(_) => {
                        lines.hang_up();
                        break Exit::Quit;
                    }
                },
                message = session.messages.recv(), if ingress_open => match message {
                    Some(message) => {
                        session.ingress.on_message(&message);
                    }
                    None => {
                        ingress_open = false;
                        warn!(workflow_id = %workflow_id, "duplex channel closed");
                        eprintln!(
                            "[warning] duplex channel closed; responses will be sent over HTTP"
                        );
                    }
                },
                Ok(()) = active.changed() => {
                    if let Some(session_id) = active.borrow_and_update().clone() {
                        info!(session_id = %session_id, "active session changed");
                    }
                }
                _ = reload.requested() => break Exit::Reload,
                _ = tokio::signal::ctrl_c() => break Exit::Quit,
            }
        };

        session.channel.close();
        match exit {
            Exit::Quit => return EXIT_OK,
            Exit::Reload => {
                active_session = tracker.active();
                info!(workflow_id = %workflow_id, "reloading client state");
                println!("reloading...");
            }
        }
    }
}

/// Returns true when the user asked to quit.
fn handle_line(controller: &HitlController, line: &str) -> bool {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(message) => {
            eprintln!("{message}");
            return false;
        }
    };
    match command {
        ReplCommand::Quit => return true,
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::List => list(controller),
        ReplCommand::Modify(id) => {
            if let Err(e) = controller.begin_modify(&id) {
                eprintln!("error: {e}");
            }
        }
        ReplCommand::Cancel(id) => {
            if let Err(e) = controller.cancel_modify(&id) {
                eprintln!("error: {e}");
            }
        }
        ReplCommand::Dismiss(id) => {
            if !controller.dismiss(&id) {
                eprintln!("error: no pending interaction {id}");
            }
        }
        action => spawn_action(controller.clone(), action),
    }
    false
}

/// Deliveries run in the background so stdin stays responsive (the recovery
/// prompt reads from it).
fn spawn_action(controller: HitlController, command: ReplCommand) {
    tokio::spawn(async move {
        let result = match command {
            ReplCommand::Approve(id) => controller.approve(&id).await,
            ReplCommand::Reject(id) => controller.reject(&id).await,
            ReplCommand::Edit(id, command) => controller.submit_modified(&id, command).await,
            ReplCommand::Input(id, text) => controller.submit_text(&id, text).await,
            ReplCommand::Confirm(id, confirmed) => controller.confirm(&id, confirmed).await,
            ReplCommand::Feedback(id, text) => controller.submit_feedback(&id, text).await,
            _ => return,
        };
        if let Err(e) = result {
            eprintln!("error: {e}");
        }
    });
}

fn list(controller: &HitlController) {
    let pending = controller.pending();
    if pending.is_empty() {
        println!("no pending interactions");
        return;
    }
    for interaction in pending {
        println!(
            "{}  {}  {}  session={}  {}",
            interaction.id,
            interaction.kind().as_str(),
            interaction.stage,
            interaction.session_id,
            interaction.payload.headline()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> ReplCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn parses_actions_with_ids_and_text() {
        assert_eq!(
            parsed("approve cmd-1"),
            ReplCommand::Approve(InteractionId::from("cmd-1"))
        );
        assert_eq!(
            parsed("  edit cmd-1   ls -la /tmp "),
            ReplCommand::Edit(InteractionId::from("cmd-1"), "ls -la /tmp".to_string())
        );
        assert_eq!(
            parsed("input input-2"),
            ReplCommand::Input(InteractionId::from("input-2"), String::new())
        );
        assert_eq!(
            parsed("confirm confirm-3 NO"),
            ReplCommand::Confirm(InteractionId::from("confirm-3"), false)
        );
        assert_eq!(parsed("ls"), ReplCommand::List);
    }

    #[test]
    fn rejects_incomplete_or_unknown_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("approve").is_err());
        assert!(parse_command("edit cmd-1").is_err());
        assert!(parse_command("confirm confirm-3 perhaps").is_err());
        assert!(parse_command("feedback feedback-1").is_err());
        assert!(parse_command("deploy now").is_err());
    }
}
