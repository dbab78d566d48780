use clap::{ArgAction, Args, Subcommand};
use tollgate_core::{HitlResponse, InteractionKind, ResponseFields};
use tollgate_runtime::{ResponseDispatcher, RuntimeConfig};

use crate::util::{outcome_exit_code, print_json};

#[derive(Args)]
pub struct RespondArgs {
    /// Session the response is routed to
    #[arg(long)]
    session_id: Option<String>,
    /// Workflow the interaction belongs to
    #[arg(long)]
    workflow_id: Option<String>,
    #[command(subcommand)]
    decision: Decision,
}

#[derive(Subcommand)]
pub enum Decision {
    /// Approve a command for execution
    Approve {
        #[arg(long)]
        command: String,
    },
    /// Reject a command
    Reject {
        #[arg(long)]
        command: String,
    },
    /// Answer a text prompt
    Input {
        #[arg(long)]
        text: String,
    },
    /// Answer a yes/no confirmation
    Confirm {
        #[arg(long, action = ArgAction::Set)]
        confirmed: bool,
    },
    /// Give free-form feedback
    Feedback {
        #[arg(long)]
        text: String,
    },
}

impl Decision {
    fn into_parts(self) -> (InteractionKind, ResponseFields) {
        match self {
            Decision::Approve { command } => (
                InteractionKind::CommandApproval,
                ResponseFields::Command {
                    execute: true,
                    command,
                },
            ),
            Decision::Reject { command } => (
                InteractionKind::CommandApproval,
                ResponseFields::Command {
                    execute: false,
                    command,
                },
            ),
            Decision::Input { text } => (
                InteractionKind::TextInput,
                ResponseFields::Input { input: text },
            ),
            Decision::Confirm { confirmed } => (
                InteractionKind::Confirmation,
                ResponseFields::Confirmation { confirmed },
            ),
            Decision::Feedback { text } => (
                InteractionKind::Feedback,
                ResponseFields::Feedback { feedback: text },
            ),
        }
    }
}

fn build_response(args: RespondArgs) -> HitlResponse {
    let (kind, fields) = args.decision.into_parts();
    HitlResponse {
        event_type: kind.response_event_type().to_string(),
        session_id: args.session_id,
        workflow_id: args.workflow_id,
        fields,
    }
}

pub async fn run(config: &RuntimeConfig, args: RespondArgs) -> i32 {
    let response = build_response(args);
    let outcome = ResponseDispatcher::new(config).send(&response).await;
    let value = outcome.to_value();
    let code = outcome_exit_code(&outcome);
    if outcome.is_delivered() {
        print_json(&value);
    } else {
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        );
    }
    code
}
