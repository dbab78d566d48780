use clap::{Args, ValueEnum};
use serde_json::json;
use tollgate_core::RecoveryReason;
use tollgate_runtime::{HttpRecoveryEndpoint, RecoveryEndpoint, RuntimeConfig};

use crate::util::{EXIT_NOT_DELIVERED, EXIT_OK, print_json, report_error};

#[derive(Clone, Copy, ValueEnum)]
pub enum ReasonArg {
    /// A human-in-the-loop interaction just completed
    HieCompletion,
    /// The workflow itself finished
    PostWorkflowCompletion,
}

impl From<ReasonArg> for RecoveryReason {
    fn from(reason: ReasonArg) -> Self {
        match reason {
            ReasonArg::HieCompletion => RecoveryReason::HieCompletion,
            ReasonArg::PostWorkflowCompletion => RecoveryReason::PostWorkflowCompletion,
        }
    }
}

#[derive(Args)]
pub struct RecoverArgs {
    /// Session to reconcile
    #[arg(long)]
    session_id: String,
    /// Why recovery is being requested
    #[arg(long, value_enum, default_value = "hie-completion")]
    reason: ReasonArg,
}

pub async fn run(config: &RuntimeConfig, args: RecoverArgs) -> i32 {
    let endpoint = HttpRecoveryEndpoint::new(config);
    match endpoint.recover(&args.session_id, args.reason.into()).await {
        Ok(resp) => {
            print_json(&json!({
                "success": resp.success,
                "session_id": resp.session_id,
                "message": resp.message,
            }));
            if resp.success { EXIT_OK } else { EXIT_NOT_DELIVERED }
        }
        Err(e) => report_error(&e, Some("Is the workflow engine running? Check TOLLGATE_API_URL.")),
    }
}
