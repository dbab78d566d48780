use clap::{Parser, Subcommand};
use tollgate_runtime::RuntimeConfig;
use tollgate_runtime::config::{
    API_URL_ENV, APPROVAL_RESULT_GRACE_ENV, FAILURE_CLOSE_DELAY_ENV, RECOVERY_DIALOG_DELAY_ENV,
    RESPONSE_TIMEOUT_ENV, RESULT_DISPLAY_ENV, WS_URL_ENV,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod terminal;
mod util;

use commands::recover::RecoverArgs;
use commands::respond::RespondArgs;

#[derive(Parser)]
#[command(
    name = "tollgate",
    version,
    about = "Answer human-in-the-loop workflow interactions from the terminal"
)]
struct Cli {
    /// Workflow engine base URL
    #[arg(long, env = "TOLLGATE_API_URL", global = true)]
    api_url: Option<String>,

    /// Duplex endpoint base URL (defaults to the API URL with a ws:// scheme)
    #[arg(long, env = "TOLLGATE_WS_URL", global = true)]
    ws_url: Option<String>,

    /// Bound on the HTTP fallback delivery, in milliseconds
    #[arg(long, env = "TOLLGATE_RESPONSE_TIMEOUT_MS", global = true)]
    response_timeout_ms: Option<u64>,

    /// How long an approved command waits for its execution result, in milliseconds
    #[arg(long, env = "TOLLGATE_APPROVAL_RESULT_GRACE_MS", global = true)]
    approval_result_grace_ms: Option<u64>,

    /// How long a command result stays on screen, in milliseconds
    #[arg(long, env = "TOLLGATE_RESULT_DISPLAY_MS", global = true)]
    result_display_ms: Option<u64>,

    /// How long a delivery failure stays on screen, in milliseconds
    #[arg(long, env = "TOLLGATE_FAILURE_CLOSE_DELAY_MS", global = true)]
    failure_close_delay_ms: Option<u64>,

    /// Pause before the reload/continue prompt after a failed recovery, in milliseconds
    #[arg(long, env = "TOLLGATE_RECOVERY_DIALOG_DELAY_MS", global = true)]
    recovery_dialog_delay_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a workflow and answer its interactions interactively
    Watch {
        /// Workflow whose duplex channel to connect to
        #[arg(long)]
        workflow_id: String,
        /// Session the client currently considers active
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Deliver a single response over HTTP and print the outcome
    Respond(RespondArgs),
    /// Ask the engine to reconcile a session and print its answer
    Recover(RecoverArgs),
}

impl Cli {
    /// Flag values (already merged with their env vars by clap) run through the
    /// runtime's bounded parsing.
    fn runtime_config(&self) -> RuntimeConfig {
        let millis = |value: Option<u64>| value.map(|v| v.to_string());
        let overrides = [
            (API_URL_ENV, self.api_url.clone()),
            (WS_URL_ENV, self.ws_url.clone()),
            (RESPONSE_TIMEOUT_ENV, millis(self.response_timeout_ms)),
            (APPROVAL_RESULT_GRACE_ENV, millis(self.approval_result_grace_ms)),
            (RESULT_DISPLAY_ENV, millis(self.result_display_ms)),
            (FAILURE_CLOSE_DELAY_ENV, millis(self.failure_close_delay_ms)),
            (RECOVERY_DIALOG_DELAY_ENV, millis(self.recovery_dialog_delay_ms)),
        ];
        RuntimeConfig::from_lookup(|key| {
            overrides
                .iter()
                .find(|(name, _)| *name == key)
                .and_then(|(_, value)| value.clone())
        })
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tollgate=info"));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let config = cli.runtime_config();

    let code = match cli.command {
        Commands::Watch {
            workflow_id,
            session_id,
        } => commands::watch::run(config, workflow_id, session_id).await,
        Commands::Respond(args) => commands::respond::run(&config, args).await,
        Commands::Recover(args) => commands::recover::run(&config, args).await,
    };
    std::process::exit(code);
}
