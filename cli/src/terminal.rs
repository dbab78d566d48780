//! Terminal implementations of the runtime's collaborator traits.

use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, oneshot};
use tollgate_core::{ExecutionResult, InteractionId, InteractionPayload, PendingInteraction};
use tollgate_runtime::{
    Collaborators, Presenter, RecoveryChoice, ReloadHandle, Severity, StatusReporter, Transcript,
    TranscriptEntry,
};

/// Hands the next stdin line to whoever is blocked on a question.
#[derive(Clone, Default)]
pub struct LineRouter {
    waiting: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl LineRouter {
    /// Returns the line back when nobody is waiting for it.
    pub fn offer(&self, line: String) -> Option<String> {
        let waiting = self
            .waiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match waiting {
            Some(tx) => tx.send(line).err(),
            None => Some(line),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Wait for the next line. `None` once stdin is gone.
    pub async fn next_line(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        *self.waiting.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx.await.ok()
    }

    /// Release any waiter; its `next_line` returns `None`.
    pub fn hang_up(&self) {
        self.waiting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

pub fn parse_recovery_choice(line: &str) -> Option<RecoveryChoice> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "reload" => Some(RecoveryChoice::Reload),
        "c" | "continue" => Some(RecoveryChoice::Continue),
        _ => None,
    }
}

pub struct TerminalPresenter {
    lines: LineRouter,
}

impl TerminalPresenter {
    pub fn new(lines: LineRouter) -> Self {
        Self { lines }
    }
}

fn describe(interaction: &PendingInteraction) -> String {
    let id = &interaction.id;
    match &interaction.payload {
        InteractionPayload::CommandApproval {
            command,
            description,
        } => {
            let mut text = format!("[{id}] Command approval requested\n  $ {command}");
            if let Some(description) = description {
                text.push_str(&format!("\n  {description}"));
            }
            text.push_str(&format!(
                "\n  approve {id} | reject {id} | modify {id}"
            ));
            text
        }
        InteractionPayload::TextInput {
            prompt,
            default_value,
        } => {
            let default = default_value
                .as_deref()
                .map(|d| format!(" (default: {d})"))
                .unwrap_or_default();
            format!("[{id}] {prompt}{default}\n  input {id} <text>")
        }
        InteractionPayload::Confirmation { message } => {
            format!("[{id}] {message}\n  confirm {id} yes|no")
        }
        InteractionPayload::Feedback { prompt } => {
            format!("[{id}] {prompt}\n  feedback {id} <text>")
        }
    }
}

#[async_trait::async_trait]
impl Presenter for TerminalPresenter {
    fn present(&self, interaction: &PendingInteraction) {
        println!("\n{}", describe(interaction));
    }

    fn update_progress(&self, id: &InteractionId, text: &str) {
        println!("[{id}] {text}");
    }

    fn show_editor(&self, id: &InteractionId, command: &str) {
        println!("[{id}] Editing: {command}\n  edit {id} <new command> | cancel {id}");
    }

    fn show_result(&self, id: &InteractionId, result: &ExecutionResult) {
        let exit = result
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("[{id}] `{}` exited with {exit}", result.command);
        if let Some(stdout) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
            println!("{}", stdout.trim_end());
        }
        if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
            eprintln!("{}", stderr.trim_end());
        }
    }

    fn show_failure(&self, id: &InteractionId, message: &str) {
        eprintln!("[{id}] {message}");
    }

    fn close(&self, id: &InteractionId) {
        println!("[{id}] closed");
    }

    async fn prompt_recovery(&self, message: &str) -> RecoveryChoice {
        println!("\n{message}");
        loop {
            println!("reload / continue?");
            let Some(line) = self.lines.next_line().await else {
                return RecoveryChoice::Continue;
            };
            if let Some(choice) = parse_recovery_choice(&line) {
                return choice;
            }
        }
    }
}

pub struct TerminalTranscript;

impl Transcript for TerminalTranscript {
    fn append(&self, entry: TranscriptEntry) {
        println!("{} > {}", entry.role.as_str(), entry.content);
    }
}

pub struct TerminalStatus;

impl StatusReporter for TerminalStatus {
    fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error | Severity::Warning => eprintln!("[{}] {message}", severity.as_str()),
            Severity::Info | Severity::Success => println!("[{}] {message}", severity.as_str()),
        }
    }
}

/// Signals the watch loop to rebuild everything from the server.
#[derive(Clone, Default)]
pub struct TerminalReload {
    requested: Arc<Notify>,
}

impl TerminalReload {
    pub async fn requested(&self) {
        self.requested.notified().await
    }
}

impl ReloadHandle for TerminalReload {
    fn reload(&self) {
        self.requested.notify_one();
    }
}

pub fn collaborators(lines: LineRouter, reload: TerminalReload) -> Collaborators {
    Collaborators {
        presenter: Arc::new(TerminalPresenter::new(lines)),
        transcript: Arc::new(TerminalTranscript),
        status: Arc::new(TerminalStatus),
        reload: Arc::new(reload),
    }
}
