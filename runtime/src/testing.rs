//! Fakes and an in-process workflow engine shared by the runtime's tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tollgate_core::{
    Envelope, ExecutionResult, HitlError, InteractionId, PendingInteraction, RecoverResponse,
    RecoveryReason,
};

use crate::channel::DuplexChannel;
use crate::collaborators::{
    Collaborators, Presenter, RecoveryChoice, ReloadHandle, Severity, StatusReporter, Transcript,
    TranscriptEntry,
};
use crate::config::RuntimeConfig;
use crate::recovery::RecoveryEndpoint;

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn test_config(base_url: &str) -> RuntimeConfig {
    RuntimeConfig {
        api_url: base_url.to_string(),
        ws_url: None,
        response_timeout: Duration::from_secs(2),
        approval_result_grace: Duration::from_millis(200),
        result_display: Duration::from_millis(10),
        failure_close_delay: Duration::from_millis(10),
        recovery_dialog_delay: Duration::from_millis(10),
    }
}

/// Poll `check` until it yields a value. Panics after five seconds.
pub async fn wait_until<T>(mut check: impl FnMut() -> Option<T>) -> T {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Default)]
pub struct EngineState {
    /// Requests to the `/response` route.
    pub hits: Arc<AtomicUsize>,
    pub responses: Mutex<Vec<(String, Value)>>,
    pub recoveries: Mutex<Vec<(String, Value)>>,
    pub recover_fails: AtomicBool,
}

pub struct TestServer {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
    pub engine: Arc<EngineState>,
}

impl TestServer {
    /// A workflow engine that records everything and executes approved commands.
    pub async fn workflow_engine() -> Self {
        let engine = Arc::new(EngineState::default());
        let router = Router::new()
            .route("/api/workflow/{session_id}/response", post(respond))
            .route("/api/workflow/{session_id}/recover", post(recover))
            .with_state(engine.clone());
        Self::serve(router, engine).await
    }

    pub async fn spawn(router: Router) -> Self {
        Self::serve(router, Arc::new(EngineState::default())).await
    }

    async fn serve(router: Router, engine: Arc<EngineState>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            hits: engine.hits.clone(),
            engine,
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        locked(&self.engine.responses).clone()
    }

    pub fn recoveries(&self) -> Vec<(String, Value)> {
        locked(&self.engine.recoveries).clone()
    }
}

async fn respond(
    State(engine): State<Arc<EngineState>>,
    Path(session_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    engine.hits.fetch_add(1, Ordering::SeqCst);
    let reply = if body["execute"] == true {
        let command = body["command"].as_str().unwrap_or_default();
        json!({
            "execution_result": {
                "command": command,
                "exit_code": 0,
                "stdout": format!("ran {command}\n"),
                "stderr": "",
                "success": true
            }
        })
    } else {
        json!({ "status": "ok" })
    };
    locked(&engine.responses).push((session_id, body));
    Json(reply)
}

async fn recover(
    State(engine): State<Arc<EngineState>>,
    Path(session_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    locked(&engine.recoveries).push((session_id.clone(), body));
    if engine.recover_fails.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "recovery unavailable").into_response();
    }
    Json(json!({ "success": true, "session_id": session_id })).into_response()
}

/// In-memory duplex channel bound to one workflow.
pub struct ScriptedChannel {
    workflow_id: String,
    broken: bool,
    sent: Mutex<Vec<Envelope>>,
}

impl ScriptedChannel {
    pub fn open(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            broken: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Claims to be open but every send fails.
    pub fn failing(workflow_id: &str) -> Self {
        Self {
            broken: true,
            ..Self::open(workflow_id)
        }
    }

    pub fn sent(&self) -> Vec<Envelope> {
        locked(&self.sent).clone()
    }
}

#[async_trait]
impl DuplexChannel for ScriptedChannel {
    fn is_open(&self, workflow_id: &str) -> bool {
        self.workflow_id == workflow_id
    }

    async fn send(&self, _workflow_id: &str, envelope: &Envelope) -> Result<(), HitlError> {
        if self.broken {
            return Err(HitlError::Channel("socket reset".to_string()));
        }
        locked(&self.sent).push(envelope.clone());
        Ok(())
    }
}

enum RecoveryScript {
    Succeed(Option<String>),
    Fail,
    Reject(String),
}

pub struct ScriptedRecovery {
    script: RecoveryScript,
    calls: Mutex<Vec<(String, RecoveryReason)>>,
}

impl ScriptedRecovery {
    fn with(script: RecoveryScript) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds, optionally reporting a different session id.
    pub fn succeeding(session_id: Option<&str>) -> Self {
        Self::with(RecoveryScript::Succeed(session_id.map(str::to_string)))
    }

    /// Transport failure.
    pub fn failing() -> Self {
        Self::with(RecoveryScript::Fail)
    }

    /// Reachable server answering `success: false`.
    pub fn rejecting(message: &str) -> Self {
        Self::with(RecoveryScript::Reject(message.to_string()))
    }

    pub fn calls(&self) -> Vec<(String, RecoveryReason)> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl RecoveryEndpoint for ScriptedRecovery {
    async fn recover(
        &self,
        session_id: &str,
        reason: RecoveryReason,
    ) -> Result<RecoverResponse, HitlError> {
        locked(&self.calls).push((session_id.to_string(), reason));
        match &self.script {
            RecoveryScript::Succeed(confirmed) => Ok(RecoverResponse {
                success: true,
                session_id: confirmed.clone(),
                message: None,
            }),
            RecoveryScript::Fail => Err(HitlError::Network("connection refused".to_string())),
            RecoveryScript::Reject(message) => Ok(RecoverResponse {
                success: false,
                session_id: None,
                message: Some(message.clone()),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterCall {
    Present(InteractionId),
    Progress(InteractionId, String),
    Editor(InteractionId, String),
    Result(InteractionId, ExecutionResult),
    Failure(InteractionId, String),
    Close(InteractionId),
    RecoveryPrompt(String),
}

pub struct RecordingPresenter {
    choice: RecoveryChoice,
    calls: Mutex<Vec<PresenterCall>>,
}

impl RecordingPresenter {
    pub fn calls(&self) -> Vec<PresenterCall> {
        locked(&self.calls).clone()
    }

    fn record(&self, call: PresenterCall) {
        locked(&self.calls).push(call);
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    fn present(&self, interaction: &PendingInteraction) {
        self.record(PresenterCall::Present(interaction.id.clone()));
    }

    fn update_progress(&self, id: &InteractionId, text: &str) {
        self.record(PresenterCall::Progress(id.clone(), text.to_string()));
    }

    fn show_editor(&self, id: &InteractionId, command: &str) {
        self.record(PresenterCall::Editor(id.clone(), command.to_string()));
    }

    fn show_result(&self, id: &InteractionId, result: &ExecutionResult) {
        self.record(PresenterCall::Result(id.clone(), result.clone()));
    }

    fn show_failure(&self, id: &InteractionId, message: &str) {
        self.record(PresenterCall::Failure(id.clone(), message.to_string()));
    }

    fn close(&self, id: &InteractionId) {
        self.record(PresenterCall::Close(id.clone()));
    }

    async fn prompt_recovery(&self, message: &str) -> RecoveryChoice {
        self.record(PresenterCall::RecoveryPrompt(message.to_string()));
        self.choice
    }
}

#[derive(Default)]
pub struct RecordingTranscript {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl RecordingTranscript {
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        locked(&self.entries).clone()
    }
}

impl Transcript for RecordingTranscript {
    fn append(&self, entry: TranscriptEntry) {
        locked(&self.entries).push(entry);
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingStatus {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        locked(&self.messages).clone()
    }
}

impl StatusReporter for RecordingStatus {
    fn report(&self, message: &str, severity: Severity) {
        locked(&self.messages).push((message.to_string(), severity));
    }
}

#[derive(Default)]
pub struct CountingReload {
    count: AtomicUsize,
}

impl CountingReload {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ReloadHandle for CountingReload {
    fn reload(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recording collaborators plus handles to inspect them.
pub struct Harness {
    pub presenter: Arc<RecordingPresenter>,
    pub transcript: Arc<RecordingTranscript>,
    pub status: Arc<RecordingStatus>,
    pub reload: Arc<CountingReload>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_recovery_choice(RecoveryChoice::Continue)
    }

    pub fn with_recovery_choice(choice: RecoveryChoice) -> Self {
        Self {
            presenter: Arc::new(RecordingPresenter {
                choice,
                calls: Mutex::new(Vec::new()),
            }),
            transcript: Arc::default(),
            status: Arc::default(),
            reload: Arc::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            presenter: self.presenter.clone(),
            transcript: self.transcript.clone(),
            status: self.status.clone(),
            reload: self.reload.clone(),
        }
    }
}
