use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tollgate_core::{Envelope, HitlError, IngressMessage};
use tracing::{debug, info, warn};

use crate::util::endpoint_url;

/// Persistent bidirectional connection to a workflow's infrastructure endpoint.
#[async_trait]
pub trait DuplexChannel: Send + Sync {
    fn is_open(&self, workflow_id: &str) -> bool;

    /// Fire the envelope. No reply is awaited; any result arrives through ingress.
    async fn send(&self, workflow_id: &str, envelope: &Envelope) -> Result<(), HitlError>;
}

/// WebSocket client bound to one workflow: `{base}/ws/{workflow_id}`.
pub struct WsChannel {
    workflow_id: String,
    outgoing: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl WsChannel {
    /// Connect and spawn the reader/writer tasks. Parsed inbound frames are
    /// delivered on the returned receiver.
    pub async fn connect(
        base_url: &str,
        workflow_id: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<IngressMessage>), HitlError> {
        let url = endpoint_url(base_url, &["ws", workflow_id])?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| HitlError::Channel(format!("Failed to connect to {url}: {e}")))?;
        info!(workflow_id, %url, "duplex channel connected");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<IngressMessage>();
        let open = Arc::new(AtomicBool::new(true));

        let writer_open = open.clone();
        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "duplex channel write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_open.store(false, Ordering::SeqCst);
        });

        let reader_open = open.clone();
        let bound_workflow = workflow_id.to_string();
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<IngressMessage>(&text) {
                            Ok(mut message) => {
                                if message.workflow_id.is_none() {
                                    message.workflow_id = Some(bound_workflow.clone());
                                }
                                if incoming_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "dropping unparsable duplex frame"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "duplex channel read failed");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            debug!(workflow_id = %bound_workflow, "duplex channel reader finished");
        });

        Ok((
            Self {
                workflow_id: workflow_id.to_string(),
                outgoing,
                open,
            },
            incoming,
        ))
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.outgoing.send(Message::Close(None));
    }
}

#[async_trait]
impl DuplexChannel for WsChannel {
    fn is_open(&self, workflow_id: &str) -> bool {
        self.workflow_id == workflow_id
            && self.open.load(Ordering::SeqCst)
            && !self.outgoing.is_closed()
    }

    async fn send(&self, workflow_id: &str, envelope: &Envelope) -> Result<(), HitlError> {
        if !self.is_open(workflow_id) {
            return Err(HitlError::Channel(format!(
                "no open channel for workflow {workflow_id}"
            )));
        }
        let text = serde_json::to_string(envelope)
            .map_err(|e| HitlError::Channel(format!("Failed to encode envelope: {e}")))?;
        self.outgoing
            .send(Message::text(text))
            .map_err(|_| HitlError::Channel("duplex channel writer has stopped".to_string()))
    }
}
