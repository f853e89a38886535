//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};

use crate::transport::{DownstreamResponse, OutboundRequest, SendReceipt, Transport, TransportError};

/// What one attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(u16, &'static str),
    FailBeforeSend,
    FailAfterSend,
    Stall { sent: bool },
    InvalidTarget,
}

/// Plays back `steps` in order, then answers 200 "ok" forever.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        receipt: &SendReceipt,
    ) -> Result<DownstreamResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(request.url.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Respond(200, "ok"));

        match step {
            Step::Respond(status, body) => {
                receipt.mark_sent();
                Ok(DownstreamResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers: HeaderMap::new(),
                    body: body.into(),
                })
            }
            Step::FailBeforeSend => Err(TransportError::Connect {
                authority: "downstream:80".to_string(),
                reason: "connection refused".to_string(),
            }),
            Step::FailAfterSend => {
                receipt.mark_sent();
                Err(TransportError::Request("connection reset".to_string()))
            }
            Step::Stall { sent } => {
                if sent {
                    receipt.mark_sent();
                }
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Request("stalled".to_string()))
            }
            Step::InvalidTarget => Err(TransportError::InvalidTarget {
                url: request.url.clone(),
                reason: "bad".to_string(),
            }),
        }
    }
}
