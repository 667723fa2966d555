//! Mock completion provider — deterministic responses for tests and for
//! running the pipeline without an API key.

use crate::api_types::{ChatMessage, StreamEvent};
use crate::llm::{CompletionClient, CompletionParams};
use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
    /// When > 0, the next N `complete` calls fail (for retry-path tests).
    fail_next: Arc<AtomicU32>,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            fail_next: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Make the next `n` completion calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String> {
        if self.take_failure() {
            anyhow::bail!("mock transient failure");
        }
        let last = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("(empty)");
        Ok(format!(
            "(mock {} t={:.1} n={}) echo: {}",
            self.model, params.temperature, params.max_tokens, last
        ))
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        let text = self.complete(system, messages, params).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in text.split_inclusive(' ') {
                if tx.send(StreamEvent::TextDelta(chunk.to_string())).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(StreamEvent::Done {
                    stop_reason: Some("end_turn".to_string()),
                })
                .await;
        });
        Ok(rx)
    }
}
