//! Anthropic Messages-shaped completion provider.
//!
//! The core never depends on this request shape beyond the
//! [`CompletionClient`] abstraction; any vendor with a system-prompt +
//! message-history contract slots in behind the same trait.

use crate::api_types::{ChatMessage, Role, StreamEvent};
use crate::llm::{CompletionClient, CompletionParams};
use crate::retry::with_single_retry;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::env;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl AnthropicClient {
    pub fn new(model: &str, base_url: Option<String>) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| "mock".to_string());
        let base_url = base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string());
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
            model: model.to_string(),
            base_url,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    async fn send_once(
        &self,
        system: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "system": system,
            "messages": Self::wire_messages(messages),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        tracing::debug!(
            "completion params: max_tokens={}, temperature={:.2}",
            params.max_tokens,
            params.temperature
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic")?;

        let status = response.status();
        if !status.is_success() {
            let err_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error {}: {}", status, err_text);
        }

        let value: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        let text = value
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            anyhow::bail!("Anthropic response contained no text content");
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl CompletionClient for AnthropicClient {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String> {
        if self.api_key == "mock" {
            // No key configured: behave like the mock so local runs still work
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            return Ok("(offline) I hear you.".to_string());
        }

        with_single_retry("Anthropic", params, CompletionParams::reduced, |p| {
            let messages = &messages;
            async move { self.send_once(system, messages, p).await }
        })
        .await
    }

    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>> {
        if self.api_key == "mock" {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            tokio::spawn(async move {
                let _ = tx.send(StreamEvent::TextDelta("(offline) I hear you.".into())).await;
                let _ = tx.send(StreamEvent::Done { stop_reason: Some("end_turn".into()) }).await;
            });
            return Ok(rx);
        }

        let body = serde_json::json!({
            "model": self.model,
            "system": system,
            "messages": Self::wire_messages(&messages),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "stream": true,
        });

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Failed to send streaming request to Anthropic")?;

        if !response.status().is_success() {
            let status = response.status();
            let err_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic streaming error {}: {}", status, err_text);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            if let Err(e) = parse_sse(byte_stream, &tx).await {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            }
        });
        Ok(rx)
    }
}

/// Parse an Anthropic SSE byte stream into [`StreamEvent`]s.
///
/// Only three event kinds matter here: `content_block_delta` with a
/// `text_delta`, `message_delta` carrying the stop reason, and
/// `message_stop`. Everything else (ping, content_block_start, …) is noise.
pub(crate) async fn parse_sse<S>(
    byte_stream: S,
    tx: &tokio::sync::mpsc::Sender<StreamEvent>,
) -> Result<()>
where
    S: futures_util::Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>>
        + Unpin
        + Send,
{
    let mut stream = byte_stream;
    let mut buffer = String::new();
    let mut stop_reason: Option<String> = None;

    while let Some(chunk_result) = stream.next().await {
        let chunk: bytes::Bytes = chunk_result.context("Error reading SSE chunk")?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();

            let mut event_type = String::new();
            let mut event_data = String::new();
            for line in event_block.lines() {
                if let Some(t) = line.strip_prefix("event: ") {
                    event_type = t.trim().to_string();
                } else if let Some(d) = line.strip_prefix("data: ") {
                    event_data = d.to_string();
                }
            }
            if event_data.is_empty() {
                continue;
            }

            match event_type.as_str() {
                "content_block_delta" => {
                    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&event_data) {
                        if let Some(text) = v
                            .get("delta")
                            .filter(|d| d.get("type").and_then(|t| t.as_str()) == Some("text_delta"))
                            .and_then(|d| d.get("text"))
                            .and_then(|t| t.as_str())
                        {
                            let _ = tx.send(StreamEvent::TextDelta(text.to_string())).await;
                        }
                    }
                }
                "message_delta" => {
                    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&event_data) {
                        if let Some(sr) = v
                            .get("delta")
                            .and_then(|d| d.get("stop_reason"))
                            .and_then(|s| s.as_str())
                        {
                            stop_reason = Some(sr.to_string());
                        }
                    }
                }
                "message_stop" => {
                    let _ = tx
                        .send(StreamEvent::Done {
                            stop_reason: stop_reason.take(),
                        })
                        .await;
                    return Ok(());
                }
                "error" => {
                    let _ = tx.send(StreamEvent::Error(event_data)).await;
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    // Stream ended without message_stop — report completion anyway
    let _ = tx.send(StreamEvent::Done { stop_reason }).await;
    Ok(())
}
