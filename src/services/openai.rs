use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::ChatMessage;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const CHAT_MODEL: &str = "gpt-4";

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("upstream returned status {status}")]
    RequestFailed { status: StatusCode },
    #[error("malformed stream event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Reassembles `data: `-prefixed stream events into the accumulated assistant
/// text, handing the sink a cumulative snapshot after every content fragment.
///
/// Chunks are assumed to arrive line-aligned; a line split across two chunks
/// is not buffered and will fail to decode.
#[derive(Default)]
pub struct StreamAssembler {
    accumulated: String,
}

impl StreamAssembler {
    pub fn push_chunk<F>(&mut self, chunk: &str, mut sink: F) -> Result<(), ChatError>
    where
        F: FnMut(&str),
    {
        for line in chunk.split('\n') {
            let event = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim();
            if event.is_empty() || event == DONE_SENTINEL {
                continue;
            }

            let parsed: StreamEvent = serde_json::from_str(event)?;
            let content = parsed
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_deref());
            if let Some(content) = content {
                if !content.is_empty() {
                    self.accumulated.push_str(content);
                    sink(&self.accumulated);
                }
            }
        }
        Ok(())
    }

    pub fn into_text(self) -> String {
        self.accumulated
    }
}

/// Streamed chat completion. Calls `on_snapshot` with the full accumulated
/// assistant text after each content fragment and returns the final text.
pub async fn stream_chat<F>(
    client: &Client,
    base_url: &str,
    api_key: &str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    mut on_snapshot: F,
) -> Result<String, ChatError>
where
    F: FnMut(&str),
{
    let request = ChatRequest {
        model: CHAT_MODEL.to_string(),
        messages,
        max_tokens,
        stream: Some(true),
    };

    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ChatError::RequestFailed {
            status: response.status(),
        });
    }

    let mut assembler = StreamAssembler::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let bytes = chunk?;
        let text = String::from_utf8_lossy(&bytes);
        assembler.push_chunk(&text, &mut on_snapshot)?;
    }

    debug!(
        "stream complete, {} bytes of assistant text",
        assembler.accumulated.len()
    );
    Ok(assembler.into_text())
}

/// One-shot chat completion, used for the follow-up question request.
pub async fn complete_chat(
    client: &Client,
    base_url: &str,
    api_key: &str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
) -> Result<String, ChatError> {
    let request = ChatRequest {
        model: CHAT_MODEL.to_string(),
        messages,
        max_tokens,
        stream: None,
    };

    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ChatError::RequestFailed {
            status: response.status(),
        });
    }

    let body: ChatResponse = response.json().await?;
    Ok(body
        .choices
        .first()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_default())
}
