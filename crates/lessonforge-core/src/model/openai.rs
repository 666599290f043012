//! OpenAI-compatible chat-completion client over HTTP.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use serde_json::{Value, json};

use super::trait_def::ModelClient;
use super::types::ModelRequest;
use crate::json::frames::{self, Frame, LineBuffer};

const THINK_CLOSE: &str = "</think>";

/// Default transport timeout. The orchestrator applies its own, usually
/// shorter, per-call timeout on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for any server exposing `POST {base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpModelClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn body(request: &ModelRequest, stream: bool) -> Value {
        json!({
            "model": request.model,
            "messages": request.messages,
            "stream": stream,
        })
    }

    async fn send(&self, request: &ModelRequest, stream: bool) -> Result<reqwest::Response> {
        let url = self.endpoint();
        tracing::debug!(url = %url, model = %request.model, stream, "sending model request");

        let mut builder = self.client.post(&url).json(&Self::body(request, stream));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("failed to reach model endpoint {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("model endpoint returned {status}: {body}"));
        }
        Ok(response)
    }
}

/// Drop a leading reasoning block (`<think>...</think>`) from a response.
pub fn strip_think(text: &str) -> &str {
    match text.find(THINK_CLOSE) {
        Some(idx) => text[idx + THINK_CLOSE.len()..].trim(),
        None => text,
    }
}

fn line_frame(line: &str) -> Frame {
    frames::data_payload(line).map_or(Frame::Empty, frames::parse_frame)
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let response = self.send(request, false).await?;
        let body: Value = response
            .json()
            .await
            .context("model response was not JSON")?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("model response has no choices[0].message.content"))?;
        Ok(strip_think(content).to_string())
    }

    fn stream<'a>(&'a self, request: &'a ModelRequest) -> BoxStream<'a, Result<String>> {
        async_stream::try_stream! {
            let response = self.send(request, true).await?;
            let mut bytes = response.bytes_stream();
            let mut buffer = LineBuffer::new();
            let mut done = false;

            'frames: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.context("model stream interrupted")?;
                for line in buffer.push(&chunk) {
                    match line_frame(&line) {
                        Frame::Content(text) => {
                            yield text;
                        }
                        Frame::Done => {
                            done = true;
                            break 'frames;
                        }
                        Frame::Empty => {}
                    }
                }
            }

            if !done {
                if let Some(Frame::Content(text)) = buffer.finish().map(|line| line_frame(&line)) {
                    yield text;
                }
            }
        }
        .boxed()
    }
}
