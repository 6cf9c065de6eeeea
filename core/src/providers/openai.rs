use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, EventStream, Provider, ProviderEvent, ToolCall,
    ToolSpec,
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const STREAM_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool<'a>>>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: OpenAIFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAITool<'a> {
    r#type: &'a str,
    function: OpenAIToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn into_tool_call(self) -> ToolCall {
        let id = if self.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            self.id
        };
        let arguments = if self.arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            self.arguments
        };

        ToolCall {
            id,
            name: self.name,
            arguments,
        }
    }
}

/// Reassembles SSE `data:` lines into provider events.
#[derive(Debug, Default)]
struct StreamState {
    pending_tool_calls: BTreeMap<usize, PendingToolCall>,
    done: bool,
}

impl StreamState {
    fn process_line(&mut self, line: &str) -> anyhow::Result<Vec<ProviderEvent>> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(Vec::new());
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return Ok(self.flush_tool_calls());
        }

        let response = match serde_json::from_str::<StreamResponse>(data) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Skipping malformed stream chunk");
                return Ok(Vec::new());
            }
        };

        if let Some(error) = response.error {
            anyhow::bail!("Stream error from API: {}", error.message);
        }

        let mut events = Vec::new();
        for choice in response.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::Token(content));
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.pending_tool_calls.entry(fragment.index).or_default();

                if let Some(id) = fragment.id
                    && !id.is_empty()
                {
                    entry.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name
                        && !name.is_empty()
                    {
                        entry.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }

            if choice.finish_reason.is_some() {
                events.extend(self.flush_tool_calls());
            }
        }

        Ok(events)
    }

    fn flush_tool_calls(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.pending_tool_calls)
            .into_values()
            .filter(|pending| !pending.name.is_empty())
            .map(|pending| ProviderEvent::ToolCall(pending.into_tool_call()))
            .collect()
    }
}

/// Splits a byte stream on `\n`. Bytes are kept until a full line arrives so
/// multibyte characters split across chunks survive.
#[derive(Debug, Default)]
struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(120)),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            temperature: 0.7,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn convert_messages<'a>(&self, messages: &'a [ChatMessage]) -> Vec<OpenAIMessage<'a>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = m.has_tool_calls().then(|| {
                    m.tool_calls()
                        .iter()
                        .map(|tc| OpenAIToolCallRequest {
                            id: &tc.id,
                            r#type: "function",
                            function: OpenAIFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                });

                let tool_call_id = match m {
                    ChatMessage::ToolResult { id, .. } => Some(id.as_str()),
                    _ => None,
                };

                OpenAIMessage {
                    role: m.role(),
                    content: m.text(),
                    tool_calls,
                    tool_call_id,
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenAITool<'_>> {
        tools
            .iter()
            .map(|t| OpenAITool {
                r#type: "function",
                function: OpenAIToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters_schema,
                },
            })
            .collect()
    }

    fn build_request<'a>(&'a self, request: &ChatRequest<'a>, stream: bool) -> OpenAIRequest<'a> {
        OpenAIRequest {
            model: &self.model,
            messages: self.convert_messages(request.messages),
            tools: request
                .tools
                .filter(|t| !t.is_empty())
                .map(Self::convert_tools),
            temperature: self.temperature,
            stream,
        }
    }

    async fn send(&self, body: &OpenAIRequest<'_>) -> anyhow::Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);
        if body.stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach chat completion endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, error_text));
        }

        Ok(response)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let body = self.build_request(&request, false);
        let response = self.send(&body).await?;

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to decode chat completion response")?;

        let message = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("No choices in response"))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();

        let has_content = message
            .content
            .as_ref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_content && tool_calls.is_empty() {
            return Err(anyhow!("Empty response from API: no content or tool calls"));
        }

        Ok(ChatResponse {
            text: message.content,
            tool_calls,
        })
    }

    async fn chat_stream(&self, request: ChatRequest<'_>) -> anyhow::Result<EventStream> {
        let body = self.build_request(&request, true);
        let response = self.send(&body).await?;

        let (tx, rx) =
            tokio::sync::mpsc::channel::<anyhow::Result<ProviderEvent>>(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut state = StreamState::default();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Chat stream interrupted");
                        let _ = tx
                            .send(Err(anyhow!(e).context("Chat stream interrupted")))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    match state.process_line(&line) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(Ok(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                    if state.done {
                        break 'read;
                    }
                }
            }

            let mut trailing = Vec::new();
            if !state.done
                && let Some(line) = lines.finish()
            {
                match state.process_line(&line) {
                    Ok(events) => trailing.extend(events),
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            trailing.extend(state.flush_tool_calls());
            trailing.push(ProviderEvent::Done);

            for event in trailing {
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
