use crate::service::{TokenStream, ToolRegistry};
use crate::traits::{
    ChatMemory, ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, Tool, ToolCall,
    ToolResult, ToolSpec,
};
use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;

/// Entry points for building an [`AiService`].
pub struct AiServices;

impl AiServices {
    /// A service with no memory and no tools.
    pub fn create(model: Arc<dyn Provider>) -> AiService {
        AiService {
            inner: Arc::new(Inner {
                model,
                memory: None,
                tools: None,
                system_message: None,
                max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            }),
        }
    }

    pub fn builder() -> AiServiceBuilder {
        AiServiceBuilder::default()
    }
}

#[derive(Default)]
pub struct AiServiceBuilder {
    model: Option<Arc<dyn Provider>>,
    memory: Option<Arc<dyn ChatMemory>>,
    tools: Option<Arc<ToolRegistry>>,
    system_message: Option<String>,
    max_tool_rounds: Option<usize>,
}

impl AiServiceBuilder {
    pub fn streaming_model(mut self, model: Arc<dyn Provider>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn chat_memory(mut self, memory: Arc<dyn ChatMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tools = Some(registry);
        self
    }

    /// Adds a single tool, creating the registry on first use.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools
            .get_or_insert_with(|| Arc::new(ToolRegistry::new()))
            .register(tool);
        self
    }

    pub fn system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    pub fn max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = Some(max_tool_rounds);
        self
    }

    pub fn build(self) -> Result<AiService> {
        let model = self
            .model
            .ok_or_else(|| anyhow!("A streaming model must be configured"))?;

        let max_tool_rounds = self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS);
        if max_tool_rounds == 0 {
            anyhow::bail!("max_tool_rounds must be at least 1");
        }

        Ok(AiService {
            inner: Arc::new(Inner {
                model,
                memory: self.memory,
                tools: self.tools,
                system_message: self.system_message.filter(|s| !s.trim().is_empty()),
                max_tool_rounds,
            }),
        })
    }
}

struct Inner {
    model: Arc<dyn Provider>,
    memory: Option<Arc<dyn ChatMemory>>,
    tools: Option<Arc<ToolRegistry>>,
    system_message: Option<String>,
    max_tool_rounds: usize,
}

/// An assistant bound to a chat model, with optional memory and tools.
#[derive(Clone)]
pub struct AiService {
    inner: Arc<Inner>,
}

/// Messages of one call: the shared memory, or a scratch transcript when
/// the service has none.
struct Conversation {
    memory: Option<Arc<dyn ChatMemory>>,
    transcript: Vec<ChatMessage>,
}

impl Conversation {
    fn add(&mut self, message: ChatMessage) -> Result<()> {
        match &self.memory {
            Some(memory) => memory.add(message),
            None => {
                self.transcript.push(message);
                Ok(())
            }
        }
    }

    fn messages(&self) -> Vec<ChatMessage> {
        match &self.memory {
            Some(memory) => memory.messages(),
            None => self.transcript.clone(),
        }
    }
}

impl AiService {
    /// Streams the answer to `user_message`. Nothing is sent until
    /// [`TokenStream::start`] or [`TokenStream::collect`] is called.
    pub fn chat(&self, user_message: impl Into<String>) -> TokenStream {
        TokenStream::new(self.clone(), user_message.into())
    }

    /// Same turn as [`AiService::chat`] but through the non-streaming API.
    pub async fn chat_blocking(&self, user_message: impl Into<String>) -> Result<String> {
        let mut conversation = self.begin(user_message.into())?;
        let specs = self.tool_specs();
        let mut rounds = 0;

        loop {
            let messages = conversation.messages();
            debug!(round = rounds, messages = messages.len(), "Calling chat model");
            let response = self
                .inner
                .model
                .chat(ChatRequest {
                    messages: &messages,
                    tools: specs.as_deref(),
                })
                .await?;

            if let Some(answer) = self
                .settle(&mut conversation, response, &mut rounds)
                .await?
            {
                return Ok(answer);
            }
        }
    }

    pub fn memory(&self) -> Option<&Arc<dyn ChatMemory>> {
        self.inner.memory.as_ref()
    }

    pub(crate) async fn stream_turn(
        &self,
        user_message: String,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let mut conversation = self.begin(user_message)?;
        let specs = self.tool_specs();
        let mut rounds = 0;

        loop {
            let messages = conversation.messages();
            let request = ChatRequest {
                messages: &messages,
                tools: specs.as_deref(),
            };
            debug!(round = rounds, messages = messages.len(), "Streaming chat model");

            let response = if self.inner.model.supports_streaming() {
                self.consume_stream(request, on_token).await?
            } else {
                let response = self.inner.model.chat(request).await?;
                if let Some(text) = response.text.as_ref().filter(|t| !t.is_empty()) {
                    on_token(text.clone());
                }
                response
            };

            if let Some(answer) = self
                .settle(&mut conversation, response, &mut rounds)
                .await?
            {
                return Ok(answer);
            }
        }
    }

    async fn consume_stream(
        &self,
        request: ChatRequest<'_>,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<ChatResponse> {
        let mut stream = self.inner.model.chat_stream(request).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut finished = false;

        while let Some(event) = stream.next().await {
            match event? {
                ProviderEvent::Token(token) => {
                    text.push_str(&token);
                    on_token(token);
                }
                ProviderEvent::ToolCall(call) => tool_calls.push(call),
                ProviderEvent::Done => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            anyhow::bail!("Chat stream closed before the model finished its answer");
        }

        Ok(ChatResponse {
            text: Some(text),
            tool_calls,
        })
    }

    fn begin(&self, user_message: String) -> Result<Conversation> {
        let mut conversation = Conversation {
            memory: self.inner.memory.clone(),
            transcript: Vec::new(),
        };
        if let Some(system_message) = &self.inner.system_message {
            conversation.add(ChatMessage::system(system_message.clone()))?;
        }
        conversation.add(ChatMessage::user(user_message))?;
        Ok(conversation)
    }

    fn tool_specs(&self) -> Option<Vec<ToolSpec>> {
        self.inner
            .tools
            .as_ref()
            .map(|registry| registry.get_specs())
            .filter(|specs| !specs.is_empty())
    }

    /// Records the model's reply. Returns the final answer, or `None` after
    /// running the requested tools so the caller asks the model again.
    async fn settle(
        &self,
        conversation: &mut Conversation,
        response: ChatResponse,
        rounds: &mut usize,
    ) -> Result<Option<String>> {
        if !response.has_tool_calls() {
            let answer = response.text.unwrap_or_default();
            conversation.add(ChatMessage::ai(answer.clone()))?;
            return Ok(Some(answer));
        }

        if *rounds >= self.inner.max_tool_rounds {
            anyhow::bail!(
                "Model kept requesting tools after {} rounds",
                self.inner.max_tool_rounds
            );
        }
        *rounds += 1;

        conversation.add(ChatMessage::ai_with_tool_calls(
            response.text,
            response.tool_calls.clone(),
        ))?;

        for call in &response.tool_calls {
            let result = self.run_tool(call).await;
            conversation.add(ChatMessage::tool_result(call, result.message_text()))?;
        }

        Ok(None)
    }

    async fn run_tool(&self, call: &ToolCall) -> ToolResult {
        match &self.inner.tools {
            Some(registry) => registry.execute_call(call).await,
            None => ToolResult::error(format!("Tool '{}' not found", call.name)),
        }
    }
}
