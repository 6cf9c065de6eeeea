use futures_util::StreamExt;
use httpmock::prelude::*;
use parley_core::{
    AiServices, ChatMessage, ChatRequest, OpenAIProvider, Provider, ProviderEvent, ToolCall,
    ToolSpec,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {chunk}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn provider(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new("test-key")
        .with_model("test-model")
        .with_base_url(server.url("/v1"))
}

#[tokio::test]
async fn streams_tokens_from_sse_body() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .body_contains("\"stream\":true")
            .body_contains("\"model\":\"test-model\"");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(sse(&[
                json!({ "choices": [{ "delta": { "role": "assistant", "content": "" } }] }),
                json!({ "choices": [{ "delta": { "content": "Berlin" } }] }),
                json!({ "choices": [{ "delta": { "content": " is the capital." } }] }),
                json!({ "choices": [{ "delta": {}, "finish_reason": "stop" }] }),
            ]));
    }).await;

    let messages = vec![ChatMessage::user("What is the capital of Germany?")];
    let mut stream = provider(&server)
        .chat_stream(ChatRequest {
            messages: &messages,
            tools: None,
        })
        .await
        .expect("stream starts");

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.expect("no stream error"));
    }

    assert_eq!(
        events,
        vec![
            ProviderEvent::Token("Berlin".into()),
            ProviderEvent::Token(" is the capital.".into()),
            ProviderEvent::Done,
        ]
    );
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn streamed_tool_call_is_reassembled() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("\"tools\":[{\"type\":\"function\"");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(sse(&[
                json!({ "choices": [{ "delta": { "tool_calls": [{
                    "index": 0, "id": "call_abc", "type": "function",
                    "function": { "name": "square_root", "arguments": "" }
                }] } }] }),
                json!({ "choices": [{ "delta": { "tool_calls": [{
                    "index": 0, "function": { "arguments": "{\"number\":" }
                }] } }] }),
                json!({ "choices": [{ "delta": { "tool_calls": [{
                    "index": 0, "function": { "arguments": " 16}" }
                }] } }] }),
                json!({ "choices": [{ "delta": {}, "finish_reason": "tool_calls" }] }),
            ]));
    }).await;

    let messages = vec![ChatMessage::user("Root of 16?")];
    let tools = vec![ToolSpec {
        name: "square_root".into(),
        description: "Square root".into(),
        parameters_schema: json!({ "type": "object" }),
    }];
    let events: Vec<ProviderEvent> = provider(&server)
        .chat_stream(ChatRequest {
            messages: &messages,
            tools: Some(&tools),
        })
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ProviderEvent::ToolCall(ToolCall {
                id: "call_abc".into(),
                name: "square_root".into(),
                arguments: "{\"number\": 16}".into(),
            }),
            ProviderEvent::Done,
        ]
    );
}

#[tokio::test]
async fn stream_without_done_marker_still_finishes() {
    let server = MockServer::start_async().await;
    let body = [
        json!({ "choices": [{ "delta": { "content": "Let me check." } }] }).to_string(),
        json!({ "choices": [{ "delta": { "tool_calls": [{
            "index": 0, "id": "call_tail", "type": "function",
            "function": { "name": "square_root", "arguments": "{\"number\": 9}" }
        }] } }] })
        .to_string(),
    ];
    // The body ends without `[DONE]` or a trailing newline.
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(format!("data: {}\n\ndata: {}", body[0], body[1]));
        })
        .await;

    let messages = vec![ChatMessage::user("Root of 9?")];
    let events: Vec<ProviderEvent> = provider(&server)
        .chat_stream(ChatRequest {
            messages: &messages,
            tools: None,
        })
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            ProviderEvent::Token("Let me check.".into()),
            ProviderEvent::ToolCall(ToolCall {
                id: "call_tail".into(),
                name: "square_root".into(),
                arguments: "{\"number\": 9}".into(),
            }),
            ProviderEvent::Done,
        ]
    );
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&chunk[..n]);

        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + content_length {
            return Ok(());
        }
    }
}

/// Serves one chunk of a chunked SSE body per connection, then hangs up
/// without the terminating chunk.
async fn spawn_dropping_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_err() {
                    return;
                }
                let event = format!(
                    "data: {}\n\n",
                    json!({ "choices": [{ "delta": { "content": "partial" } }] })
                );
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                     transfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
                    event.len(),
                    event
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.flush().await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/v1")
}

#[tokio::test]
async fn dropped_connection_ends_stream_with_error() {
    let base_url = spawn_dropping_server().await;
    let provider = OpenAIProvider::new("test-key").with_base_url(base_url);

    let messages = vec![ChatMessage::user("Tell me everything")];
    let events: Vec<anyhow::Result<ProviderEvent>> = provider
        .chat_stream(ChatRequest {
            messages: &messages,
            tools: None,
        })
        .await
        .unwrap()
        .collect()
        .await;

    assert!(events.last().is_some_and(|event| event.is_err()));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, Ok(ProviderEvent::Done)))
    );

    let completions = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (c, e) = (completions.clone(), errors.clone());
    let result = AiServices::create(Arc::new(provider))
        .chat("Tell me everything")
        .on_complete(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        })
        .collect()
        .await;

    assert!(result.is_err());
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).body("invalid api key");
    }).await;

    let messages = vec![ChatMessage::user("hi")];
    let err = provider(&server)
        .chat_stream(ChatRequest {
            messages: &messages,
            tools: None,
        })
        .await
        .err()
        .expect("request fails");

    let text = err.to_string();
    assert!(text.contains("401"), "{text}");
    assert!(text.contains("invalid api key"), "{text}");
}

#[tokio::test]
async fn non_streaming_chat_reads_first_choice() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("\"stream\":false");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Pong" } }]
        }));
    }).await;

    let messages = vec![ChatMessage::user("Ping")];
    let response = provider(&server)
        .chat(ChatRequest {
            messages: &messages,
            tools: None,
        })
        .await
        .unwrap();

    assert_eq!(response.text_or_empty(), "Pong");
    assert!(!response.has_tool_calls());
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn service_streams_through_http_provider() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(sse(&[
                json!({ "choices": [{ "delta": { "content": "Hallo " } }] }),
                json!({ "choices": [{ "delta": { "content": "Klaus!" } }] }),
            ]));
    }).await;

    let assistant = AiServices::create(Arc::new(provider(&server)));
    let answer = assistant
        .chat("Hi, my name is Klaus")
        .collect()
        .await
        .unwrap();

    assert_eq!(answer, "Hallo Klaus!");
}
