//! OpenAI-compatible chat completions over server-sent events.
//!
//! Content deltas are forwarded as they arrive. Tool calls arrive as
//! fragments spread over many deltas (name first, arguments in pieces,
//! keyed by `index`); they are assembled here and surfaced as one
//! `LLMEvent::ToolCall` each once the model signals `finish_reason`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::base::{
    BaseLLM, ChatMessage, LLMConfig, LLMError, LLMEvent, LLMResult, LLMStream, ToolDefinition,
    ToolInvocation,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const STREAM_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Incremental decoder for the chat-completions event stream
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    // A `tool_calls` finish reason was seen; only `[DONE]` may follow
    turn_complete: bool,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw body bytes; returns events for every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<LLMResult<LLMEvent>> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            match std::str::from_utf8(&line) {
                Ok(line) => self.handle_line(line.trim_end(), &mut events),
                Err(e) => warn!("Dropping non UTF-8 stream line: {}", e),
            }
        }
        events
    }

    /// Flush state after the body ended.
    ///
    /// A body that ends before the model reported a finish reason or `[DONE]`
    /// was cut off, and yields [`LLMError::StreamInterrupted`].
    pub fn finish(&mut self) -> Vec<LLMResult<LLMEvent>> {
        let mut events = Vec::new();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            if let Ok(line) = std::str::from_utf8(&rest) {
                self.handle_line(line.trim_end(), &mut events);
            }
        }
        if !self.finished {
            self.finished = true;
            if self.turn_complete {
                events.push(Ok(LLMEvent::Done));
            } else {
                self.tool_calls.clear();
                events.push(Err(LLMError::StreamInterrupted(
                    "response body ended before the model finished".to_string(),
                )));
            }
        }
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<LLMResult<LLMEvent>>) {
        if self.finished || line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.drain_tool_calls(events);
            self.finished = true;
            events.push(Ok(LLMEvent::Done));
            return;
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Failed to parse stream chunk: {} - data: {}", e, data);
                return;
            }
        };

        if let Some(err) = chunk.error {
            self.finished = true;
            events.push(Err(LLMError::ProviderError(err.to_string())));
            return;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };

        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            events.push(Ok(LLMEvent::Content(content)));
        }

        for delta in choice.delta.tool_calls {
            let entry = self.tool_calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                entry.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    entry.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    entry.arguments.push_str(&arguments);
                }
            }
        }

        match choice.finish_reason.as_deref() {
            None => {}
            Some("tool_calls") => {
                self.drain_tool_calls(events);
                self.turn_complete = true;
            }
            Some(reason) => {
                debug!("Model finished: {}", reason);
                self.drain_tool_calls(events);
                self.finished = true;
                events.push(Ok(LLMEvent::Done));
            }
        }
    }

    fn drain_tool_calls(&mut self, events: &mut Vec<LLMResult<LLMEvent>>) {
        for (_, call) in std::mem::take(&mut self.tool_calls) {
            let raw = call.arguments.trim();
            let arguments = if raw.is_empty() {
                Ok(json!({}))
            } else {
                serde_json::from_str::<Value>(raw)
            };
            events.push(match arguments {
                Ok(arguments) => Ok(LLMEvent::ToolCall(ToolInvocation {
                    id: call.id,
                    name: call.name,
                    arguments,
                })),
                Err(e) => Err(LLMError::InvalidResponse(format!(
                    "Malformed arguments for tool '{}': {e}",
                    call.name
                ))),
            });
        }
    }
}

/// Adapter for `/chat/completions` with `stream: true`
pub struct OpenAILLM {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAILLM {
    pub fn new(config: LLMConfig) -> LLMResult<Self> {
        if config.api_key.is_empty() {
            return Err(LLMError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LLMError::ConnectionFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    pub fn build_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl BaseLLM for OpenAILLM {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> LLMResult<LLMStream> {
        let body = self.build_body(messages, tools);
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let timeout = Duration::from_secs(self.config.request_timeout.unwrap_or(15));
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| LLMError::ConnectionFailed("Request timed out".to_string()))?
            .map_err(|e| LLMError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Chat completion error ({}): {}", status, error_text);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::AuthenticationFailed(error_text)
                }
                _ => LLMError::ProviderError(format!("API error ({status}): {error_text}")),
            });
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_SIZE);
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut stream = response.bytes_stream();

            while let Some(item) = stream.next().await {
                let events = match item {
                    Ok(bytes) => decoder.feed(&bytes),
                    Err(e) => vec![Err(LLMError::StreamInterrupted(e.to_string()))],
                };
                for event in events {
                    let stop = event.is_err();
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    if stop {
                        return;
                    }
                }
                if decoder.is_finished() {
                    return;
                }
            }

            for event in decoder.finish() {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }

    fn get_provider_info(&self) -> &'static str {
        "OpenAI chat completions (streaming)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_of(events: &[LLMResult<LLMEvent>]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(LLMEvent::Content(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decodes_content_deltas() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"We open \"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"at nine.\"}}]}\n\n",
        );
        assert_eq!(content_of(&events), "We open at nine.");
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut decoder = SseDecoder::new();
        let first = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"con");
        assert!(first.is_empty());
        let second = decoder.feed(b"tent\":\"hi\"}}]}\n");
        assert_eq!(content_of(&second), "hi");
    }

    #[test]
    fn test_done_marker_ends_stream() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: [DONE]\n");
        assert!(matches!(events.as_slice(), [Ok(LLMEvent::Done)]));
        assert!(decoder.is_finished());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_stop_reason_emits_done_once() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n",
        );
        let done = events
            .iter()
            .filter(|e| matches!(e, Ok(LLMEvent::Done)))
            .count();
        assert_eq!(done, 1);
    }

    #[test]
    fn test_assembles_fragmented_tool_call() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"fetchCompanyInfo\",\"arguments\":\"\"}}]}}]}\n",
        );
        events.extend(decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"mc_num\"}}]}}]}\n",
        ));
        events.extend(decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ber\\\":\\\"12345\\\"}\"}}]}}]}\n",
        ));
        assert!(events.is_empty());

        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        );
        match events.as_slice() {
            [Ok(LLMEvent::ToolCall(call))] => {
                assert_eq!(call.id, "call_1");
                assert_eq!(call.name, "fetchCompanyInfo");
                assert_eq!(call.arguments, json!({"mc_number": "12345"}));
            }
            other => panic!("unexpected events: {other:?}"),
        }

        let tail = decoder.feed(b"data: [DONE]\n");
        assert!(matches!(tail.as_slice(), [Ok(LLMEvent::Done)]));
    }

    #[test]
    fn test_two_tool_calls_keep_index_order() {
        let mut decoder = SseDecoder::new();
        decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"b\",\"function\":{\"name\":\"second\",\"arguments\":\"{}\"}},{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"first\",\"arguments\":\"{}\"}}]}}]}\n",
        );
        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        );
        let names: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Ok(LLMEvent::ToolCall(call)) => Some(call.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_malformed_tool_arguments_are_an_error() {
        let mut decoder = SseDecoder::new();
        decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"lookup\",\"arguments\":\"{oops\"}}]}}]}\n",
        );
        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        );
        assert!(matches!(events.as_slice(), [Err(LLMError::InvalidResponse(_))]));
    }

    #[test]
    fn test_error_object_in_stream() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"error\":{\"message\":\"overloaded\"}}\n");
        assert!(matches!(events.as_slice(), [Err(LLMError::ProviderError(_))]));
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_truncated_body_is_interrupted() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"We open at\"}}]}\n");
        assert_eq!(content_of(&events), "We open at");

        let events = decoder.finish();
        assert!(matches!(events.as_slice(), [Err(LLMError::StreamInterrupted(_))]));
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_truncated_tool_call_is_not_emitted() {
        let mut decoder = SseDecoder::new();
        decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"lookup\",\"arguments\":\"{}\"}}]}}]}\n",
        );
        let events = decoder.finish();
        assert!(matches!(events.as_slice(), [Err(LLMError::StreamInterrupted(_))]));
    }

    #[test]
    fn test_tool_calls_finish_without_done_marker() {
        let mut decoder = SseDecoder::new();
        decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"lookup\",\"arguments\":\"{}\"}}]}}]}\n",
        );
        let events = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        );
        assert!(matches!(events.as_slice(), [Ok(LLMEvent::ToolCall(_))]));
        assert!(matches!(decoder.finish().as_slice(), [Ok(LLMEvent::Done)]));
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\n\n\r\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_body_includes_tools_only_when_offered() {
        let llm = OpenAILLM::new(LLMConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let messages = vec![ChatMessage::user("hi")];

        let body = llm.build_body(&messages, &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);

        let tools = vec![ToolDefinition {
            name: "lookup".to_string(),
            description: "Look something up".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let body = llm.build_body(&messages, &tools);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            OpenAILLM::new(LLMConfig::default()),
            Err(LLMError::InvalidConfiguration(_))
        ));
    }
}
