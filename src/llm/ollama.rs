//! Ollama chat backend
//!
//! Posts the conversation to `/api/chat` with streaming enabled and pumps
//! the newline-delimited JSON reply into a [`TokenStream`] from a reader
//! thread.

use crate::llm::backend::{wire_messages, ModelBackend, TokenSink, TokenStream, WireMessage};
use crate::llm::config::LLMConfig;
use crate::messages::types::Turn;
use crate::{Result, TridentError};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Streams replies from an Ollama server
pub struct OllamaBackend {
    client: Client,
    config: LLMConfig,
    url: String,
}

impl OllamaBackend {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| TridentError::ConfigError(format!("HTTP client: {}", e)))?;
        let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

        info!("Ollama backend: model {} at {}", config.model_id, url);
        Ok(Self {
            client,
            config,
            url,
        })
    }
}

impl ModelBackend for OllamaBackend {
    fn send(&self, history: &[Turn]) -> Result<TokenStream> {
        let request = ChatRequest {
            model: &self.config.model_id,
            messages: wire_messages(history),
            stream: true,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TridentError::BackendUnavailable(format!(
                "{} returned {}: {}",
                self.url,
                status,
                body.trim()
            )));
        }

        let (sink, stream) = TokenStream::channel(self.config.stream_capacity);
        std::thread::Builder::new()
            .name("ollama-stream".to_string())
            .spawn(move || pump(response, sink))
            .map_err(|e| TridentError::ChannelError(format!("Failed to spawn reader: {}", e)))?;

        Ok(stream)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

fn request_error(e: reqwest::Error) -> TridentError {
    if e.is_timeout() {
        TridentError::BackendTimeout(e.to_string())
    } else {
        TridentError::BackendUnavailable(e.to_string())
    }
}

/// Read chunks until `done`, a failure, or the stream is dropped
fn pump(response: Response, sink: TokenSink) {
    let reader = BufReader::new(response);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let error = if e.kind() == std::io::ErrorKind::TimedOut {
                    TridentError::BackendTimeout(e.to_string())
                } else {
                    TridentError::BackendUnavailable(e.to_string())
                };
                sink.fail(error);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_chunk(&line) {
            Ok(Chunk::Fragment(content)) => {
                if !sink.send(content) {
                    debug!("Reply stream dropped, closing connection");
                    return;
                }
            }
            Ok(Chunk::Skip) => {}
            Ok(Chunk::Done) => return,
            Err(e) => {
                warn!("Ollama stream failed: {}", e);
                sink.fail(e);
                return;
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Chunk {
    Fragment(String),
    Skip,
    Done,
}

fn parse_chunk(line: &str) -> Result<Chunk> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| TridentError::BackendUnavailable(format!("Malformed chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(TridentError::BackendUnavailable(error));
    }

    match chunk.message {
        Some(message) if !message.content.is_empty() => Ok(Chunk::Fragment(message.content)),
        _ if chunk.done => Ok(Chunk::Done),
        _ => Ok(Chunk::Skip),
    }
}
