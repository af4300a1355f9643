//! In-process model backend using mistral.rs
//!
//! The model lives on its own tokio runtime; each request is a task that
//! forwards streamed chunks into a [`TokenStream`].

use crate::llm::backend::{render_content, ModelBackend, TokenStream};
use crate::llm::config::{LLMConfig, QuantizationType};
use crate::messages::types::{Role, Turn};
use crate::{Result, TridentError};
use futures::StreamExt;
use mistralrs::{
    ChatCompletionChunkResponse, ChunkChoice, Delta, IsqType, PagedAttentionMetaBuilder,
    Response, TextMessageRole, TextMessages, TextModelBuilder,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

/// Model loaded in this process
pub struct MistralBackend {
    runtime: Runtime,
    model: Arc<mistralrs::Model>,
    config: LLMConfig,
}

impl MistralBackend {
    /// Load the model. Blocks until the weights are ready.
    pub fn new(config: LLMConfig) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| TridentError::ModelLoadError(format!("Failed to create runtime: {}", e)))?;

        info!("Loading model: {}", config.model_id);
        let model = runtime.block_on(initialize_model(&config))?;
        info!("Model loaded successfully");

        Ok(Self {
            runtime,
            model: Arc::new(model),
            config,
        })
    }
}

impl ModelBackend for MistralBackend {
    fn send(&self, history: &[Turn]) -> Result<TokenStream> {
        let messages = build_text_messages(history);
        let (sink, stream) = TokenStream::channel(self.config.stream_capacity);
        let model = self.model.clone();

        self.runtime.spawn(async move {
            let mut responses = match model.stream_chat_request(messages).await {
                Ok(responses) => responses,
                Err(e) => {
                    error!("Streaming request failed: {}", e);
                    sink.fail(TridentError::BackendUnavailable(e.to_string()));
                    return;
                }
            };

            while let Some(response) = responses.next().await {
                match response {
                    Response::Chunk(ChatCompletionChunkResponse { choices, .. }) => {
                        if let Some(ChunkChoice {
                            delta:
                                Delta {
                                    content: Some(content),
                                    ..
                                },
                            ..
                        }) = choices.first()
                        {
                            if !sink.send(content.clone()) {
                                debug!("Reply stream dropped, aborting generation");
                                break;
                            }
                        }
                    }
                    Response::ModelError(msg, _) => {
                        sink.fail(TridentError::BackendUnavailable(msg));
                        break;
                    }
                    Response::InternalError(e) => {
                        sink.fail(TridentError::BackendUnavailable(e.to_string()));
                        break;
                    }
                    Response::ValidationError(e) => {
                        sink.fail(TridentError::BackendUnavailable(e.to_string()));
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(stream)
    }

    fn name(&self) -> &str {
        "mistral"
    }
}

async fn initialize_model(config: &LLMConfig) -> Result<mistralrs::Model> {
    let isq_type = match config.quantization {
        QuantizationType::None => None,
        QuantizationType::Q4K => Some(IsqType::Q4K),
        QuantizationType::Q8_0 => Some(IsqType::Q8_0),
        QuantizationType::Q4_0 => Some(IsqType::Q4_0),
    };

    let mut builder = TextModelBuilder::new(&config.model_id);

    if let Some(isq) = isq_type {
        builder = builder.with_isq(isq);
    }

    if config.enable_logging {
        builder = builder.with_logging();
    }

    builder = builder
        .with_paged_attn(|| {
            PagedAttentionMetaBuilder::default()
                .with_block_size(32)
                .build()
        })
        .map_err(|e| {
            TridentError::ModelLoadError(format!("Failed to configure paged attention: {}", e))
        })?;

    builder
        .build()
        .await
        .map_err(|e| TridentError::ModelLoadError(format!("Failed to load model: {}", e)))
}

fn build_text_messages(history: &[Turn]) -> TextMessages {
    history.iter().fold(TextMessages::new(), |messages, turn| {
        let role = match turn.role {
            Role::System => TextMessageRole::System,
            Role::User => TextMessageRole::User,
            Role::Assistant => TextMessageRole::Assistant,
        };
        messages.add_message(role, render_content(turn))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::types::UserPrompt;

    #[test]
    #[ignore]
    fn test_backend_streams_reply() {
        let backend = MistralBackend::new(LLMConfig::new("microsoft/Phi-3.5-mini-instruct"))
            .expect("model should load");
        let history = vec![
            Turn::system("Answer in one word."),
            Turn::user(UserPrompt::typed("Say hello.")),
        ];
        let reply: String = backend
            .send(&history)
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(!reply.is_empty());
    }
}
