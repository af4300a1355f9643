pub mod history;
pub mod storage;
pub mod types;

pub use history::{estimate_tokens, AssistantTurnHandle, ConversationHistory};
pub use storage::HistoryStore;
pub use types::{AudioData, PromptTag, Role, Turn, UserPrompt};
