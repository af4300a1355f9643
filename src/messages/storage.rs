//! JSON persistence of the conversation log between sessions

use super::history::ConversationHistory;
use super::types::Turn;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads and saves a history as a JSON array of `{role, content}` records
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored log.
    ///
    /// A missing file yields a fresh history holding only `system_prompt`.
    pub fn load(&self, system_prompt: &str) -> Result<ConversationHistory> {
        if !self.path.exists() {
            info!("No stored history at {:?}, starting fresh", self.path);
            return Ok(ConversationHistory::new(system_prompt));
        }

        let json = fs::read_to_string(&self.path)?;
        let turns: Vec<Turn> = if json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&json)?
        };
        info!("Loaded {} turns from {:?}", turns.len(), self.path);

        Ok(ConversationHistory::from_turns(turns, system_prompt))
    }

    /// Write the current log, replacing the stored file atomically
    pub fn save(&self, history: &ConversationHistory) -> Result<()> {
        let turns = history.snapshot();
        let json = serde_json::to_string_pretty(&turns)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Saved {} turns to {:?}", turns.len(), self.path);
        Ok(())
    }
}
