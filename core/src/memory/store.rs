use crate::traits::{ChatMemoryStore, ChatMessage};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
pub struct InMemoryChatMemoryStore {
    messages: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryChatMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatMemoryStore for InMemoryChatMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn get_messages(&self, memory_id: &str) -> Result<Vec<ChatMessage>> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(messages.get(memory_id).cloned().unwrap_or_default())
    }

    fn update_messages(&self, memory_id: &str, updated: &[ChatMessage]) -> Result<()> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.insert(memory_id.to_string(), updated.to_vec());
        Ok(())
    }

    fn delete_messages(&self, memory_id: &str) -> Result<()> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.remove(memory_id);
        Ok(())
    }
}

/// One JSON file per memory id under `dir`.
pub struct FileChatMemoryStore {
    dir: PathBuf,
}

impl FileChatMemoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, memory_id: &str) -> PathBuf {
        let is_plain = !memory_id.is_empty()
            && memory_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        let file_name = if is_plain {
            format!("{memory_id}.json")
        } else {
            format!("{:x}.json", md5::compute(memory_id.as_bytes()))
        };
        self.dir.join(file_name)
    }
}

impl ChatMemoryStore for FileChatMemoryStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get_messages(&self, memory_id: &str) -> Result<Vec<ChatMessage>> {
        let path = self.path_for(memory_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read chat memory {}", path.display()));
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse chat memory {}", path.display()))
    }

    fn update_messages(&self, memory_id: &str, messages: &[ChatMessage]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create memory directory {}", self.dir.display())
        })?;

        let path = self.path_for(memory_id);
        let content = serde_json::to_string_pretty(messages)
            .context("Failed to serialize chat memory")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write chat memory {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace chat memory {}", path.display()))?;

        Ok(())
    }

    fn delete_messages(&self, memory_id: &str) -> Result<()> {
        let path = self.path_for(memory_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete chat memory {}", path.display()))
            }
        }
    }
}
