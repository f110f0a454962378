use crate::models::{Conversation, DEFAULT_DATASET_SPLIT, DEFAULT_MODEL_TYPE, Turn};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A finite set of conversations that can be traversed any number of times
pub trait ConversationSource {
    /// Start a fresh, lazy traversal from the first record
    fn traverse(&self) -> Result<Box<dyn Iterator<Item = Conversation> + '_>>;
}

impl ConversationSource for Vec<Conversation> {
    fn traverse(&self) -> Result<Box<dyn Iterator<Item = Conversation> + '_>> {
        Ok(Box::new(self.iter().cloned()))
    }
}

/// Conversations stored one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConversationSource for JsonlSource {
    fn traverse(&self) -> Result<Box<dyn Iterator<Item = Conversation> + '_>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open data file: {}", self.path.display()))?;

        let records = BufReader::new(file)
            .split(b'\n')
            .enumerate()
            .map_while(|(index, line)| match line {
                Ok(line) => Some((index + 1, line)),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Stopped reading data file");
                    None
                }
            })
            .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
            .map(|(line_number, line)| parse_record(line_number, &line));

        Ok(Box::new(records))
    }
}

/// Parse one raw dataset line, falling back to an empty conversation
fn parse_record(line_number: usize, line: &[u8]) -> Conversation {
    match serde_json::from_slice::<Value>(line) {
        Ok(record) => conversation_from_value(line_number, &record),
        Err(e) => {
            tracing::warn!(line = line_number, error = %e, "Malformed record, using empty conversation");
            Conversation::default()
        }
    }
}

fn conversation_from_value(line_number: usize, record: &Value) -> Conversation {
    let metadata_field = |name: &str, default: &str| {
        record
            .get("metadata")
            .and_then(|metadata| metadata.get(name))
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    let inputs = match record.pointer("/inputs/messages").and_then(Value::as_array) {
        Some(messages) => messages
            .iter()
            .filter_map(|message| {
                let turn = turn_from_value(message);
                if turn.is_none() {
                    tracing::warn!(line = line_number, "Skipping malformed input message");
                }
                turn
            })
            .collect(),
        None => {
            tracing::warn!(line = line_number, "Record has no input messages");
            Vec::new()
        }
    };

    let outputs = record
        .pointer("/outputs/message")
        .and_then(turn_from_value)
        .into_iter()
        .collect();

    Conversation {
        dataset_split: metadata_field("dataset_split", DEFAULT_DATASET_SPLIT),
        model_type: metadata_field("ls_model_type", DEFAULT_MODEL_TYPE),
        inputs,
        outputs,
    }
}

fn turn_from_value(message: &Value) -> Option<Turn> {
    let role = message.get("role")?.as_str()?;
    let content = message.get("content")?.as_str()?;
    Some(Turn::new(role, content))
}
