use crate::models::AnalysisResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Writes analysis results as JSON documents into a directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    out_dir: PathBuf,
}

impl ResultStore {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    /// Store `result` under a name derived from the current UTC time
    pub fn save(&self, result: &AnalysisResult) -> Result<PathBuf> {
        self.save_at(result, Utc::now())
    }

    /// Store `result` under a name derived from `timestamp`
    pub fn save_at(&self, result: &AnalysisResult, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.out_dir.join(result_file_name(timestamp));
        let json_content = serialize_result(result)?;

        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create directory: {}", self.out_dir.display()))?;
        std::fs::write(&path, json_content)
            .with_context(|| format!("Failed to write results to: {}", path.display()))?;

        tracing::info!(path = %path.display(), "Results stored");
        Ok(path)
    }
}

/// `result-<date>-<time>.json`
pub fn result_file_name(timestamp: DateTime<Utc>) -> String {
    format!("result-{}.json", timestamp.format("%Y-%m-%d-%H:%M:%S"))
}

/// Serialize results to pretty-printed JSON
fn serialize_result(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize results to JSON")
}

/// Read a previously stored result
pub fn load(path: &Path) -> Result<AnalysisResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))
}
