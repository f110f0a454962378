use crate::models::{Conversation, Vocabulary};
use crate::oracle::{OracleError, TextOracle, json_type_name, parse_json_object};
use crate::prompts::{EXTRACT_THEMES, EXTRACT_TOPICS, Prompt};
use serde_json::{Value, json};

/// Field of the extraction answer holding the newly observed labels
const VALUES_FIELD: &str = "values";

/// Builds a vocabulary in one pass by asking the oracle about each conversation
/// in turn, showing it everything discovered so far.
pub struct VocabularyAggregator<'a> {
    oracle: &'a dyn TextOracle,
    prompt: &'static Prompt,
}

impl<'a> VocabularyAggregator<'a> {
    pub fn new(oracle: &'a dyn TextOracle, prompt: &'static Prompt) -> Self {
        Self { oracle, prompt }
    }

    /// Aggregator that discovers conversation topics
    pub fn topics(oracle: &'a dyn TextOracle) -> Self {
        Self::new(oracle, &EXTRACT_TOPICS)
    }

    /// Aggregator that discovers conversation themes
    pub fn themes(oracle: &'a dyn TextOracle) -> Self {
        Self::new(oracle, &EXTRACT_THEMES)
    }

    /// Run one pass over `records` and return the resulting vocabulary.
    ///
    /// A record whose oracle call fails or whose answer cannot be parsed
    /// contributes nothing; the pass always reaches the end of `records`.
    pub async fn aggregate<I>(&self, records: I) -> Vocabulary
    where
        I: IntoIterator<Item = Conversation>,
    {
        let mut vocabulary = Vocabulary::new();
        let mut processed = 0;

        for (index, record) in records.into_iter().enumerate() {
            let labels = self.extract(index, &record, &vocabulary).await;
            for label in labels {
                vocabulary.record(&label);
            }
            processed += 1;
        }

        tracing::info!(
            kind = ?self.prompt.kind,
            records = processed,
            labels = vocabulary.len(),
            "Vocabulary pass finished"
        );
        vocabulary
    }

    /// Ask the oracle for the labels of one record
    async fn extract(&self, index: usize, record: &Conversation, vocabulary: &Vocabulary) -> Vec<String> {
        tracing::debug!(kind = ?self.prompt.kind, record = index, known = vocabulary.len(), "Extracting labels");

        let request = self.prompt.request(json!({
            "conversation": record.transcript(),
            "previous": vocabulary.labels(),
        }));

        let response = match self.oracle.query(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(kind = ?self.prompt.kind, record = index, error = %e, "Oracle call failed");
                return Vec::new();
            }
        };

        match parse_values(index, &response) {
            Ok(values) => values,
            Err(e) => {
                tracing::error!(
                    kind = ?self.prompt.kind,
                    record = index,
                    error = %e,
                    response = %response,
                    "Discarding unusable oracle response"
                );
                Vec::new()
            }
        }
    }
}

/// Pull the `values` array out of an extraction answer
fn parse_values(index: usize, response: &str) -> Result<Vec<String>, OracleError> {
    let object = parse_json_object(response)?;

    let values = match object.get(VALUES_FIELD) {
        Some(Value::Array(values)) => values,
        Some(other) => {
            return Err(OracleError::Malformed(format!(
                "`{}` is {}, expected an array",
                VALUES_FIELD,
                json_type_name(other)
            )));
        }
        None => {
            return Err(OracleError::Malformed(format!("missing `{}` field", VALUES_FIELD)));
        }
    };

    Ok(values
        .iter()
        .filter_map(|value| match value.as_str() {
            Some(label) => Some(label.to_string()),
            None => {
                tracing::warn!(record = index, value = %value, "Ignoring non-string label");
                None
            }
        })
        .collect())
}
