use serde::de::{self, MapAccess, Visitor};
use serde_json::Value;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Split identifier used when a record carries no metadata
pub const DEFAULT_DATASET_SPLIT: &str = "base";
/// Model-type identifier used when a record carries no metadata
pub const DEFAULT_MODEL_TYPE: &str = "chat";

/// A single utterance within a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker identifier, e.g. "user" or "assistant"
    pub role: String,
    /// What the speaker said
    pub text: String,
}

impl Turn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

/// A recorded conversation as read from the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Dataset split the record came from
    pub dataset_split: String,
    /// Kind of model that produced the outputs
    pub model_type: String,
    /// Turns sent to the model
    pub inputs: Vec<Turn>,
    /// Turns produced by the model
    pub outputs: Vec<Turn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            dataset_split: DEFAULT_DATASET_SPLIT.to_string(),
            model_type: DEFAULT_MODEL_TYPE.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl Conversation {
    /// Create a conversation with default provenance metadata
    pub fn new(inputs: Vec<Turn>, outputs: Vec<Turn>) -> Self {
        Self {
            inputs,
            outputs,
            ..Self::default()
        }
    }

    /// Number of input turns
    pub fn length(&self) -> usize {
        self.inputs.len()
    }

    /// Render input turns followed by output turns, one `role: text` line each
    pub fn transcript(&self) -> String {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|turn| format!("{}: {}", turn.role, turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Frequency-counted set of labels discovered during one aggregation pass.
///
/// Labels keep their first-discovery order, which is the order used both for
/// candidate lists handed to the labeler and for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `label`, returning its new frequency
    pub fn record(&mut self, label: &str) -> u64 {
        match self.counts.get_mut(label) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => {
                self.order.push(label.to_string());
                self.counts.insert(label.to_string(), 1);
                1
            }
        }
    }

    /// Frequency of `label`, if it has been seen
    pub fn count(&self, label: &str) -> Option<u64> {
        self.counts.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.counts.contains_key(label)
    }

    /// Labels in first-discovery order
    pub fn labels(&self) -> Vec<String> {
        self.order.clone()
    }

    /// (label, frequency) pairs in first-discovery order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.order
            .iter()
            .map(|label| (label.as_str(), self.counts[label]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn set_count(&mut self, label: String, count: u64) {
        if !self.counts.contains_key(&label) {
            self.order.push(label.clone());
        }
        self.counts.insert(label, count);
    }
}

impl<const N: usize> From<[(&str, u64); N]> for Vocabulary {
    fn from(entries: [(&str, u64); N]) -> Self {
        let mut vocabulary = Vocabulary::new();
        for (label, count) in entries {
            vocabulary.set_count(label.to_string(), count);
        }
        vocabulary
    }
}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VocabularyVisitor;

        impl<'de> Visitor<'de> for VocabularyVisitor {
            type Value = Vocabulary;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of label to frequency")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Vocabulary, A::Error> {
                let mut vocabulary = Vocabulary::new();
                while let Some((label, count)) = access.next_entry::<String, u64>()? {
                    vocabulary.set_count(label, count);
                }
                Ok(vocabulary)
            }
        }

        deserializer.deserialize_map(VocabularyVisitor)
    }
}

/// Classification of a conversation the oracle answered in the expected shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Number of input turns in the conversation
    pub length: usize,
    /// Estimated user feedback (0.0 to 1.0)
    pub feedback_score: f64,
    /// Estimated success of the conversation (0.0 to 1.0)
    pub success_score: f64,
    /// Primary topic, picked from the topic vocabulary
    pub topic: String,
    /// Up to three themes, picked from the theme vocabulary
    pub themes: Vec<String>,
}

/// Fallback kept when the oracle answer could not be used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradedLabel {
    /// Number of input turns in the conversation
    pub length: usize,
    /// Verbatim oracle output, empty when the oracle produced nothing
    pub response_content: String,
    /// Why the response was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-conversation labeling outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LabelResult {
    Complete(Labels),
    Degraded(DegradedLabel),
}

/// Error attached to stored entries that match neither variant
const INCOMPLETE_ENTRY: &str = "stored entry has incomplete labels";

impl<'de> Deserialize<'de> for LabelResult {
    /// Entries that match neither shape but carry a `length` load as degraded,
    /// with the entry itself kept as the response content.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entry = Value::deserialize(deserializer)?;

        if let Ok(labels) = Labels::deserialize(&entry) {
            return Ok(LabelResult::Complete(labels));
        }
        if let Ok(degraded) = DegradedLabel::deserialize(&entry) {
            return Ok(LabelResult::Degraded(degraded));
        }

        let length = entry
            .get("length")
            .and_then(Value::as_u64)
            .ok_or_else(|| <D::Error as de::Error>::custom("label entry has no `length`"))?;
        Ok(LabelResult::degraded(
            length as usize,
            entry.to_string(),
            Some(INCOMPLETE_ENTRY.to_string()),
        ))
    }
}

impl LabelResult {
    pub fn degraded(length: usize, response_content: String, error: Option<String>) -> Self {
        LabelResult::Degraded(DegradedLabel {
            length,
            response_content,
            error,
        })
    }

    pub fn length(&self) -> usize {
        match self {
            LabelResult::Complete(labels) => labels.length,
            LabelResult::Degraded(degraded) => degraded.length,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, LabelResult::Degraded(_))
    }

    pub fn as_complete(&self) -> Option<&Labels> {
        match self {
            LabelResult::Complete(labels) => Some(labels),
            LabelResult::Degraded(_) => None,
        }
    }
}

/// Vocabularies discovered by the aggregation passes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commons {
    pub topics: Vocabulary,
    pub themes: Vocabulary,
}

/// Final artifact of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One entry per input conversation, in source order
    pub data: Vec<LabelResult>,
    pub commons: Commons,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcript_renders_inputs_then_outputs() {
        let conversation = Conversation::new(
            vec![Turn::new("system", "Be kind"), Turn::new("user", "Hi")],
            vec![Turn::new("assistant", "Hello")],
        );

        assert_eq!(
            conversation.transcript(),
            "system: Be kind\nuser: Hi\nassistant: Hello"
        );
        assert_eq!(conversation.length(), 2);
    }

    #[test]
    fn test_empty_conversation() {
        let conversation = Conversation::default();
        assert_eq!(conversation.transcript(), "");
        assert_eq!(conversation.length(), 0);
        assert_eq!(conversation.dataset_split, "base");
        assert_eq!(conversation.model_type, "chat");
    }

    #[test]
    fn test_vocabulary_record_counts() {
        let mut vocabulary = Vocabulary::new();
        assert_eq!(vocabulary.record("layoffs"), 1);
        assert_eq!(vocabulary.record("promotion"), 1);
        assert_eq!(vocabulary.record("layoffs"), 2);

        assert_eq!(vocabulary.count("layoffs"), Some(2));
        assert_eq!(vocabulary.count("promotion"), Some(1));
        assert_eq!(vocabulary.count("salary"), None);
        assert_eq!(vocabulary.labels(), vec!["layoffs", "promotion"]);
        assert_eq!(vocabulary.len(), 2);
    }

    #[test]
    fn test_vocabulary_labels_are_verbatim() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.record("Layoffs");
        vocabulary.record("layoffs");
        vocabulary.record("layoffs ");

        assert_eq!(vocabulary.len(), 3);
    }

    #[test]
    fn test_vocabulary_serializes_in_discovery_order() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.record("zeta");
        vocabulary.record("alpha");
        vocabulary.record("zeta");

        let serialized = serde_json::to_string(&vocabulary).unwrap();
        assert_eq!(serialized, r#"{"zeta":2,"alpha":1}"#);

        let restored: Vocabulary = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored, vocabulary);
    }

    #[test]
    fn test_label_result_wire_shape() {
        let complete = LabelResult::Complete(Labels {
            length: 3,
            feedback_score: 0.8,
            success_score: 0.6,
            topic: "layoffs".to_string(),
            themes: vec!["tension".to_string()],
        });
        assert_eq!(
            serde_json::to_value(&complete).unwrap(),
            json!({
                "length": 3,
                "feedback_score": 0.8,
                "success_score": 0.6,
                "topic": "layoffs",
                "themes": ["tension"],
            })
        );

        let degraded = LabelResult::degraded(2, "not json".to_string(), None);
        assert_eq!(
            serde_json::to_value(&degraded).unwrap(),
            json!({"length": 2, "response_content": "not json"})
        );
    }

    #[test]
    fn test_label_result_deserializes_both_variants() {
        let data: Vec<LabelResult> = serde_json::from_value(json!([
            {"length": 1, "feedback_score": 0.5, "success_score": 0.4, "topic": "t", "themes": []},
            {"length": 4, "response_content": "oops", "error": "bad"},
        ]))
        .unwrap();

        assert!(!data[0].is_degraded());
        assert_eq!(data[0].as_complete().unwrap().topic, "t");
        assert!(data[1].is_degraded());
        assert_eq!(data[1].length(), 4);
    }

    #[test]
    fn test_partial_label_entry_loads_as_degraded() {
        let data: Vec<LabelResult> = serde_json::from_value(json!([
            {"length": 2, "topic": "layoffs"},
            {"length": 3, "feedback_score": 0.5, "success_score": 0.4, "topic": "t"},
        ]))
        .unwrap();

        match &data[0] {
            LabelResult::Degraded(degraded) => {
                assert_eq!(degraded.length, 2);
                assert_eq!(
                    serde_json::from_str::<Value>(&degraded.response_content).unwrap(),
                    json!({"length": 2, "topic": "layoffs"})
                );
                assert_eq!(degraded.error.as_deref(), Some(INCOMPLETE_ENTRY));
            }
            other => panic!("expected degraded entry, got {:?}", other),
        }
        assert!(data[1].is_degraded());
        assert_eq!(data[1].length(), 3);
    }

    #[test]
    fn test_label_entry_without_length_is_rejected() {
        let result = serde_json::from_value::<LabelResult>(json!({"topic": "layoffs"}));
        assert!(result.unwrap_err().to_string().contains("no `length`"));
    }
}
