use crate::config::VocabularyPolicy;
use crate::models::{Conversation, LabelResult, Labels};
use crate::oracle::{OracleError, TextOracle, parse_json_object};
use crate::prompts::LABEL_CONVERSATION;
use serde::Deserialize;
use serde_json::{Value, json};

/// Most themes kept per conversation
pub const MAX_THEMES: usize = 3;

/// Labeling answer as the oracle is asked to return it
#[derive(Debug, Deserialize)]
struct LabelResponse {
    topic: String,
    themes: Vec<String>,
    feedback_score: f64,
    success_score: f64,
}

/// Classifies conversations against closed topic and theme vocabularies
pub struct Labeler<'a> {
    oracle: &'a dyn TextOracle,
    policy: VocabularyPolicy,
}

impl<'a> Labeler<'a> {
    pub fn new(oracle: &'a dyn TextOracle, policy: VocabularyPolicy) -> Self {
        Self { oracle, policy }
    }

    /// Label one conversation with a single oracle call.
    ///
    /// Never fails: an unusable answer yields [`LabelResult::Degraded`] holding
    /// the raw oracle text. `length` always comes from the record itself.
    pub async fn label(
        &self,
        index: usize,
        record: &Conversation,
        topics: &[String],
        themes: &[String],
    ) -> LabelResult {
        let length = record.length();
        let request = LABEL_CONVERSATION.request(json!({
            "conversation": record.transcript(),
            "common_topics": topics,
            "common_themes": themes,
        }));

        let response = match self.oracle.query(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(record = index, error = %e, "Labeling call failed");
                return LabelResult::degraded(length, String::new(), Some(e.to_string()));
            }
        };

        match parse_label_response(&response) {
            Ok(parsed) => self.finish(index, length, parsed, topics, themes, response),
            Err(e) => {
                tracing::error!(record = index, error = %e, response = %response, "Unparseable labeling response");
                LabelResult::degraded(length, response, Some(e.to_string()))
            }
        }
    }

    fn finish(
        &self,
        index: usize,
        length: usize,
        parsed: LabelResponse,
        topics: &[String],
        themes: &[String],
        response: String,
    ) -> LabelResult {
        let topic_known = topics.contains(&parsed.topic);
        if !topic_known {
            tracing::warn!(record = index, topic = %parsed.topic, "Topic is not in the discovered vocabulary");
        }

        let mut chosen = parsed.themes;
        for theme in chosen.iter().filter(|theme| !themes.contains(theme)) {
            tracing::warn!(record = index, theme = %theme, "Theme is not in the discovered vocabulary");
        }

        if self.policy == VocabularyPolicy::Strict {
            if !topic_known {
                return LabelResult::degraded(
                    length,
                    response,
                    Some(format!("topic '{}' is not in the topic vocabulary", parsed.topic)),
                );
            }
            chosen.retain(|theme| themes.contains(theme));
        }

        if chosen.len() > MAX_THEMES {
            tracing::warn!(record = index, count = chosen.len(), "Too many themes, keeping the first {}", MAX_THEMES);
            chosen.truncate(MAX_THEMES);
        }

        LabelResult::Complete(Labels {
            length,
            feedback_score: clamp_score(index, "feedback_score", parsed.feedback_score),
            success_score: clamp_score(index, "success_score", parsed.success_score),
            topic: parsed.topic,
            themes: chosen,
        })
    }
}

fn parse_label_response(response: &str) -> Result<LabelResponse, OracleError> {
    let object = parse_json_object(response)?;
    serde_json::from_value(Value::Object(object))
        .map_err(|e| OracleError::Malformed(format!("unexpected labeling answer: {}", e)))
}

fn clamp_score(index: usize, field: &str, score: f64) -> f64 {
    let clamped = score.clamp(0.0, 1.0);
    if clamped != score {
        tracing::warn!(record = index, field, score, "Score out of range, clamped");
    }
    clamped
}
