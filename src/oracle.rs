//! Text oracle contract: the request shape, failure modes, and the
//! defensive JSON parsing every caller applies to oracle output.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Which task a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Topics,
    Themes,
    Label,
}

/// A single instruction sent to the oracle
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub kind: PromptKind,
    /// Natural-language task description
    pub instruction: &'static str,
    /// Field name to type description of the payload
    pub input_schema: Value,
    /// Field name to type description of the expected answer
    pub output_schema: Value,
    /// The data to analyze
    pub payload: Value,
}

/// Errors from oracle calls and oracle output parsing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unreachable: {0}")]
    Unreachable(String),
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

/// A service that answers instructions with text that should be a JSON object.
///
/// Implementations make no promise that the text parses; callers run it
/// through [`parse_json_object`].
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn query(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Parse oracle output as a JSON object, tolerating surrounding prose
pub fn parse_json_object(response: &str) -> Result<Map<String, Value>, OracleError> {
    let parsed = match serde_json::from_str::<Value>(response) {
        Ok(parsed) => parsed,
        Err(_) => try_extract_embedded_json(response)?,
    };

    match parsed {
        Value::Object(object) => Ok(object),
        other => Err(OracleError::Malformed(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Try to extract JSON that might be embedded in text
fn try_extract_embedded_json(response: &str) -> Result<Value, OracleError> {
    match response.find('{') {
        Some(start) => match response.rfind('}') {
            Some(end) if end > start => serde_json::from_str(&response[start..=end])
                .map_err(|e| OracleError::Malformed(format!("failed to parse extracted JSON: {}", e))),
            _ => Err(OracleError::Malformed(
                "found opening brace but no closing brace in response".to_string(),
            )),
        },
        None => Err(OracleError::Malformed("no JSON found in response".to_string())),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays canned responses per prompt kind; the last scripted answer
    /// repeats once the script runs out.
    #[derive(Default)]
    pub struct ScriptedOracle {
        scripts: Mutex<HashMap<PromptKind, VecDeque<Result<String, OracleError>>>>,
        requests: Mutex<Vec<OracleRequest>>,
    }

    impl ScriptedOracle {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, kind: PromptKind, response: impl Into<String>) -> Self {
            self.push(kind, Ok(response.into()));
            self
        }

        pub fn fail(mut self, kind: PromptKind, error: OracleError) -> Self {
            self.push(kind, Err(error));
            self
        }

        fn push(&mut self, kind: PromptKind, answer: Result<String, OracleError>) {
            self.scripts
                .get_mut()
                .unwrap()
                .entry(kind)
                .or_default()
                .push_back(answer);
        }

        /// Every request received so far, in call order
        pub fn requests(&self) -> Vec<OracleRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn requests_for(&self, kind: PromptKind) -> Vec<OracleRequest> {
            self.requests()
                .into_iter()
                .filter(|request| request.kind == kind)
                .collect()
        }
    }

    #[async_trait]
    impl TextOracle for ScriptedOracle {
        async fn query(&self, request: &OracleRequest) -> Result<String, OracleError> {
            self.requests.lock().unwrap().push(request.clone());

            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&request.kind) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => Err(OracleError::Unreachable(format!(
                    "no scripted response for {:?}",
                    request.kind
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let object = parse_json_object(r#"{"values": ["a", "b"]}"#).unwrap();
        assert_eq!(object["values"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_parse_object_inside_markdown_fence() {
        let response = "```json\n{\"topic\": \"layoffs\"}\n```";
        let object = parse_json_object(response).unwrap();
        assert_eq!(object["topic"], "layoffs");
    }

    #[test]
    fn test_parse_object_with_surrounding_prose() {
        let response = r#"Here you go: {"values": []} Hope that helps."#;
        assert!(parse_json_object(response).is_ok());
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        let err = parse_json_object("I cannot help with that").unwrap_err();
        assert_eq!(
            err,
            OracleError::Malformed("no JSON found in response".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_unclosed_object() {
        let err = parse_json_object(r#"{"values": ["a""#).unwrap_err();
        assert!(err.to_string().contains("no closing brace"));
    }

    #[test]
    fn test_parse_rejects_non_object_json() {
        let err = parse_json_object(r#"["a", "b"]"#).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_parse_rejects_broken_embedded_json() {
        let err = parse_json_object("prefix { not json } suffix").unwrap_err();
        assert!(err.to_string().contains("failed to parse extracted JSON"));
    }

    #[tokio::test]
    async fn test_scripted_oracle_repeats_last_answer() {
        use scripted::ScriptedOracle;

        let oracle = ScriptedOracle::new()
            .respond(PromptKind::Themes, "first")
            .respond(PromptKind::Themes, "second");
        let request = OracleRequest {
            kind: PromptKind::Themes,
            instruction: "test",
            input_schema: Value::Null,
            output_schema: Value::Null,
            payload: Value::Null,
        };

        assert_eq!(oracle.query(&request).await.unwrap(), "first");
        assert_eq!(oracle.query(&request).await.unwrap(), "second");
        assert_eq!(oracle.query(&request).await.unwrap(), "second");
        assert_eq!(oracle.requests().len(), 3);

        let topics = OracleRequest {
            kind: PromptKind::Topics,
            ..request
        };
        assert!(oracle.query(&topics).await.is_err());
    }
}
