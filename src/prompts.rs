use crate::oracle::{OracleRequest, PromptKind};
use serde_json::{Map, Value};

/// System message sent with every request
pub const SYSTEM_PROMPT: &str = "You must respond strictly in JSON format. Do not include extra text. \
Every response must be a single valid JSON object, not markdown.";

/// A task template: instruction plus the shapes of its input and output
#[derive(Debug)]
pub struct Prompt {
    pub kind: PromptKind,
    pub instruction: &'static str,
    pub inputs: &'static [(&'static str, &'static str)],
    pub outputs: &'static [(&'static str, &'static str)],
}

pub static EXTRACT_TOPICS: Prompt = Prompt {
    kind: PromptKind::Topics,
    instruction: "Conversations are given to you one at a time. Extract the most common topics \
of the current conversation. Topics listed in `previous` were already extracted from earlier \
conversations: reuse their exact wording when the same topic appears and do not add near-duplicates. \
Return the topics of this conversation as a JSON array in the format given below.",
    inputs: &[("conversation", "string"), ("previous", "string[]")],
    outputs: &[("values", "string[]")],
};

pub static EXTRACT_THEMES: Prompt = Prompt {
    kind: PromptKind::Themes,
    instruction: "Conversations are given to you one at a time. Extract the most common themes \
of the current conversation. Themes listed in `previous` were already extracted from earlier \
conversations: reuse their exact wording when the same theme appears and do not add near-duplicates. \
Return the themes of this conversation as a JSON array in the format given below.",
    inputs: &[("conversation", "string"), ("previous", "string[]")],
    outputs: &[("values", "string[]")],
};

pub static LABEL_CONVERSATION: Prompt = Prompt {
    kind: PromptKind::Label,
    instruction: "Analyze this conversation.\n\
1. Identify the primary topic, choosing only from `common_topics`.\n\
2. Identify up to 3 key themes, choosing only from `common_themes`.\n\
3. Estimate the user feedback score as a float from 0.0 to 1.0.\n\
4. Estimate the success score of the conversation as a float from 0.0 to 1.0.",
    inputs: &[
        ("conversation", "string"),
        ("common_topics", "string[]"),
        ("common_themes", "string[]"),
    ],
    outputs: &[
        ("feedback_score", "float"),
        ("success_score", "float"),
        ("topic", "string"),
        ("themes", "string[]"),
    ],
};

impl Prompt {
    /// Build a request for this task around `payload`
    pub fn request(&self, payload: Value) -> OracleRequest {
        OracleRequest {
            kind: self.kind,
            instruction: self.instruction,
            input_schema: schema(self.inputs),
            output_schema: schema(self.outputs),
            payload,
        }
    }
}

fn schema(fields: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|(name, kind)| (name.to_string(), Value::String(kind.to_string())))
        .collect();
    Value::Object(map)
}

/// Render the user message for a chat-style oracle
pub fn render_user_message(request: &OracleRequest) -> String {
    format!(
        "{}\n\nReturn JSON formatted string: {}\n\nInputs:\n{}\n{}",
        request.instruction, request.output_schema, request.input_schema, request.payload
    )
}
