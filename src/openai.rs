use crate::config::OracleConfig;
use crate::oracle::{OracleError, OracleRequest, TextOracle};
use crate::prompts::{SYSTEM_PROMPT, render_user_message};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

/// Oracle backed by an OpenAI-compatible chat completion endpoint, with rate limiting
pub struct OpenAiOracle {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    rate_limit_rps: f64,
    timeout: Duration,
    /// Time of the last request sent
    last_request: Mutex<Option<Instant>>,
}

impl OpenAiOracle {
    /// Create the oracle, reading the API key from the configured environment variable
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", config.env_var_api_key))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.api_endpoint);

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            rate_limit_rps: config.rate_limit_rps,
            timeout: Duration::from_secs(config.timeout_secs),
            last_request: Mutex::new(None),
        })
    }

    /// Enforce rate limiting for API requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / rate_limit_rps);

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Build the chat completion request
    fn build_request(&self, request: &OracleRequest) -> Result<CreateChatCompletionRequest, OracleError> {
        let system_message = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT.to_string())
            .build()
            .map_err(|e| OracleError::Unreachable(format!("failed to build system message: {}", e)))?
            .into();

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(render_user_message(request))
            .build()
            .map_err(|e| OracleError::Unreachable(format!("failed to build user message: {}", e)))?
            .into();

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([system_message, user_message])
            .temperature(self.temperature as f32)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| OracleError::Unreachable(format!("failed to build chat completion request: {}", e)))
    }

    /// Extract the first choice's text, empty when the model returned none
    fn extract_content(response: CreateChatCompletionResponse) -> String {
        match response.choices.first() {
            Some(choice) => match &choice.message.content {
                Some(content) => content.clone(),
                None => String::new(),
            },
            None => String::new(),
        }
    }
}

#[async_trait]
impl TextOracle for OpenAiOracle {
    async fn query(&self, request: &OracleRequest) -> Result<String, OracleError> {
        {
            let mut last_request = self.last_request.lock().await;
            Self::enforce_rate_limit(&mut last_request, self.rate_limit_rps).await;
        }

        let chat_request = self.build_request(request)?;
        tracing::debug!(kind = ?request.kind, model = %self.model, "Sending oracle request");

        let response = timeout(self.timeout, self.client.chat().create(chat_request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))?
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Oracle response received"
            );
        }

        Ok(Self::extract_content(response))
    }
}
