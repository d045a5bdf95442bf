use std::future::Future;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use tokio::time::{Duration, Instant, timeout};

use crate::error::OracleError;
use crate::message::{ChatMessage, Role};
use crate::settings::Settings;

/// The non-deterministic reasoning step: an ordered list of role-tagged messages in,
/// one free-form reply out.
///
/// Implementors only need to be shareable; the pipeline holds no other state.
/// Tests substitute a deterministic stub.
pub trait ReasoningOracle: Send + Sync {
    fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

impl<T: ReasoningOracle> ReasoningOracle for std::sync::Arc<T> {
    fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<String, OracleError>> + Send {
        (**self).complete(messages)
    }
}

// Tuning knobs that change oracle behavior, never the contract shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleTuning {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&Settings> for OracleTuning {
    fn from(settings: &Settings) -> Self {
        OracleTuning {
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(settings.oracle_timeout_secs),
        }
    }
}

pub struct OpenAiOracle {
    // None until a key is configured; every call then reports the oracle unavailable.
    client: Option<Client<OpenAIConfig>>,
    tuning: OracleTuning,
}

impl OpenAiOracle {
    pub fn new(api_key: &str, tuning: OracleTuning) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(api_key);
        OpenAiOracle {
            client: Some(Client::with_config(openai_config)),
            tuning,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        match settings.openai_api_key.as_deref() {
            Some(api_key) => Self::new(api_key, OracleTuning::from(settings)),
            None => {
                log::warn!("No OpenAI API key configured, oracle calls will fail");
                OpenAiOracle {
                    client: None,
                    tuning: OracleTuning::from(settings),
                }
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, OracleError> {
        let content = message.content.as_str();
        let built: ChatCompletionRequestMessage = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()?
                .into(),
        };
        Ok(built)
    }
}

impl ReasoningOracle for OpenAiOracle {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let Some(client) = &self.client else {
            return Err(OracleError::Unavailable("no OpenAI API key configured".into()));
        };
        let request_messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>, _>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.tuning.model)
            .messages(request_messages)
            .temperature(self.tuning.temperature)
            .max_completion_tokens(self.tuning.max_tokens)
            .build()?;

        let start_time = Instant::now();
        let response = timeout(self.tuning.timeout, client.chat().create(request))
            .await
            .map_err(|_| OracleError::Timeout)??;
        log::debug!(
            "Oracle {} answered in {:?}",
            self.tuning.model,
            start_time.elapsed()
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::Empty)
    }
}
