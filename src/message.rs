use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    // Side channel for credentials; never forwarded to the oracle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    // Role and content only.
    pub fn stripped(&self) -> Self {
        Self::new(self.role, self.content.clone())
    }
}

/// Everything the hosting runtime hands over for one invocation, oldest message first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub messages: Vec<ChatMessage>,
    // Invoker identity attached to the call context by the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_account_id: Option<String>,
}

impl InboundRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        InboundRequest {
            messages,
            signer_account_id: None,
        }
    }

    // A bare state object becomes a single user message.
    pub fn from_state(state: &Value) -> Self {
        Self::new(vec![ChatMessage::user(state.to_string())])
    }

    pub fn with_signer(mut self, signer: impl Into<String>) -> Self {
        self.signer_account_id = Some(signer.into());
        self
    }

    pub fn first(&self) -> Option<&ChatMessage> {
        self.messages.first()
    }

    pub fn state_index(&self) -> Option<usize> {
        self.messages.iter().position(|m| m.role == Role::User)
    }
}
