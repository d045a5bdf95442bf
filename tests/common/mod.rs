#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;

use rann_oracle::auth::API_KEY_METADATA;
use rann_oracle::{ChatMessage, InboundRequest, OracleError, ReasoningOracle, Settings};
use serde_json::Value;

pub const API_KEY: &str = "Rannbhoomi";
pub const GAME_MASTER: &str = "gamemaster.near";

// Scripted oracle that remembers every message list it was handed.
pub struct RecordingOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingOracle {
    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(results: Vec<Result<String, OracleError>>) -> Self {
        RecordingOracle {
            replies: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReasoningOracle for RecordingOracle {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(OracleError::Unavailable("no scripted reply".into())))
    }
}

pub fn fixture(name: &str) -> Value {
    let json_str = fs::read_to_string(format!("tests/fixtures/{name}"))
        .expect("Failed to read fixture file");
    serde_json::from_str(&json_str).expect("Failed to parse fixture JSON")
}

pub fn settings() -> Settings {
    Settings {
        api_key: Some(API_KEY.to_string()),
        game_master: Some(GAME_MASTER.to_string()),
        ..Settings::default()
    }
}

pub fn keyed_request(state: &Value, api_key: &str) -> InboundRequest {
    InboundRequest::new(vec![
        ChatMessage::user(state.to_string()).with_metadata(API_KEY_METADATA, api_key),
    ])
}
