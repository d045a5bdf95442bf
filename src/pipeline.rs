//! The per-invocation pipeline: authorize, build the instruction, consult the oracle,
//! coerce its reply, and fold every outcome into a single [`Reply`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::arbiter::MoveArbiter;
use crate::auth::AuthorizationGate;
use crate::coercer;
use crate::error::{AppError, CoerceError, InputError, OracleError};
use crate::message::{ChatMessage, InboundRequest};
use crate::oracle::ReasoningOracle;
use crate::schema::SchemaVersion;
use crate::settings::Settings;
use crate::synthesizer::TraitSynthesizer;
use crate::updater::TraitUpdater;

pub const FAILURE_MESSAGE: &str =
    "Sorry, I couldn't process that request. Please try again with valid input.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Synthesize,
    Update,
    Arbitrate,
}

/// One oracle-backed operation: how to read the caller's state, what to send,
/// and which contract the reply must satisfy.
pub trait Operation: Send + Sync {
    const KIND: OperationKind;
    const INSTRUCTION: &'static str;

    type Input: Send + Sync;
    type Output: Serialize;

    fn parse(&self, state: Value) -> Result<Self::Input, InputError>;

    // Content of the state-carrying user message as forwarded to the oracle.
    fn render(&self, input: &Self::Input) -> Result<String, InputError>;

    fn validate(
        &self,
        input: &Self::Input,
        object: &Map<String, Value>,
        version: SchemaVersion,
    ) -> Result<Self::Output, CoerceError>;

    // Local answer used when the oracle cannot produce one and fallback is enabled.
    fn fallback(&self, _input: &Self::Input) -> Option<Self::Output> {
        None
    }
}

/// What goes back to the hosting runtime. Never a mixture of prose and data.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Decision(Value),
    Refusal(String),
    Failure(String),
}

impl Reply {
    pub fn failure() -> Self {
        Reply::Failure(FAILURE_MESSAGE.to_string())
    }

    pub fn content(&self) -> String {
        match self {
            Reply::Decision(value) => value.to_string(),
            Reply::Refusal(text) | Reply::Failure(text) => text.clone(),
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, Reply::Decision(_))
    }

    pub fn as_decision(&self) -> Option<&Value> {
        match self {
            Reply::Decision(value) => Some(value),
            _ => None,
        }
    }
}

// Longest caller state that is searched for an embedded object when it is not bare JSON.
pub const MAX_EMBEDDED_STATE_LEN: usize = 16 * 1024;

// Caller state is normally bare JSON; tolerate it being fenced or wrapped in prose.
fn parse_state(content: &str) -> Result<Value, InputError> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => Ok(value),
        Err(e) if content.len() > MAX_EMBEDDED_STATE_LEN => Err(InputError::Json(e)),
        Err(e) => coercer::extract_object(content)
            .map(Value::Object)
            .map_err(|_| InputError::Json(e)),
    }
}

pub struct Pipeline<O> {
    oracle: O,
    gate: AuthorizationGate,
    settings: Settings,
}

impl<O: ReasoningOracle> Pipeline<O> {
    pub fn new(oracle: O, settings: Settings) -> Self {
        let gate = AuthorizationGate::new(settings.api_key.clone(), settings.game_master.clone());
        Pipeline {
            oracle,
            gate,
            settings,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn synthesize(&self, request: &InboundRequest) -> Reply {
        self.handle(&TraitSynthesizer, request).await
    }

    pub async fn update(&self, request: &InboundRequest) -> Reply {
        self.handle(&TraitUpdater, request).await
    }

    pub async fn arbitrate(&self, request: &InboundRequest) -> Reply {
        self.handle(&MoveArbiter, request).await
    }

    pub async fn dispatch(&self, kind: OperationKind, request: &InboundRequest) -> Reply {
        match kind {
            OperationKind::Synthesize => self.synthesize(request).await,
            OperationKind::Update => self.update(request).await,
            OperationKind::Arbitrate => self.arbitrate(request).await,
        }
    }

    /// Run `op` and convert every outcome into a reply. Never fails.
    pub async fn handle<Op: Operation>(&self, op: &Op, request: &InboundRequest) -> Reply {
        let invocation = Uuid::new_v4();
        log::info!(
            "[{invocation}] {} invoked with {} message(s)",
            Op::KIND,
            request.messages.len()
        );

        match self.run(op, request, &invocation).await {
            Ok(output) => match serde_json::to_value(&output) {
                Ok(value) => {
                    log::info!("[{invocation}] {} succeeded", Op::KIND);
                    Reply::Decision(value)
                }
                Err(e) => {
                    log::error!("[{invocation}] failed to serialize decision: {e}");
                    Reply::failure()
                }
            },
            Err(AppError::Denied(denied)) => {
                log::warn!("[{invocation}] {} denied: {denied}", Op::KIND);
                Reply::Refusal(denied.refusal().to_string())
            }
            Err(AppError::Schema(e)) => {
                log::warn!("[{invocation}] {} schema violation: {e}", Op::KIND);
                Reply::failure()
            }
            Err(e) => {
                log::error!("[{invocation}] {} failed: {e}", Op::KIND);
                Reply::failure()
            }
        }
    }

    /// Typed variant of [`Pipeline::handle`] for callers that want the error.
    pub async fn execute<Op: Operation>(
        &self,
        op: &Op,
        request: &InboundRequest,
    ) -> Result<Op::Output, AppError> {
        self.run(op, request, &Uuid::new_v4()).await
    }

    async fn run<Op: Operation>(
        &self,
        op: &Op,
        request: &InboundRequest,
        invocation: &Uuid,
    ) -> Result<Op::Output, AppError> {
        self.gate
            .check(self.settings.gates.for_operation(Op::KIND), request)?;

        let state_index = request.state_index().ok_or(InputError::NoUserMessage)?;
        let input = op.parse(parse_state(&request.messages[state_index].content)?)?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(Op::INSTRUCTION.trim()));
        for (i, message) in request.messages.iter().enumerate() {
            if i == state_index {
                messages.push(ChatMessage::user(op.render(&input)?));
            } else {
                messages.push(message.stripped());
            }
        }

        match self.consult(op, &input, &messages, invocation).await {
            Err(e @ (AppError::Oracle(_) | AppError::Schema(_)))
                if self.settings.fallback_on_oracle_failure =>
            {
                match op.fallback(&input) {
                    Some(output) => {
                        log::warn!("[{invocation}] {e}; answering with local fallback");
                        Ok(output)
                    }
                    None => Err(e),
                }
            }
            result => result,
        }
    }

    async fn consult<Op: Operation>(
        &self,
        op: &Op,
        input: &Op::Input,
        messages: &[ChatMessage],
        invocation: &Uuid,
    ) -> Result<Op::Output, AppError> {
        let attempts = if self.settings.retry_on_schema_violation { 2 } else { 1 };
        let version = self.settings.schema_version;

        for attempt in 1..=attempts {
            let raw = self.oracle.complete(messages).await?;
            if raw.trim().is_empty() {
                return Err(OracleError::Empty.into());
            }
            if self.settings.debug_mode {
                log::debug!("[{invocation}] oracle reply: {raw}");
            }

            match coercer::coerce(&raw, |object| op.validate(input, object, version)) {
                Ok(output) => return Ok(output),
                Err(e) if attempt < attempts => {
                    log::warn!("[{invocation}] schema violation on attempt {attempt}, retrying: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CoerceError::NoJson.into())
    }
}

