use serde::Serialize;
use serde_json::{Map, Value};

use crate::character::{ScenarioAnswer, ScenarioOption, TraitSet};
use crate::error::{CoerceError, InputError};
use crate::pipeline::{Operation, OperationKind};
use crate::prompts::UPDATER_INSTRUCTION;
use crate::schema::{self, SchemaVersion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub stats: TraitSet,
    pub questions: Vec<ScenarioAnswer>,
}

impl UpdateRequest {
    // Answers that cannot be tied to one of their options carry no influence.
    pub fn neutral_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.selected_option().is_none())
            .count()
    }
}

// Forwarded shape of a question. Unusable answers are nulled and flagged.
#[derive(Serialize)]
struct RenderedQuestion<'a> {
    question: &'a str,
    options: &'a [ScenarioOption],
    answered: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    neutral: bool,
}

#[derive(Serialize)]
struct RenderedRequest<'a> {
    stats: &'a TraitSet,
    questions: Vec<RenderedQuestion<'a>>,
}

// Malformed entries degrade to a neutral question instead of failing the call.
fn lenient_answer(item: Value) -> ScenarioAnswer {
    let question = item
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(item).unwrap_or_else(|e| {
        log::warn!("Treating malformed scenario answer as neutral: {e}");
        ScenarioAnswer {
            question,
            options: Vec::new(),
            answered: None,
        }
    })
}

/// Revises a TraitSet from answered scenario questions.
///
/// Direction and magnitude of change are left to the oracle; the only thing this layer
/// guarantees is five keys, each clamped to `[0, 10000]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraitUpdater;

impl Operation for TraitUpdater {
    const KIND: OperationKind = OperationKind::Update;
    const INSTRUCTION: &'static str = UPDATER_INSTRUCTION;

    type Input = UpdateRequest;
    type Output = TraitSet;

    fn parse(&self, state: Value) -> Result<Self::Input, InputError> {
        let Value::Object(mut state) = state else {
            return Err(InputError::NotAnObject);
        };

        let stats = match state.remove("stats") {
            Some(Value::Object(stats)) => schema::trait_set(&stats, SchemaVersion::V1)
                .map_err(|e| InputError::InvalidStats(e.to_string()))?,
            Some(_) => return Err(InputError::InvalidStats("expected an object".into())),
            None => return Err(InputError::MissingField("stats".into())),
        };

        let questions = match state.remove("questions") {
            Some(Value::Array(items)) => items.into_iter().map(lenient_answer).collect(),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                log::warn!("Ignoring non-list questions field: {other}");
                Vec::new()
            }
        };

        let request = UpdateRequest { stats, questions };
        let neutral = request.neutral_count();
        if neutral > 0 {
            log::info!(
                "{neutral} of {} scenario answer(s) left neutral",
                request.questions.len()
            );
        }
        Ok(request)
    }

    fn render(&self, input: &Self::Input) -> Result<String, InputError> {
        let questions = input
            .questions
            .iter()
            .map(|q| {
                let selected = q.selected_option();
                RenderedQuestion {
                    question: &q.question,
                    options: &q.options,
                    answered: selected.map(|o| o.id),
                    neutral: selected.is_none(),
                }
            })
            .collect();
        let rendered = RenderedRequest {
            stats: &input.stats,
            questions,
        };
        Ok(serde_json::to_string(&rendered)?)
    }

    fn validate(
        &self,
        _input: &Self::Input,
        object: &Map<String, Value>,
        version: SchemaVersion,
    ) -> Result<Self::Output, CoerceError> {
        schema::trait_set(object, version)
    }
}
