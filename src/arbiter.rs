use serde_json::{Map, Value};

use crate::character::{MoveDecision, RoundState};
use crate::error::{CoerceError, InputError};
use crate::fallback;
use crate::pipeline::{Operation, OperationKind};
use crate::prompts::ARBITER_INSTRUCTION;
use crate::schema::{self, SchemaVersion};

/// Picks exactly one move per combatant for the current round.
///
/// The choice itself is the oracle's; the arbiter guarantees that both combatants get
/// a move, that each move is a literal member of the round's moveset, and that the
/// decision object carries no other keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveArbiter;

impl Operation for MoveArbiter {
    const KIND: OperationKind = OperationKind::Arbitrate;
    const INSTRUCTION: &'static str = ARBITER_INSTRUCTION;

    type Input = RoundState;
    type Output = MoveDecision;

    fn parse(&self, state: Value) -> Result<Self::Input, InputError> {
        RoundState::from_value(state)
    }

    fn render(&self, input: &Self::Input) -> Result<String, InputError> {
        Ok(serde_json::to_string(input)?)
    }

    fn validate(
        &self,
        input: &Self::Input,
        object: &Map<String, Value>,
        version: SchemaVersion,
    ) -> Result<Self::Output, CoerceError> {
        schema::move_decision(object, input, version)
    }

    fn fallback(&self, input: &Self::Input) -> Option<Self::Output> {
        Some(fallback::choose_moves(input))
    }
}
