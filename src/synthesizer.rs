use serde_json::{Map, Value};

use crate::character::{Ability, Trait, TraitProfile};
use crate::error::{CoerceError, InputError};
use crate::pipeline::{Operation, OperationKind};
use crate::prompts::SYNTHESIZER_INSTRUCTION;
use crate::schema::{self, SchemaVersion};

/// Five bounded traits and five ability names for a described character.
///
/// The oracle owns the values; this layer owns the shape. Since the description may
/// not carry any of the generated keys, and the contract admits no others, the output
/// never repeats an input key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraitSynthesizer;

impl Operation for TraitSynthesizer {
    const KIND: OperationKind = OperationKind::Synthesize;
    const INSTRUCTION: &'static str = SYNTHESIZER_INSTRUCTION;

    type Input = Map<String, Value>;
    type Output = TraitProfile;

    fn parse(&self, state: Value) -> Result<Self::Input, InputError> {
        let Value::Object(description) = state else {
            return Err(InputError::NotAnObject);
        };
        let reserved = Trait::keys().into_iter().chain(Ability::keys());
        if let Some(key) = reserved.into_iter().find(|k| description.contains_key(*k)) {
            return Err(InputError::ReservedKey(key.to_string()));
        }
        Ok(description)
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
        let profile = schema::trait_profile(object, version)?;
        // V2 already rejected foreign keys; V1 drops echoed ones.
        if let Some(echoed) = object.keys().find(|k| input.contains_key(k.as_str())) {
            log::debug!("Dropping echoed input key {echoed}");
        }
        Ok(profile)
    }
}
