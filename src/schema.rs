//! Output contracts for each operation.
//!
//! A contract is validated against a JSON object the coercer already pulled out of
//! the oracle's reply. Two schema versions exist:
//!
//! * `V1` is permissive: unknown keys are dropped, numbers may arrive as floats or
//!   numeric strings, a move may arrive wrapped as `{"move": "..."}`.
//! * `V2` is strict: the key set must match exactly and numbers must be integers.
//!
//! Both versions clamp trait values into `[0, 10000]`; nothing is ever wrapped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::character::{
    Ability, AbilityNames, MoveDecision, RoundState, Trait, TraitProfile, TraitSet, clamp_trait,
};
use crate::error::CoerceError;

pub const MAX_ABILITY_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V1,
    #[default]
    V2,
}

fn check_keys(
    object: &Map<String, Value>,
    expected: &[&str],
    version: SchemaVersion,
) -> Result<(), CoerceError> {
    if let Some(missing) = expected.iter().copied().find(|k| !object.contains_key(*k)) {
        return Err(CoerceError::MissingKey(missing.to_string()));
    }
    if version == SchemaVersion::V2 {
        if let Some(extra) = object.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(CoerceError::UnexpectedKey(extra.clone()));
        }
    } else if object.len() > expected.len() {
        log::debug!(
            "Dropping {} extra key(s) under schema v1",
            object.len() - expected.len()
        );
    }
    Ok(())
}

fn trait_value(key: &str, value: &Value, version: SchemaVersion) -> Result<u32, CoerceError> {
    let raw = match (value, version) {
        (Value::Number(n), _) if n.is_i64() || n.is_u64() => n.as_i64().unwrap_or(i64::MAX),
        (Value::Number(n), SchemaVersion::V1) => n
            .as_f64()
            .map(|f| f.round() as i64)
            .ok_or_else(|| CoerceError::invalid(key, "not a number"))?,
        (Value::String(s), SchemaVersion::V1) => s
            .trim()
            .parse::<f64>()
            .map(|f| f.round() as i64)
            .map_err(|_| CoerceError::invalid(key, format!("not a number: {s:?}")))?,
        _ => return Err(CoerceError::invalid(key, "expected an integer")),
    };
    Ok(clamp_trait(raw))
}

fn ability_name(key: &str, value: &Value, version: SchemaVersion) -> Result<String, CoerceError> {
    let name = value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| CoerceError::invalid(key, "expected a string"))?;
    if name.is_empty() {
        return Err(CoerceError::invalid(key, "empty name"));
    }
    if version == SchemaVersion::V2 && name.chars().count() > MAX_ABILITY_NAME_LEN {
        return Err(CoerceError::invalid(key, "name too long"));
    }
    Ok(name.to_string())
}

fn traits_from(object: &Map<String, Value>, version: SchemaVersion) -> Result<TraitSet, CoerceError> {
    let mut traits = TraitSet::new(0, 0, 0, 0, 0);
    for t in Trait::iter() {
        let value = object
            .get(t.key())
            .ok_or_else(|| CoerceError::MissingKey(t.key().to_string()))?;
        traits.set(t, trait_value(t.key(), value, version)? as i64);
    }
    Ok(traits)
}

/// TraitSet contract: exactly the five trait keys.
pub fn trait_set(object: &Map<String, Value>, version: SchemaVersion) -> Result<TraitSet, CoerceError> {
    check_keys(object, &Trait::keys(), version)?;
    traits_from(object, version)
}

/// TraitSet plus the five ability names.
pub fn trait_profile(
    object: &Map<String, Value>,
    version: SchemaVersion,
) -> Result<TraitProfile, CoerceError> {
    let mut expected = Trait::keys();
    expected.extend(Ability::keys());
    check_keys(object, &expected, version)?;

    let traits = traits_from(object, version)?;
    let name = |a: Ability| -> Result<String, CoerceError> {
        let value = object
            .get(a.key())
            .ok_or_else(|| CoerceError::MissingKey(a.key().to_string()))?;
        ability_name(a.key(), value, version)
    };
    let abilities = AbilityNames {
        strike: name(Ability::Strike)?,
        taunt: name(Ability::Taunt)?,
        dodge: name(Ability::Dodge)?,
        recover: name(Ability::Recover)?,
        special_move: name(Ability::SpecialMove)?,
    };
    Ok(TraitProfile { traits, abilities })
}

/// Move pair contract: one key per combatant, each value a literal moveset member.
pub fn move_decision(
    object: &Map<String, Value>,
    round: &RoundState,
    version: SchemaVersion,
) -> Result<MoveDecision, CoerceError> {
    let ids = round.ids();
    check_keys(object, &ids, version)?;

    let pick = |id: &str| -> Result<(String, String), CoerceError> {
        let value = object
            .get(id)
            .ok_or_else(|| CoerceError::MissingKey(id.to_string()))?;
        let name = match (value, version) {
            (Value::String(s), _) => s.as_str(),
            (Value::Object(inner), SchemaVersion::V1) => inner
                .get("move")
                .and_then(Value::as_str)
                .ok_or_else(|| CoerceError::invalid(id, "expected a move name"))?,
            _ => return Err(CoerceError::invalid(id, "expected a move name")),
        };
        let resolved = round
            .moveset
            .resolve(name)
            .ok_or_else(|| CoerceError::invalid(id, format!("{name:?} is not in the moveset")))?;
        Ok((id.to_string(), resolved.to_string()))
    };

    Ok(MoveDecision {
        moves: [pick(ids[0])?, pick(ids[1])?],
    })
}
