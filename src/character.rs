// Data model shared by the three operations. Everything here lives for one invocation.
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::InputError;
use crate::schema::{self, SchemaVersion};

pub const TRAIT_MIN: u32 = 0;
pub const TRAIT_MAX: u32 = 10_000;
pub const ADJECTIVE_COUNT: usize = 5;

// Clamp any integer into the trait range. Never wraps.
pub fn clamp_trait(value: i64) -> u32 {
    value.clamp(TRAIT_MIN as i64, TRAIT_MAX as i64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter, EnumString)]
pub enum Trait {
    Strength,
    Wit,
    Charisma,
    Defence,
    Luck,
}

impl Trait {
    pub fn keys() -> Vec<&'static str> {
        Trait::iter().map(|t| t.key()).collect()
    }

    pub fn key(self) -> &'static str {
        self.into()
    }
}

/// The five bounded combat statistics of a character.
///
/// Construct through [`TraitSet::new`] or [`TraitSet::clamped`]; both keep every
/// field inside `[TRAIT_MIN, TRAIT_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitSet {
    #[serde(rename = "Strength")]
    pub strength: u32,
    #[serde(rename = "Wit")]
    pub wit: u32,
    #[serde(rename = "Charisma")]
    pub charisma: u32,
    #[serde(rename = "Defence")]
    pub defence: u32,
    #[serde(rename = "Luck")]
    pub luck: u32,
}

impl TraitSet {
    pub fn new(strength: i64, wit: i64, charisma: i64, defence: i64, luck: i64) -> Self {
        TraitSet {
            strength: clamp_trait(strength),
            wit: clamp_trait(wit),
            charisma: clamp_trait(charisma),
            defence: clamp_trait(defence),
            luck: clamp_trait(luck),
        }
    }

    pub fn clamped(self) -> Self {
        TraitSet::new(
            self.strength as i64,
            self.wit as i64,
            self.charisma as i64,
            self.defence as i64,
            self.luck as i64,
        )
    }

    pub fn get(&self, t: Trait) -> u32 {
        match t {
            Trait::Strength => self.strength,
            Trait::Wit => self.wit,
            Trait::Charisma => self.charisma,
            Trait::Defence => self.defence,
            Trait::Luck => self.luck,
        }
    }

    pub fn set(&mut self, t: Trait, value: i64) {
        let value = clamp_trait(value);
        match t {
            Trait::Strength => self.strength = value,
            Trait::Wit => self.wit = value,
            Trait::Charisma => self.charisma = value,
            Trait::Defence => self.defence = value,
            Trait::Luck => self.luck = value,
        }
    }

    pub fn values(&self) -> [(Trait, u32); 5] {
        [
            (Trait::Strength, self.strength),
            (Trait::Wit, self.wit),
            (Trait::Charisma, self.charisma),
            (Trait::Defence, self.defence),
            (Trait::Luck, self.luck),
        ]
    }

    // The on-chain contract only accepts updated traits in [2500, 10000]; callers
    // that forward to it check with this.
    pub fn within(&self, min: u32, max: u32) -> bool {
        self.values().iter().all(|(_, v)| *v >= min && *v <= max)
    }

    pub fn is_bounded(&self) -> bool {
        self.within(TRAIT_MIN, TRAIT_MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter, EnumString)]
pub enum Ability {
    #[strum(serialize = "strike-name")]
    Strike,
    #[strum(serialize = "taunt-name")]
    Taunt,
    #[strum(serialize = "dodge-name")]
    Dodge,
    #[strum(serialize = "recover-name")]
    Recover,
    #[strum(serialize = "special-move-name")]
    SpecialMove,
}

impl Ability {
    pub fn keys() -> Vec<&'static str> {
        Ability::iter().map(|a| a.key()).collect()
    }

    pub fn key(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityNames {
    #[serde(rename = "strike-name")]
    pub strike: String,
    #[serde(rename = "taunt-name")]
    pub taunt: String,
    #[serde(rename = "dodge-name")]
    pub dodge: String,
    #[serde(rename = "recover-name")]
    pub recover: String,
    #[serde(rename = "special-move-name")]
    pub special_move: String,
}

// Output of the synthesizer: traits and ability names flattened into one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitProfile {
    #[serde(flatten)]
    pub traits: TraitSet,
    #[serde(flatten)]
    pub abilities: AbilityNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub adjectives: Vec<String>,
    #[serde(default)]
    pub knowledge_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combatant {
    #[serde(skip)]
    pub id: String,
    pub personality: PersonalityProfile,
    pub traits: TraitSet,
    pub total_damage_received: u64,
}

#[derive(Deserialize)]
struct CombatantWire {
    personality: PersonalityProfile,
    traits: serde_json::Map<String, Value>,
    total_damage_received: u64,
}

impl Combatant {
    pub fn from_value(id: String, value: Value) -> Result<Self, InputError> {
        let wire: CombatantWire = serde_json::from_value(value)
            .map_err(|e| InputError::InvalidRoundState(format!("{id}: {e}")))?;

        if wire.personality.adjectives.len() != ADJECTIVE_COUNT {
            return Err(InputError::InvalidRoundState(format!(
                "{id}: expected {ADJECTIVE_COUNT} adjectives, found {}",
                wire.personality.adjectives.len()
            )));
        }

        let traits = schema::trait_set(&wire.traits, SchemaVersion::V1)
            .map_err(|e| InputError::InvalidRoundState(format!("{id}: {e}")))?;

        Ok(Combatant {
            id,
            personality: wire.personality,
            traits,
            total_damage_received: wire.total_damage_received,
        })
    }
}

// Known moves and their codes in the battle contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Move {
    #[strum(serialize = "strike")]
    Strike,
    #[strum(serialize = "taunt")]
    Taunt,
    #[strum(serialize = "dodge")]
    Dodge,
    #[strum(serialize = "recover")]
    Recover,
    #[strum(to_string = "special_move", serialize = "special")]
    SpecialMove,
}

impl Move {
    pub fn contract_code(self) -> u8 {
        match self {
            Move::Strike => 0,
            Move::Taunt => 1,
            Move::Dodge => 2,
            Move::SpecialMove => 3,
            Move::Recover => 4,
        }
    }

    pub fn default_moveset() -> Moveset {
        Moveset(Move::iter().map(|m| m.to_string()).collect())
    }
}

/// Closed, ordered set of move names for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Moveset(Vec<String>);

impl Moveset {
    pub fn new(moves: Vec<String>) -> Result<Self, InputError> {
        if moves.is_empty() {
            return Err(InputError::InvalidRoundState("moveset is empty".into()));
        }
        for (i, name) in moves.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(InputError::InvalidRoundState(
                    "moveset contains a blank move".into(),
                ));
            }
            if moves[..i].iter().any(|m| m.eq_ignore_ascii_case(name)) {
                return Err(InputError::InvalidRoundState(format!(
                    "duplicate move in moveset: {name}"
                )));
            }
        }
        Ok(Moveset(moves))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|m| m == name)
    }

    // Map an oracle-supplied name onto the moveset's own spelling.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.0
            .iter()
            .find(|m| m.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

/// Full input of one arbitration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    pub current_round: u32,
    pub combatants: [Combatant; 2],
    pub moveset: Moveset,
}

impl RoundState {
    pub fn from_value(value: Value) -> Result<Self, InputError> {
        let Value::Object(mut map) = value else {
            return Err(InputError::NotAnObject);
        };

        let current_round = map
            .remove("current_round")
            .and_then(|v| v.as_u64())
            .and_then(|r| u32::try_from(r).ok())
            .filter(|r| *r >= 1)
            .ok_or_else(|| {
                InputError::InvalidRoundState("current_round must be a positive integer".into())
            })?;

        let moves: Vec<String> = map
            .remove("moveset")
            .ok_or_else(|| InputError::MissingField("moveset".into()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| {
                    InputError::InvalidRoundState(format!("moveset must be a list of names: {e}"))
                })
            })?;
        let moveset = Moveset::new(moves)?;

        let combatants = map
            .into_iter()
            .map(|(id, v)| Combatant::from_value(id, v))
            .collect::<Result<Vec<_>, _>>()?;
        let combatants: [Combatant; 2] = combatants.try_into().map_err(|c: Vec<Combatant>| {
            InputError::InvalidRoundState(format!("expected two combatants, found {}", c.len()))
        })?;

        Ok(RoundState {
            current_round,
            combatants,
            moveset,
        })
    }

    pub fn ids(&self) -> [&str; 2] {
        [&self.combatants[0].id, &self.combatants[1].id]
    }
}

impl Serialize for RoundState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("current_round", &self.current_round)?;
        for combatant in &self.combatants {
            map.serialize_entry(&combatant.id, combatant)?;
        }
        map.serialize_entry("moveset", &self.moveset)?;
        map.end()
    }
}

/// One move per combatant, keyed by combatant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDecision {
    pub moves: [(String, String); 2],
}

impl MoveDecision {
    pub fn move_for(&self, id: &str) -> Option<&str> {
        self.moves
            .iter()
            .find(|(who, _)| who == id)
            .map(|(_, m)| m.as_str())
    }

    // Unknown move names have no contract code.
    pub fn contract_codes(&self) -> [Option<u8>; 2] {
        let code = |name: &str| name.parse::<Move>().ok().map(Move::contract_code);
        [code(&self.moves[0].1), code(&self.moves[1].1)]
    }
}

impl Serialize for MoveDecision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        for (id, chosen) in &self.moves {
            map.serialize_entry(id, chosen)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOption {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioAnswer {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<ScenarioOption>,
    #[serde(default)]
    pub answered: Option<i64>,
}

impl ScenarioAnswer {
    pub fn selected_option(&self) -> Option<&ScenarioOption> {
        let answered = self.answered?;
        self.options.iter().find(|o| o.id == answered)
    }
}
