pub mod arbiter;
pub mod auth;
pub mod character;
pub mod coercer;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod message;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod settings;
pub mod synthesizer;
pub mod updater;

// Re-export commonly used items for easier access
pub use arbiter::MoveArbiter;
pub use auth::{AuthorizationDenied, AuthorizationGate, GateKind};
pub use character::{
    Combatant, Move, MoveDecision, Moveset, PersonalityProfile, RoundState, ScenarioAnswer,
    ScenarioOption, TraitProfile, TraitSet,
};
pub use error::{AppError, CoerceError, InputError, OracleError};
pub use message::{ChatMessage, InboundRequest, Role};
pub use oracle::{OpenAiOracle, ReasoningOracle};
pub use pipeline::{Operation, OperationKind, Pipeline, Reply};
pub use schema::SchemaVersion;
pub use settings::Settings;
pub use synthesizer::TraitSynthesizer;
pub use updater::{TraitUpdater, UpdateRequest};
