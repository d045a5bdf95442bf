use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

use crate::auth::GateKind;
use crate::pipeline::OperationKind;
use crate::schema::SchemaVersion;

pub const SETTINGS_PATH: &str = "./data/settings.json";

// Environment overrides, applied after the file is read.
pub const ENV_API_KEY: &str = "RANN_API_KEY";
pub const ENV_GAME_MASTER: &str = "RANN_GAME_MASTER";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

// Which gate guards each operation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Gates {
    pub synthesize: GateKind,
    pub update: GateKind,
    pub arbitrate: GateKind,
}

impl Default for Gates {
    fn default() -> Self {
        Gates {
            synthesize: GateKind::Signer,
            update: GateKind::Open,
            arbitrate: GateKind::ApiKey,
        }
    }
}

impl Gates {
    pub fn for_operation(&self, kind: OperationKind) -> GateKind {
        match kind {
            OperationKind::Synthesize => self.synthesize,
            OperationKind::Update => self.update,
            OperationKind::Arbitrate => self.arbitrate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,     // Shared secret expected in message metadata.
    pub game_master: Option<String>, // Signer allowed through the signer gate.
    pub openai_api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub oracle_timeout_secs: u64,
    pub schema_version: SchemaVersion,
    pub retry_on_schema_violation: bool,
    pub fallback_on_oracle_failure: bool,
    pub gates: Gates,
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: None,
            game_master: None,
            openai_api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            oracle_timeout_secs: 120,
            schema_version: SchemaVersion::V2,
            retry_on_schema_violation: true,
            fallback_on_oracle_failure: false,
            gates: Gates::default(),
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // Load settings from the default file path, falling back to defaults if absent.
    pub fn load() -> io::Result<Self> {
        Self::load_or_default(SETTINGS_PATH)
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to_file(SETTINGS_PATH)
    }

    pub fn load_or_default(path: &str) -> io::Result<Self> {
        match Self::load_settings_from_file(path) {
            Ok(settings) => Ok(settings),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No settings at {path}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn load_settings_from_file(path: &str) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    // Non-empty values from `lookup` replace the file's credentials.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(value) = get(ENV_API_KEY) {
            self.api_key = Some(value);
        }
        if let Some(value) = get(ENV_GAME_MASTER) {
            self.game_master = Some(value);
        }
        if let Some(value) = get(ENV_OPENAI_API_KEY) {
            self.openai_api_key = Some(value);
        }
        self
    }
}
