// Credential gate evaluated before anything touches the oracle.
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::message::InboundRequest;

pub const API_KEY_METADATA: &str = "api_key";
pub const NOT_AUTHORIZED: &str = "Not Authorized";
pub const NOT_GAME_MASTER: &str = "Sorry! You are not Game Master :)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GateKind {
    // No credential required.
    Open,
    // Shared secret in the first message's metadata.
    ApiKey,
    // Invoker identity from the call context.
    Signer,
}

impl GateKind {
    pub fn refusal(self) -> &'static str {
        match self {
            GateKind::Signer => NOT_GAME_MASTER,
            GateKind::Open | GateKind::ApiKey => NOT_AUTHORIZED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DenialReason {
    #[strum(serialize = "no messages")]
    NoMessages,
    #[strum(serialize = "credential missing")]
    MissingCredential,
    #[strum(serialize = "credential mismatch")]
    Mismatch,
    #[strum(serialize = "no expected credential configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} ({gate} gate)")]
pub struct AuthorizationDenied {
    pub gate: GateKind,
    pub reason: DenialReason,
}

impl AuthorizationDenied {
    pub fn refusal(&self) -> &'static str {
        self.gate.refusal()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationGate {
    api_key: Option<String>,
    game_master: Option<String>,
}

impl AuthorizationGate {
    pub fn new(api_key: Option<String>, game_master: Option<String>) -> Self {
        AuthorizationGate {
            api_key,
            game_master,
        }
    }

    pub fn check(&self, kind: GateKind, request: &InboundRequest) -> Result<(), AuthorizationDenied> {
        let deny = |reason| Err(AuthorizationDenied { gate: kind, reason });

        let presented = match kind {
            GateKind::Open => return Ok(()),
            GateKind::ApiKey => {
                let Some(first) = request.first() else {
                    return deny(DenialReason::NoMessages);
                };
                first.metadata_str(API_KEY_METADATA)
            }
            GateKind::Signer => {
                if request.messages.is_empty() {
                    return deny(DenialReason::NoMessages);
                }
                request.signer_account_id.as_deref()
            }
        };
        let expected = match kind {
            GateKind::ApiKey => self.api_key.as_deref(),
            _ => self.game_master.as_deref(),
        };

        // An unconfigured gate refuses everyone.
        let Some(expected) = expected else {
            return deny(DenialReason::NotConfigured);
        };
        match presented {
            None => deny(DenialReason::MissingCredential),
            Some(value) if value == expected => Ok(()),
            Some(_) => deny(DenialReason::Mismatch),
        }
    }
}
