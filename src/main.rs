use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rann_oracle::auth::API_KEY_METADATA;
use rann_oracle::settings::SETTINGS_PATH;
use rann_oracle::{InboundRequest, OpenAiOracle, OperationKind, Pipeline, Settings, logging};
use serde_json::Value;

/// Reads a request from stdin, runs one operation, prints the reply content.
#[derive(Parser, Debug)]
#[command(name = "rann-oracle", version)]
struct Cli {
    /// synthesize | update | arbitrate
    #[arg(value_parser = parse_operation)]
    operation: OperationKind,

    #[arg(long, default_value = SETTINGS_PATH)]
    settings: String,

    /// Invoker identity for signer-gated operations
    #[arg(long)]
    signer: Option<String>,

    /// Shared secret attached to the first message's metadata
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn parse_operation(s: &str) -> Result<OperationKind, String> {
    s.parse()
        .map_err(|_| format!("unknown operation {s:?}, expected synthesize, update or arbitrate"))
}

// Either a full request (`{"messages": [...]}`) or a bare state object.
fn read_request(input: &str) -> anyhow::Result<InboundRequest> {
    let value: Value = serde_json::from_str(input).context("stdin is not valid JSON")?;
    if value.get("messages").is_some_and(Value::is_array) {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(InboundRequest::from_state(&value))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.settings)
        .with_context(|| format!("failed to load settings from {}", cli.settings))?
        .apply_env();

    if let Err(e) = logging::init(cli.log_dir.clone(), settings.debug_mode) {
        eprintln!("Logging disabled: {e}");
    }

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let mut request = read_request(&input)?;
    if let Some(signer) = cli.signer {
        request = request.with_signer(signer);
    }
    if let Some(api_key) = cli.api_key {
        if let Some(first) = request.messages.first_mut() {
            *first = first.clone().with_metadata(API_KEY_METADATA, api_key);
        }
    }

    let oracle = OpenAiOracle::from_settings(&settings);
    let pipeline = Pipeline::new(oracle, settings);
    let reply = pipeline.dispatch(cli.operation, &request).await;

    println!("{}", reply.content());
    Ok(if reply.is_decision() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
