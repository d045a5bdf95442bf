mod common;

use rann_oracle::auth::{API_KEY_METADATA, NOT_AUTHORIZED, NOT_GAME_MASTER};
use rann_oracle::pipeline::{FAILURE_MESSAGE, MAX_EMBEDDED_STATE_LEN};
use rann_oracle::*;
use serde_json::{Value, json};

use common::{API_KEY, GAME_MASTER, RecordingOracle, fixture, keyed_request, settings};

const PROFILE_REPLY: &str = r#"{
    "Strength": 7400, "Wit": 6100, "Charisma": 3900, "Defence": 8800, "Luck": 2200,
    "strike-name": "Pommel of Regret", "taunt-name": "Your Father Smelt of Elderberries",
    "dodge-name": "Strategic Cowardice", "recover-name": "Sulk and Heal",
    "special-move-name": "Exile's Revenge"
}"#;

const UPDATED_TRAITS: &str =
    r#"{"Strength": 8410, "Wit": 9602, "Charisma": 6105, "Defence": 7488, "Luck": 4390}"#;

fn pipeline(oracle: RecordingOracle) -> Pipeline<RecordingOracle> {
    Pipeline::new(oracle, settings())
}

fn signed(state: &Value) -> InboundRequest {
    InboundRequest::from_state(state).with_signer(GAME_MASTER)
}

fn decision_keys(reply: &Reply) -> Vec<String> {
    let decision = reply.as_decision().expect("expected a decision");
    decision.as_object().unwrap().keys().cloned().collect()
}

fn trait_values(reply: &Reply) -> Vec<i64> {
    let decision = reply.as_decision().expect("expected a decision");
    ["Strength", "Wit", "Charisma", "Defence", "Luck"]
        .iter()
        .map(|k| decision[*k].as_i64().expect("trait is an integer"))
        .collect()
}

// Authorization

#[tokio::test]
async fn test_arbitrate_without_messages_is_refused() {
    let pipeline = pipeline(RecordingOracle::replying([r#"{"agent_1":"strike","agent_2":"dodge"}"#]));
    let reply = pipeline.arbitrate(&InboundRequest::default()).await;
    assert_eq!(reply, Reply::Refusal(NOT_AUTHORIZED.to_string()));
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[tokio::test]
async fn test_arbitrate_with_wrong_key_never_reaches_oracle() {
    let pipeline = pipeline(RecordingOracle::replying([r#"{"agent_1":"strike","agent_2":"dodge"}"#]));
    let request = keyed_request(&fixture("round_state.json"), "Rannbhoomi ");
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(reply.content(), NOT_AUTHORIZED);
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[tokio::test]
async fn test_synthesize_requires_game_master() {
    let pipeline = pipeline(RecordingOracle::replying([PROFILE_REPLY]));
    let character = fixture("character.json");

    let reply = pipeline.synthesize(&InboundRequest::from_state(&character)).await;
    assert_eq!(reply, Reply::Refusal(NOT_GAME_MASTER.to_string()));

    let reply = pipeline
        .synthesize(&InboundRequest::from_state(&character).with_signer("impostor.near"))
        .await;
    assert_eq!(reply, Reply::Refusal(NOT_GAME_MASTER.to_string()));
    assert_eq!(pipeline.oracle().call_count(), 0);

    let reply = pipeline.synthesize(&signed(&character)).await;
    assert!(reply.is_decision());
    assert_eq!(pipeline.oracle().call_count(), 1);
}

#[tokio::test]
async fn test_credentials_are_not_forwarded() {
    let pipeline = pipeline(RecordingOracle::replying([r#"{"agent_1":"strike","agent_2":"dodge"}"#]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    pipeline.arbitrate(&request).await;

    let calls = pipeline.oracle().calls();
    assert_eq!(calls.len(), 1);
    for message in &calls[0] {
        assert!(message.metadata.is_none());
        assert!(!message.content.contains(API_KEY));
    }
}

// Synthesizer

#[tokio::test]
async fn test_synthesize_character() {
    let pipeline = pipeline(RecordingOracle::replying([PROFILE_REPLY]));
    let character = fixture("character.json");
    let reply = pipeline.synthesize(&signed(&character)).await;

    let mut keys = decision_keys(&reply);
    keys.sort();
    let mut expected = vec![
        "Strength", "Wit", "Charisma", "Defence", "Luck", "strike-name", "taunt-name",
        "dodge-name", "recover-name", "special-move-name",
    ];
    expected.sort();
    assert_eq!(keys, expected);

    for key in character.as_object().unwrap().keys() {
        assert!(!keys.contains(key), "input key {key} leaked into output");
    }
    assert!(trait_values(&reply).iter().all(|v| (0..=10_000).contains(v)));
}

#[tokio::test]
async fn test_synthesize_forwards_instruction_then_description() {
    let pipeline = pipeline(RecordingOracle::replying([PROFILE_REPLY]));
    let character = fixture("character.json");
    pipeline.synthesize(&signed(&character)).await;

    let calls = pipeline.oracle().calls();
    let sent = &calls[0];
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].role, Role::System);
    assert!(sent[0].content.contains("special-move-name"));
    assert_eq!(sent[1].role, Role::User);
    let forwarded: Value = serde_json::from_str(&sent[1].content).unwrap();
    assert_eq!(forwarded, character);
}

#[tokio::test]
async fn test_synthesize_strips_fenced_reply() {
    let fenced = format!("Here are the stats you asked for:\n```json\n{PROFILE_REPLY}\n```\nEnjoy!");
    let pipeline = pipeline(RecordingOracle::replying([fenced.as_str()]));
    let reply = pipeline.synthesize(&signed(&fixture("character.json"))).await;
    assert_eq!(trait_values(&reply), vec![7400, 6100, 3900, 8800, 2200]);
    assert_eq!(reply.as_decision().unwrap()["dodge-name"], "Strategic Cowardice");
}

#[tokio::test]
async fn test_synthesize_clamps_oracle_values() {
    let reply_text = PROFILE_REPLY.replace("7400", "15000").replace("2200", "-3");
    let pipeline = pipeline(RecordingOracle::replying([reply_text.as_str()]));
    let reply = pipeline.synthesize(&signed(&fixture("character.json"))).await;
    assert_eq!(trait_values(&reply), vec![10_000, 6100, 3900, 8800, 0]);
}

#[tokio::test]
async fn test_synthesize_rejects_description_with_generated_keys() {
    let pipeline = pipeline(RecordingOracle::replying([PROFILE_REPLY]));
    let mut character = fixture("character.json");
    character["Luck"] = json!(9999);
    let reply = pipeline.synthesize(&signed(&character)).await;
    assert_eq!(reply, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[tokio::test]
async fn test_synthesize_echoed_input_key() {
    let echoed = PROFILE_REPLY.replacen('{', r#"{"name": "Vikram the Unbowed","#, 1);

    let pipeline = pipeline(RecordingOracle::replying([echoed.as_str(), echoed.as_str()]));
    let reply = pipeline.synthesize(&signed(&fixture("character.json"))).await;
    assert_eq!(reply, Reply::failure());

    let mut lenient = settings();
    lenient.schema_version = SchemaVersion::V1;
    let pipeline = Pipeline::new(RecordingOracle::replying([echoed.as_str()]), lenient);
    let reply = pipeline.synthesize(&signed(&fixture("character.json"))).await;
    assert!(!decision_keys(&reply).contains(&"name".to_string()));
    assert_eq!(decision_keys(&reply).len(), 10);
}

// Updater

#[tokio::test]
async fn test_update_scenario_answers() {
    let pipeline = pipeline(RecordingOracle::replying([UPDATED_TRAITS]));
    let reply = pipeline
        .update(&InboundRequest::from_state(&fixture("scenario_answers.json")))
        .await;

    let mut keys = decision_keys(&reply);
    keys.sort();
    assert_eq!(keys, vec!["Charisma", "Defence", "Luck", "Strength", "Wit"]);
    assert_eq!(trait_values(&reply), vec![8410, 9602, 6105, 7488, 4390]);

    let calls = pipeline.oracle().calls();
    let sent = &calls[0];
    let forwarded: Value = serde_json::from_str(&sent[1].content).unwrap();
    assert_eq!(forwarded["stats"]["Wit"], 9471);
    assert_eq!(forwarded["questions"].as_array().unwrap().len(), 5);
    assert_eq!(forwarded["questions"][1]["answered"], 3);
    assert!(forwarded["questions"][1].get("neutral").is_none());
}

#[tokio::test]
async fn test_update_keeps_boundary_values() {
    let state = json!({
        "stats": {"Strength": 0, "Wit": 10000, "Charisma": 0, "Defence": 10000, "Luck": 5000},
        "questions": []
    });
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"Strength": 0, "Wit": 10000, "Charisma": 0, "Defence": 10000, "Luck": 5000}"#,
    ]));
    let reply = pipeline.update(&InboundRequest::from_state(&state)).await;
    assert_eq!(trait_values(&reply), vec![0, 10_000, 0, 10_000, 5000]);
}

#[tokio::test]
async fn test_update_clamps_out_of_range_reply() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"Strength": 10450, "Wit": 9900, "Charisma": -120, "Defence": 7000, "Luck": 4000}"#,
    ]));
    let reply = pipeline
        .update(&InboundRequest::from_state(&fixture("scenario_answers.json")))
        .await;
    assert_eq!(trait_values(&reply), vec![10_000, 9900, 0, 7000, 4000]);
}

#[tokio::test]
async fn test_update_with_no_answers_still_returns_traits() {
    let mut state = fixture("scenario_answers.json");
    state["questions"] = json!([]);
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"Strength": 8231, "Wit": 9471, "Charisma": 5932, "Defence": 7519, "Luck": 4211}"#,
    ]));
    let reply = pipeline.update(&InboundRequest::from_state(&state)).await;
    assert_eq!(trait_values(&reply), vec![8231, 9471, 5932, 7519, 4211]);
}

#[tokio::test]
async fn test_update_output_fed_back_stays_bounded() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"Strength": 10000, "Wit": 9999, "Charisma": 0, "Defence": 1, "Luck": 5000}"#,
        r#"{"Strength": 10001, "Wit": 9999, "Charisma": -1, "Defence": 1, "Luck": 5000}"#,
    ]));
    let first = pipeline
        .update(&InboundRequest::from_state(&fixture("scenario_answers.json")))
        .await;
    let stats = first.as_decision().expect("first update").clone();

    let second = pipeline
        .update(&InboundRequest::from_state(&json!({"stats": stats, "questions": []})))
        .await;
    assert_eq!(trait_values(&second), vec![10_000, 9999, 0, 1, 5000]);
    assert_eq!(decision_keys(&second).len(), 5);
}

#[tokio::test]
async fn test_update_marks_invalid_answer_neutral() {
    let mut state = fixture("scenario_answers.json");
    state["questions"][0]["answered"] = json!(9);
    state["questions"][4] = json!("not a question");
    let pipeline = pipeline(RecordingOracle::replying([UPDATED_TRAITS]));
    let reply = pipeline.update(&InboundRequest::from_state(&state)).await;
    assert!(reply.is_decision());

    let calls = pipeline.oracle().calls();
    let sent = &calls[0];
    let forwarded: Value = serde_json::from_str(&sent[1].content).unwrap();
    assert_eq!(forwarded["questions"][0]["answered"], Value::Null);
    assert_eq!(forwarded["questions"][0]["neutral"], true);
    assert_eq!(forwarded["questions"][4]["neutral"], true);
    assert!(forwarded["questions"][2].get("neutral").is_none());
}

#[tokio::test]
async fn test_update_without_stats_fails() {
    let pipeline = pipeline(RecordingOracle::replying([UPDATED_TRAITS]));
    let reply = pipeline
        .update(&InboundRequest::from_state(&json!({"questions": []})))
        .await;
    assert_eq!(reply.content(), FAILURE_MESSAGE);
    assert_eq!(pipeline.oracle().call_count(), 0);
}

// Arbiter

#[tokio::test]
async fn test_arbitrate_round() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "special_move", "agent_2": "dodge"}"#,
    ]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    let reply = pipeline.arbitrate(&request).await;

    assert_eq!(
        reply.as_decision(),
        Some(&json!({"agent_1": "special_move", "agent_2": "dodge"}))
    );
}

#[tokio::test]
async fn test_arbitrate_reply_with_prose_is_reduced_to_object() {
    let pipeline = pipeline(RecordingOracle::replying([
        "agent_1 is hurt, so {\"agent_1\": \"Recover\", \"agent_2\": \"strike\"} seems right.",
    ]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(
        reply.as_decision(),
        Some(&json!({"agent_1": "recover", "agent_2": "strike"}))
    );
}

#[tokio::test]
async fn test_arbitrate_retries_once_on_invented_move() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "fireball", "agent_2": "dodge"}"#,
        r#"{"agent_1": "taunt", "agent_2": "dodge"}"#,
    ]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(reply.as_decision().unwrap()["agent_1"], "taunt");

    let calls = pipeline.oracle().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_arbitrate_gives_up_after_second_violation() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "fireball", "agent_2": "dodge"}"#,
        r#"{"agent_1": "strike"}"#,
        r#"{"agent_1": "strike", "agent_2": "dodge"}"#,
    ]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(reply, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 2);
}

#[tokio::test]
async fn test_arbitrate_without_retry() {
    let mut settings = settings();
    settings.retry_on_schema_violation = false;
    let pipeline = Pipeline::new(
        RecordingOracle::replying([
            "I think both should strike.",
            r#"{"agent_1": "strike", "agent_2": "strike"}"#,
        ]),
        settings,
    );
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    assert_eq!(pipeline.arbitrate(&request).await, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 1);
}

#[tokio::test]
async fn test_arbitrate_custom_moveset() {
    let mut state = fixture("round_state.json");
    state["moveset"] = json!(["Lunge", "Parry"]);
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "strike", "agent_2": "parry"}"#,
        r#"{"agent_1": "lunge", "agent_2": "parry"}"#,
    ]));
    let reply = pipeline.arbitrate(&keyed_request(&state, API_KEY)).await;
    assert_eq!(
        reply.as_decision(),
        Some(&json!({"agent_1": "Lunge", "agent_2": "Parry"}))
    );
}

#[tokio::test]
async fn test_arbitrate_malformed_round_state() {
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "strike", "agent_2": "dodge"}"#,
    ]));
    let request = InboundRequest::new(vec![
        ChatMessage::user("round three, agent_1 is winning").with_metadata(API_KEY_METADATA, API_KEY),
    ]);
    assert_eq!(pipeline.arbitrate(&request).await, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[tokio::test]
async fn test_oracle_error_becomes_failure_message() {
    let pipeline = pipeline(RecordingOracle::with_results(vec![Err(OracleError::Timeout)]));
    let request = keyed_request(&fixture("round_state.json"), API_KEY);
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(reply.content(), FAILURE_MESSAGE);
    assert_eq!(pipeline.oracle().call_count(), 1);
}

#[tokio::test]
async fn test_empty_oracle_reply_is_failure() {
    let pipeline = pipeline(RecordingOracle::replying(["   "]));
    let reply = pipeline
        .update(&InboundRequest::from_state(&fixture("scenario_answers.json")))
        .await;
    assert_eq!(reply, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 1);
}

#[tokio::test]
async fn test_arbitrate_falls_back_when_enabled() {
    let mut settings = settings();
    settings.fallback_on_oracle_failure = true;
    let pipeline = Pipeline::new(
        RecordingOracle::with_results(vec![Err(OracleError::Unavailable("offline".into()))]),
        settings,
    );
    let state = fixture("round_state.json");
    let reply = pipeline.arbitrate(&keyed_request(&state, API_KEY)).await;

    let decision = reply.as_decision().expect("fallback decision");
    let moveset = state["moveset"].as_array().unwrap();
    for id in ["agent_1", "agent_2"] {
        assert!(moveset.contains(&decision[id]));
    }
    assert_eq!(decision.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_fallback_never_bypasses_authorization() {
    let mut settings = settings();
    settings.fallback_on_oracle_failure = true;
    let pipeline = Pipeline::new(RecordingOracle::with_results(Vec::new()), settings);
    let reply = pipeline
        .arbitrate(&InboundRequest::from_state(&fixture("round_state.json")))
        .await;
    assert_eq!(reply, Reply::Refusal(NOT_AUTHORIZED.to_string()));
}

#[tokio::test]
async fn test_dispatch_and_execute() {
    let pipeline = pipeline(RecordingOracle::replying([UPDATED_TRAITS, UPDATED_TRAITS]));
    let request = InboundRequest::from_state(&fixture("scenario_answers.json"));

    let reply = pipeline.dispatch(OperationKind::Update, &request).await;
    assert!(reply.is_decision());

    let traits = pipeline.execute(&TraitUpdater, &request).await.unwrap();
    assert_eq!(traits, TraitSet::new(8410, 9602, 6105, 7488, 4390));
}

#[tokio::test]
async fn test_execute_surfaces_denial() {
    let pipeline = pipeline(RecordingOracle::with_results(Vec::new()));
    let result = pipeline
        .execute(&MoveArbiter, &InboundRequest::from_state(&fixture("round_state.json")))
        .await;
    assert!(matches!(result, Err(AppError::Denied(_))));
}

#[tokio::test]
async fn test_fenced_round_state_is_accepted() {
    let state = fixture("round_state.json");
    let content = format!("Round state follows:\n```json\n{state}\n```");
    let request = InboundRequest::new(vec![
        ChatMessage::user(content).with_metadata(API_KEY_METADATA, API_KEY),
    ]);
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "strike", "agent_2": "taunt"}"#,
    ]));
    let reply = pipeline.arbitrate(&request).await;
    assert_eq!(
        reply.as_decision(),
        Some(&json!({"agent_1": "strike", "agent_2": "taunt"}))
    );
}

#[tokio::test]
async fn test_oversized_non_json_state_is_rejected() {
    let content = "{".repeat(MAX_EMBEDDED_STATE_LEN * 4);
    let request = InboundRequest::new(vec![
        ChatMessage::user(content).with_metadata(API_KEY_METADATA, API_KEY),
    ]);
    let pipeline = pipeline(RecordingOracle::replying([
        r#"{"agent_1": "strike", "agent_2": "taunt"}"#,
    ]));
    assert_eq!(pipeline.arbitrate(&request).await, Reply::failure());
    assert_eq!(pipeline.oracle().call_count(), 0);
}

#[tokio::test]
async fn test_unconfigured_openai_oracle_still_refuses_first() {
    let oracle = OpenAiOracle::from_settings(&settings());
    assert!(!oracle.is_configured());
    let pipeline = Pipeline::new(oracle, settings());
    let state = fixture("round_state.json");

    let reply = pipeline.arbitrate(&keyed_request(&state, "wrong")).await;
    assert_eq!(reply, Reply::Refusal(NOT_AUTHORIZED.to_string()));

    let reply = pipeline.arbitrate(&keyed_request(&state, API_KEY)).await;
    assert_eq!(reply, Reply::failure());
}
