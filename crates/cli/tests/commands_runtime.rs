use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use garcon_cli::commands::{config, doctor, replay};
use serde_json::Value;

#[test]
fn config_reports_sources_and_redacts_secrets() {
    with_env(
        &[
            ("GARCON_SLACK_APP_TOKEN", "xapp-1-secret"),
            ("GARCON_SLACK_BOT_TOKEN", "xoxb-2-secret"),
            ("GARCON_SLACK_SIGNING_SECRET", "8f742231b10e8888abcd99yyyzzz85a5"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- slack.app_token = xapp-*** (source: env (GARCON_SLACK_APP_TOKEN))"));
            assert!(output.contains("- slack.bot_token = xoxb-*** (source: env (GARCON_SLACK_BOT_TOKEN))"));
            assert!(output.contains("- slack.signing_secret = <redacted>"));
            assert!(output.contains("- slack.bot_name = garcon (source: default)"));
            assert!(output.contains("- slack.allowed_channels = <all> (source: default)"));
            assert!(!output.contains("8f742231b10e8888abcd99yyyzzz85a5"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_tokens() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"));
    });
}

#[test]
fn doctor_passes_with_valid_env_and_marks_offline_integrations_skipped() {
    with_env(
        &[("GARCON_SLACK_APP_TOKEN", "xapp-test"), ("GARCON_SLACK_BOT_TOKEN", "xoxb-test")],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0, "expected doctor to pass");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "pass");
            let status_of = |name: &str| {
                payload["checks"]
                    .as_array()
                    .and_then(|checks| checks.iter().find(|check| check["name"] == name))
                    .map(|check| check["status"].clone())
            };
            assert_eq!(status_of("dialogue_patterns"), Some(Value::from("pass")));
            assert_eq!(status_of("slack_token_readiness"), Some(Value::from("pass")));
            assert_eq!(status_of("events_ingress"), Some(Value::from("skipped")));
            assert_eq!(status_of("delivery_service"), Some(Value::from("skipped")));
        },
    );
}

#[test]
fn doctor_fails_when_config_invalid() {
    with_env(&[("GARCON_SLACK_APP_TOKEN", "not-a-token")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1, "expected doctor failure code");
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] slack_token_readiness:"));
    });
}

#[test]
fn replay_prints_the_conversation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("lunch.txt");
    fs::write(
        &script,
        "!bot G4RC0NB0T garcon\n\
         !user U1 brainfart\n\
         U1: oh, garçon?\n\
         U1: <@G4RC0NB0T> abort\n",
    )
    .expect("write script");

    let result = replay::run(&script, false);

    assert_eq!(result.exit_code, 0);
    assert_eq!(
        result.output,
        "[CREPLAY] brainfart: oh, garçon?\n\
         [CREPLAY] garcon: Hi, @brainfart! Would you like to place an order?\n\
         [CREPLAY] brainfart: <@G4RC0NB0T> abort\n\
         [CREPLAY] garcon: Very well then, I'll disappear for now!\n\
         (stage after line 4: uninitiated)"
    );
}

#[test]
fn replay_emits_json_exchanges() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("status.txt");
    fs::write(
        &script,
        "!bot G4RC0NB0T garcon\n\
         !user U1 brainfart\n\
         !channel C1N3MEUMN\n\
         U1: oh, garçon?\n\
         U1: <@G4RC0NB0T> we'd like to place an order from Chili's\n\
         U1: <@G4RC0NB0T> what does our order look like?\n",
    )
    .expect("write script");

    let result = replay::run(&script, true);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "replay");
    assert_eq!(payload["exchanges"][1]["replies"][0], "Okay, what would everyone like from Chili's?");
    assert_eq!(payload["exchanges"][1]["stage"], "ordering");
    assert_eq!(payload["exchanges"][2]["channel"], "C1N3MEUMN");
    assert_eq!(
        payload["exchanges"][2]["replies"][0],
        "Nobody has ordered anything from Chili's yet."
    );
}

#[test]
fn replay_rejects_malformed_scripts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("broken.txt");
    fs::write(&script, "!user U1\n").expect("write script");

    let result = replay::run(&script, false);
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "replay");
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "script_invalid");

    let missing = replay::run(&dir.path().join("absent.txt"), false);
    assert_eq!(missing.exit_code, 2);
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GARCON_SLACK_APP_TOKEN",
        "GARCON_SLACK_BOT_TOKEN",
        "GARCON_SLACK_BOT_NAME",
        "GARCON_SLACK_ALLOWED_CHANNELS",
        "GARCON_SLACK_SIGNING_SECRET",
        "GARCON_CONVERSATION_COLLABORATOR_TIMEOUT_SECS",
        "GARCON_CONVERSATION_DROPOFF_ADDRESS",
        "GARCON_RESTAURANTS_BASE_URL",
        "GARCON_DELIVERY_BASE_URL",
        "GARCON_DELIVERY_API_KEY",
        "GARCON_SERVER_BIND_ADDRESS",
        "GARCON_SERVER_HEALTH_CHECK_PORT",
        "GARCON_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "GARCON_LOGGING_LEVEL",
        "GARCON_LOGGING_FORMAT",
        "GARCON_LOG_LEVEL",
        "GARCON_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
