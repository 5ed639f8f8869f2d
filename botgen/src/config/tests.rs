//! Config tests.

use crate::config::{AdapterKind, BotConfig};
use botgen_storage::Storage;
use serial_test::serial;
use std::env;

const VARS: [&str; 24] = [
    "WEBHOOK_URI",
    "DIALOG_STATE_PROPERTY",
    "PORT",
    "LOG_FILE",
    "JSON_LIMIT",
    "URL_ENCODED_LIMIT",
    "DISABLE_WEBSERVER",
    "DISABLE_CONSOLE",
    "STORAGE_TYPE",
    "DATABASE_URL",
    "ADAPTER",
    "BOT_TOKEN",
    "TELEGRAM_API_URL",
    "TELOXIDE_API_URL",
    "SLACK_VERIFICATION_TOKEN",
    "SLACK_CLIENT_SIGNING_SECRET",
    "SLACK_BOT_TOKEN",
    "SLACK_CLIENT_ID",
    "SLACK_CLIENT_SECRET",
    "SLACK_REDIRECT_URI",
    "SLACK_SCOPES",
    "SLACK_OAUTH_VERSION",
    "SLACK_ENABLE_INCOMPLETE",
    "SLACK_API_URL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_load_config_with_defaults() {
    clear_env();

    let config = BotConfig::load(None, None).unwrap();

    assert_eq!(config.base().webhook_uri, "/api/messages");
    assert_eq!(config.base().dialog_state_property, "dialogState");
    assert_eq!(config.port(), 3000);
    assert_eq!(config.log_file(), "logs/botgen.log");
    assert_eq!(config.base().json_limit, "100kb");
    assert!(!config.base().disable_webserver);
    assert_eq!(config.storage_type(), "memory");
    assert_eq!(config.database_url(), "sqlite:./botgen.db");
    assert_eq!(config.adapter_kind(), AdapterKind::Web);
    assert_eq!(config.adapter.slack.oauth_version, "v1");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_config_with_custom_values() {
    clear_env();
    env::set_var("WEBHOOK_URI", "/hooks/bot");
    env::set_var("PORT", "8080");
    env::set_var("JSON_LIMIT", "1mb");
    env::set_var("DISABLE_CONSOLE", "true");
    env::set_var("STORAGE_TYPE", "SQLite");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("ADAPTER", "slack");
    env::set_var("SLACK_VERIFICATION_TOKEN", "verify");
    env::set_var("SLACK_BOT_TOKEN", "xoxb-1");
    env::set_var("SLACK_SCOPES", "chat:write, channels:history,");

    let config = BotConfig::load(None, None).unwrap();

    assert_eq!(config.base().webhook_uri, "/hooks/bot");
    assert_eq!(config.port(), 8080);
    assert!(config.base().disable_console);
    assert_eq!(config.storage_type(), "sqlite");
    assert_eq!(config.adapter_kind(), AdapterKind::Slack);
    assert_eq!(
        config.adapter.slack.scopes,
        vec!["chat:write".to_string(), "channels:history".to_string()]
    );
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn test_overrides_win_over_env() {
    clear_env();
    env::set_var("PORT", "8080");
    env::set_var("ADAPTER", "slack");
    env::set_var("BOT_TOKEN", "123:abc");

    let config = BotConfig::load(Some(9000), Some("telegram".to_string())).unwrap();

    assert_eq!(config.port(), 9000);
    assert_eq!(config.adapter_kind(), AdapterKind::Telegram);
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn test_load_rejects_bad_port_and_adapter() {
    clear_env();
    env::set_var("PORT", "eighty");
    assert!(BotConfig::load(None, None).is_err());

    clear_env();
    assert!(BotConfig::load(None, Some("irc".to_string())).is_err());
}

#[test]
#[serial]
fn test_validate_checks_base_settings() {
    clear_env();
    env::set_var("STORAGE_TYPE", "redis");
    assert!(BotConfig::load(None, None).unwrap().validate().is_err());

    clear_env();
    env::set_var("JSON_LIMIT", "huge");
    assert!(BotConfig::load(None, None).unwrap().validate().is_err());

    clear_env();
    env::set_var("WEBHOOK_URI", "api/messages");
    assert!(BotConfig::load(None, None).unwrap().validate().is_err());

    clear_env();
}

#[test]
#[serial]
fn test_validate_adapter_credentials() {
    clear_env();
    let config = BotConfig::load(None, Some("telegram".to_string())).unwrap();
    assert!(config.validate().is_err());

    env::set_var("BOT_TOKEN", "123:abc");
    env::set_var("TELEGRAM_API_URL", "not-a-valid-url");
    let config = BotConfig::load(None, Some("telegram".to_string())).unwrap();
    assert!(config.validate().is_err());

    clear_env();
    let config = BotConfig::load(None, Some("slack".to_string())).unwrap();
    assert!(config.validate().is_err());

    env::set_var("SLACK_ENABLE_INCOMPLETE", "1");
    let config = BotConfig::load(None, Some("slack".to_string())).unwrap();
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn test_slack_client_id_without_bot_token_fails_validation() {
    clear_env();
    env::set_var("SLACK_VERIFICATION_TOKEN", "verify");
    env::set_var("SLACK_CLIENT_ID", "123.456");
    env::set_var("SLACK_CLIENT_SECRET", "secret");
    env::set_var("SLACK_REDIRECT_URI", "https://bot.example.com/oauth");
    env::set_var("SLACK_SCOPES", "chat:write");

    let config = BotConfig::load(None, Some("slack".to_string())).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("SLACK_BOT_TOKEN"));

    env::set_var("SLACK_BOT_TOKEN", "xoxb-1");
    let config = BotConfig::load(None, Some("slack".to_string())).unwrap();
    assert!(config.validate().is_ok());
    assert!(config.build_adapter().is_ok());

    clear_env();
}

#[tokio::test]
#[serial]
async fn test_build_storage_and_adapter() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.db");
    env::set_var("STORAGE_TYPE", "sqlite");
    env::set_var("DATABASE_URL", format!("sqlite:{}", db_path.display()));

    let config = BotConfig::load(None, None).unwrap();
    let storage = config.build_storage().await.unwrap();
    assert!(storage.read(&["missing".to_string()]).await.unwrap().is_empty());

    let adapter = config.build_adapter().unwrap();
    assert_eq!(adapter.name(), "web");

    let options = config.bot_options(adapter, storage);
    assert_eq!(options.webhook_uri, "/api/messages");
    assert!(options.adapter.is_some());

    clear_env();
}
