use std::env;
use std::sync::Mutex;
use volley_club_bot::config::Config;
use volley_club_bot::services::orchestrator::Settings;

// Config tests share process environment and must run one at a time
static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

const VARS: [&str; 11] = [
    "TELEGRAM_BOT_TOKEN",
    "DATABASE_URL",
    "HTTP_PORT",
    "TIMEZONE_OFFSET_HOURS",
    "ADMIN_IDS",
    "STATS_EXCLUDED_IDS",
    "BALLOT_CAPACITY",
    "OPEN_HOUR",
    "REMIND_HOUR",
    "RECONCILE_HOUR",
    "CONVERSATION_TTL_MINUTES",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_config_from_env_with_all_vars() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token_123");
    env::set_var("DATABASE_URL", "json:./data/collections");
    env::set_var("HTTP_PORT", "8080");
    env::set_var("TIMEZONE_OFFSET_HOURS", "5");
    env::set_var("ADMIN_IDS", "111, 222");
    env::set_var("STATS_EXCLUDED_IDS", "333");
    env::set_var("BALLOT_CAPACITY", "12");
    env::set_var("OPEN_HOUR", "9");
    env::set_var("REMIND_HOUR", "13");
    env::set_var("RECONCILE_HOUR", "22");
    env::set_var("CONVERSATION_TTL_MINUTES", "15");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.telegram_bot_token, "test_token_123");
    assert_eq!(config.database_url, "json:./data/collections");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.timezone_offset_hours, 5);
    assert_eq!(config.timezone().local_minus_utc(), 5 * 3600);
    assert_eq!(config.admin_ids, vec![111, 222]);
    assert_eq!(config.stats_excluded_ids, vec![333]);
    assert_eq!(config.ballot_capacity, 12);
    assert_eq!((config.open_hour, config.remind_hour, config.reconcile_hour), (9, 13, 22));

    let settings = Settings::from(&config);
    assert_eq!(settings.ballot_capacity, 12);
    assert_eq!(settings.conversation_ttl, chrono::Duration::minutes(15));
    assert_eq!(settings.admin_ids, vec![111, 222]);
}

#[test]
fn test_config_from_env_with_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "required_token");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.database_url, "sqlite:./data/volley.db");
    assert_eq!(config.http_port, 3000);
    assert_eq!(config.timezone_offset_hours, 3);
    assert!(config.admin_ids.is_empty());
    assert_eq!(config.ballot_capacity, 14);
    assert_eq!((config.open_hour, config.remind_hour, config.reconcile_hour), (10, 12, 23));
    assert_eq!(config.conversation_ttl_minutes, 60);
}

#[test]
fn test_config_missing_required_token() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let missing = Config::from_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "   ");
    let blank = Config::from_env();
    clear_env();

    assert!(missing.unwrap_err().to_string().contains("TELEGRAM_BOT_TOKEN"));
    assert!(blank.is_err());
}

#[test]
fn test_config_rejects_invalid_values() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let cases = [
        ("HTTP_PORT", "not_a_number"),
        ("TIMEZONE_OFFSET_HOURS", "15"),
        ("BALLOT_CAPACITY", "0"),
        ("REMIND_HOUR", "24"),
        ("CONVERSATION_TTL_MINUTES", "-5"),
        ("ADMIN_IDS", "12,abc"),
    ];
    for (var, value) in cases {
        clear_env();
        env::set_var("TELEGRAM_BOT_TOKEN", "token");
        env::set_var(var, value);
        let result = Config::from_env();
        clear_env();

        let message = result.unwrap_err().to_string();
        assert!(message.contains(var), "{var}={value}: {message}");
    }
}
