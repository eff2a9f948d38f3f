use anyhow::{anyhow, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::str::FromStr;

use crate::utils::validation::parse_chat_ids;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/volley.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    /// Offset of the club's civil timezone from UTC, in hours.
    pub timezone_offset_hours: i32,
    pub admin_ids: Vec<i64>,
    pub stats_excluded_ids: Vec<i64>,
    pub ballot_capacity: usize,
    pub open_hour: u32,
    pub remind_hour: u32,
    pub reconcile_hour: u32,
    pub conversation_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = database_url_from_env();

        let http_port = parse_var("HTTP_PORT", 3000u16)?;

        let timezone_offset_hours = parse_var("TIMEZONE_OFFSET_HOURS", 3i32)?;
        if !(-12..=14).contains(&timezone_offset_hours) {
            return Err(anyhow!("Invalid TIMEZONE_OFFSET_HOURS: must be between -12 and 14"));
        }

        let ballot_capacity = parse_var("BALLOT_CAPACITY", 14usize)?;
        if ballot_capacity == 0 {
            return Err(anyhow!("Invalid BALLOT_CAPACITY: must be at least 1"));
        }

        let open_hour = parse_hour("OPEN_HOUR", 10)?;
        let remind_hour = parse_hour("REMIND_HOUR", 12)?;
        let reconcile_hour = parse_hour("RECONCILE_HOUR", 23)?;

        let conversation_ttl_minutes = parse_var("CONVERSATION_TTL_MINUTES", 60i64)?;
        if conversation_ttl_minutes <= 0 {
            return Err(anyhow!("Invalid CONVERSATION_TTL_MINUTES: must be positive"));
        }

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            timezone_offset_hours,
            admin_ids: parse_id_list("ADMIN_IDS")?,
            stats_excluded_ids: parse_id_list("STATS_EXCLUDED_IDS")?,
            ballot_capacity,
            open_hour,
            remind_hour,
            reconcile_hour,
            conversation_ttl_minutes,
        })
    }

    /// The club's fixed civil timezone.
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// `DATABASE_URL`, or the default SQLite file when unset or blank.
pub fn database_url_from_env() -> String {
    match env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => DEFAULT_DATABASE_URL.to_string(),
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {}", name)),
        _ => Ok(default),
    }
}

fn parse_hour(name: &str, default: u32) -> Result<u32> {
    let hour = parse_var(name, default)?;
    if hour > 23 {
        return Err(anyhow!("Invalid {}: hour must be between 0 and 23", name));
    }
    Ok(hour)
}

fn parse_id_list(name: &str) -> Result<Vec<i64>> {
    let raw = env::var(name).unwrap_or_default();
    parse_chat_ids(&raw).map_err(|e| anyhow!("Invalid {}: {}", name, e))
}
