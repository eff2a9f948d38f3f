use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::error::BotError;

/// Civil date format used in chat input, fingerprints and labels.
pub const DATE_FORMAT: &str = "%d.%m.%Y";
/// Clock time format used in chat input, fingerprints and labels.
pub const TIME_FORMAT: &str = "%H:%M";

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Parses `DD.MM.YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate, BotError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| BotError::invalid(format!("'{}' is not a date in DD.MM.YYYY format", input.trim())))
}

/// Parses `HH:MM` with `0 <= HH <= 23` and `0 <= MM <= 59`.
pub fn parse_time(input: &str) -> Result<NaiveTime, BotError> {
    let input = input.trim();
    let invalid = || BotError::invalid(format!("'{input}' is not a time in HH:MM format"));

    let (hours, minutes) = input.split_once(':').ok_or_else(invalid)?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 {
        return Err(BotError::invalid(format!("hour {hours} is out of range 0-23")));
    }
    if minutes > 59 {
        return Err(BotError::invalid(format!("minute {minutes} is out of range 0-59")));
    }
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

/// Parses a weekday given as `0..6` (Monday = 0) or an English day name.
pub fn parse_weekday(input: &str) -> Result<u8, BotError> {
    let input = input.trim();
    if let Ok(index) = input.parse::<u8>() {
        if index <= 6 {
            return Ok(index);
        }
        return Err(BotError::invalid(format!("weekday {index} is out of range 0-6")));
    }

    let lowered = input.to_lowercase();
    WEEKDAYS
        .iter()
        .position(|name| {
            let name = name.to_lowercase();
            lowered.len() >= 3 && name.starts_with(&lowered)
        })
        .map(|index| index as u8)
        .ok_or_else(|| BotError::invalid(format!("'{input}' is not a weekday")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn weekday_name(weekday: u8) -> &'static str {
    WEEKDAYS.get(usize::from(weekday)).copied().unwrap_or("?")
}

/// Monday = 0 ... Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// `(weekday - from.weekday) mod 7`.
pub fn days_until_weekday(from: NaiveDate, weekday: u8) -> i64 {
    (i64::from(weekday) - i64::from(weekday_index(from))).rem_euclid(7)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("27.03.2025").ok();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 27));
        assert!(parse_date("2025-03-27").is_err());
        assert!(parse_date("31.02.2025").is_err());
    }

    #[test]
    fn test_parse_time_bounds() {
        assert_eq!(parse_time("19:00").ok(), NaiveTime::from_hms_opt(19, 0, 0));
        assert_eq!(parse_time("7:05").ok(), NaiveTime::from_hms_opt(7, 5, 0));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("23:60").is_err());
        assert!(parse_time("1900").is_err());
        assert!(parse_time("19:0").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("1").ok(), Some(1));
        assert_eq!(parse_weekday("tuesday").ok(), Some(1));
        assert_eq!(parse_weekday("Sun").ok(), Some(6));
        assert!(parse_weekday("7").is_err());
        assert!(parse_weekday("tu").is_err());
    }

    #[test]
    fn test_days_until_weekday() {
        // 27.03.2025 is a Thursday
        let thursday = NaiveDate::from_ymd_opt(2025, 3, 27).unwrap();
        assert_eq!(weekday_index(thursday), 3);
        assert_eq!(days_until_weekday(thursday, 3), 0);
        assert_eq!(days_until_weekday(thursday, 1), 5);
        assert_eq!(days_until_weekday(thursday, 6), 3);
    }
}
