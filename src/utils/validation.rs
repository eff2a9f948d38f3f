use crate::error::BotError;

pub const MAX_NAME_LEN: usize = 64;
pub const MAX_CARD_LEN: usize = 64;
pub const MAX_TEXT_LEN: usize = 200;
pub const MAX_BROADCAST_LEN: usize = 4000;

pub fn validate_player_name(name: &str) -> Result<String, BotError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(BotError::invalid("Name cannot be empty"));
    }

    if name.chars().count() < 2 {
        return Err(BotError::invalid("Name must be at least 2 characters long"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(BotError::invalid(format!(
            "Name cannot be longer than {MAX_NAME_LEN} characters"
        )));
    }

    if name.contains('\n') || name.contains('\r') {
        return Err(BotError::invalid("Name cannot contain line breaks"));
    }

    if name.starts_with('/') {
        return Err(BotError::invalid("Name cannot start with '/'"));
    }

    Ok(name.to_string())
}

/// Parses a non-negative whole amount. Spaces used as thousands separators
/// are accepted.
pub fn validate_amount(input: &str) -> Result<u64, BotError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(BotError::invalid("Amount cannot be empty"));
    }

    if cleaned.starts_with('-') {
        return Err(BotError::invalid("Amount cannot be negative"));
    }

    let amount: u64 = cleaned
        .parse()
        .map_err(|_| BotError::invalid(format!("'{}' is not a whole number", input.trim())))?;

    if amount == 0 {
        return Err(BotError::invalid("Amount must be greater than zero"));
    }

    Ok(amount)
}

/// Free-form payment destination. Kept verbatim apart from trimming, since
/// debtors copy it as shown.
pub fn validate_card(input: &str) -> Result<String, BotError> {
    let card = input.trim();

    if card.is_empty() {
        return Err(BotError::invalid("Card cannot be empty"));
    }

    if card.chars().count() > MAX_CARD_LEN {
        return Err(BotError::invalid(format!(
            "Card cannot be longer than {MAX_CARD_LEN} characters"
        )));
    }

    if card.contains('\n') || card.contains('\r') {
        return Err(BotError::invalid("Card cannot contain line breaks"));
    }

    Ok(card.to_string())
}

/// Optional free text (location, description). `-` or an empty answer
/// means "none".
pub fn validate_optional_text(field: &str, input: &str) -> Result<Option<String>, BotError> {
    let text = input.trim();

    if text.is_empty() || text == "-" {
        return Ok(None);
    }

    if text.chars().count() > MAX_TEXT_LEN {
        return Err(BotError::invalid(format!(
            "{field} cannot be longer than {MAX_TEXT_LEN} characters"
        )));
    }

    Ok(Some(text.to_string()))
}

pub fn validate_yes_no(input: &str) -> Result<bool, BotError> {
    match input.trim().to_lowercase().as_str() {
        "yes" | "y" | "+" | "true" => Ok(true),
        "no" | "n" | "-" | "false" => Ok(false),
        _ => Err(BotError::invalid("Answer must be 'yes' or 'no'")),
    }
}

pub fn validate_broadcast_text(input: &str) -> Result<String, BotError> {
    let text = input.trim();

    if text.is_empty() {
        return Err(BotError::invalid("Message cannot be empty"));
    }

    if text.chars().count() > MAX_BROADCAST_LEN {
        return Err(BotError::invalid(format!(
            "Message cannot be longer than {MAX_BROADCAST_LEN} characters"
        )));
    }

    Ok(text.to_string())
}

pub fn validate_telegram_chat_id(chat_id: i64) -> Result<(), BotError> {
    // Telegram chat IDs should be non-zero
    if chat_id == 0 {
        return Err(BotError::invalid("Chat ID cannot be zero"));
    }

    if chat_id > 9_999_999_999 {
        return Err(BotError::invalid("Invalid user chat ID range"));
    }

    // Supergroups sit around -100xxxxxxxxxx
    if chat_id < -2_000_000_000_000 {
        return Err(BotError::invalid("Chat ID out of valid range"));
    }

    Ok(())
}

/// Parses a comma separated list of chat ids.
pub fn parse_chat_ids(input: &str) -> Result<Vec<i64>, BotError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let id: i64 = s
                .parse()
                .map_err(|_| BotError::invalid(format!("'{s}' is not a chat id")))?;
            validate_telegram_chat_id(id)?;
            Ok(id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name_valid() {
        assert_eq!(validate_player_name("  Anna  ").ok(), Some("Anna".to_string()));
        assert!(validate_player_name("Ivan Petrov").is_ok());
        assert!(validate_player_name("Юля").is_ok());
    }

    #[test]
    fn test_validate_player_name_invalid() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name("A").is_err());
        assert!(validate_player_name("two\nlines").is_err());
        assert!(validate_player_name("/start").is_err());
        assert!(validate_player_name(&"a".repeat(65)).is_err());
        assert!(validate_player_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_amount() {
        assert_eq!(validate_amount("200").ok(), Some(200));
        assert_eq!(validate_amount(" 1 500 ").ok(), Some(1500));
        assert!(validate_amount("").is_err());
        assert!(validate_amount("0").is_err());
        assert!(validate_amount("-5").is_err());
        assert!(validate_amount("12.5").is_err());
        assert!(validate_amount("abc").is_err());
    }

    #[test]
    fn test_validate_card() {
        assert_eq!(
            validate_card(" 2200 1234 5678 9010 ").ok(),
            Some("2200 1234 5678 9010".to_string())
        );
        assert!(validate_card("").is_err());
        assert!(validate_card("a\nb").is_err());
        assert!(validate_card(&"1".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_optional_text() {
        assert_eq!(validate_optional_text("Location", "-").ok(), Some(None));
        assert_eq!(validate_optional_text("Location", "  ").ok(), Some(None));
        assert_eq!(
            validate_optional_text("Location", " Gym 3 ").ok(),
            Some(Some("Gym 3".to_string()))
        );
        assert!(validate_optional_text("Location", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_yes_no() {
        assert_eq!(validate_yes_no("YES").ok(), Some(true));
        assert_eq!(validate_yes_no("n").ok(), Some(false));
        assert!(validate_yes_no("maybe").is_err());
    }

    #[test]
    fn test_validate_telegram_chat_id() {
        assert!(validate_telegram_chat_id(12345).is_ok());
        assert!(validate_telegram_chat_id(-1001234567890).is_ok());
        assert!(validate_telegram_chat_id(0).is_err());
        assert!(validate_telegram_chat_id(-3000000000000).is_err());
    }

    #[test]
    fn test_parse_chat_ids() {
        assert_eq!(parse_chat_ids("1, 2,,3").ok(), Some(vec![1, 2, 3]));
        assert_eq!(parse_chat_ids("").ok(), Some(vec![]));
        assert!(parse_chat_ids("1,x").is_err());
        assert!(parse_chat_ids("0").is_err());
    }
}
