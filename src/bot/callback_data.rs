//! Inline button payload grammar.
//!
//! Payloads are `<action>_<selector>[_...]` strings of at most 64 bytes.
//! They are parsed once at the transport edge into [`CallbackAction`] and
//! dispatched on the tag. Parsing is left-anchored and ignores trailing
//! selectors it does not need, so payloads of in-flight messages stay valid.

use std::fmt;
use std::str::FromStr;

use crate::database::models::{TeamScope, Vote};
use crate::error::BotError;

/// Telegram limit for callback data.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Parsed inline button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `vote_yes_<fp>` / `vote_no_<fp>`
    Vote { vote: Vote, fingerprint: String },
    /// `paid_yes_<fp>_<player_id>`
    Paid {
        fingerprint: String,
        player_id: String,
    },
    /// `paydebt_select_<n>`
    PayDebtSelect(usize),
    /// `paydebt_confirm_yes`
    PayDebtConfirm,
    /// `view_payment_<n>`
    ViewPayment(usize),
    /// `charge_select_<n>`
    ChargeSelect(usize),
    /// `send_team_<MALE|FEMALE|BOTH>`
    SendTeam(TeamScope),
}

impl CallbackAction {
    /// Payload string for the button.
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Vote { vote, fingerprint } => format!("vote_{}_{}", vote.as_str(), fingerprint),
            CallbackAction::Paid {
                fingerprint,
                player_id,
            } => format!("paid_yes_{fingerprint}_{player_id}"),
            CallbackAction::PayDebtSelect(index) => format!("paydebt_select_{index}"),
            CallbackAction::PayDebtConfirm => "paydebt_confirm_yes".to_string(),
            CallbackAction::ViewPayment(index) => format!("view_payment_{index}"),
            CallbackAction::ChargeSelect(index) => format!("charge_select_{index}"),
            CallbackAction::SendTeam(scope) => format!("send_team_{}", scope.as_str()),
        }
    }

    /// Whether the encoded payload fits the transport limit.
    pub fn fits(&self) -> bool {
        self.encode().len() <= MAX_PAYLOAD_LEN
    }

    /// Parses a payload received from Telegram.
    pub fn parse(data: &str) -> Result<Self, BotError> {
        let invalid = || BotError::invalid(format!("unknown button payload '{data}'"));

        if let Some(fingerprint) = data.strip_prefix("vote_yes_") {
            return vote(Vote::Yes, fingerprint).ok_or_else(invalid);
        }
        if let Some(fingerprint) = data.strip_prefix("vote_no_") {
            return vote(Vote::No, fingerprint).ok_or_else(invalid);
        }
        if let Some(rest) = data.strip_prefix("paid_yes_") {
            let (fingerprint, player_id) = split_fingerprint(rest).ok_or_else(invalid)?;
            return Ok(CallbackAction::Paid {
                fingerprint: fingerprint.to_string(),
                player_id: player_id.to_string(),
            });
        }
        if data.starts_with("paydebt_confirm_yes") {
            return Ok(CallbackAction::PayDebtConfirm);
        }
        if let Some(rest) = data.strip_prefix("paydebt_select_") {
            return index(rest).map(CallbackAction::PayDebtSelect).ok_or_else(invalid);
        }
        if let Some(rest) = data.strip_prefix("view_payment_") {
            return index(rest).map(CallbackAction::ViewPayment).ok_or_else(invalid);
        }
        if let Some(rest) = data.strip_prefix("charge_select_") {
            return index(rest).map(CallbackAction::ChargeSelect).ok_or_else(invalid);
        }
        if let Some(rest) = data.strip_prefix("send_team_") {
            let selector = rest.split('_').next().unwrap_or_default();
            return selector
                .parse::<TeamScope>()
                .map(CallbackAction::SendTeam)
                .map_err(|_| invalid());
        }
        Err(invalid())
    }
}

fn vote(vote: Vote, fingerprint: &str) -> Option<CallbackAction> {
    (!fingerprint.is_empty()).then(|| CallbackAction::Vote {
        vote,
        fingerprint: fingerprint.to_string(),
    })
}

/// Splits `<fp>_<player_id>`. The fingerprint is `DD.MM.YYYY_HH:MM` or
/// `const_<weekday>_<HH:MM>`; player ids may contain `_` themselves.
fn split_fingerprint(rest: &str) -> Option<(&str, &str)> {
    let separators = if rest.starts_with("const_") { 3 } else { 2 };
    let split_at = rest.match_indices('_').nth(separators - 1)?.0;
    let (fingerprint, player_id) = (&rest[..split_at], &rest[split_at + 1..]);
    if player_id.is_empty() || fingerprint.split('_').any(str::is_empty) {
        return None;
    }
    Some((fingerprint, player_id))
}

fn index(selectors: &str) -> Option<usize> {
    selectors.split('_').next()?.parse().ok()
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CallbackAction {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallbackAction::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vote_keeps_whole_fingerprint() {
        assert_eq!(
            CallbackAction::parse("vote_yes_const_1_19:00").unwrap(),
            CallbackAction::Vote {
                vote: Vote::Yes,
                fingerprint: "const_1_19:00".into()
            }
        );
        assert_eq!(
            CallbackAction::parse("vote_no_27.03.2025_19:00").unwrap(),
            CallbackAction::Vote {
                vote: Vote::No,
                fingerprint: "27.03.2025_19:00".into()
            }
        );
    }

    #[test]
    fn test_parse_paid_splits_after_fingerprint() {
        assert_eq!(
            CallbackAction::parse("paid_yes_const_1_19:00_123456789").unwrap(),
            CallbackAction::Paid {
                fingerprint: "const_1_19:00".into(),
                player_id: "123456789".into()
            }
        );
        assert_eq!(
            CallbackAction::parse("paid_yes_27.03.2025_19:00_surrogate_ivan-petrov").unwrap(),
            CallbackAction::Paid {
                fingerprint: "27.03.2025_19:00".into(),
                player_id: "surrogate_ivan-petrov".into()
            }
        );
        assert_eq!(
            CallbackAction::parse("paid_yes_const_6_10:30_surrogate_guest").unwrap(),
            CallbackAction::Paid {
                fingerprint: "const_6_10:30".into(),
                player_id: "surrogate_guest".into()
            }
        );
    }

    #[test]
    fn test_parse_indices_accept_trailing_selectors() {
        assert_eq!(
            CallbackAction::parse("charge_select_3").unwrap(),
            CallbackAction::ChargeSelect(3)
        );
        assert_eq!(
            CallbackAction::parse("view_payment_0_extra").unwrap(),
            CallbackAction::ViewPayment(0)
        );
        assert_eq!(
            CallbackAction::parse("paydebt_select_12").unwrap(),
            CallbackAction::PayDebtSelect(12)
        );
        assert_eq!(
            CallbackAction::parse("paydebt_confirm_yes").unwrap(),
            CallbackAction::PayDebtConfirm
        );
        assert_eq!(
            CallbackAction::parse("send_team_FEMALE").unwrap(),
            CallbackAction::SendTeam(TeamScope::Female)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for data in [
            "",
            "vote_yes_",
            "charge_select_x",
            "paid_yes_nounderscore",
            "paid_yes_27.03.2025_19:00",
            "paid_yes_const_1_19:00_",
            "settings:close",
            "send_team_KIDS",
        ] {
            assert!(CallbackAction::parse(data).is_err(), "{data} should be rejected");
        }
    }

    #[test]
    fn test_encode_parse_and_length() {
        let actions = vec![
            CallbackAction::Vote {
                vote: Vote::No,
                fingerprint: "27.03.2025_19:00".into(),
            },
            CallbackAction::Paid {
                fingerprint: "const_6_10:30".into(),
                player_id: "-1001234567890".into(),
            },
            CallbackAction::SendTeam(TeamScope::Both),
        ];
        for action in actions {
            assert!(action.fits());
            assert_eq!(CallbackAction::parse(&action.encode()).unwrap(), action);
        }
    }
}
