use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// Prefix of player ids created for admin-placed surrogate votes.
pub const SURROGATE_PREFIX: &str = "surrogate_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Yes,
    No,
}

impl Vote {
    pub fn as_str(self) -> &'static str {
        match self {
            Vote::Yes => "yes",
            Vote::No => "no",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vote {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "+" => Ok(Vote::Yes),
            "no" | "n" | "-" => Ok(Vote::No),
            _ => Err(BotError::invalid("vote must be 'yes' or 'no'")),
        }
    }
}

/// One vote with the name shown for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub display_name: String,
    pub vote: Vote,
    pub timestamp: NaiveDateTime,
}

/// Votes of one training, keyed by player id.
pub type Ballot = BTreeMap<String, BallotRecord>;

/// Shape of the `votes` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotesDocument {
    #[serde(default)]
    pub votes: BTreeMap<String, Ballot>,
}

pub fn yes_count(ballot: &Ballot) -> usize {
    ballot.values().filter(|r| r.vote == Vote::Yes).count()
}

/// Capacity predicate: may `player_id` record `vote` without pushing the
/// YES count over `capacity`?
///
/// Only a transition into YES (new voter or NO -> YES) can be refused.
pub fn admits(ballot: &Ballot, player_id: &str, vote: Vote, capacity: usize) -> bool {
    if vote == Vote::No {
        return true;
    }
    match ballot.get(player_id) {
        Some(existing) if existing.vote == Vote::Yes => true,
        _ => yes_count(ballot) < capacity,
    }
}

/// Earliest vote timestamp, if any vote was cast.
pub fn first_vote_at(ballot: &Ballot) -> Option<NaiveDateTime> {
    ballot.values().map(|r| r.timestamp).min()
}

pub fn is_surrogate(player_id: &str) -> bool {
    player_id.starts_with(SURROGATE_PREFIX)
}

/// Deterministic surrogate id for a free-text name, so repeated admin
/// votes for the same name revise one record.
pub fn surrogate_id(name: &str) -> String {
    let normalized: String = name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{SURROGATE_PREFIX}{normalized}")
}
