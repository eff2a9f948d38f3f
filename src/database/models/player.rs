use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// Team a player belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team {
    Male,
    Female,
}

/// Team eligibility of a training, game or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TeamScope {
    Male,
    Female,
    Both,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Male => "MALE",
            Team::Female => "FEMALE",
        }
    }
}

impl TeamScope {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamScope::Male => "MALE",
            TeamScope::Female => "FEMALE",
            TeamScope::Both => "BOTH",
        }
    }

    /// Whether a member of `team` is eligible.
    pub fn includes(self, team: Team) -> bool {
        matches!(
            (self, team),
            (TeamScope::Both, _) | (TeamScope::Male, Team::Male) | (TeamScope::Female, Team::Female)
        )
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TeamScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MALE" | "M" => Ok(Team::Male),
            "FEMALE" | "F" => Ok(Team::Female),
            _ => Err(BotError::invalid("team must be MALE or FEMALE")),
        }
    }
}

impl FromStr for TeamScope {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MALE" | "M" => Ok(TeamScope::Male),
            "FEMALE" | "F" => Ok(TeamScope::Female),
            "BOTH" | "ALL" => Ok(TeamScope::Both),
            _ => Err(BotError::invalid("team must be MALE, FEMALE or BOTH")),
        }
    }
}

/// Cumulative attendance counter. `attended <= total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub attended: u32,
    pub total: u32,
}

impl Attendance {
    /// Counts one more accounted session.
    pub fn record(&mut self, attended: bool) {
        self.total += 1;
        if attended {
            self.attended += 1;
        }
    }
}

/// Player document stored under its chat id in `users`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: Option<String>,
    pub team: Option<Team>,
    pub username: Option<String>,
    #[serde(default)]
    pub training_attendance: Attendance,
    #[serde(default)]
    pub game_attendance: Attendance,
    #[serde(default)]
    pub mvp_count: u32,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_excluded_from_stats: bool,
}

impl Player {
    /// Both registration fields are set.
    pub fn is_registered(&self) -> bool {
        self.name.is_some() && self.team.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// `@username` when known, the display name otherwise.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("@{username}"),
            None => self.display_name().to_string(),
        }
    }
}

/// Store key of the player behind a chat id.
pub fn player_key(chat_id: i64) -> String {
    chat_id.to_string()
}
