use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::database::models::player::TeamScope;

/// Game catalog entry. Games are managed outside the attendance pipeline;
/// only the fields read by the game reminder job are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub opponent: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "both_teams")]
    pub team_scope: TeamScope,
}

fn both_teams() -> TeamScope {
    TeamScope::Both
}
