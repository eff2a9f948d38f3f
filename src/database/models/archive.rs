use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::database::models::ballot::Ballot;
use crate::database::models::player::TeamScope;

/// Immutable snapshot of a training occurrence and its final ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub training_fingerprint: String,
    pub effective_date: NaiveDate,
    pub team_scope: TeamScope,
    pub with_coach: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub ballot: Ballot,
}
