use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::database::collections;
use crate::database::models::player::TeamScope;
use crate::utils::datetime::{
    days_until_weekday, format_date, format_time, weekday_index, weekday_name,
};

/// Billing state of a training.
///
/// `NotCharged -> Charged -> Collected`; `Charged` is also reached by
/// reconciliation of a coach-less training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingStatus {
    NotCharged,
    Charged,
    Collected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrainingKind {
    OneOff,
    Recurring,
}

/// When a training happens and when its poll opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Schedule {
    OneOff {
        date: NaiveDate,
        voting_open_date: NaiveDate,
    },
    Recurring {
        weekday: u8,
        voting_open_weekday: u8,
    },
}

/// A stored training, one-off or recurring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Training {
    pub schedule: Schedule,
    pub team_scope: TeamScope,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub with_coach: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: TrainingStatus,
    pub voting_opened: bool,
    /// Occurrence date last handled by end-of-day reconciliation.
    #[serde(default)]
    pub last_reconciled: Option<NaiveDate>,
}

impl Training {
    pub fn kind(&self) -> TrainingKind {
        match self.schedule {
            Schedule::OneOff { .. } => TrainingKind::OneOff,
            Schedule::Recurring { .. } => TrainingKind::Recurring,
        }
    }

    /// Stable join key: `<DD.MM.YYYY>_<HH:MM>` or `const_<weekday>_<HH:MM>`.
    pub fn fingerprint(&self) -> String {
        match self.schedule {
            Schedule::OneOff { date, .. } => {
                format!("{}_{}", format_date(date), format_time(self.start))
            }
            Schedule::Recurring { weekday, .. } => {
                format!("const_{}_{}", weekday, format_time(self.start))
            }
        }
    }

    /// Collection holding trainings of this kind.
    pub fn collection(&self) -> &'static str {
        collection_for(self.kind())
    }

    /// Human readable date/time span.
    pub fn label(&self) -> String {
        let span = format!("{}-{}", format_time(self.start), format_time(self.end));
        match self.schedule {
            Schedule::OneOff { date, .. } => format!("{} {}", format_date(date), span),
            Schedule::Recurring { weekday, .. } => format!("every {} {}", weekday_name(weekday), span),
        }
    }

    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        match self.schedule {
            Schedule::OneOff { date: day, .. } => day == date,
            Schedule::Recurring { weekday, .. } => weekday_index(date) == weekday,
        }
    }

    /// Upcoming instance relative to `now` as `(date, days_until)`.
    ///
    /// A one-off instance must start strictly after `now`. A recurring
    /// training yields its instance within the next 7 days; today's instance
    /// only counts while it has not started.
    pub fn next_occurrence(&self, now: NaiveDateTime) -> Option<(NaiveDate, i64)> {
        let today = now.date();
        match self.schedule {
            Schedule::OneOff { date, .. } => {
                (date.and_time(self.start) > now).then(|| (date, (date - today).num_days()))
            }
            Schedule::Recurring { weekday, .. } => {
                let days = days_until_weekday(today, weekday);
                if days == 0 && now.time() >= self.start {
                    return None;
                }
                Some((today + Duration::days(days), days))
            }
        }
    }

    /// Calendar date of the most recent occurrence a ballot pertains to.
    ///
    /// For a recurring training on its own weekday the occurrence only
    /// becomes today's once it has ended.
    pub fn effective_date(&self, now: NaiveDateTime) -> NaiveDate {
        match self.schedule {
            Schedule::OneOff { date, .. } => date,
            Schedule::Recurring { weekday, .. } => {
                let today = now.date();
                let back = (i64::from(weekday_index(today)) - i64::from(weekday)).rem_euclid(7);
                let mut date = today - Duration::days(back);
                if back == 0 && now.time() < self.end {
                    date -= Duration::days(7);
                }
                date
            }
        }
    }

    /// End of the occurrence on `date`.
    pub fn ends_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.end)
    }

    /// Whether the poll should already be open on `today`.
    pub fn voting_due(&self, today: NaiveDate) -> bool {
        match self.schedule {
            Schedule::OneOff { voting_open_date, .. } => voting_open_date <= today,
            Schedule::Recurring {
                weekday,
                voting_open_weekday,
            } => {
                let lead = (i64::from(weekday) - i64::from(voting_open_weekday)).rem_euclid(7);
                days_until_weekday(today, weekday) <= lead
            }
        }
    }

    /// Whether `today` is the configured poll opening day.
    pub fn voting_opens_on(&self, today: NaiveDate) -> bool {
        match self.schedule {
            Schedule::OneOff { voting_open_date, .. } => voting_open_date == today,
            Schedule::Recurring {
                voting_open_weekday, ..
            } => weekday_index(today) == voting_open_weekday,
        }
    }
}

pub fn collection_for(kind: TrainingKind) -> &'static str {
    match kind {
        TrainingKind::OneOff => collections::ONE_TIME_TRAININGS,
        TrainingKind::Recurring => collections::CONSTANT_TRAININGS,
    }
}

/// A stored training together with its collection key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingEntry {
    pub id: String,
    pub training: Training,
}

impl TrainingEntry {
    pub fn fingerprint(&self) -> String {
        self.training.fingerprint()
    }
}

/// One concrete upcoming instance of a training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingInstance {
    pub id: String,
    pub training: Training,
    pub date: NaiveDate,
    pub days_until: i64,
}

impl TrainingInstance {
    pub fn fingerprint(&self) -> String {
        self.training.fingerprint()
    }

    /// Ranking: days ahead, then start time, one-off before recurring,
    /// then id.
    pub fn rank(&self, other: &Self) -> Ordering {
        self.days_until
            .cmp(&other.days_until)
            .then(self.training.start.cmp(&other.training.start))
            .then(self.training.kind().cmp(&other.training.kind()))
            .then(self.id.cmp(&other.id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn tuesday_training() -> Training {
        Training {
            schedule: Schedule::Recurring {
                weekday: 1,
                voting_open_weekday: 6,
            },
            team_scope: TeamScope::Both,
            start: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            with_coach: false,
            location: None,
            description: None,
            status: TrainingStatus::NotCharged,
            voting_opened: false,
            last_reconciled: None,
        }
    }

    #[test]
    fn test_fingerprints() {
        let mut training = tuesday_training();
        assert_eq!(training.fingerprint(), "const_1_19:00");

        training.schedule = Schedule::OneOff {
            date: NaiveDate::from_ymd_opt(2025, 3, 27).unwrap(),
            voting_open_date: NaiveDate::from_ymd_opt(2025, 3, 25).unwrap(),
        };
        assert_eq!(training.fingerprint(), "27.03.2025_19:00");
        assert_eq!(training.collection(), collections::ONE_TIME_TRAININGS);
    }

    #[test]
    fn test_effective_date_recurring() {
        let training = tuesday_training();
        // Wednesday 26.03.2025 -> yesterday
        assert_eq!(
            training.effective_date(at(2025, 3, 26, 10, 0)),
            NaiveDate::from_ymd_opt(2025, 3, 25).unwrap()
        );
        // Tuesday before the end -> previous week
        assert_eq!(
            training.effective_date(at(2025, 3, 25, 20, 0)),
            NaiveDate::from_ymd_opt(2025, 3, 18).unwrap()
        );
        // Tuesday after the end -> today
        assert_eq!(
            training.effective_date(at(2025, 3, 25, 21, 30)),
            NaiveDate::from_ymd_opt(2025, 3, 25).unwrap()
        );
    }

    #[test]
    fn test_next_occurrence_recurring_today() {
        let training = tuesday_training();
        assert_eq!(
            training.next_occurrence(at(2025, 3, 25, 18, 0)),
            Some((NaiveDate::from_ymd_opt(2025, 3, 25).unwrap(), 0))
        );
        assert_eq!(training.next_occurrence(at(2025, 3, 25, 19, 0)), None);
        assert_eq!(
            training.next_occurrence(at(2025, 3, 26, 9, 0)),
            Some((NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), 6))
        );
    }

    #[test]
    fn test_voting_due_recurring() {
        // Poll opens Sunday for a Tuesday training: lead of 2 days.
        let training = tuesday_training();
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 22).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 23).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 24).unwrap();
        assert!(!training.voting_due(saturday));
        assert!(training.voting_due(sunday));
        assert!(training.voting_due(monday));
        assert!(training.voting_opens_on(sunday));
        assert!(!training.voting_opens_on(monday));
    }

    #[test]
    fn test_document_round_trip() {
        let training = tuesday_training();
        let json = serde_json::to_value(&training).unwrap();
        assert_eq!(json["schedule"]["kind"], "RECURRING");
        assert_eq!(json["status"], "NOT_CHARGED");
        let back: Training = serde_json::from_value(json).unwrap();
        assert_eq!(back, training);
    }
}
