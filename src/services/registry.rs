//! Catalog of scheduled trainings and their lifecycle state.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::database::models::{
    collection_for, Schedule, Team, TeamScope, Training, TrainingEntry, TrainingInstance, TrainingKind,
    TrainingStatus,
};
use crate::database::{collections, Database};
use crate::error::{BotError, BotResult, Conflict};
use crate::services::clock::Clock;
use crate::utils::datetime::{parse_date, parse_time, parse_weekday};
use crate::utils::validation::validate_optional_text;

/// Shape of a training collection, keyed by id.
pub type Trainings = BTreeMap<String, Training>;

/// Raw answers collected by the add-training conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingForm {
    pub kind: TrainingKind,
    /// `DD.MM.YYYY` for one-off trainings, a weekday otherwise.
    pub day: String,
    /// Same format as `day`.
    pub voting_open: String,
    pub start: String,
    pub end: String,
    pub team_scope: String,
    pub with_coach: bool,
    pub location: String,
    pub description: String,
}

impl TrainingForm {
    /// Validates every field against `now` and builds a fresh training.
    pub fn validate(&self, now: NaiveDateTime) -> BotResult<Training> {
        let start = parse_time(&self.start)?;
        let end = parse_time(&self.end)?;
        if end <= start {
            return Err(BotError::invalid("end time must be after start time"));
        }

        let schedule = match self.kind {
            TrainingKind::OneOff => {
                let date = parse_date(&self.day)?;
                if date.and_time(start) <= now {
                    return Err(BotError::invalid("training date must be in the future"));
                }
                let voting_open_date = parse_date(&self.voting_open)?;
                if voting_open_date > date {
                    return Err(BotError::invalid("voting cannot open after the training"));
                }
                Schedule::OneOff {
                    date,
                    voting_open_date,
                }
            }
            TrainingKind::Recurring => Schedule::Recurring {
                weekday: parse_weekday(&self.day)?,
                voting_open_weekday: parse_weekday(&self.voting_open)?,
            },
        };

        let mut training = Training {
            schedule,
            team_scope: self.team_scope.parse()?,
            start,
            end,
            with_coach: self.with_coach,
            location: validate_optional_text("Location", &self.location)?,
            description: validate_optional_text("Description", &self.description)?,
            status: TrainingStatus::NotCharged,
            voting_opened: false,
            last_reconciled: None,
        };
        // Occurrences before admission are never reconciled.
        if training.kind() == TrainingKind::Recurring {
            training.last_reconciled = Some(training.effective_date(now));
        }
        Ok(training)
    }
}

/// Collection a fingerprint belongs to.
fn collection_of(fingerprint: &str) -> &'static str {
    if fingerprint.starts_with("const_") {
        collection_for(TrainingKind::Recurring)
    } else {
        collection_for(TrainingKind::OneOff)
    }
}

fn next_id(trainings: &Trainings) -> String {
    let max = trainings.keys().filter_map(|k| k.parse::<u64>().ok()).max();
    max.map_or(1, |id| id + 1).to_string()
}

/// One-off and recurring trainings.
pub struct TrainingRegistry {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl TrainingRegistry {
    /// Registry over `db`; `clock` anchors upcoming listings.
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Validates `form` and stores the training.
    pub async fn add_training(&self, form: &TrainingForm) -> BotResult<TrainingEntry> {
        let training = form.validate(self.clock.now())?;
        self.insert(training).await
    }

    /// Stores an already validated training under a fresh id.
    pub async fn insert(&self, training: Training) -> BotResult<TrainingEntry> {
        let fingerprint = training.fingerprint();
        let entry = self
            .db
            .update(training.collection(), |trainings: &mut Trainings| {
                if trainings.values().any(|t| t.fingerprint() == fingerprint) {
                    return Err(Conflict::DuplicateTraining(fingerprint.clone()).into());
                }
                let id = next_id(trainings);
                trainings.insert(id.clone(), training.clone());
                Ok(TrainingEntry { id, training })
            })
            .await?;
        info!("Training {} added with id {}", fingerprint, entry.id);
        Ok(entry)
    }

    /// Every stored training, one-off first, then by numeric id.
    pub async fn list_all(&self) -> BotResult<Vec<TrainingEntry>> {
        let mut entries = Vec::new();
        for collection in [collections::ONE_TIME_TRAININGS, collections::CONSTANT_TRAININGS] {
            let trainings: Trainings = self.db.read(collection).await?;
            let mut batch: Vec<_> = trainings
                .into_iter()
                .map(|(id, training)| TrainingEntry { id, training })
                .collect();
            batch.sort_by_key(|e| e.id.parse::<u64>().unwrap_or(u64::MAX));
            entries.extend(batch);
        }
        Ok(entries)
    }

    /// Upcoming instances visible to `team` (all trainings for `None`)
    /// within `window_days` of today, best ranked first.
    pub async fn list_upcoming(&self, team: Option<Team>, window_days: Option<i64>) -> BotResult<Vec<TrainingInstance>> {
        let now = self.clock.now();
        let mut instances: Vec<TrainingInstance> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| team.map_or(true, |t| e.training.team_scope.includes(t)))
            .filter_map(|e| {
                let (date, days_until) = e.training.next_occurrence(now)?;
                if window_days.is_some_and(|w| days_until >= w) {
                    return None;
                }
                Some(TrainingInstance {
                    id: e.id,
                    training: e.training,
                    date,
                    days_until,
                })
            })
            .collect();
        instances.sort_by(|a, b| a.rank(b));
        Ok(instances)
    }

    /// Closest upcoming training for `team`.
    pub async fn next_training(&self, team: Team) -> BotResult<Option<TrainingInstance>> {
        Ok(self.list_upcoming(Some(team), None).await?.into_iter().next())
    }

    /// Instances in `[today, today + 7)`.
    pub async fn week_trainings(&self, team: Team) -> BotResult<Vec<TrainingInstance>> {
        self.list_upcoming(Some(team), Some(7)).await
    }

    /// Training stored under `fingerprint`, if any.
    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> BotResult<Option<TrainingEntry>> {
        let trainings: Trainings = self.db.read(collection_of(fingerprint)).await?;
        Ok(trainings
            .into_iter()
            .find(|(_, t)| t.fingerprint() == fingerprint)
            .map(|(id, training)| TrainingEntry { id, training }))
    }

    /// Like [`TrainingRegistry::find_by_fingerprint`], failing with NOT_FOUND.
    pub async fn require(&self, fingerprint: &str) -> BotResult<TrainingEntry> {
        self.find_by_fingerprint(fingerprint)
            .await?
            .ok_or_else(|| BotError::not_found("training", fingerprint))
    }

    /// Applies `change` to the training behind `fingerprint` and returns the
    /// updated copy.
    async fn modify<F>(&self, fingerprint: &str, change: F) -> BotResult<Training>
    where
        F: FnOnce(&mut Training) -> BotResult<()>,
    {
        self.db
            .update(collection_of(fingerprint), |trainings: &mut Trainings| {
                let training = trainings
                    .values_mut()
                    .find(|t| t.fingerprint() == fingerprint)
                    .ok_or_else(|| BotError::not_found("training", fingerprint))?;
                change(training)?;
                Ok(training.clone())
            })
            .await
    }

    /// Unconditional status overwrite, for admin corrections.
    pub async fn set_status(&self, fingerprint: &str, status: TrainingStatus) -> BotResult<Training> {
        let training = self
            .modify(fingerprint, |t| {
                t.status = status;
                Ok(())
            })
            .await?;
        info!("Training {} status set to {:?}", fingerprint, status);
        Ok(training)
    }

    /// Latches `voting_opened`. A recurring training starts a new billing
    /// cycle here: the previous occurrence counts as reconciled.
    pub async fn mark_voting_opened(&self, fingerprint: &str) -> BotResult<Training> {
        let now = self.clock.now();
        self.modify(fingerprint, |t| {
            t.voting_opened = true;
            if t.kind() == TrainingKind::Recurring {
                t.status = TrainingStatus::NotCharged;
                t.last_reconciled = Some(t.effective_date(now));
            }
            Ok(())
        })
        .await
    }

    /// NOT_CHARGED -> CHARGED; closes voting.
    pub async fn mark_charged(&self, fingerprint: &str) -> BotResult<Training> {
        self.modify(fingerprint, |t| {
            if t.status != TrainingStatus::NotCharged {
                return Err(Conflict::AlreadyCharged.into());
            }
            t.status = TrainingStatus::Charged;
            t.voting_opened = false;
            Ok(())
        })
        .await
    }

    /// CHARGED -> COLLECTED. Returns whether the transition happened.
    pub async fn mark_collected(&self, fingerprint: &str) -> BotResult<bool> {
        let mut moved = false;
        self.modify(fingerprint, |t| {
            if t.status == TrainingStatus::Charged {
                t.status = TrainingStatus::Collected;
                moved = true;
            }
            Ok(())
        })
        .await?;
        Ok(moved)
    }

    /// Changes which teams the training is for.
    pub async fn rescope(&self, fingerprint: &str, scope: TeamScope) -> BotResult<Training> {
        let training = self
            .modify(fingerprint, |t| {
                t.team_scope = scope;
                Ok(())
            })
            .await?;
        info!("Training {} rescoped to {}", fingerprint, scope);
        Ok(training)
    }

    /// Records that reconciliation handled the occurrence on `date`.
    pub async fn mark_reconciled(&self, fingerprint: &str, date: NaiveDate) -> BotResult<Training> {
        self.modify(fingerprint, |t| {
            t.last_reconciled = Some(date);
            t.voting_opened = false;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::database::store::MemoryStore;
    use crate::services::clock::FixedClock;

    fn registry() -> TrainingRegistry {
        // Tuesday 25.03.2025 09:00
        let now = NaiveDate::from_ymd_opt(2025, 3, 25).unwrap().and_hms_opt(9, 0, 0).unwrap();
        TrainingRegistry::new(
            Arc::new(Database::new(Arc::new(MemoryStore::new()))),
            Arc::new(FixedClock::new(now)),
        )
    }

    fn one_off(day: &str) -> TrainingForm {
        TrainingForm {
            kind: TrainingKind::OneOff,
            day: day.into(),
            voting_open: "24.03.2025".into(),
            start: "19:00".into(),
            end: "21:00".into(),
            team_scope: "MALE".into(),
            with_coach: false,
            location: "-".into(),
            description: "".into(),
        }
    }

    #[tokio::test]
    async fn test_add_training_assigns_monotonic_ids() {
        let registry = registry();
        let first = registry.add_training(&one_off("27.03.2025")).await.unwrap();
        let second = registry.add_training(&one_off("28.03.2025")).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
        assert_eq!(first.fingerprint(), "27.03.2025_19:00");
    }

    #[tokio::test]
    async fn test_add_training_rejects_duplicates_and_bad_input() {
        let registry = registry();
        registry.add_training(&one_off("27.03.2025")).await.unwrap();

        let dup = registry.add_training(&one_off("27.03.2025")).await;
        assert!(matches!(dup, Err(BotError::StateConflict(Conflict::DuplicateTraining(_)))));

        let past = registry.add_training(&one_off("20.03.2025")).await;
        assert!(matches!(past, Err(BotError::InvalidInput(_))));

        let mut late = one_off("27.03.2025");
        late.start = "24:00".into();
        assert!(registry.add_training(&late).await.is_err());

        let mut inverted = one_off("29.03.2025");
        inverted.end = "18:00".into();
        assert!(registry.add_training(&inverted).await.is_err());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let registry = registry();
        let entry = registry.add_training(&one_off("27.03.2025")).await.unwrap();
        let fp = entry.fingerprint();

        assert!(!registry.mark_collected(&fp).await.unwrap());
        registry.mark_charged(&fp).await.unwrap();
        assert!(matches!(
            registry.mark_charged(&fp).await,
            Err(BotError::StateConflict(Conflict::AlreadyCharged))
        ));
        assert!(registry.mark_collected(&fp).await.unwrap());
        assert_eq!(registry.require(&fp).await.unwrap().training.status, TrainingStatus::Collected);
    }

    #[tokio::test]
    async fn test_set_status_overwrites() {
        let registry = registry();
        let fp = registry.add_training(&one_off("27.03.2025")).await.unwrap().fingerprint();

        registry.set_status(&fp, TrainingStatus::Collected).await.unwrap();
        let training = registry.set_status(&fp, TrainingStatus::NotCharged).await.unwrap();
        assert_eq!(training.status, TrainingStatus::NotCharged);
        assert!(registry.mark_charged(&fp).await.is_ok());
    }

    #[tokio::test]
    async fn test_rescope_and_missing_training() {
        let registry = registry();
        let entry = registry.add_training(&one_off("27.03.2025")).await.unwrap();
        let training = registry.rescope(&entry.fingerprint(), TeamScope::Both).await.unwrap();
        assert_eq!(training.team_scope, TeamScope::Both);

        assert!(matches!(
            registry.rescope("01.01.2030_10:00", TeamScope::Male).await,
            Err(BotError::NotFound { .. })
        ));
    }
}
