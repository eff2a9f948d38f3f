#![allow(dead_code, clippy::unwrap_used)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use volley_club_bot::bot::handlers::ChatContext;
use volley_club_bot::database::models::{Team, TrainingEntry, TrainingKind, Vote};
use volley_club_bot::database::store::MemoryStore;
use volley_club_bot::services::clock::FixedClock;
use volley_club_bot::services::notifier::RecordingNotifier;
use volley_club_bot::services::orchestrator::{Orchestrator, Settings};
use volley_club_bot::services::registry::TrainingForm;

pub const ADMIN: i64 = 1000;

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Core wired to a memory store, a settable clock and a recording transport.
pub struct TestBot {
    pub core: Arc<Orchestrator>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestBot {
    pub async fn new(now: NaiveDateTime) -> Self {
        Self::with_capacity(now, 14).await
    }

    pub async fn with_capacity(now: NaiveDateTime, capacity: usize) -> Self {
        Self::with_settings(
            now,
            Settings {
                ballot_capacity: capacity,
                conversation_ttl: Duration::minutes(60),
                admin_ids: vec![ADMIN],
                stats_excluded_ids: Vec::new(),
            },
        )
        .await
    }

    pub async fn with_settings(now: NaiveDateTime, settings: Settings) -> Self {
        let clock = Arc::new(FixedClock::new(now));
        let notifier = Arc::new(RecordingNotifier::new());
        let core = Arc::new(Orchestrator::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            notifier.clone(),
            settings,
        ));
        core.provision().await.unwrap();
        Self {
            core,
            clock,
            notifier,
        }
    }

    pub async fn register(&self, chat_id: i64, name: &str, team: Team) {
        self.core.roster.set_name(chat_id, name, None).await.unwrap();
        self.core.roster.set_team(chat_id, team).await.unwrap();
    }

    pub fn ctx(&self, chat_id: i64) -> ChatContext {
        ChatContext::new(chat_id, None, format!("user{chat_id}"))
    }

    /// Adds a training as [`ADMIN`]; the poll opens when it is due.
    pub async fn add(&self, form: TrainingForm) -> TrainingEntry {
        self.core.add_training(ADMIN, &form).await.unwrap().0
    }

    pub async fn vote(&self, chat_id: i64, fingerprint: &str, vote: Vote) {
        self.core.ballots.cast(chat_id, fingerprint, vote).await.unwrap();
    }
}

pub fn one_off(day: &str, voting_open: &str, scope: &str) -> TrainingForm {
    TrainingForm {
        kind: TrainingKind::OneOff,
        day: day.to_string(),
        voting_open: voting_open.to_string(),
        start: "19:00".to_string(),
        end: "21:00".to_string(),
        team_scope: scope.to_string(),
        with_coach: false,
        location: "-".to_string(),
        description: "-".to_string(),
    }
}

pub fn weekly(weekday: &str, voting_open: &str, scope: &str, with_coach: bool) -> TrainingForm {
    TrainingForm {
        kind: TrainingKind::Recurring,
        day: weekday.to_string(),
        voting_open: voting_open.to_string(),
        start: "19:00".to_string(),
        end: "21:00".to_string(),
        team_scope: scope.to_string(),
        with_coach,
        location: "Gym 3".to_string(),
        description: "-".to_string(),
    }
}
