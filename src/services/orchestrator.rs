//! Couples clock, registry, ballots, billing and archive, and hosts the
//! per-chat conversations.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::conversation::ConversationStore;
use crate::config::Config;
use crate::database::models::{Ballot, Game, TeamScope, TrainingEntry, TrainingKind, TrainingStatus};
use crate::database::store::Store;
use crate::database::{collections, Database};
use crate::error::BotResult;
use crate::services::archive::{ArchiveOutcome, ArchiveWriter};
use crate::services::ballot::BallotEngine;
use crate::services::billing::BillingEngine;
use crate::services::clock::Clock;
use crate::services::notifier::{BroadcastReport, Notifier};
use crate::services::registry::{TrainingForm, TrainingRegistry};
use crate::services::roster::Roster;

/// Runtime knobs of the core.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ballot_capacity: usize,
    pub conversation_ttl: Duration,
    pub admin_ids: Vec<i64>,
    pub stats_excluded_ids: Vec<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ballot_capacity: 14,
            conversation_ttl: Duration::minutes(60),
            admin_ids: Vec::new(),
            stats_excluded_ids: Vec::new(),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            ballot_capacity: config.ballot_capacity,
            conversation_ttl: Duration::minutes(config.conversation_ttl_minutes),
            admin_ids: config.admin_ids.clone(),
            stats_excluded_ids: config.stats_excluded_ids.clone(),
        }
    }
}

/// What reconciliation did with one training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub fingerprint: String,
    pub occurrence: NaiveDate,
    pub auto_charged: bool,
    pub archive: ArchiveOutcome,
}

/// All services wired over one store, clock and transport.
pub struct Orchestrator {
    pub settings: Settings,
    pub db: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub roster: Arc<Roster>,
    pub registry: Arc<TrainingRegistry>,
    pub ballots: Arc<BallotEngine>,
    pub archive: Arc<ArchiveWriter>,
    pub billing: Arc<BillingEngine>,
    pub conversations: ConversationStore,
}

impl Orchestrator {
    /// Builds every component over `store`.
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>, settings: Settings) -> Self {
        let db = Arc::new(Database::new(store));
        let roster = Arc::new(Roster::new(db.clone()));
        let registry = Arc::new(TrainingRegistry::new(db.clone(), clock.clone()));
        let ballots = Arc::new(BallotEngine::new(
            db.clone(),
            roster.clone(),
            registry.clone(),
            notifier.clone(),
            clock.clone(),
            settings.ballot_capacity,
        ));
        let archive = Arc::new(ArchiveWriter::new(
            db.clone(),
            roster.clone(),
            ballots.clone(),
            clock.clone(),
        ));
        let billing = Arc::new(BillingEngine::new(
            db.clone(),
            roster.clone(),
            registry.clone(),
            ballots.clone(),
            archive.clone(),
            notifier.clone(),
        ));
        let conversations = ConversationStore::new(settings.conversation_ttl);

        Self {
            settings,
            db,
            clock,
            notifier,
            roster,
            registry,
            ballots,
            archive,
            billing,
            conversations,
        }
    }

    /// Applies the configured admin and exclusion membership.
    pub async fn provision(&self) -> BotResult<()> {
        self.roster
            .provision(&self.settings.admin_ids, &self.settings.stats_excluded_ids)
            .await
    }

    /// Admin entry point: stores the training and opens its poll right away
    /// when the opening day has already come.
    pub async fn add_training(&self, admin_id: i64, form: &TrainingForm) -> BotResult<(TrainingEntry, Option<BroadcastReport>)> {
        self.roster.require_admin(admin_id).await?;
        let entry = self.registry.add_training(form).await?;

        if entry.training.voting_due(self.clock.today()) {
            let report = self.open_poll(&entry).await?;
            let entry = self.registry.require(&entry.fingerprint()).await?;
            return Ok((entry, Some(report)));
        }
        Ok((entry, None))
    }

    /// Opens the poll of `entry`. A ballot left from a past occurrence of a
    /// recurring training is archived first.
    pub async fn open_poll(&self, entry: &TrainingEntry) -> BotResult<BroadcastReport> {
        if entry.training.kind() == TrainingKind::Recurring {
            let outcome = self.archive.archive(&entry.training, false).await?;
            if matches!(outcome, ArchiveOutcome::Archived { .. }) {
                info!("Archived leftover ballot of {} before reopening", entry.fingerprint());
            }
        }
        self.ballots.open(entry).await
    }

    /// Trainings whose poll opens today and is not yet open.
    pub async fn due_polls(&self) -> BotResult<Vec<TrainingEntry>> {
        let now = self.clock.now();
        let today = now.date();
        Ok(self
            .registry
            .list_all()
            .await?
            .into_iter()
            .filter(|e| !e.training.voting_opened && e.training.voting_opens_on(today))
            .filter(|e| e.training.next_occurrence(now).is_some())
            .collect())
    }

    /// Open polls whose training is exactly `days` ahead.
    pub async fn polls_in(&self, days: i64) -> BotResult<Vec<TrainingEntry>> {
        let now = self.clock.now();
        Ok(self
            .registry
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.training.voting_opened)
            .filter(|e| e.training.next_occurrence(now).is_some_and(|(_, d)| d == days))
            .collect())
    }

    /// End-of-day handling of the last past occurrence of one training.
    ///
    /// Returns `None` when there is nothing to do: the occurrence is not in
    /// the past yet or was already reconciled.
    pub async fn reconcile(&self, fingerprint: &str) -> BotResult<Option<Reconciled>> {
        let _guard = self.db.lock_fingerprint(fingerprint).await;

        let training = self.registry.require(fingerprint).await?.training;
        let now = self.clock.now();
        let occurrence = training.effective_date(now);
        if occurrence >= now.date() || training.last_reconciled == Some(occurrence) {
            return Ok(None);
        }

        let auto_charged = !training.with_coach && training.status == TrainingStatus::NotCharged;
        let archive = if auto_charged {
            let charged = self.registry.mark_charged(fingerprint).await?;
            self.archive.archive_locked(&charged, true).await?
        } else {
            if training.with_coach && training.status == TrainingStatus::NotCharged {
                warn!("Training {} with coach was never charged", fingerprint);
            }
            self.archive.archive_locked(&training, false).await?
        };
        self.registry.mark_reconciled(fingerprint, occurrence).await?;

        info!(
            "Reconciled {} for {}: auto_charged={}, archive={:?}",
            fingerprint, occurrence, auto_charged, archive
        );
        Ok(Some(Reconciled {
            fingerprint: fingerprint.to_string(),
            occurrence,
            auto_charged,
            archive,
        }))
    }

    /// Trainings that can be charged: NOT_CHARGED with an active ballot.
    pub async fn chargeable(&self) -> BotResult<Vec<TrainingEntry>> {
        let active = self.ballots.active().await?;
        Ok(self
            .registry
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.training.status == TrainingStatus::NotCharged)
            .filter(|e| active.contains(&e.fingerprint()))
            .collect())
    }

    /// Admin entry point for [`TrainingRegistry::rescope`].
    pub async fn rescope(&self, admin_id: i64, fingerprint: &str, scope: TeamScope) -> BotResult<TrainingEntry> {
        self.roster.require_admin(admin_id).await?;
        self.registry.rescope(fingerprint, scope).await?;
        self.registry.require(fingerprint).await
    }

    /// Games scheduled on `date`, by id.
    pub async fn games_on(&self, date: NaiveDate) -> BotResult<Vec<(String, Game)>> {
        let games: BTreeMap<String, Game> = self.db.read(collections::GAMES).await?;
        Ok(games.into_iter().filter(|(_, g)| g.date == date).collect())
    }

    /// Votes recorded for one game.
    pub async fn game_ballot(&self, game_id: &str) -> BotResult<Ballot> {
        let mut ballots: BTreeMap<String, Ballot> = self.db.read(collections::GAME_VOTES).await?;
        Ok(ballots.remove(game_id).unwrap_or_default())
    }
}
