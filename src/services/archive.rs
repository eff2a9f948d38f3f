//! Archive & statistics writer.
//!
//! Archiving a ballot appends an immutable entry, writes the attendance
//! back into the roster and deletes the ballot. All three happen under the
//! fingerprint lock, so a ballot is accounted at most once.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::models::{first_vote_at, ArchiveEntry, Training, TrainingKind};
use crate::database::{collections, Database};
use crate::error::BotResult;
use crate::services::ballot::BallotEngine;
use crate::services::clock::Clock;
use crate::services::roster::Roster;

/// Shape of the archive collection, keyed by sequential id.
pub type Archive = BTreeMap<String, ArchiveEntry>;

/// What an archive call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { id: String, players_updated: usize },
    /// The occurrence has not happened yet.
    NotDue,
    /// The ballot belongs to the upcoming occurrence.
    FreshBallot,
    NoBallot,
}

/// Moves finished ballots into the archive and updates attendance.
pub struct ArchiveWriter {
    db: Arc<Database>,
    roster: Arc<Roster>,
    ballots: Arc<BallotEngine>,
    clock: Arc<dyn Clock>,
}

impl ArchiveWriter {
    /// Wires the writer to its collaborators.
    pub fn new(db: Arc<Database>, roster: Arc<Roster>, ballots: Arc<BallotEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            roster,
            ballots,
            clock,
        }
    }

    /// Archives the ballot of `training`. Without `force` only past occurrences qualify.
    pub async fn archive(&self, training: &Training, force: bool) -> BotResult<ArchiveOutcome> {
        let _guard = self.db.lock_fingerprint(&training.fingerprint()).await;
        self.archive_locked(training, force).await
    }

    /// Same as [`ArchiveWriter::archive`] for callers already holding the
    /// fingerprint lock.
    pub async fn archive_locked(&self, training: &Training, force: bool) -> BotResult<ArchiveOutcome> {
        let fingerprint = training.fingerprint();
        let now = self.clock.now();
        let effective_date = training.effective_date(now);

        if !force && effective_date >= now.date() {
            debug!("Archive of {} skipped: occurrence {} not past", fingerprint, effective_date);
            return Ok(ArchiveOutcome::NotDue);
        }

        let Some(ballot) = self.ballots.snapshot(&fingerprint).await? else {
            return Ok(ArchiveOutcome::NoBallot);
        };

        if !force && training.kind() == TrainingKind::Recurring {
            let occurrence_end = training.ends_at(effective_date);
            if first_vote_at(&ballot).is_some_and(|first| first > occurrence_end) {
                debug!("Ballot {} belongs to the next occurrence, kept", fingerprint);
                return Ok(ArchiveOutcome::FreshBallot);
            }
        }

        let entry = ArchiveEntry {
            training_fingerprint: fingerprint.clone(),
            effective_date,
            team_scope: training.team_scope,
            with_coach: training.with_coach,
            location: training.location.clone(),
            description: training.description.clone(),
            start: training.start,
            end: training.end,
            ballot: ballot.clone(),
        };
        let id = self
            .db
            .update(collections::TRAINING_VOTES_ARCHIVE, |archive: &mut Archive| {
                let id = archive
                    .keys()
                    .filter_map(|k| k.parse::<u64>().ok())
                    .max()
                    .map_or(1, |max| max + 1)
                    .to_string();
                archive.insert(id.clone(), entry);
                Ok(id)
            })
            .await?;

        let players_updated = self
            .roster
            .record_training_attendance(training.team_scope, &ballot)
            .await?;
        self.ballots.close(&fingerprint).await?;

        info!(
            "Archived {} ({}) as entry {}: {} vote(s), {} player(s) updated",
            fingerprint,
            effective_date,
            id,
            ballot.len(),
            players_updated
        );
        Ok(ArchiveOutcome::Archived { id, players_updated })
    }

    /// Entries archived for `fingerprint`, oldest first.
    pub async fn entries_for(&self, fingerprint: &str) -> BotResult<Vec<(String, ArchiveEntry)>> {
        let archive: Archive = self.db.read(collections::TRAINING_VOTES_ARCHIVE).await?;
        let mut entries: Vec<_> = archive
            .into_iter()
            .filter(|(_, e)| e.training_fingerprint == fingerprint)
            .collect();
        entries.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX));
        Ok(entries)
    }
}
