//! Per-training poll: open, accept and revise votes under the capacity
//! bound, remind, close.

use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::callback_data::CallbackAction;
use crate::database::models::{
    admits, surrogate_id, yes_count, Ballot, BallotRecord, Training, TrainingEntry, TrainingStatus,
    VotesDocument, Vote,
};
use crate::database::{collections, Database};
use crate::error::{BotError, BotResult, Conflict};
use crate::services::clock::Clock;
use crate::services::notifier::{broadcast, BroadcastReport, Button, Keyboard, Notifier};
use crate::services::registry::TrainingRegistry;
use crate::services::roster::Roster;
use crate::utils::datetime::format_date;

/// Result of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastOutcome {
    pub fingerprint: String,
    pub vote: Vote,
    /// YES count after the vote.
    pub yes_count: usize,
    /// The same vote was already on record.
    pub unchanged: bool,
}

/// Votes of open polls: casting, reminders and snapshots.
pub struct BallotEngine {
    db: Arc<Database>,
    roster: Arc<Roster>,
    registry: Arc<TrainingRegistry>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

/// YES/NO buttons of a poll.
pub fn vote_keyboard(fingerprint: &str) -> Keyboard {
    Keyboard::row(vec![
        Button::new(
            "✅ I'm in",
            CallbackAction::Vote {
                vote: Vote::Yes,
                fingerprint: fingerprint.to_string(),
            },
        ),
        Button::new(
            "❌ Can't make it",
            CallbackAction::Vote {
                vote: Vote::No,
                fingerprint: fingerprint.to_string(),
            },
        ),
    ])
}

/// Poll announcement text.
pub fn announcement(training: &Training, now: chrono::NaiveDateTime) -> String {
    let mut text = format!("🏐 Training {}", training.label());
    if let Some((date, _)) = training.next_occurrence(now) {
        text.push_str(&format!("\n📅 Next session: {}", format_date(date)));
    }
    if let Some(location) = &training.location {
        text.push_str(&format!("\n📍 {location}"));
    }
    if training.with_coach {
        text.push_str("\n👨‍🏫 With coach");
    }
    if let Some(description) = &training.description {
        text.push_str(&format!("\n{description}"));
    }
    text.push_str("\n\nWill you come?");
    text
}

impl BallotEngine {
    /// Wires the engine to its collaborators; `capacity` caps YES votes.
    pub fn new(
        db: Arc<Database>,
        roster: Arc<Roster>,
        registry: Arc<TrainingRegistry>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> Self {
        Self {
            db,
            roster,
            registry,
            notifier,
            clock,
            capacity,
        }
    }

    /// Maximum number of YES votes per ballot.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Latches `voting_opened` and announces the poll to every eligible
    /// player.
    pub async fn open(&self, entry: &TrainingEntry) -> BotResult<BroadcastReport> {
        let fingerprint = entry.fingerprint();
        let training = {
            let _guard = self.db.lock_fingerprint(&fingerprint).await;
            self.registry.mark_voting_opened(&fingerprint).await?
        };

        let recipients: Vec<i64> = self
            .roster
            .eligible(training.team_scope)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let text = announcement(&training, self.clock.now());
        let report = broadcast(
            self.notifier.as_ref(),
            &recipients,
            &text,
            Some(&vote_keyboard(&fingerprint)),
            "poll open",
        )
        .await;
        info!(
            "Poll {} opened: {} delivered, {} failed",
            fingerprint,
            report.delivered.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Re-sends the announcement to eligible players without a vote.
    pub async fn remind(&self, entry: &TrainingEntry) -> BotResult<BroadcastReport> {
        let fingerprint = entry.fingerprint();
        let ballot = self.snapshot(&fingerprint).await?.unwrap_or_default();
        let recipients: Vec<i64> = self
            .roster
            .eligible(entry.training.team_scope)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| !ballot.contains_key(&id.to_string()))
            .collect();

        let text = format!(
            "⏰ Reminder: you have not voted yet.\n\n{}",
            announcement(&entry.training, self.clock.now())
        );
        let report = broadcast(
            self.notifier.as_ref(),
            &recipients,
            &text,
            Some(&vote_keyboard(&fingerprint)),
            "poll reminder",
        )
        .await;
        info!("Reminder for {} sent to {} player(s)", fingerprint, report.delivered.len());
        Ok(report)
    }

    /// Records the vote of a registered player.
    pub async fn cast(&self, chat_id: i64, fingerprint: &str, vote: Vote) -> BotResult<CastOutcome> {
        let player = self.roster.require_registered(chat_id).await?;
        self.record(fingerprint, chat_id.to_string(), player.display_name().to_string(), vote)
            .await
    }

    /// Admin vote on behalf of a free-text name. Counts toward capacity.
    pub async fn cast_surrogate(&self, admin_id: i64, name: &str, fingerprint: &str, vote: Vote) -> BotResult<CastOutcome> {
        self.roster.require_admin(admin_id).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BotError::invalid("name cannot be empty"));
        }
        self.record(fingerprint, surrogate_id(name), name.to_string(), vote)
            .await
    }

    async fn record(&self, fingerprint: &str, player_id: String, display_name: String, vote: Vote) -> BotResult<CastOutcome> {
        let _guard = self.db.lock_fingerprint(fingerprint).await;

        let training = self.registry.require(fingerprint).await?.training;
        if training.status != TrainingStatus::NotCharged || !training.voting_opened {
            return Err(Conflict::VotingClosed.into());
        }

        let capacity = self.capacity;
        let timestamp = self.clock.now();
        let outcome = self
            .db
            .update(collections::VOTES, |doc: &mut VotesDocument| {
                let ballot = doc.votes.entry(fingerprint.to_string()).or_default();
                if !admits(ballot, &player_id, vote, capacity) {
                    return Err(Conflict::CapacityReached { capacity }.into());
                }
                let unchanged = ballot.get(&player_id).is_some_and(|r| r.vote == vote);
                ballot.insert(
                    player_id.clone(),
                    BallotRecord {
                        display_name,
                        vote,
                        timestamp,
                    },
                );
                Ok(CastOutcome {
                    fingerprint: fingerprint.to_string(),
                    vote,
                    yes_count: yes_count(ballot),
                    unchanged,
                })
            })
            .await
            .inspect_err(|e| {
                if matches!(e, BotError::StateConflict(Conflict::CapacityReached { .. })) {
                    warn!("Vote of {} on {} rejected: ballot full", player_id, fingerprint);
                }
            })?;
        info!(
            "Vote {} by {} on {} ({} yes)",
            vote, player_id, fingerprint, outcome.yes_count
        );
        Ok(outcome)
    }

    /// Current ballot of `fingerprint`, if a poll has votes.
    pub async fn snapshot(&self, fingerprint: &str) -> BotResult<Option<Ballot>> {
        let mut doc: VotesDocument = self.db.read(collections::VOTES).await?;
        Ok(doc.votes.remove(fingerprint))
    }

    /// Number of YES votes on `fingerprint`.
    pub async fn yes_count(&self, fingerprint: &str) -> BotResult<usize> {
        Ok(self.snapshot(fingerprint).await?.map_or(0, |b| yes_count(&b)))
    }

    /// Voters of an active ballot ordered by vote time.
    pub async fn voters(&self, fingerprint: &str) -> BotResult<Vec<(String, BallotRecord)>> {
        let ballot = self
            .snapshot(fingerprint)
            .await?
            .ok_or_else(|| BotError::not_found("ballot", fingerprint))?;
        let mut voters: Vec<_> = ballot.into_iter().collect();
        voters.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));
        Ok(voters)
    }

    /// Fingerprints with an active ballot.
    pub async fn active(&self) -> BotResult<Vec<String>> {
        let doc: VotesDocument = self.db.read(collections::VOTES).await?;
        Ok(doc.votes.into_keys().collect())
    }

    /// Removes the ballot and returns it. Callers hold the fingerprint lock.
    pub async fn close(&self, fingerprint: &str) -> BotResult<Ballot> {
        self.db
            .update(collections::VOTES, |doc: &mut VotesDocument| {
                doc.votes
                    .remove(fingerprint)
                    .ok_or_else(|| BotError::not_found("ballot", fingerprint))
            })
            .await
    }
}
