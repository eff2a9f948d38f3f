//! Player directory: identity, team, admin and exclusion flags, cumulative
//! attendance counters.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::models::{player_key, Ballot, Player, Team, TeamScope, Vote};
use crate::database::{collections, Database};
use crate::error::{BotError, BotResult};

/// Shape of the `users` collection, keyed by chat id.
pub type Players = BTreeMap<String, Player>;

/// Registration progress of one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    Name,
    Team,
    Done,
}

/// Registered players, admins and excluded members.
pub struct Roster {
    db: Arc<Database>,
}

impl Roster {
    /// Roster backed by `db`.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Every known player.
    pub async fn all(&self) -> BotResult<Players> {
        self.db.read(collections::USERS).await
    }

    /// Player behind `chat_id`, if known.
    pub async fn get(&self, chat_id: i64) -> BotResult<Option<Player>> {
        Ok(self.all().await?.remove(&player_key(chat_id)))
    }

    /// Player with a name and team, or NOT_REGISTERED.
    pub async fn require_registered(&self, chat_id: i64) -> BotResult<Player> {
        match self.get(chat_id).await? {
            Some(player) if player.is_registered() => Ok(player),
            _ => Err(BotError::NotRegistered(player_key(chat_id))),
        }
    }

    /// Whether `chat_id` is a configured admin.
    pub async fn is_admin(&self, chat_id: i64) -> BotResult<bool> {
        Ok(self.get(chat_id).await?.is_some_and(|p| p.is_admin))
    }

    /// Fails with UNAUTHORIZED unless `chat_id` is an admin.
    pub async fn require_admin(&self, chat_id: i64) -> BotResult<()> {
        if self.is_admin(chat_id).await? {
            Ok(())
        } else {
            Err(BotError::Unauthorized)
        }
    }

    /// Which registration question the chat has to answer next.
    pub async fn registration_step(&self, chat_id: i64) -> BotResult<RegistrationStep> {
        let step = match self.get(chat_id).await? {
            Some(p) if p.is_registered() => RegistrationStep::Done,
            Some(p) if p.name.is_some() => RegistrationStep::Team,
            _ => RegistrationStep::Name,
        };
        Ok(step)
    }

    /// Stores the display name, creating the player on first contact.
    pub async fn set_name(&self, chat_id: i64, name: &str, username: Option<String>) -> BotResult<Player> {
        let key = player_key(chat_id);
        self.db
            .update(collections::USERS, |players: &mut Players| {
                let player = players.entry(key.clone()).or_default();
                player.name = Some(name.to_string());
                if username.is_some() {
                    player.username = username;
                }
                Ok(player.clone())
            })
            .await
    }

    /// Stores the team answer of the registration dialog.
    pub async fn set_team(&self, chat_id: i64, team: Team) -> BotResult<Player> {
        let key = player_key(chat_id);
        let player = self
            .db
            .update(collections::USERS, |players: &mut Players| {
                let player = players
                    .get_mut(&key)
                    .filter(|p| p.name.is_some())
                    .ok_or_else(|| BotError::NotRegistered(key.clone()))?;
                player.team = Some(team);
                Ok(player.clone())
            })
            .await?;
        info!("Player {} registered as {} ({})", chat_id, player.display_name(), team);
        Ok(player)
    }

    /// Registered players eligible for `scope`, as chat ids. Snapshot of a
    /// single roster read.
    pub async fn eligible(&self, scope: TeamScope) -> BotResult<Vec<(i64, Player)>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|(_, p)| p.is_registered() && p.team.is_some_and(|t| scope.includes(t)))
            .filter_map(|(key, p)| key.parse::<i64>().ok().map(|id| (id, p)))
            .collect())
    }

    /// Chat ids of every admin.
    pub async fn admins(&self) -> BotResult<Vec<i64>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|(_, p)| p.is_admin)
            .filter_map(|(key, _)| key.parse().ok())
            .collect())
    }

    /// Applies the configured admin and stats-exclusion membership. Ids not
    /// yet known get an unregistered placeholder.
    pub async fn provision(&self, admin_ids: &[i64], excluded_ids: &[i64]) -> BotResult<()> {
        self.db
            .update(collections::USERS, |players: &mut Players| {
                for &id in admin_ids {
                    players.entry(player_key(id)).or_default().is_admin = true;
                }
                for &id in excluded_ids {
                    players.entry(player_key(id)).or_default().is_excluded_from_stats = true;
                }
                Ok(())
            })
            .await?;
        info!(
            "Provisioned {} admin(s), {} stats-excluded player(s)",
            admin_ids.len(),
            excluded_ids.len()
        );
        Ok(())
    }

    /// Write-back of one archived ballot into the attendance counters.
    ///
    /// Records without a player (surrogates), excluded players and players
    /// outside a single-team scope are skipped. Returns the number of
    /// players updated.
    pub async fn record_training_attendance(&self, scope: TeamScope, ballot: &Ballot) -> BotResult<usize> {
        self.db
            .update(collections::USERS, |players: &mut Players| {
                let mut updated = 0;
                for (player_id, record) in ballot {
                    let Some(player) = players.get_mut(player_id) else {
                        debug!("No player for ballot record {}, skipping stats", player_id);
                        continue;
                    };
                    if player.is_excluded_from_stats {
                        continue;
                    }
                    let in_scope = scope == TeamScope::Both || player.team.is_some_and(|t| scope.includes(t));
                    if !in_scope {
                        continue;
                    }
                    player.training_attendance.record(record.vote == Vote::Yes);
                    updated += 1;
                }
                Ok(updated)
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::database::models::BallotRecord;
    use crate::database::store::MemoryStore;
    use chrono::NaiveDate;

    fn roster() -> Roster {
        Roster::new(Arc::new(Database::new(Arc::new(MemoryStore::new()))))
    }

    #[tokio::test]
    async fn test_two_step_registration() {
        let roster = roster();
        assert_eq!(roster.registration_step(7).await.unwrap(), RegistrationStep::Name);
        assert!(roster.set_team(7, Team::Male).await.is_err());

        roster.set_name(7, "Oleg", Some("oleg".into())).await.unwrap();
        assert_eq!(roster.registration_step(7).await.unwrap(), RegistrationStep::Team);
        assert!(roster.require_registered(7).await.is_err());

        roster.set_team(7, Team::Male).await.unwrap();
        assert_eq!(roster.registration_step(7).await.unwrap(), RegistrationStep::Done);
        assert_eq!(roster.require_registered(7).await.unwrap().mention(), "@oleg");
    }

    #[tokio::test]
    async fn test_provision_and_admin_check() {
        let roster = roster();
        roster.provision(&[1], &[2]).await.unwrap();

        assert!(roster.require_admin(1).await.is_ok());
        assert!(matches!(roster.require_admin(2).await, Err(BotError::Unauthorized)));
        assert_eq!(roster.admins().await.unwrap(), vec![1]);
        // placeholders are not registered players
        assert!(roster.eligible(TeamScope::Both).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attendance_respects_scope_and_exclusion() {
        let roster = roster();
        for (id, name, team) in [(1, "Ann", Team::Female), (2, "Bob", Team::Male), (3, "Eve", Team::Female)] {
            roster.set_name(id, name, None).await.unwrap();
            roster.set_team(id, team).await.unwrap();
        }
        roster.provision(&[], &[3]).await.unwrap();

        let at = NaiveDate::from_ymd_opt(2025, 3, 25).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let ballot: Ballot = [("1", Vote::Yes), ("2", Vote::Yes), ("3", Vote::No), ("surrogate_guest", Vote::Yes)]
            .into_iter()
            .map(|(id, vote)| {
                (
                    id.to_string(),
                    BallotRecord {
                        display_name: id.to_string(),
                        vote,
                        timestamp: at,
                    },
                )
            })
            .collect();

        let updated = roster.record_training_attendance(TeamScope::Female, &ballot).await.unwrap();
        assert_eq!(updated, 1);

        let players = roster.all().await.unwrap();
        assert_eq!(players["1"].training_attendance.attended, 1);
        assert_eq!(players["2"].training_attendance.total, 0);
        assert_eq!(players["3"].training_attendance.total, 0);
    }
}
