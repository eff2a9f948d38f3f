use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::database::models::Vote;
use crate::error::BotResult;
use crate::services::orchestrator::Orchestrator;
use crate::utils::datetime::format_time;
use crate::utils::logging::{log_job_event, log_send_failure};

/// Local hours of the daily jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHours {
    pub open: u32,
    pub remind: u32,
    pub reconcile: u32,
}

/// The periodic jobs. Each job is serialized against itself; an overlapping
/// run is skipped.
pub struct Jobs {
    core: Arc<Orchestrator>,
    open_guard: Mutex<()>,
    remind_guard: Mutex<()>,
    game_guard: Mutex<()>,
    reconcile_guard: Mutex<()>,
    expire_guard: Mutex<()>,
}

macro_rules! guarded {
    ($guard:expr, $name:literal) => {
        match $guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log_job_event($name, "skipped", Some("previous run still active"));
                return Ok(0);
            }
        }
    };
}

impl Jobs {
    pub fn new(core: Arc<Orchestrator>) -> Self {
        Self {
            core,
            open_guard: Mutex::new(()),
            remind_guard: Mutex::new(()),
            game_guard: Mutex::new(()),
            reconcile_guard: Mutex::new(()),
            expire_guard: Mutex::new(()),
        }
    }

    /// Opens every poll whose opening day is today. Returns polls opened.
    pub async fn open_due_polls(&self) -> BotResult<usize> {
        let _guard = guarded!(self.open_guard, "open_due_polls");
        let mut opened = 0;
        for entry in self.core.due_polls().await? {
            match self.core.open_poll(&entry).await {
                Ok(_) => opened += 1,
                Err(e) => tracing::error!("Failed to open poll {}: {}", entry.fingerprint(), e),
            }
        }
        log_job_event("open_due_polls", "done", Some(&format!("{opened} opened")));
        Ok(opened)
    }

    /// Reminds non-voters of open polls two days ahead. Returns polls
    /// reminded.
    pub async fn send_reminders(&self) -> BotResult<usize> {
        let _guard = guarded!(self.remind_guard, "send_reminders");
        let mut reminded = 0;
        for entry in self.core.polls_in(2).await? {
            match self.core.ballots.remind(&entry).await {
                Ok(_) => reminded += 1,
                Err(e) => tracing::error!("Failed to remind {}: {}", entry.fingerprint(), e),
            }
        }
        log_job_event("send_reminders", "done", Some(&format!("{reminded} poll(s)")));
        Ok(reminded)
    }

    /// Tells eligible players about tomorrow's games according to their
    /// game vote. Returns messages delivered.
    pub async fn game_reminders(&self) -> BotResult<usize> {
        let _guard = guarded!(self.game_guard, "game_reminders");
        let tomorrow = self.core.clock.today() + Duration::days(1);
        let mut delivered = 0;

        for (game_id, game) in self.core.games_on(tomorrow).await? {
            let ballot = self.core.game_ballot(&game_id).await?;
            let place = game.location.as_deref().unwrap_or("TBA");
            for (chat_id, _) in self.core.roster.eligible(game.team_scope).await? {
                let text = match ballot.get(&chat_id.to_string()).map(|r| r.vote) {
                    Some(Vote::Yes) => format!(
                        "🏐 Game tomorrow at {} against {} ({}). See you there!",
                        format_time(game.time),
                        game.opponent,
                        place
                    ),
                    None => format!(
                        "🏐 Game tomorrow at {} against {}. Please vote whether you will play.",
                        format_time(game.time),
                        game.opponent
                    ),
                    Some(Vote::No) => continue,
                };
                match self.core.notifier.send_message(chat_id, &text, None).await {
                    Ok(_) => delivered += 1,
                    Err(e) => log_send_failure(chat_id, "game reminder", &e.to_string()),
                }
            }
        }
        log_job_event("game_reminders", "done", Some(&format!("{delivered} sent")));
        Ok(delivered)
    }

    /// Reconciles every training with an unhandled past occurrence.
    /// Returns trainings reconciled.
    pub async fn reconcile_past(&self) -> BotResult<usize> {
        let _guard = guarded!(self.reconcile_guard, "reconcile_past");
        let mut reconciled = 0;
        for entry in self.core.registry.list_all().await? {
            match self.core.reconcile(&entry.fingerprint()).await {
                Ok(Some(_)) => reconciled += 1,
                Ok(None) => {}
                Err(e) => tracing::error!("Failed to reconcile {}: {}", entry.fingerprint(), e),
            }
        }
        log_job_event("reconcile_past", "done", Some(&format!("{reconciled} reconciled")));
        Ok(reconciled)
    }

    /// Drops abandoned conversations.
    pub async fn expire_conversations(&self) -> BotResult<usize> {
        let _guard = guarded!(self.expire_guard, "expire_conversations");
        let purged = self.core.conversations.purge_expired(self.core.clock.now());
        if purged > 0 {
            log_job_event("expire_conversations", "done", Some(&format!("{purged} dropped")));
        }
        Ok(purged)
    }
}

/// Six-field cron expression firing daily at `local_hour` of a zone
/// `offset_hours` east of UTC.
pub fn daily_cron(local_hour: u32, offset_hours: i32) -> String {
    let utc_hour = (local_hour as i32 - offset_hours).rem_euclid(24);
    format!("0 0 {utc_hour} * * *")
}

/// Cron registration of the daily jobs.
pub struct SchedulerService {
    jobs: Arc<Jobs>,
    scheduler: JobScheduler,
    hours: JobHours,
    offset_hours: i32,
}

impl SchedulerService {
    pub async fn new(jobs: Arc<Jobs>, hours: JobHours, offset_hours: i32) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            jobs,
            scheduler,
            hours,
            offset_hours,
        })
    }

    /// Registers every job and starts the scheduler.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let open = daily_cron(self.hours.open, self.offset_hours);
        let remind = daily_cron(self.hours.remind, self.offset_hours);
        let reconcile = daily_cron(self.hours.reconcile, self.offset_hours);

        let jobs = self.jobs.clone();
        self.scheduler
            .add(Job::new_async(open.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    if let Err(e) = jobs.open_due_polls().await {
                        tracing::error!("open_due_polls failed: {}", e);
                    }
                })
            })?)
            .await?;

        let jobs = self.jobs.clone();
        self.scheduler
            .add(Job::new_async(remind.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    if let Err(e) = jobs.send_reminders().await {
                        tracing::error!("send_reminders failed: {}", e);
                    }
                    if let Err(e) = jobs.game_reminders().await {
                        tracing::error!("game_reminders failed: {}", e);
                    }
                })
            })?)
            .await?;

        let jobs = self.jobs.clone();
        self.scheduler
            .add(Job::new_async(reconcile.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    if let Err(e) = jobs.reconcile_past().await {
                        tracing::error!("reconcile_past failed: {}", e);
                    }
                })
            })?)
            .await?;

        let jobs = self.jobs.clone();
        self.scheduler
            .add(Job::new_async("0 */10 * * * *", move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    if let Err(e) = jobs.expire_conversations().await {
                        tracing::error!("expire_conversations failed: {}", e);
                    }
                })
            })?)
            .await?;

        self.scheduler.start().await?;

        tracing::info!(
            "Scheduler started - open {}, remind {}, reconcile {} (UTC cron)",
            open,
            remind,
            reconcile
        );
        Ok(())
    }

    /// Shuts the scheduler down.
    pub async fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_cron_converts_to_utc() {
        assert_eq!(daily_cron(10, 3), "0 0 7 * * *");
        assert_eq!(daily_cron(1, 3), "0 0 22 * * *");
        assert_eq!(daily_cron(23, -5), "0 0 4 * * *");
        assert_eq!(daily_cron(12, 0), "0 0 12 * * *");
    }
}
