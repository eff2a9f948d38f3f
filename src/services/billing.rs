//! Turns a closed ballot into per-attendee debts and tracks settlement.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::callback_data::CallbackAction;
use crate::database::models::{debt_key, is_surrogate, Debt, TrainingStatus, Vote};
use crate::database::{collections, Database};
use crate::error::{BotError, BotResult, Conflict};
use crate::services::archive::{ArchiveOutcome, ArchiveWriter};
use crate::services::ballot::BallotEngine;
use crate::services::notifier::{broadcast, BroadcastReport, Button, Keyboard, Notifier};
use crate::services::registry::TrainingRegistry;
use crate::services::roster::Roster;
use crate::utils::logging::log_send_failure;

/// Shape of the `payments` collection, keyed by debt key.
pub type Payments = BTreeMap<String, Debt>;

/// Per-person share of `total` split `n` ways, rounded half to even.
/// The rounding residual is not redistributed.
pub fn split(total: u64, n: usize) -> u64 {
    let n = n.max(1) as u64;
    let (quotient, remainder) = (total / n, total % n);
    match (remainder * 2).cmp(&n) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient % 2,
    }
}

/// Debts created by one charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSummary {
    pub fingerprint: String,
    pub training_label: String,
    pub per_person: u64,
    pub card: String,
    pub debtors: Vec<String>,
    pub archive: ArchiveOutcome,
}

/// Result of a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub debt: Debt,
    /// This payment settled the last open debt of the training. The status
    /// moves to COLLECTED only if it is still CHARGED; the admin notice is
    /// sent either way.
    pub collected: bool,
}

/// Debts of one training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtGroup {
    pub fingerprint: String,
    pub training_label: String,
    pub debts: Vec<Debt>,
}

impl DebtGroup {
    /// Debts already paid.
    pub fn paid_count(&self) -> usize {
        self.debts.iter().filter(|d| d.paid).count()
    }

    /// Debts still open.
    pub fn unpaid(&self) -> impl Iterator<Item = &Debt> {
        self.debts.iter().filter(|d| !d.paid)
    }
}

/// Single "I paid" button for a debt notice.
pub fn paid_keyboard(debt: &Debt) -> Keyboard {
    Keyboard::row(vec![Button::new(
        "💸 I paid",
        CallbackAction::Paid {
            fingerprint: debt.training_fingerprint.clone(),
            player_id: debt.player_id.clone(),
        },
    )])
}

fn debt_notice(debt: &Debt) -> String {
    format!(
        "💳 Payment for training {}\nAmount: {}\nCard: {}\n\nPress the button once you have paid.",
        debt.training_label, debt.amount, debt.card
    )
}

/// Charges, debts and their settlement.
pub struct BillingEngine {
    db: Arc<Database>,
    roster: Arc<Roster>,
    registry: Arc<TrainingRegistry>,
    ballots: Arc<BallotEngine>,
    archive: Arc<ArchiveWriter>,
    notifier: Arc<dyn Notifier>,
}

impl BillingEngine {
    /// Wires the engine to its collaborators.
    pub fn new(
        db: Arc<Database>,
        roster: Arc<Roster>,
        registry: Arc<TrainingRegistry>,
        ballots: Arc<BallotEngine>,
        archive: Arc<ArchiveWriter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            roster,
            registry,
            ballots,
            archive,
            notifier,
        }
    }

    /// Charges a NOT_CHARGED training and notifies every debtor.
    pub async fn charge(&self, admin_id: i64, fingerprint: &str, total: u64, card: &str) -> BotResult<ChargeSummary> {
        let summary = self.apply_charge(admin_id, fingerprint, total, card).await?;
        self.notify_charge(&summary).await;
        Ok(summary)
    }

    /// State half of [`BillingEngine::charge`]: debts, CHARGED, archive.
    pub async fn apply_charge(&self, admin_id: i64, fingerprint: &str, total: u64, card: &str) -> BotResult<ChargeSummary> {
        self.roster.require_admin(admin_id).await?;
        let _guard = self.db.lock_fingerprint(fingerprint).await;

        let training = self.registry.require(fingerprint).await?.training;
        if training.status != TrainingStatus::NotCharged {
            return Err(Conflict::AlreadyCharged.into());
        }

        let ballot = self
            .ballots
            .snapshot(fingerprint)
            .await?
            .ok_or_else(|| BotError::not_found("ballot", fingerprint))?;
        let debtors: Vec<String> = ballot
            .iter()
            .filter(|(_, r)| r.vote == Vote::Yes)
            .map(|(id, _)| id.clone())
            .collect();
        if debtors.is_empty() {
            return Err(BotError::NoAttendees(fingerprint.to_string()));
        }

        let per_person = split(total, debtors.len());
        let training_label = training.label();
        self.db
            .update(collections::PAYMENTS, |payments: &mut Payments| {
                for player_id in &debtors {
                    let debt = Debt {
                        player_id: player_id.clone(),
                        training_fingerprint: fingerprint.to_string(),
                        amount: per_person,
                        training_label: training_label.clone(),
                        card: card.to_string(),
                        paid: false,
                    };
                    payments.insert(debt.key(), debt);
                }
                Ok(())
            })
            .await?;

        let training = self.registry.mark_charged(fingerprint).await?;
        let archive = self.archive.archive_locked(&training, true).await?;

        info!(
            "Charged {}: {} x {} (total {}) by admin {}",
            fingerprint,
            debtors.len(),
            per_person,
            total,
            admin_id
        );
        Ok(ChargeSummary {
            fingerprint: fingerprint.to_string(),
            training_label,
            per_person,
            card: card.to_string(),
            debtors,
            archive,
        })
    }

    /// Sends each debtor their amount, card and a paid button. Surrogate
    /// debtors have no chat and are skipped.
    pub async fn notify_charge(&self, summary: &ChargeSummary) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for player_id in &summary.debtors {
            let Ok(chat_id) = player_id.parse::<i64>() else {
                continue;
            };
            let debt = Debt {
                player_id: player_id.clone(),
                training_fingerprint: summary.fingerprint.clone(),
                amount: summary.per_person,
                training_label: summary.training_label.clone(),
                card: summary.card.clone(),
                paid: false,
            };
            match self
                .notifier
                .send_message(chat_id, &debt_notice(&debt), Some(&paid_keyboard(&debt)))
                .await
            {
                Ok(_) => report.delivered.push(chat_id),
                Err(e) => {
                    log_send_failure(chat_id, "charge notice", &e.to_string());
                    report.failed.push(chat_id);
                }
            }
        }
        report
    }

    /// Marks one debt paid. The debtor or an admin may confirm.
    pub async fn confirm_paid(&self, actor_id: i64, fingerprint: &str, player_id: &str) -> BotResult<Settlement> {
        if actor_id.to_string() != player_id {
            self.roster.require_admin(actor_id).await?;
        }

        let settlement = {
            let _guard = self.db.lock_fingerprint(fingerprint).await;
            let key = debt_key(fingerprint, player_id);
            let (debt, all_paid) = self
                .db
                .update(collections::PAYMENTS, |payments: &mut Payments| {
                    let debt = payments
                        .get_mut(&key)
                        .ok_or_else(|| BotError::not_found("debt", key.clone()))?;
                    if debt.paid {
                        return Err(Conflict::AlreadyPaid.into());
                    }
                    debt.paid = true;
                    let debt = debt.clone();
                    let all_paid = payments
                        .values()
                        .filter(|d| d.training_fingerprint == fingerprint)
                        .all(|d| d.paid);
                    Ok((debt, all_paid))
                })
                .await?;

            if all_paid {
                self.mark_collected(fingerprint).await?;
            }
            Settlement {
                debt,
                collected: all_paid,
            }
        };
        info!("Debt {}_{} paid (confirmed by {})", fingerprint, player_id, actor_id);

        if settlement.collected {
            let admins = self.roster.admins().await?;
            let text = format!(
                "💰 All payments for training {} are collected.",
                settlement.debt.training_label
            );
            broadcast(self.notifier.as_ref(), &admins, &text, None, "collected notice").await;
        }
        Ok(settlement)
    }

    async fn mark_collected(&self, fingerprint: &str) -> BotResult<()> {
        match self.registry.mark_collected(fingerprint).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!("Debts of {} settled after a new cycle began", fingerprint);
                Ok(())
            }
            // Debts outlive a deleted training.
            Err(BotError::NotFound { .. }) => {
                warn!("Debts of {} settled but the training is gone", fingerprint);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Every debt, paid or not.
    pub async fn all_debts(&self) -> BotResult<Payments> {
        self.db.read(collections::PAYMENTS).await
    }

    /// Unpaid debts of one player, by training.
    pub async fn unpaid_debts(&self, player_id: &str) -> BotResult<Vec<Debt>> {
        Ok(self
            .all_debts()
            .await?
            .into_values()
            .filter(|d| d.player_id == player_id && !d.paid)
            .collect())
    }

    /// Trainings with at least one unpaid debt.
    pub async fn open_groups(&self) -> BotResult<Vec<DebtGroup>> {
        let mut groups: BTreeMap<String, DebtGroup> = BTreeMap::new();
        for debt in self.all_debts().await?.into_values() {
            groups
                .entry(debt.training_fingerprint.clone())
                .or_insert_with(|| DebtGroup {
                    fingerprint: debt.training_fingerprint.clone(),
                    training_label: debt.training_label.clone(),
                    debts: Vec::new(),
                })
                .debts
                .push(debt);
        }
        Ok(groups
            .into_values()
            .filter(|g| g.unpaid().next().is_some())
            .collect())
    }

    /// All debts of one training.
    pub async fn group(&self, fingerprint: &str) -> BotResult<DebtGroup> {
        self.open_groups()
            .await?
            .into_iter()
            .find(|g| g.fingerprint == fingerprint)
            .ok_or_else(|| BotError::not_found("payment group", fingerprint))
    }

    /// One summary per debtor listing every unpaid debt.
    pub async fn notify_debtors(&self) -> BotResult<BroadcastReport> {
        let mut by_player: BTreeMap<String, Vec<Debt>> = BTreeMap::new();
        for debt in self.all_debts().await?.into_values().filter(|d| !d.paid) {
            by_player.entry(debt.player_id.clone()).or_default().push(debt);
        }

        let mut report = BroadcastReport::default();
        for (player_id, debts) in by_player {
            if is_surrogate(&player_id) {
                continue;
            }
            let Ok(chat_id) = player_id.parse::<i64>() else {
                continue;
            };
            let total: u64 = debts.iter().map(|d| d.amount).sum();
            let mut text = String::from("🔔 You have unpaid trainings:\n");
            for debt in &debts {
                text.push_str(&format!("\n• {}: {} (card {})", debt.training_label, debt.amount, debt.card));
            }
            text.push_str(&format!("\n\nTotal: {total}\nUse /paydebt to confirm a payment."));

            match self.notifier.send_message(chat_id, &text, None).await {
                Ok(_) => report.delivered.push(chat_id),
                Err(e) => {
                    log_send_failure(chat_id, "debtor reminder", &e.to_string());
                    report.failed.push(chat_id);
                }
            }
        }
        Ok(report)
    }
}
