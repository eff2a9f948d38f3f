//! Per-chat conversation state.
//!
//! At most one conversation is active per chat id. Entries not touched for
//! longer than the TTL are dropped lazily on access and by the periodic
//! purge.

use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::database::models::{TeamScope, TrainingKind};
use crate::services::registry::TrainingForm;

/// Questions of the add-training flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStep {
    Kind,
    Day,
    VotingOpen,
    Start,
    End,
    Scope,
    Coach,
    Location,
    Description,
}

impl TrainingStep {
    pub fn next(self) -> Option<TrainingStep> {
        use TrainingStep::*;
        match self {
            Kind => Some(Day),
            Day => Some(VotingOpen),
            VotingOpen => Some(Start),
            Start => Some(End),
            End => Some(Scope),
            Scope => Some(Coach),
            Coach => Some(Location),
            Location => Some(Description),
            Description => None,
        }
    }
}

/// Answers collected by the add-training dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingDraft {
    pub step: TrainingStep,
    pub form: TrainingForm,
}

impl Default for TrainingDraft {
    fn default() -> Self {
        Self {
            step: TrainingStep::Kind,
            form: TrainingForm {
                kind: TrainingKind::OneOff,
                day: String::new(),
                voting_open: String::new(),
                start: String::new(),
                end: String::new(),
                team_scope: TeamScope::Both.to_string(),
                with_coach: false,
                location: String::new(),
                description: String::new(),
            },
        }
    }
}

/// State of the charge dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargeDraft {
    /// Fingerprints offered as `charge_select_<n>`.
    pub candidates: Vec<String>,
    pub fingerprint: Option<String>,
    pub amount: Option<u64>,
}

/// State of the pay-debt dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayDebtDraft {
    /// `(fingerprint, label)` offered as `paydebt_select_<n>`.
    pub debts: Vec<(String, String)>,
    pub selected: Option<usize>,
}

/// Multi-step dialog a chat is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    Registration,
    AddTraining(TrainingDraft),
    Charge(ChargeDraft),
    PayDebt(PayDebtDraft),
    /// Fingerprints offered as `view_payment_<n>`.
    ViewPayments(Vec<String>),
    Broadcast { scope: Option<TeamScope> },
}

impl Conversation {
    pub fn name(&self) -> &'static str {
        match self {
            Conversation::Registration => "registration",
            Conversation::AddTraining(_) => "add training",
            Conversation::Charge(_) => "charge",
            Conversation::PayDebt(_) => "pay debt",
            Conversation::ViewPayments(_) => "view payments",
            Conversation::Broadcast { .. } => "broadcast",
        }
    }
}

#[derive(Debug)]
struct Entry {
    conversation: Conversation,
    touched: NaiveDateTime,
}

/// Active conversations by chat id.
#[derive(Debug)]
pub struct ConversationStore {
    ttl: Duration,
    entries: Mutex<HashMap<i64, Entry>>,
}

impl ConversationStore {
    /// Store dropping conversations idle longer than `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<i64, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts `conversation`, replacing any active one.
    pub fn begin(&self, chat_id: i64, conversation: Conversation, now: NaiveDateTime) {
        self.entries().insert(
            chat_id,
            Entry {
                conversation,
                touched: now,
            },
        );
    }

    /// Active conversation of the chat, if it has not expired.
    pub fn get(&self, chat_id: i64, now: NaiveDateTime) -> Option<Conversation> {
        let mut entries = self.entries();
        let expired = now - entries.get(&chat_id)?.touched > self.ttl;
        if expired {
            entries.remove(&chat_id);
            return None;
        }
        entries.get(&chat_id).map(|entry| entry.conversation.clone())
    }

    /// Stores the next state of an active conversation.
    pub fn advance(&self, chat_id: i64, conversation: Conversation, now: NaiveDateTime) {
        self.begin(chat_id, conversation, now);
    }

    pub fn cancel(&self, chat_id: i64) -> Option<Conversation> {
        self.entries().remove(&chat_id).map(|e| e.conversation)
    }

    /// Drops idle conversations; returns how many were removed.
    pub fn purge_expired(&self, now: NaiveDateTime) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.touched <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
