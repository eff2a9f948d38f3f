//! Outbound chat transport.
//!
//! The core only sees [`Notifier`]. [`TelegramNotifier`] drives a
//! `teloxide::Bot`; [`RecordingNotifier`] keeps every message in memory and
//! can be told to fail for chosen recipients.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::bot::callback_data::CallbackAction;
use crate::error::{BotError, BotResult};
use crate::utils::logging::log_send_failure;

/// Inline button with a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Grouped button rows attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    /// One button per row.
    pub fn column(buttons: Vec<Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn actions(&self) -> impl Iterator<Item = &CallbackAction> {
        self.rows.iter().flatten().map(|b| &b.action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Outgoing chat transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a message and returns its id.
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> BotResult<i32>;

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> BotResult<()>;

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> BotResult<()>;
}

/// Per-recipient outcome of a fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Sends `text` to every recipient. Failures are logged and counted; the
/// loop never stops early.
pub async fn broadcast(
    notifier: &dyn Notifier,
    recipients: &[i64],
    text: &str,
    keyboard: Option<&Keyboard>,
    context: &str,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &chat_id in recipients {
        match notifier.send_message(chat_id, text, keyboard).await {
            Ok(_) => report.delivered.push(chat_id),
            Err(e) => {
                log_send_failure(chat_id, context, &e.to_string());
                report.failed.push(chat_id);
            }
        }
    }
    report
}

/// Notifier backed by the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
            row.iter()
                .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.encode()))
                .collect::<Vec<_>>()
        }))
    }
}

fn send_error(chat_id: i64, e: teloxide::RequestError) -> BotError {
    BotError::TransientSend {
        chat_id,
        reason: e.to_string(),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> BotResult<i32> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(Self::markup(keyboard));
        }
        let message = request.await.map_err(|e| send_error(chat_id, e))?;
        Ok(message.id.0)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> BotResult<()> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .await
            .map_err(|e| send_error(chat_id, e))?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> BotResult<()> {
        let action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.bot
            .send_chat_action(ChatId(chat_id), action)
            .await
            .map_err(|e| send_error(chat_id, e))?;
        Ok(())
    }
}

/// Message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<SentMessage>,
    actions: Vec<(i64, ChatAction)>,
    failing: HashSet<i64>,
    next_id: i32,
}

/// In-memory transport. Edits rewrite the recorded text in place.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    inner: Mutex<Recorded>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every later send to `chat_id` fails with TRANSIENT_SEND.
    pub fn fail_for(&self, chat_id: i64) {
        self.state().failing.insert(chat_id);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    /// Messages sent to one chat, oldest first.
    pub fn messages_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.state()
            .sent
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    /// Latest message sent to one chat.
    pub fn last_to(&self, chat_id: i64) -> Option<SentMessage> {
        self.messages_to(chat_id).pop()
    }

    pub fn chat_actions(&self) -> Vec<(i64, ChatAction)> {
        self.state().actions.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.sent.clear();
        state.actions.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> BotResult<i32> {
        let mut state = self.state();
        if state.failing.contains(&chat_id) {
            return Err(BotError::TransientSend {
                chat_id,
                reason: "recipient unreachable".to_string(),
            });
        }
        state.next_id += 1;
        let message_id = state.next_id;
        state.sent.push(SentMessage {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> BotResult<()> {
        let mut state = self.state();
        let message = state
            .sent
            .iter_mut()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id)
            .ok_or_else(|| BotError::not_found("message", message_id.to_string()))?;
        message.text = text.to_string();
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> BotResult<()> {
        self.state().actions.push((chat_id, action));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_continues_past_failures() {
        let notifier = RecordingNotifier::new();
        notifier.fail_for(2);

        let report = broadcast(&notifier, &[1, 2, 3], "hello", None, "test").await;

        assert_eq!(report.delivered, vec![1, 3]);
        assert_eq!(report.failed, vec![2]);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_edit_rewrites_recorded_text() {
        let notifier = RecordingNotifier::new();
        let id = notifier.send_message(5, "step 1", None).await.unwrap();
        notifier.edit_message(5, id, "done").await.unwrap();

        assert_eq!(notifier.last_to(5).unwrap().text, "done");
        assert!(notifier.edit_message(5, id + 1, "x").await.is_err());
    }

    #[test]
    fn test_keyboard_layouts() {
        let buttons = vec![
            Button::new("A", CallbackAction::ChargeSelect(0)),
            Button::new("B", CallbackAction::ChargeSelect(1)),
        ];
        assert_eq!(Keyboard::column(buttons.clone()).rows.len(), 2);
        assert_eq!(Keyboard::row(buttons).actions().count(), 2);
    }
}
