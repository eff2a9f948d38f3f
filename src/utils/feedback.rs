use std::sync::Arc;

use crate::error::{BotError, BotResult};
use crate::services::notifier::{Keyboard, Notifier};

/// Feedback types for different command outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackType {
    Success,
    Error,
    Info,
    Processing,
}

impl FeedbackType {
    fn emoji(&self) -> &'static str {
        match self {
            FeedbackType::Success => "✅",
            FeedbackType::Error => "❌",
            FeedbackType::Info => "ℹ️",
            FeedbackType::Processing => "⏳",
        }
    }

    pub fn format(&self, message: &str) -> String {
        format!("{} {}", self.emoji(), message)
    }
}

/// Replies on one chat through the [`Notifier`].
#[derive(Clone)]
pub struct CommandFeedback {
    notifier: Arc<dyn Notifier>,
    chat_id: i64,
}

impl CommandFeedback {
    pub fn new(notifier: Arc<dyn Notifier>, chat_id: i64) -> Self {
        Self { notifier, chat_id }
    }

    /// Send immediate feedback message
    pub async fn send(&self, feedback_type: FeedbackType, message: &str) -> BotResult<i32> {
        self.notifier
            .send_message(self.chat_id, &feedback_type.format(message), None)
            .await
    }

    /// Plain text, optionally with buttons.
    pub async fn plain(&self, message: &str, keyboard: Option<&Keyboard>) -> BotResult<i32> {
        self.notifier.send_message(self.chat_id, message, keyboard).await
    }

    /// Update an existing message with new feedback
    pub async fn update_message(&self, message_id: i32, feedback_type: FeedbackType, message: &str) -> BotResult<()> {
        self.notifier
            .edit_message(self.chat_id, message_id, &feedback_type.format(message))
            .await
    }

    pub async fn success(&self, message: &str) -> BotResult<i32> {
        self.send(FeedbackType::Success, message).await
    }

    pub async fn error(&self, message: &str) -> BotResult<i32> {
        self.send(FeedbackType::Error, message).await
    }

    pub async fn info(&self, message: &str) -> BotResult<i32> {
        self.send(FeedbackType::Info, message).await
    }

    /// Reports a failed operation with its user-facing text.
    pub async fn report(&self, error: &BotError) -> BotResult<i32> {
        self.error(&error.user_message()).await
    }

    /// Send validation error with helpful suggestion
    pub async fn validation_error(&self, error: &str, suggestion: &str) -> BotResult<i32> {
        let message = format!("{error}\n\n💡 Suggestion: {suggestion}");
        self.send(FeedbackType::Error, &message).await
    }
}

/// Progress tracker for multi-step operations
pub struct ProgressTracker {
    feedback: CommandFeedback,
    message_id: Option<i32>,
    total_steps: u32,
    current_step: u32,
}

impl ProgressTracker {
    pub fn new(feedback: CommandFeedback, total_steps: u32) -> Self {
        Self {
            feedback,
            message_id: None,
            total_steps,
            current_step: 0,
        }
    }

    /// Start progress tracking
    pub async fn start(&mut self, initial_message: &str) -> BotResult<()> {
        let progress_message = format!("{} (1/{})", initial_message, self.total_steps);
        let message_id = self.feedback.send(FeedbackType::Processing, &progress_message).await?;
        self.message_id = Some(message_id);
        self.current_step = 1;
        Ok(())
    }

    /// Update progress to next step
    pub async fn next_step(&mut self, step_message: &str) -> BotResult<()> {
        if let Some(message_id) = self.message_id {
            self.current_step = (self.current_step + 1).min(self.total_steps);
            let progress_message = format!("{} ({}/{})", step_message, self.current_step, self.total_steps);
            self.feedback
                .update_message(message_id, FeedbackType::Processing, &progress_message)
                .await?;
        }
        Ok(())
    }

    /// Complete progress tracking with success message
    pub async fn complete(&mut self, completion_message: &str) -> BotResult<()> {
        if let Some(message_id) = self.message_id {
            self.feedback
                .update_message(message_id, FeedbackType::Success, completion_message)
                .await?;
        }
        Ok(())
    }

    /// Complete progress tracking with error message
    pub async fn error(&mut self, error_message: &str) -> BotResult<()> {
        if let Some(message_id) = self.message_id {
            self.feedback
                .update_message(message_id, FeedbackType::Error, error_message)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::notifier::RecordingNotifier;

    #[test]
    fn test_feedback_type_emojis() {
        assert_eq!(FeedbackType::Success.emoji(), "✅");
        assert_eq!(FeedbackType::Error.emoji(), "❌");
        assert_eq!(FeedbackType::Info.emoji(), "ℹ️");
        assert_eq!(FeedbackType::Processing.emoji(), "⏳");
    }

    #[tokio::test]
    async fn test_progress_tracker_edits_one_message() {
        let notifier = Arc::new(RecordingNotifier::new());
        let feedback = CommandFeedback::new(notifier.clone(), 42);
        let mut progress = ProgressTracker::new(feedback, 3);

        progress.start("Charging").await.unwrap();
        progress.next_step("Creating debts").await.unwrap();
        progress.complete("Charged").await.unwrap();

        let sent = notifier.messages_to(42);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "✅ Charged");
    }
}
