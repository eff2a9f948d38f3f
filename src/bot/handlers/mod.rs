pub mod callback;
pub mod general_message;
pub mod message;

use teloxide::{dispatching::UpdateHandler, prelude::*, types::User};

use crate::bot::commands::Command;
use crate::error::BotError;
use crate::services::orchestrator::Orchestrator;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::log_command_error;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

/// Who is talking, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

impl ChatContext {
    pub fn new(chat_id: i64, username: Option<String>, first_name: impl Into<String>) -> Self {
        Self {
            chat_id,
            username,
            first_name: first_name.into(),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self::new(user.id.0 as i64, user.username.clone(), user.first_name.clone())
    }

    /// Name used in log lines.
    pub fn user(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }

    pub fn feedback(&self, core: &Orchestrator) -> CommandFeedback {
        CommandFeedback::new(core.notifier.clone(), self.chat_id)
    }
}

/// Logs a failed operation and answers on the originating chat.
pub async fn report_error(core: &Orchestrator, ctx: &ChatContext, operation: &str, error: &BotError) {
    log_command_error(operation, ctx.user(), ctx.chat_id, &error.kind().to_string(), &error.to_string());
    if let Err(e) = ctx.feedback(core).report(error).await {
        tracing::warn!("Could not report error to {}: {}", ctx.chat_id, e);
    }
}

pub struct BotHandler;

impl BotHandler {
    /// Update routing. Expects an `Arc<Orchestrator>` among the dispatcher
    /// dependencies.
    pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(message::command_handler),
            )
            .branch(Update::filter_message().endpoint(message::text_handler))
            .branch(Update::filter_callback_query().endpoint(callback::callback_handler))
    }
}
