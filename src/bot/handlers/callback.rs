use std::sync::Arc;
use teloxide::prelude::*;

use crate::bot::callback_data::CallbackAction;
use crate::bot::commands::{ballots, broadcast, charge, payments};
use crate::bot::handlers::{ChatContext, HandlerResult};
use crate::error::BotResult;
use crate::services::orchestrator::Orchestrator;
use crate::utils::logging::log_command_error;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, core: Arc<Orchestrator>) -> HandlerResult {
    let ctx = ChatContext::from_user(&q.from);
    let data = q.data.clone().unwrap_or_default();
    tracing::info!("Callback received: '{}' from {}({})", data, ctx.user(), ctx.chat_id);

    let toast = run_callback(&core, &ctx, &data).await;
    let mut answer = bot.answer_callback_query(q.id);
    if let Some(text) = toast {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}

/// Runs a button press; the returned text is shown as the button answer.
/// Failures are answered the same way.
pub async fn run_callback(core: &Orchestrator, ctx: &ChatContext, data: &str) -> Option<String> {
    match dispatch_callback(core, ctx, data).await {
        Ok(toast) => toast,
        Err(e) => {
            log_command_error("callback", ctx.user(), ctx.chat_id, &e.kind().to_string(), &e.to_string());
            Some(e.user_message())
        }
    }
}

pub async fn dispatch_callback(core: &Orchestrator, ctx: &ChatContext, data: &str) -> BotResult<Option<String>> {
    match CallbackAction::parse(data)? {
        CallbackAction::Vote { vote, fingerprint } => ballots::on_vote(core, ctx, vote, &fingerprint).await,
        CallbackAction::Paid {
            fingerprint,
            player_id,
        } => payments::on_paid(core, ctx, &fingerprint, &player_id).await,
        CallbackAction::PayDebtSelect(index) => payments::on_select(core, ctx, index).await,
        CallbackAction::PayDebtConfirm => payments::on_confirm(core, ctx).await,
        CallbackAction::ViewPayment(index) => payments::on_view(core, ctx, index).await,
        CallbackAction::ChargeSelect(index) => charge::on_select(core, ctx, index).await,
        CallbackAction::SendTeam(scope) => broadcast::on_scope(core, ctx, scope).await,
    }
}
