use crate::bot::callback_data::CallbackAction;
use crate::bot::conversation::Conversation;
use crate::bot::handlers::ChatContext;
use crate::database::models::TeamScope;
use crate::error::{BotError, BotResult};
use crate::services::notifier::{broadcast as send_all, Button, Keyboard};
use crate::services::orchestrator::Orchestrator;
use crate::utils::logging::log_validation_error;
use crate::utils::validation::validate_broadcast_text;

pub async fn broadcast(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;

    let keyboard = Keyboard::row(
        [TeamScope::Male, TeamScope::Female, TeamScope::Both]
            .into_iter()
            .map(|scope| Button::new(scope.as_str(), CallbackAction::SendTeam(scope)))
            .collect(),
    );
    core.conversations
        .begin(ctx.chat_id, Conversation::Broadcast { scope: None }, core.clock.now());
    ctx.feedback(core)
        .plain("Who should receive the message?", Some(&keyboard))
        .await?;
    Ok(())
}

pub async fn on_scope(core: &Orchestrator, ctx: &ChatContext, scope: TeamScope) -> BotResult<Option<String>> {
    core.roster.require_admin(ctx.chat_id).await?;
    if !matches!(
        core.conversations.get(ctx.chat_id, core.clock.now()),
        Some(Conversation::Broadcast { .. })
    ) {
        return Err(BotError::not_found("broadcast dialog", ctx.chat_id.to_string()));
    }

    core.conversations.advance(
        ctx.chat_id,
        Conversation::Broadcast { scope: Some(scope) },
        core.clock.now(),
    );
    ctx.feedback(core)
        .plain(&format!("Send the message text for team {scope}:"), None)
        .await?;
    Ok(Some(scope.to_string()))
}

pub async fn on_text(core: &Orchestrator, ctx: &ChatContext, scope: Option<TeamScope>, text: &str) -> BotResult<()> {
    let feedback = ctx.feedback(core);
    let Some(scope) = scope else {
        feedback.info("Pick the recipients with the buttons above, or /cancel.").await?;
        return Ok(());
    };

    let text = match validate_broadcast_text(text) {
        Ok(text) => text,
        Err(e) => {
            log_validation_error("broadcast", "text", text, &e.to_string(), ctx.user(), ctx.chat_id);
            feedback.validation_error(&e.user_message(), "Send a shorter message.").await?;
            return Ok(());
        }
    };
    core.conversations.cancel(ctx.chat_id);

    let recipients: Vec<i64> = core
        .roster
        .eligible(scope)
        .await?
        .into_iter()
        .map(|(chat_id, _)| chat_id)
        .collect();
    let report = send_all(core.notifier.as_ref(), &recipients, &text, None, "broadcast").await;
    tracing::info!(
        "Broadcast to {} by {}: {} delivered, {} failed",
        scope,
        ctx.chat_id,
        report.delivered.len(),
        report.failed.len()
    );

    let mut summary = format!("Message delivered to {} player(s).", report.delivered.len());
    if !report.failed.is_empty() {
        summary.push_str(&format!(" {} could not be reached.", report.failed.len()));
    }
    feedback.success(&summary).await?;
    Ok(())
}
