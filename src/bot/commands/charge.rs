use crate::bot::callback_data::CallbackAction;
use crate::bot::conversation::{ChargeDraft, Conversation};
use crate::bot::handlers::ChatContext;
use crate::error::{BotError, BotResult};
use crate::services::notifier::{Button, ChatAction, Keyboard};
use crate::services::orchestrator::Orchestrator;
use crate::utils::feedback::ProgressTracker;
use crate::utils::logging::{log_command_error, log_validation_error};
use crate::utils::validation::{validate_amount, validate_card};

/// Lists chargeable trainings as `charge_select_<n>` buttons.
pub async fn charge_all(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;
    let feedback = ctx.feedback(core);

    let entries = core.chargeable().await?;
    if entries.is_empty() {
        feedback.info("There are no trainings to charge.").await?;
        return Ok(());
    }

    let mut buttons = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let yes = core.ballots.yes_count(&entry.fingerprint()).await?;
        buttons.push(Button::new(
            format!("{} ({} yes)", entry.training.label(), yes),
            CallbackAction::ChargeSelect(index),
        ));
    }
    let draft = ChargeDraft {
        candidates: entries.iter().map(|e| e.fingerprint()).collect(),
        ..ChargeDraft::default()
    };
    core.conversations
        .begin(ctx.chat_id, Conversation::Charge(draft), core.clock.now());
    feedback
        .plain("Which training do you want to charge?", Some(&Keyboard::column(buttons)))
        .await?;
    Ok(())
}

pub async fn on_select(core: &Orchestrator, ctx: &ChatContext, index: usize) -> BotResult<Option<String>> {
    core.roster.require_admin(ctx.chat_id).await?;
    let Some(Conversation::Charge(mut draft)) = core.conversations.get(ctx.chat_id, core.clock.now()) else {
        return Err(BotError::not_found("charge dialog", ctx.chat_id.to_string()));
    };
    let fingerprint = draft
        .candidates
        .get(index)
        .cloned()
        .ok_or_else(|| BotError::not_found("selection", index.to_string()))?;

    let entry = core.registry.require(&fingerprint).await?;
    draft.fingerprint = Some(fingerprint);
    draft.amount = None;
    core.conversations
        .advance(ctx.chat_id, Conversation::Charge(draft), core.clock.now());
    ctx.feedback(core)
        .plain(
            &format!("Charging {}. Enter the total amount:", entry.training.label()),
            None,
        )
        .await?;
    Ok(None)
}

pub async fn on_text(core: &Orchestrator, ctx: &ChatContext, mut draft: ChargeDraft, text: &str) -> BotResult<()> {
    let feedback = ctx.feedback(core);

    let Some(fingerprint) = draft.fingerprint.clone() else {
        feedback.info("Pick a training with the buttons above, or /cancel.").await?;
        return Ok(());
    };

    let Some(amount) = draft.amount else {
        match validate_amount(text) {
            Ok(amount) => {
                draft.amount = Some(amount);
                core.conversations
                    .advance(ctx.chat_id, Conversation::Charge(draft), core.clock.now());
                feedback.plain("Card or account for the transfer:", None).await?;
            }
            Err(e) => {
                log_validation_error("chargeall", "amount", text, &e.to_string(), ctx.user(), ctx.chat_id);
                feedback
                    .validation_error(&e.user_message(), "Enter a whole number, e.g. 2400.")
                    .await?;
            }
        }
        return Ok(());
    };

    let card = match validate_card(text) {
        Ok(card) => card,
        Err(e) => {
            log_validation_error("chargeall", "card", text, &e.to_string(), ctx.user(), ctx.chat_id);
            feedback
                .validation_error(&e.user_message(), "Send the card number as debtors should see it.")
                .await?;
            return Ok(());
        }
    };
    core.conversations.cancel(ctx.chat_id);

    if let Err(e) = core.notifier.send_chat_action(ctx.chat_id, ChatAction::Typing).await {
        tracing::debug!("Typing action failed: {}", e);
    }
    let mut progress = ProgressTracker::new(feedback.clone(), 2);
    progress.start("Creating debts...").await?;

    let summary = match core.billing.apply_charge(ctx.chat_id, &fingerprint, amount, &card).await {
        Ok(summary) => summary,
        Err(e) => {
            log_command_error("chargeall", ctx.user(), ctx.chat_id, &e.kind().to_string(), &e.to_string());
            progress.error(&e.user_message()).await?;
            return Ok(());
        }
    };

    progress
        .next_step(&format!("Notifying {} debtor(s)...", summary.debtors.len()))
        .await?;
    let report = core.billing.notify_charge(&summary).await;

    let mut done = format!(
        "Training {} charged: {} per person, {} debtor(s).",
        summary.training_label,
        summary.per_person,
        summary.debtors.len()
    );
    if !report.failed.is_empty() {
        done.push_str(&format!("\n⚠️ {} notification(s) could not be delivered.", report.failed.len()));
    }
    progress.complete(&done).await?;
    Ok(())
}
