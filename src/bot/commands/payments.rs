use crate::bot::callback_data::CallbackAction;
use crate::bot::conversation::{Conversation, PayDebtDraft};
use crate::bot::handlers::ChatContext;
use crate::database::models::{player_key, Debt};
use crate::error::{BotError, BotResult};
use crate::services::billing::Settlement;
use crate::services::notifier::{Button, Keyboard};
use crate::services::orchestrator::Orchestrator;

fn settled_text(settlement: &Settlement) -> String {
    let mut text = format!(
        "Payment of {} for training {} confirmed.",
        settlement.debt.amount, settlement.debt.training_label
    );
    if settlement.collected {
        text.push_str(" All payments for this training are collected.");
    }
    text
}

/// Lists the caller's unpaid debts as `paydebt_select_<n>` buttons.
pub async fn pay_debt(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_registered(ctx.chat_id).await?;
    let feedback = ctx.feedback(core);

    let debts = core.billing.unpaid_debts(&player_key(ctx.chat_id)).await?;
    if debts.is_empty() {
        feedback.success("You have no unpaid trainings.").await?;
        return Ok(());
    }

    let buttons = debts
        .iter()
        .enumerate()
        .map(|(index, debt)| {
            Button::new(
                format!("{}: {}", debt.training_label, debt.amount),
                CallbackAction::PayDebtSelect(index),
            )
        })
        .collect();
    let draft = PayDebtDraft {
        debts: debts
            .iter()
            .map(|d| (d.training_fingerprint.clone(), d.training_label.clone()))
            .collect(),
        selected: None,
    };
    core.conversations
        .begin(ctx.chat_id, Conversation::PayDebt(draft), core.clock.now());
    feedback
        .plain("Which training did you pay for?", Some(&Keyboard::column(buttons)))
        .await?;
    Ok(())
}

pub async fn on_select(core: &Orchestrator, ctx: &ChatContext, index: usize) -> BotResult<Option<String>> {
    let Some(Conversation::PayDebt(mut draft)) = core.conversations.get(ctx.chat_id, core.clock.now()) else {
        return Err(BotError::not_found("payment dialog", ctx.chat_id.to_string()));
    };
    let (_, label) = draft
        .debts
        .get(index)
        .cloned()
        .ok_or_else(|| BotError::not_found("selection", index.to_string()))?;

    draft.selected = Some(index);
    core.conversations
        .advance(ctx.chat_id, Conversation::PayDebt(draft), core.clock.now());
    let keyboard = Keyboard::row(vec![Button::new("✅ Yes, I paid", CallbackAction::PayDebtConfirm)]);
    ctx.feedback(core)
        .plain(&format!("Confirm that you paid for training {label}?"), Some(&keyboard))
        .await?;
    Ok(None)
}

pub async fn on_confirm(core: &Orchestrator, ctx: &ChatContext) -> BotResult<Option<String>> {
    let Some(Conversation::PayDebt(draft)) = core.conversations.get(ctx.chat_id, core.clock.now()) else {
        return Err(BotError::not_found("payment dialog", ctx.chat_id.to_string()));
    };
    let (fingerprint, _) = draft
        .selected
        .and_then(|index| draft.debts.get(index).cloned())
        .ok_or_else(|| BotError::invalid("pick a training first"))?;

    core.conversations.cancel(ctx.chat_id);
    let settlement = core
        .billing
        .confirm_paid(ctx.chat_id, &fingerprint, &player_key(ctx.chat_id))
        .await?;
    ctx.feedback(core).success(&settled_text(&settlement)).await?;
    Ok(Some("Payment confirmed".to_string()))
}

/// `paid_yes_<fp>_<player_id>`: pressed by the debtor, or by an admin from
/// the payments view.
pub async fn on_paid(core: &Orchestrator, ctx: &ChatContext, fingerprint: &str, player_id: &str) -> BotResult<Option<String>> {
    let settlement = core.billing.confirm_paid(ctx.chat_id, fingerprint, player_id).await?;
    ctx.feedback(core).success(&settled_text(&settlement)).await?;
    Ok(Some("Payment confirmed".to_string()))
}

/// Lists trainings with unpaid debts as `view_payment_<n>` buttons.
pub async fn view_payments(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;
    let feedback = ctx.feedback(core);

    let groups = core.billing.open_groups().await?;
    if groups.is_empty() {
        feedback.success("All trainings are paid.").await?;
        return Ok(());
    }

    let buttons = groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            Button::new(
                format!("{} ({}/{} paid)", group.training_label, group.paid_count(), group.debts.len()),
                CallbackAction::ViewPayment(index),
            )
        })
        .collect();
    core.conversations.begin(
        ctx.chat_id,
        Conversation::ViewPayments(groups.iter().map(|g| g.fingerprint.clone()).collect()),
        core.clock.now(),
    );
    feedback
        .plain("Trainings with open payments:", Some(&Keyboard::column(buttons)))
        .await?;
    Ok(())
}

pub async fn on_view(core: &Orchestrator, ctx: &ChatContext, index: usize) -> BotResult<Option<String>> {
    core.roster.require_admin(ctx.chat_id).await?;
    let Some(Conversation::ViewPayments(fingerprints)) = core.conversations.get(ctx.chat_id, core.clock.now()) else {
        return Err(BotError::not_found("payments view", ctx.chat_id.to_string()));
    };
    let fingerprint = fingerprints
        .get(index)
        .ok_or_else(|| BotError::not_found("selection", index.to_string()))?;

    let group = core.billing.group(fingerprint).await?;
    let players = core.roster.all().await?;
    let name_of = |debt: &Debt| {
        players
            .get(&debt.player_id)
            .map(|p| p.display_name().to_string())
            .unwrap_or_else(|| debt.player_id.clone())
    };

    let mut text = format!(
        "Training {}: {}/{} paid\n",
        group.training_label,
        group.paid_count(),
        group.debts.len()
    );
    for debt in &group.debts {
        let mark = if debt.paid { "✅" } else { "❌" };
        text.push_str(&format!("\n{} {} - {}", mark, name_of(debt), debt.amount));
    }
    let buttons: Vec<Button> = group
        .unpaid()
        .map(|debt| {
            Button::new(
                format!("Mark {} paid", name_of(debt)),
                CallbackAction::Paid {
                    fingerprint: debt.training_fingerprint.clone(),
                    player_id: debt.player_id.clone(),
                },
            )
        })
        .filter(|b| b.action.fits())
        .collect();

    let keyboard = Keyboard::column(buttons);
    ctx.feedback(core)
        .plain(&text, (!keyboard.rows.is_empty()).then_some(&keyboard))
        .await?;
    Ok(None)
}

pub async fn notify_debtors(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;
    let report = core.billing.notify_debtors().await?;
    let mut text = format!("Reminder sent to {} debtor(s).", report.delivered.len());
    if !report.failed.is_empty() {
        text.push_str(&format!(" {} could not be reached.", report.failed.len()));
    }
    ctx.feedback(core).success(&text).await?;
    Ok(())
}
