use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::commands::{ballots, broadcast, charge, payments, register, training, Command};
use crate::bot::conversation::Conversation;
use crate::bot::handlers::{general_message, report_error, ChatContext, HandlerResult};
use crate::error::BotResult;
use crate::services::orchestrator::Orchestrator;
use crate::utils::logging::{log_command_start, log_command_success};

fn context(msg: &Message) -> ChatContext {
    match msg.from() {
        Some(user) => ChatContext::new(msg.chat.id.0, user.username.clone(), user.first_name.clone()),
        None => ChatContext::new(msg.chat.id.0, None, "unknown"),
    }
}

pub async fn command_handler(msg: Message, cmd: Command, core: Arc<Orchestrator>) -> HandlerResult {
    run_command(&core, &context(&msg), cmd).await;
    Ok(())
}

pub async fn text_handler(msg: Message, core: Arc<Orchestrator>) -> HandlerResult {
    if let Some(text) = msg.text() {
        run_text(&core, &context(&msg), text).await;
    }
    Ok(())
}

fn command_name(cmd: &Command) -> &'static str {
    match cmd {
        Command::Help => "help",
        Command::Start => "start",
        Command::Register => "register",
        Command::Cancel => "cancel",
        Command::NextTraining => "nexttraining",
        Command::WeekTrainings => "weektrainings",
        Command::PayDebt => "paydebt",
        Command::AddTraining => "addtraining",
        Command::ChargeAll => "chargeall",
        Command::ViewPayments => "viewpayments",
        Command::NotifyDebtors => "notifydebtors",
        Command::Broadcast => "broadcast",
        Command::AddVote { .. } => "addvote",
        Command::Rescope { .. } => "rescope",
        Command::Votes { .. } => "votes",
    }
}

/// Runs a command and reports any failure on the originating chat.
pub async fn run_command(core: &Orchestrator, ctx: &ChatContext, cmd: Command) {
    let name = command_name(&cmd);
    log_command_start(name, ctx.user(), ctx.chat_id, None);
    match dispatch_command(core, ctx, cmd).await {
        Ok(()) => log_command_success(name, ctx.user(), ctx.chat_id, None),
        Err(e) => report_error(core, ctx, name, &e).await,
    }
}

pub async fn dispatch_command(core: &Orchestrator, ctx: &ChatContext, cmd: Command) -> BotResult<()> {
    match cmd {
        Command::Help => {
            ctx.feedback(core)
                .plain(&Command::descriptions().to_string(), None)
                .await?;
        }
        Command::Start | Command::Register => register::start(core, ctx).await?,
        Command::Cancel => {
            let feedback = ctx.feedback(core);
            match core.conversations.cancel(ctx.chat_id) {
                Some(conversation) => feedback.info(&format!("Cancelled {}.", conversation.name())).await?,
                None => feedback.info("Nothing to cancel.").await?,
            };
        }
        Command::NextTraining => training::next_training(core, ctx).await?,
        Command::WeekTrainings => training::week_trainings(core, ctx).await?,
        Command::PayDebt => payments::pay_debt(core, ctx).await?,
        Command::AddTraining => training::add_training(core, ctx).await?,
        Command::ChargeAll => charge::charge_all(core, ctx).await?,
        Command::ViewPayments => payments::view_payments(core, ctx).await?,
        Command::NotifyDebtors => payments::notify_debtors(core, ctx).await?,
        Command::Broadcast => broadcast::broadcast(core, ctx).await?,
        Command::AddVote {
            vote,
            fingerprint,
            name,
        } => ballots::add_vote(core, ctx, vote, &fingerprint, &name).await?,
        Command::Rescope { fingerprint, scope } => ballots::rescope(core, ctx, &fingerprint, &scope).await?,
        Command::Votes { fingerprint } => ballots::votes(core, ctx, &fingerprint).await?,
    }
    Ok(())
}

/// Feeds free text into the chat's conversation.
pub async fn run_text(core: &Orchestrator, ctx: &ChatContext, text: &str) {
    if let Err(e) = dispatch_text(core, ctx, text).await {
        report_error(core, ctx, "text", &e).await;
    }
}

pub async fn dispatch_text(core: &Orchestrator, ctx: &ChatContext, text: &str) -> BotResult<()> {
    match core.conversations.get(ctx.chat_id, core.clock.now()) {
        Some(Conversation::Registration) => register::on_text(core, ctx, text).await,
        Some(Conversation::AddTraining(draft)) => training::on_text(core, ctx, draft, text).await,
        Some(Conversation::Charge(draft)) => charge::on_text(core, ctx, draft, text).await,
        Some(Conversation::Broadcast { scope }) => broadcast::on_text(core, ctx, scope, text).await,
        Some(Conversation::PayDebt(_)) | Some(Conversation::ViewPayments(_)) => {
            ctx.feedback(core)
                .info("Please use the buttons above, or /cancel.")
                .await?;
            Ok(())
        }
        None => general_message::handle_general_message(core, ctx, text).await,
    }
}
