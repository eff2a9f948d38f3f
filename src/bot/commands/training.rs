use crate::bot::conversation::{Conversation, TrainingDraft, TrainingStep};
use crate::bot::handlers::ChatContext;
use crate::database::models::{TeamScope, TrainingInstance, TrainingKind};
use crate::error::{BotError, BotResult};
use crate::services::orchestrator::Orchestrator;
use crate::utils::datetime::{format_date, format_time, parse_date, parse_time, parse_weekday, weekday_name, weekday_index};
use crate::utils::logging::log_validation_error;
use crate::utils::validation::{validate_optional_text, validate_yes_no};

fn prompt(step: TrainingStep, kind: TrainingKind) -> &'static str {
    match (step, kind) {
        (TrainingStep::Kind, _) => "New training. Is it ONE-OFF or WEEKLY?",
        (TrainingStep::Day, TrainingKind::OneOff) => "Date of the training (DD.MM.YYYY)?",
        (TrainingStep::Day, TrainingKind::Recurring) => "Weekday of the training (0 = Monday ... 6 = Sunday, or a day name)?",
        (TrainingStep::VotingOpen, TrainingKind::OneOff) => "On which date should voting open (DD.MM.YYYY)?",
        (TrainingStep::VotingOpen, TrainingKind::Recurring) => "On which weekday should voting open?",
        (TrainingStep::Start, _) => "Start time (HH:MM)?",
        (TrainingStep::End, _) => "End time (HH:MM)?",
        (TrainingStep::Scope, _) => "Which team: MALE, FEMALE or BOTH?",
        (TrainingStep::Coach, _) => "Is it with a coach? (yes/no)",
        (TrainingStep::Location, _) => "Location? Send '-' to skip.",
        (TrainingStep::Description, _) => "Description? Send '-' to skip.",
    }
}

fn parse_kind(input: &str) -> BotResult<TrainingKind> {
    match input.trim().to_lowercase().replace(['-', '_'], "").as_str() {
        "oneoff" | "once" | "1" => Ok(TrainingKind::OneOff),
        "weekly" | "recurring" | "2" => Ok(TrainingKind::Recurring),
        _ => Err(BotError::invalid("answer ONE-OFF or WEEKLY")),
    }
}

/// Validates one answer and stores it in the draft.
fn apply_answer(draft: &mut TrainingDraft, text: &str) -> BotResult<()> {
    let form = &mut draft.form;
    let value = text.trim().to_string();
    match draft.step {
        TrainingStep::Kind => form.kind = parse_kind(text)?,
        TrainingStep::Day | TrainingStep::VotingOpen => {
            match form.kind {
                TrainingKind::OneOff => {
                    parse_date(text)?;
                }
                TrainingKind::Recurring => {
                    parse_weekday(text)?;
                }
            }
            if draft.step == TrainingStep::Day {
                form.day = value;
            } else {
                form.voting_open = value;
            }
        }
        TrainingStep::Start => {
            parse_time(text)?;
            form.start = value;
        }
        TrainingStep::End => {
            parse_time(text)?;
            form.end = value;
        }
        TrainingStep::Scope => {
            value.parse::<TeamScope>()?;
            form.team_scope = value;
        }
        TrainingStep::Coach => form.with_coach = validate_yes_no(text)?,
        TrainingStep::Location => {
            validate_optional_text("Location", text)?;
            form.location = value;
        }
        TrainingStep::Description => {
            validate_optional_text("Description", text)?;
            form.description = value;
        }
    }
    Ok(())
}

pub async fn add_training(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;
    let draft = TrainingDraft::default();
    let first = prompt(draft.step, draft.form.kind);
    core.conversations
        .begin(ctx.chat_id, Conversation::AddTraining(draft), core.clock.now());
    ctx.feedback(core).plain(first, None).await?;
    Ok(())
}

pub async fn on_text(core: &Orchestrator, ctx: &ChatContext, mut draft: TrainingDraft, text: &str) -> BotResult<()> {
    let feedback = ctx.feedback(core);

    if let Err(e) = apply_answer(&mut draft, text) {
        log_validation_error("addtraining", &format!("{:?}", draft.step), text, &e.to_string(), ctx.user(), ctx.chat_id);
        feedback
            .validation_error(&e.user_message(), prompt(draft.step, draft.form.kind))
            .await?;
        return Ok(());
    }

    if let Some(next) = draft.step.next() {
        draft.step = next;
        let question = prompt(draft.step, draft.form.kind);
        core.conversations
            .advance(ctx.chat_id, Conversation::AddTraining(draft), core.clock.now());
        feedback.plain(question, None).await?;
        return Ok(());
    }

    core.conversations.cancel(ctx.chat_id);
    let (entry, opened) = core.add_training(ctx.chat_id, &draft.form).await?;
    let mut text = format!(
        "Training {} added.\nFingerprint: {}",
        entry.training.label(),
        entry.fingerprint()
    );
    match opened {
        Some(report) => text.push_str(&format!(
            "\nVoting is open: poll sent to {} player(s).",
            report.delivered.len()
        )),
        None => text.push_str("\nVoting will open on schedule."),
    }
    feedback.success(&text).await?;
    Ok(())
}

pub fn render_instance(instance: &TrainingInstance) -> String {
    let training = &instance.training;
    let mut text = format!(
        "📅 {} {}, {}-{}",
        weekday_name(weekday_index(instance.date)),
        format_date(instance.date),
        format_time(training.start),
        format_time(training.end)
    );
    text.push_str(&format!(" ({})", training.team_scope));
    if let Some(location) = &training.location {
        text.push_str(&format!("\n📍 {location}"));
    }
    if training.with_coach {
        text.push_str("\n👨‍🏫 With coach");
    }
    if let Some(description) = &training.description {
        text.push_str(&format!("\n{description}"));
    }
    text
}

pub async fn next_training(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    let player = core.roster.require_registered(ctx.chat_id).await?;
    let feedback = ctx.feedback(core);
    let Some(team) = player.team else {
        return Err(BotError::NotRegistered(ctx.chat_id.to_string()));
    };

    match core.registry.next_training(team).await? {
        Some(instance) => {
            feedback
                .plain(&format!("Next training:\n\n{}", render_instance(&instance)), None)
                .await?
        }
        None => feedback.info("No upcoming trainings scheduled.").await?,
    };
    Ok(())
}

pub async fn week_trainings(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    let player = core.roster.require_registered(ctx.chat_id).await?;
    let feedback = ctx.feedback(core);
    let Some(team) = player.team else {
        return Err(BotError::NotRegistered(ctx.chat_id.to_string()));
    };

    let instances = core.registry.week_trainings(team).await?;
    if instances.is_empty() {
        feedback.info("No trainings in the coming week.").await?;
        return Ok(());
    }
    let listing = instances
        .iter()
        .map(render_instance)
        .collect::<Vec<_>>()
        .join("\n\n");
    feedback
        .plain(&format!("Trainings this week:\n\n{listing}"), None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_answer_keeps_step_on_error() {
        let mut draft = TrainingDraft::default();
        assert!(apply_answer(&mut draft, "sometimes").is_err());
        assert!(apply_answer(&mut draft, "weekly").is_ok());
        assert_eq!(draft.form.kind, TrainingKind::Recurring);

        draft.step = TrainingStep::Day;
        assert!(apply_answer(&mut draft, "27.03.2025").is_err());
        assert!(apply_answer(&mut draft, "tue").is_ok());
        assert_eq!(draft.form.day, "tue");

        draft.step = TrainingStep::Start;
        assert!(apply_answer(&mut draft, "25:00").is_err());
        assert!(draft.form.start.is_empty());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("One-Off").ok(), Some(TrainingKind::OneOff));
        assert_eq!(parse_kind("WEEKLY").ok(), Some(TrainingKind::Recurring));
        assert!(parse_kind("daily").is_err());
    }
}
