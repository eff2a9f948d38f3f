use crate::bot::conversation::Conversation;
use crate::bot::handlers::ChatContext;
use crate::database::models::Team;
use crate::error::BotResult;
use crate::services::orchestrator::Orchestrator;
use crate::services::roster::RegistrationStep;
use crate::utils::logging::log_validation_error;
use crate::utils::validation::validate_player_name;

const ASK_NAME: &str = "👋 Welcome to the volleyball club bot!\n\nWhat is your name? It will be shown in polls.";
const ASK_TEAM: &str = "Which team do you play for? Answer MALE or FEMALE.";

/// Begins or resumes registration. Registered players short-circuit.
pub async fn start(core: &Orchestrator, ctx: &ChatContext) -> BotResult<()> {
    let feedback = ctx.feedback(core);
    match core.roster.registration_step(ctx.chat_id).await? {
        RegistrationStep::Done => {
            let player = core.roster.require_registered(ctx.chat_id).await?;
            let team = player.team.map(|t| t.to_string()).unwrap_or_default();
            feedback
                .info(&format!(
                    "You are already registered as {} ({}). Use /help to see what I can do.",
                    player.display_name(),
                    team
                ))
                .await?;
        }
        RegistrationStep::Name => {
            core.conversations
                .begin(ctx.chat_id, Conversation::Registration, core.clock.now());
            feedback.plain(ASK_NAME, None).await?;
        }
        RegistrationStep::Team => {
            core.conversations
                .begin(ctx.chat_id, Conversation::Registration, core.clock.now());
            feedback.plain(ASK_TEAM, None).await?;
        }
    }
    Ok(())
}

pub async fn on_text(core: &Orchestrator, ctx: &ChatContext, text: &str) -> BotResult<()> {
    let feedback = ctx.feedback(core);
    let now = core.clock.now();

    match core.roster.registration_step(ctx.chat_id).await? {
        RegistrationStep::Name => {
            let name = match validate_player_name(text) {
                Ok(name) => name,
                Err(e) => {
                    log_validation_error("register", "name", text, &e.to_string(), ctx.user(), ctx.chat_id);
                    feedback
                        .validation_error(&e.user_message(), "Send your first and last name, e.g. 'Anna Smirnova'.")
                        .await?;
                    return Ok(());
                }
            };
            core.roster.set_name(ctx.chat_id, &name, ctx.username.clone()).await?;
            core.conversations.advance(ctx.chat_id, Conversation::Registration, now);
            feedback.plain(ASK_TEAM, None).await?;
        }
        RegistrationStep::Team => {
            let team = match text.parse::<Team>() {
                Ok(team) => team,
                Err(e) => {
                    log_validation_error("register", "team", text, &e.to_string(), ctx.user(), ctx.chat_id);
                    feedback.validation_error(&e.user_message(), ASK_TEAM).await?;
                    return Ok(());
                }
            };
            let player = core.roster.set_team(ctx.chat_id, team).await?;
            core.conversations.cancel(ctx.chat_id);
            feedback
                .success(&format!(
                    "Registration complete: {} ({}). Use /nexttraining to see when we play.",
                    player.display_name(),
                    team
                ))
                .await?;
        }
        RegistrationStep::Done => {
            core.conversations.cancel(ctx.chat_id);
            feedback.info("You are already registered.").await?;
        }
    }
    Ok(())
}
