use crate::bot::handlers::ChatContext;
use crate::error::BotResult;
use crate::services::orchestrator::Orchestrator;

/// Text outside any conversation.
pub async fn handle_general_message(core: &Orchestrator, ctx: &ChatContext, text: &str) -> BotResult<()> {
    let feedback = ctx.feedback(core);

    if text.starts_with('/') {
        let error_msg = format!("Unknown command: {}", text.split_whitespace().next().unwrap_or(text));
        let suggestion = "Use /help to see all available commands, or check your command syntax.";
        feedback.validation_error(&error_msg, suggestion).await?;
    } else if text.to_lowercase().contains("training") {
        feedback
            .info("Looking for trainings? Try /nexttraining or /weektrainings.")
            .await?;
    } else if text.to_lowercase().contains("help") {
        feedback.info("Use /help to see all available commands!").await?;
    }
    // Other messages are ignored to avoid spam
    Ok(())
}
