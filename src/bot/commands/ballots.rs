//! Poll interaction: vote buttons and the admin ballot commands.

use crate::bot::handlers::ChatContext;
use crate::database::models::{is_surrogate, Vote};
use crate::error::BotResult;
use crate::services::ballot::CastOutcome;
use crate::services::orchestrator::Orchestrator;
use crate::utils::validation::validate_player_name;

fn tally(outcome: &CastOutcome, capacity: usize) -> String {
    format!("{}/{} confirmed", outcome.yes_count, capacity)
}

/// `vote_yes_<fp>` / `vote_no_<fp>` from a poll message.
pub async fn on_vote(core: &Orchestrator, ctx: &ChatContext, vote: Vote, fingerprint: &str) -> BotResult<Option<String>> {
    let outcome = core.ballots.cast(ctx.chat_id, fingerprint, vote).await?;
    let capacity = core.ballots.capacity();

    let toast = match (outcome.unchanged, outcome.vote) {
        (true, _) => format!("Your vote is already recorded ({}).", tally(&outcome, capacity)),
        (false, Vote::Yes) => format!("See you at the training! {}", tally(&outcome, capacity)),
        (false, Vote::No) => format!("Got it, you will not come. {}", tally(&outcome, capacity)),
    };
    Ok(Some(toast))
}

/// `/addvote <yes|no> <fingerprint> <name>`
pub async fn add_vote(core: &Orchestrator, ctx: &ChatContext, vote: Vote, fingerprint: &str, name: &str) -> BotResult<()> {
    let name = validate_player_name(name)?;
    let outcome = core
        .ballots
        .cast_surrogate(ctx.chat_id, &name, fingerprint, vote)
        .await?;
    ctx.feedback(core)
        .success(&format!(
            "Vote '{}' for {} recorded on {} ({}).",
            vote,
            name,
            fingerprint,
            tally(&outcome, core.ballots.capacity())
        ))
        .await?;
    Ok(())
}

/// `/rescope <fingerprint> <MALE|FEMALE|BOTH>`
pub async fn rescope(core: &Orchestrator, ctx: &ChatContext, fingerprint: &str, scope: &str) -> BotResult<()> {
    let scope = scope.parse()?;
    let entry = core.rescope(ctx.chat_id, fingerprint, scope).await?;
    ctx.feedback(core)
        .success(&format!(
            "Training {} is now for team {}.",
            entry.training.label(),
            entry.training.team_scope
        ))
        .await?;
    Ok(())
}

/// `/votes <fingerprint>`: voters of an open ballot in vote order.
pub async fn votes(core: &Orchestrator, ctx: &ChatContext, fingerprint: &str) -> BotResult<()> {
    core.roster.require_admin(ctx.chat_id).await?;
    let voters = core.ballots.voters(fingerprint).await?;

    let yes: Vec<_> = voters.iter().filter(|(_, r)| r.vote == Vote::Yes).collect();
    let no: Vec<_> = voters.iter().filter(|(_, r)| r.vote == Vote::No).collect();

    let mut text = format!(
        "Votes for {}: {}/{} yes\n",
        fingerprint,
        yes.len(),
        core.ballots.capacity()
    );
    for (label, group) in [("✅ Coming", &yes), ("❌ Not coming", &no)] {
        if group.is_empty() {
            continue;
        }
        text.push_str(&format!("\n{label}:"));
        for (index, (player_id, record)) in group.iter().enumerate() {
            let marker = if is_surrogate(player_id) { " (added by admin)" } else { "" };
            text.push_str(&format!("\n{}. {}{}", index + 1, record.display_name, marker));
        }
        text.push('\n');
    }
    ctx.feedback(core).plain(text.trim_end(), None).await?;
    Ok(())
}
