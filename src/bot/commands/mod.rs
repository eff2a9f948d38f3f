pub mod ballots;
pub mod broadcast;
pub mod charge;
pub mod payments;
pub mod register;
pub mod training;

use teloxide::utils::command::{BotCommands, ParseError};

use crate::database::models::Vote;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Volleyball club bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start the bot and register")]
    Start,
    #[command(description = "Register or finish registration")]
    Register,
    #[command(description = "Abort the current dialog")]
    Cancel,
    #[command(description = "Show the next training")]
    NextTraining,
    #[command(description = "Show trainings of the coming week")]
    WeekTrainings,
    #[command(description = "Confirm payment of one of your debts")]
    PayDebt,
    #[command(description = "(admin) Schedule a training")]
    AddTraining,
    #[command(description = "(admin) Charge a training")]
    ChargeAll,
    #[command(description = "(admin) Show trainings with open payments")]
    ViewPayments,
    #[command(description = "(admin) Remind every debtor")]
    NotifyDebtors,
    #[command(description = "(admin) Message all players of a team")]
    Broadcast,
    #[command(
        description = "(admin) Vote for someone: /addvote <yes|no> <fingerprint> <name>",
        parse_with = parse_add_vote
    )]
    AddVote {
        vote: Vote,
        fingerprint: String,
        name: String,
    },
    #[command(
        description = "(admin) Change the team of a training: /rescope <fingerprint> <MALE|FEMALE|BOTH>",
        parse_with = "split"
    )]
    Rescope { fingerprint: String, scope: String },
    #[command(description = "(admin) Show the voters of a training: /votes <fingerprint>")]
    Votes { fingerprint: String },
}

/// `<yes|no> <fingerprint> <name...>`; the name may contain spaces.
fn parse_add_vote(input: String) -> Result<(Vote, String, String), ParseError> {
    let mut parts = input.split_whitespace();
    let (Some(vote), Some(fingerprint)) = (parts.next(), parts.next()) else {
        return Err(ParseError::TooFewArguments {
            expected: 3,
            found: input.split_whitespace().count(),
            message: "usage: /addvote <yes|no> <fingerprint> <name>".to_string(),
        });
    };
    let name = parts.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(ParseError::TooFewArguments {
            expected: 3,
            found: 2,
            message: "name is missing".to_string(),
        });
    }
    let vote = vote
        .parse::<Vote>()
        .map_err(|e| ParseError::IncorrectFormat(Box::new(e)))?;
    Ok((vote, fingerprint.to_string(), name))
}
