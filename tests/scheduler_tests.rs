mod common;

use chrono::{Duration, NaiveTime};
use std::collections::BTreeMap;
use volley_club_bot::bot::conversation::Conversation;
use volley_club_bot::database::collections;
use volley_club_bot::database::models::{Ballot, BallotRecord, Game, Team, TeamScope, Vote};
use volley_club_bot::services::clock::Clock;
use volley_club_bot::services::scheduler::Jobs;

use common::{at, date, one_off, weekly, TestBot};

/// Saturday 22.03.2025 with three registered male players.
async fn saturday_bot() -> TestBot {
    let bot = TestBot::new(at(2025, 3, 22, 9, 0)).await;
    for id in 1..=3 {
        bot.register(id, &format!("Player {id}"), Team::Male).await;
    }
    bot
}

#[tokio::test]
async fn test_open_due_polls_on_opening_day() {
    let bot = saturday_bot().await;
    let (weekly_entry, opened) = bot
        .core
        .add_training(common::ADMIN, &weekly("1", "6", "MALE", false))
        .await
        .unwrap();
    assert!(opened.is_none());
    assert!(!weekly_entry.training.voting_opened);
    bot.add(one_off("27.03.2025", "23.03.2025", "BOTH")).await;
    assert!(bot.notifier.sent().is_empty());

    let jobs = Jobs::new(bot.core.clone());
    assert_eq!(jobs.open_due_polls().await.unwrap(), 0);

    bot.clock.set(at(2025, 3, 23, 10, 0));
    assert_eq!(jobs.open_due_polls().await.unwrap(), 2);
    assert_eq!(bot.notifier.messages_to(1).len(), 2);
    let poll = bot.notifier.last_to(1).unwrap();
    assert_eq!(poll.keyboard.map(|k| k.actions().count()), Some(2));

    // Already open: nothing to do on a second run.
    assert_eq!(jobs.open_due_polls().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reminders_reach_only_non_voters() {
    let bot = saturday_bot().await;
    bot.clock.set(at(2025, 3, 23, 10, 0));
    let fp = bot.add(weekly("1", "6", "MALE", false)).await.fingerprint();
    bot.vote(1, &fp, Vote::Yes).await;
    bot.notifier.clear();

    let jobs = Jobs::new(bot.core.clone());
    assert_eq!(jobs.send_reminders().await.unwrap(), 1);
    assert!(bot.notifier.messages_to(1).is_empty());
    assert!(bot.notifier.last_to(2).unwrap().text.contains("Reminder"));
    assert!(bot.notifier.last_to(3).is_some());

    // Monday: the training is one day away, no reminder.
    bot.notifier.clear();
    bot.clock.set(at(2025, 3, 24, 12, 0));
    assert_eq!(jobs.send_reminders().await.unwrap(), 0);
    assert!(bot.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_game_reminders_follow_game_votes() {
    let bot = saturday_bot().await;
    let game = Game {
        date: date(2025, 3, 23),
        time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        opponent: "Spartak".into(),
        location: Some("Arena".into()),
        team_scope: TeamScope::Male,
    };
    bot.core
        .db
        .update(collections::GAMES, |games: &mut BTreeMap<String, Game>| {
            games.insert("1".into(), game);
            Ok(())
        })
        .await
        .unwrap();

    let record = |vote| BallotRecord {
        display_name: "p".into(),
        vote,
        timestamp: at(2025, 3, 20, 9, 0),
    };
    bot.core
        .db
        .update(collections::GAME_VOTES, |ballots: &mut BTreeMap<String, Ballot>| {
            let ballot = ballots.entry("1".into()).or_default();
            ballot.insert("1".into(), record(Vote::Yes));
            ballot.insert("2".into(), record(Vote::No));
            Ok(())
        })
        .await
        .unwrap();

    let jobs = Jobs::new(bot.core.clone());
    assert_eq!(jobs.game_reminders().await.unwrap(), 2);
    assert!(bot.notifier.last_to(1).unwrap().text.contains("See you"));
    assert!(bot.notifier.messages_to(2).is_empty());
    assert!(bot.notifier.last_to(3).unwrap().text.contains("Please vote"));
}

#[tokio::test]
async fn test_expire_conversations_drops_idle_dialogs() {
    let bot = saturday_bot().await;
    let now = bot.clock.now();
    bot.core.conversations.begin(1, Conversation::Registration, now);
    bot.core
        .conversations
        .begin(2, Conversation::Broadcast { scope: None }, now + Duration::minutes(30));

    bot.clock.advance(Duration::minutes(61));
    let jobs = Jobs::new(bot.core.clone());
    assert_eq!(jobs.expire_conversations().await.unwrap(), 1);
    assert_eq!(bot.core.conversations.len(), 1);
}
