mod common;

use common::{at, date, one_off, weekly, TestBot, ADMIN};
use volley_club_bot::database::models::{Attendance, Team, TrainingStatus, Vote};
use volley_club_bot::services::archive::ArchiveOutcome;
use volley_club_bot::services::scheduler::Jobs;

const TUESDAY: &str = "const_1_19:00";

async fn attendance(bot: &TestBot, id: i64) -> Attendance {
    bot.core
        .roster
        .get(id)
        .await
        .unwrap()
        .unwrap()
        .training_attendance
}

/// Weekly Tuesday training whose poll opens on Sunday 23.03.2025. Players
/// 1 and 2 vote YES, player 3 votes NO.
async fn tuesday_cycle(with_coach: bool) -> TestBot {
    let bot = TestBot::new(at(2025, 3, 23, 10, 0)).await;
    for (id, name) in [(1, "Anna"), (2, "Boris"), (3, "Vera")] {
        bot.register(id, name, Team::Male).await;
    }
    let entry = bot.add(weekly("1", "6", "BOTH", with_coach)).await;
    assert!(entry.training.voting_opened);

    bot.vote(1, TUESDAY, Vote::Yes).await;
    bot.vote(2, TUESDAY, Vote::Yes).await;
    bot.vote(3, TUESDAY, Vote::No).await;
    bot
}

#[tokio::test]
async fn test_reconcile_auto_charges_past_training() {
    let bot = tuesday_cycle(false).await;
    bot.clock.set(at(2025, 3, 26, 23, 0));

    let jobs = Jobs::new(bot.core.clone());
    assert_eq!(jobs.reconcile_past().await.unwrap(), 1);

    let training = bot.core.registry.require(TUESDAY).await.unwrap().training;
    assert_eq!(training.status, TrainingStatus::Charged);
    assert_eq!(training.last_reconciled, Some(date(2025, 3, 25)));
    assert!(bot.core.billing.all_debts().await.unwrap().is_empty());

    assert!(bot.core.ballots.snapshot(TUESDAY).await.unwrap().is_none());
    let entries = bot.core.archive.entries_for(TUESDAY).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.effective_date, date(2025, 3, 25));
    assert_eq!(entries[0].1.ballot.len(), 3);

    assert_eq!(attendance(&bot, 1).await, Attendance { attended: 1, total: 1 });
    assert_eq!(attendance(&bot, 2).await, Attendance { attended: 1, total: 1 });
    assert_eq!(attendance(&bot, 3).await, Attendance { attended: 0, total: 1 });
}

#[tokio::test]
async fn test_reconcile_handles_an_occurrence_once() {
    let bot = tuesday_cycle(false).await;
    bot.clock.set(at(2025, 3, 26, 23, 0));

    let first = bot.core.reconcile(TUESDAY).await.unwrap().unwrap();
    assert!(first.auto_charged);
    assert!(matches!(first.archive, ArchiveOutcome::Archived { players_updated: 3, .. }));

    assert!(bot.core.reconcile(TUESDAY).await.unwrap().is_none());
    bot.clock.set(at(2025, 3, 27, 23, 0));
    assert!(bot.core.reconcile(TUESDAY).await.unwrap().is_none());

    assert_eq!(bot.core.archive.entries_for(TUESDAY).await.unwrap().len(), 1);
    assert_eq!(attendance(&bot, 1).await.total, 1);
}

#[tokio::test]
async fn test_training_with_coach_is_archived_not_charged() {
    let bot = tuesday_cycle(true).await;
    bot.clock.set(at(2025, 3, 26, 23, 0));

    let reconciled = bot.core.reconcile(TUESDAY).await.unwrap().unwrap();
    assert!(!reconciled.auto_charged);
    assert!(matches!(reconciled.archive, ArchiveOutcome::Archived { .. }));

    let training = bot.core.registry.require(TUESDAY).await.unwrap().training;
    assert_eq!(training.status, TrainingStatus::NotCharged);
    assert!(!training.voting_opened);
}

#[tokio::test]
async fn test_statistics_grow_monotonically_over_cycles() {
    let bot = tuesday_cycle(false).await;
    let jobs = Jobs::new(bot.core.clone());
    bot.clock.set(at(2025, 3, 26, 23, 0));
    jobs.reconcile_past().await.unwrap();
    let after_first = attendance(&bot, 3).await;

    // Next Sunday the poll reopens and a new billing cycle starts.
    bot.clock.set(at(2025, 3, 30, 10, 0));
    assert_eq!(jobs.open_due_polls().await.unwrap(), 1);
    let training = bot.core.registry.require(TUESDAY).await.unwrap().training;
    assert_eq!(training.status, TrainingStatus::NotCharged);
    assert!(training.voting_opened);

    bot.vote(3, TUESDAY, Vote::Yes).await;
    bot.clock.set(at(2025, 4, 2, 23, 0));
    assert_eq!(jobs.reconcile_past().await.unwrap(), 1);

    let after_second = attendance(&bot, 3).await;
    assert!(after_second.total >= after_first.total);
    assert!(after_second.attended >= after_first.attended);
    assert!(after_second.attended <= after_second.total);
    assert_eq!(after_second, Attendance { attended: 1, total: 2 });
    // Players who skipped the second poll are not counted.
    assert_eq!(attendance(&bot, 1).await, Attendance { attended: 1, total: 1 });
    assert_eq!(bot.core.archive.entries_for(TUESDAY).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_occurrence_before_admission_is_skipped() {
    // Added on Wednesday, the day after a Tuesday occurrence.
    let bot = TestBot::new(at(2025, 3, 26, 12, 0)).await;
    bot.add(weekly("1", "6", "BOTH", false)).await;

    bot.clock.set(at(2025, 3, 26, 23, 0));
    assert!(bot.core.reconcile(TUESDAY).await.unwrap().is_none());
    let training = bot.core.registry.require(TUESDAY).await.unwrap().training;
    assert_eq!(training.status, TrainingStatus::NotCharged);
}

#[tokio::test]
async fn test_cross_team_votes_do_not_touch_stats() {
    let bot = TestBot::new(at(2025, 3, 25, 10, 0)).await;
    bot.register(1, "Olga", Team::Female).await;
    bot.register(2, "Quentin", Team::Male).await;
    let fp = bot.add(one_off("27.03.2025", "25.03.2025", "FEMALE")).await.fingerprint();

    bot.vote(1, &fp, Vote::Yes).await;
    bot.vote(2, &fp, Vote::Yes).await;
    let summary = bot.core.billing.charge(ADMIN, &fp, 100, "card").await.unwrap();
    assert!(matches!(summary.archive, ArchiveOutcome::Archived { players_updated: 1, .. }));

    assert_eq!(attendance(&bot, 1).await, Attendance { attended: 1, total: 1 });
    assert_eq!(attendance(&bot, 2).await, Attendance::default());
}

#[tokio::test]
async fn test_excluded_players_and_surrogates_are_not_counted() {
    let bot = TestBot::new(at(2025, 3, 25, 10, 0)).await;
    bot.register(1, "Olga", Team::Female).await;
    bot.register(ADMIN, "Coach", Team::Female).await;
    bot.core.roster.provision(&[], &[ADMIN]).await.unwrap();
    let fp = bot.add(one_off("27.03.2025", "25.03.2025", "BOTH")).await.fingerprint();

    bot.vote(1, &fp, Vote::Yes).await;
    bot.vote(ADMIN, &fp, Vote::Yes).await;
    bot.core.ballots.cast_surrogate(ADMIN, "Guest", &fp, Vote::Yes).await.unwrap();

    let summary = bot.core.billing.charge(ADMIN, &fp, 300, "card").await.unwrap();
    assert_eq!(summary.debtors.len(), 3);
    assert!(matches!(summary.archive, ArchiveOutcome::Archived { players_updated: 1, .. }));
    assert_eq!(attendance(&bot, ADMIN).await.total, 0);
}

#[tokio::test]
async fn test_archive_guards_without_force() {
    let bot = TestBot::new(at(2025, 3, 25, 10, 0)).await;
    bot.register(1, "Anna", Team::Male).await;

    // One-off occurrence still ahead.
    let entry = bot.add(one_off("27.03.2025", "25.03.2025", "BOTH")).await;
    bot.vote(1, &entry.fingerprint(), Vote::Yes).await;
    let outcome = bot.core.archive.archive(&entry.training, false).await.unwrap();
    assert_eq!(outcome, ArchiveOutcome::NotDue);

    // Weekly Monday training polled on Tuesday: votes postdate Monday's end.
    let monday = bot.add(weekly("0", "1", "BOTH", true)).await;
    assert!(monday.training.voting_opened);
    bot.vote(1, &monday.fingerprint(), Vote::Yes).await;
    let outcome = bot.core.archive.archive(&monday.training, false).await.unwrap();
    assert_eq!(outcome, ArchiveOutcome::FreshBallot);
    assert!(bot.core.ballots.snapshot(&monday.fingerprint()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_past_one_off_without_ballot_is_closed() {
    let bot = TestBot::new(at(2025, 3, 20, 10, 0)).await;
    let fp = bot.add(one_off("27.03.2025", "26.03.2025", "BOTH")).await.fingerprint();

    bot.clock.set(at(2025, 3, 28, 23, 0));
    let reconciled = bot.core.reconcile(&fp).await.unwrap().unwrap();
    assert_eq!(reconciled.occurrence, date(2025, 3, 27));
    assert_eq!(reconciled.archive, ArchiveOutcome::NoBallot);
    assert_eq!(
        bot.core.registry.require(&fp).await.unwrap().training.status,
        TrainingStatus::Charged
    );
}
