mod common;

use common::{
    answers, app_state, complete_all_topics, create_test_db, new_goal, register, LEVEL_ONE_XP,
    QUESTIONS_PER_QUIZ, TOPICS_PER_LEVEL,
};
use questline::{
    db::{models::LevelState, AttemptInsert, SubmissionOutcome},
    rejections::AppError,
};

const RACERS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passing_submissions_award_once() {
    let db = create_test_db().await;
    let user = register(&db, "ada").await;
    let user_id = user.id;
    let state = app_state(db.clone());
    let (_, levels) = new_goal(&state, user.id).await;
    complete_all_topics(&state, user.id, levels[0]).await;

    let mut handles = Vec::new();
    for i in 0..RACERS {
        let state = state.clone();
        let level_id = levels[0];
        handles.push(tokio::spawn(async move {
            state
                .quizzes
                .submit_quiz(user_id, level_id, &format!("racer-{i}"), &answers(QUESTIONS_PER_QUIZ))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(result) => {
                assert!(result.passed);
                assert_eq!(result.xp_awarded, LEVEL_ONE_XP);
                winners += 1;
            }
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);

    let user = db.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(user.total_exp, LEVEL_ONE_XP);
    assert_eq!(db.xp_awards(user.id).await.unwrap().len(), 1);
    assert_eq!(db.level_state(levels[0]).await.unwrap(), LevelState::Completed);
    assert_eq!(db.level_state(levels[1]).await.unwrap(), LevelState::Unlocked);

    let passing = db
        .attempts(user.id, levels[0])
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.passed)
        .count();
    assert_eq!(passing, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_of_one_submission_agree() {
    let db = create_test_db().await;
    let user = register(&db, "ada").await;
    let user_id = user.id;
    let state = app_state(db.clone());
    let (_, levels) = new_goal(&state, user.id).await;
    complete_all_topics(&state, user.id, levels[0]).await;

    let mut handles = Vec::new();
    for _ in 0..RACERS {
        let state = state.clone();
        let level_id = levels[0];
        handles.push(tokio::spawn(async move {
            state
                .quizzes
                .submit_quiz(user_id, level_id, "same-id", &answers(8))
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    assert!(results.iter().all(|r| *r == results[0]));
    assert!(results[0].passed);

    assert_eq!(db.attempts(user.id, levels[0]).await.unwrap().len(), 1);
    assert_eq!(
        db.get_user(user.id).await.unwrap().unwrap().total_exp,
        LEVEL_ONE_XP
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_topic_completions_converge() {
    let db = create_test_db().await;
    let user = register(&db, "ada").await;
    let user_id = user.id;
    let state = app_state(db.clone());
    let (_, levels) = new_goal(&state, user.id).await;

    let mut handles = Vec::new();
    for i in 0..RACERS * TOPICS_PER_LEVEL {
        let state = state.clone();
        let level_id = levels[0];
        let topic = (i % TOPICS_PER_LEVEL) as i64;
        handles.push(tokio::spawn(async move {
            state.progression.complete_topic(user_id, level_id, topic).await
        }));
    }

    let mut newly = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().newly_completed {
            newly += 1;
        }
    }
    assert_eq!(newly, TOPICS_PER_LEVEL);

    let level = state.goals.get_level(user.id, levels[0]).await.unwrap();
    assert!(level.topics.iter().all(|t| t.completed));
    assert_eq!(level.state, LevelState::PendingQuiz);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_stored_passes_from_one_snapshot_award_once() {
    let db = create_test_db().await;
    let user = register(&db, "ada").await;
    let state = app_state(db.clone());
    let (_, levels) = new_goal(&state, user.id).await;
    complete_all_topics(&state, user.id, levels[0]).await;

    // Every racer skips the service checks and starts from the same snapshot.
    let level = db.owned_level(user.id, levels[0]).await.unwrap().unwrap();
    let mut handles = Vec::new();
    for i in 0..RACERS {
        let db = db.clone();
        let attempt = AttemptInsert {
            user_id: user.id,
            level: level.clone(),
            submission_id: format!("stored-{i}"),
            correct: 10,
            total: 10,
            score: 1.0,
            passed: true,
        };
        handles.push(tokio::spawn(async move { db.record_attempt(&attempt).await }));
    }

    let mut recorded = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            SubmissionOutcome::Recorded(result) => {
                assert_eq!(result.xp_awarded, LEVEL_ONE_XP);
                recorded += 1;
            }
            SubmissionOutcome::LevelNotPending => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(recorded, 1);
    assert_eq!(db.xp_awards(user.id).await.unwrap().len(), 1);
    assert_eq!(
        db.get_user(user.id).await.unwrap().unwrap().total_exp,
        LEVEL_ONE_XP
    );
}
