mod common;

use messenger_server::chat::{access, directory, membership};
use messenger_server::error::ApiError;
use messenger_server::models::MembershipState;
use sqlx::{SqliteConnection, SqlitePool};

async fn assert_not_headless(pool: &SqlitePool, conversation_id: &str) {
    let mut conn = pool.acquire().await.unwrap();
    let active = membership::active_members(&mut conn, conversation_id)
        .await
        .unwrap();
    if !active.is_empty() {
        assert!(
            active.iter().any(|m| m.is_admin),
            "group {} has active members but no active admin",
            conversation_id
        );
    }
}

async fn join_order(conn: &mut SqliteConnection, conversation_id: &str) -> Vec<(String, i64)> {
    sqlx::query_as::<_, (String, i64)>(
        r#"SELECT user_id, seq FROM "memberships" WHERE conversation_id = ? ORDER BY seq ASC"#,
    )
    .bind(conversation_id)
    .fetch_all(&mut *conn)
    .await
    .unwrap()
}

#[tokio::test]
async fn check_membership_distinguishes_absent_active_and_left() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 4).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(access::check_membership(&mut conn, &users[3].0, &group)
        .await
        .unwrap()
        .is_none());

    let active = access::check_membership(&mut conn, &users[1].0, &group)
        .await
        .unwrap()
        .unwrap();
    assert!(active.is_active());
    assert!(!active.is_admin);

    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();
    membership::leave(&mut conn, &users[1].0, &conversation)
        .await
        .unwrap();

    let left = access::check_membership(&mut conn, &users[1].0, &group)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(left.state, MembershipState::Left { .. }));

    assert!(matches!(
        access::require_participant(&mut conn, &users[1].0, &group).await,
        Err(ApiError::Forbidden(_))
    ));
    assert!(access::require_history(&mut conn, &users[1].0, &group)
        .await
        .is_ok());
    assert!(matches!(
        access::require_history(&mut conn, &users[3].0, &group).await,
        Err(ApiError::Forbidden(_))
    ));
}

#[tokio::test]
async fn left_admin_has_no_authority() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 3).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();
    membership::leave(&mut conn, &users[0].0, &conversation)
        .await
        .unwrap();

    let row = access::check_membership(&mut conn, &users[0].0, &group)
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_admin);
    assert!(!row.has_authority());
    assert!(matches!(
        access::require_admin(&mut conn, &users[0].0, &group).await,
        Err(ApiError::Forbidden(_))
    ));
}

#[tokio::test]
async fn join_inserts_then_rejects_active_duplicate() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 4).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();

    let outcome = membership::join(&mut conn, &users[3].0, &conversation, false)
        .await
        .unwrap();
    assert_eq!(outcome, membership::JoinOutcome::Joined);

    assert!(matches!(
        membership::join(&mut conn, &users[3].0, &conversation, false).await,
        Err(ApiError::Conflict(_))
    ));
}

#[tokio::test]
async fn rejoin_reuses_row_and_does_not_restore_admin() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 3).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();

    membership::leave(&mut conn, &users[0].0, &conversation)
        .await
        .unwrap();
    let outcome = membership::join(&mut conn, &users[0].0, &conversation, false)
        .await
        .unwrap();
    assert_eq!(outcome, membership::JoinOutcome::Rejoined);

    let row = access::check_membership(&mut conn, &users[0].0, &group)
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_active());
    assert!(!row.is_admin);

    let rows = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM "memberships" WHERE user_id = ? AND conversation_id = ?"#,
    )
    .bind(&users[0].0)
    .bind(&group)
    .fetch_one(&mut *conn)
    .await
    .unwrap();
    assert_eq!(rows, 1);

    // An explicit grant on rejoin is honoured
    membership::leave(&mut conn, &users[2].0, &conversation)
        .await
        .unwrap();
    membership::join(&mut conn, &users[2].0, &conversation, true)
        .await
        .unwrap();
    let row = access::check_membership(&mut conn, &users[2].0, &group)
        .await
        .unwrap()
        .unwrap();
    assert!(row.has_authority());
}

#[tokio::test]
async fn join_direct_conversation_is_rejected() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 3).await;
    let direct = common::create_test_direct(&pool, &users[0].0, &users[1].0).await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &direct).await.unwrap();

    assert!(matches!(
        membership::join(&mut conn, &users[2].0, &conversation, false).await,
        Err(ApiError::Validation(_))
    ));

    // Leaving a direct conversation is terminal
    membership::leave(&mut conn, &users[0].0, &conversation)
        .await
        .unwrap();
    assert!(matches!(
        membership::join(&mut conn, &users[0].0, &conversation, false).await,
        Err(ApiError::Validation(_))
    ));
}

#[tokio::test]
async fn handoff_picks_earliest_remaining_member() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 4).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str(), users[3].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();

    // M1 leaves first, so M2 is the earliest remaining member
    membership::leave(&mut conn, &users[1].0, &conversation)
        .await
        .unwrap();
    let outcome = membership::leave(&mut conn, &users[0].0, &conversation)
        .await
        .unwrap();
    assert_eq!(outcome.promoted.as_deref(), Some(users[2].0.as_str()));
    drop(conn);

    assert_eq!(common::active_admins(&pool, &group).await, vec![users[2].0.clone()]);
}

#[tokio::test]
async fn join_order_survives_vacuum() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 4).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str(), users[3].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();

    // A rejoin reuses the row, so M1 keeps its place in the join order
    membership::leave(&mut conn, &users[1].0, &conversation)
        .await
        .unwrap();
    membership::join(&mut conn, &users[1].0, &conversation, false)
        .await
        .unwrap();

    let before = join_order(&mut conn, &group).await;
    sqlx::query("VACUUM").execute(&mut *conn).await.unwrap();
    let after = join_order(&mut conn, &group).await;
    assert_eq!(before, after);

    let outcome = membership::leave(&mut conn, &users[0].0, &conversation)
        .await
        .unwrap();
    assert_eq!(outcome.promoted.as_deref(), Some(users[1].0.as_str()));
}

#[tokio::test]
async fn last_member_leaving_promotes_nobody() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 3).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut conn = pool.acquire().await.unwrap();
    let conversation = access::require_conversation(&mut conn, &group).await.unwrap();
    for (id, _) in &users {
        membership::leave(&mut conn, id, &conversation).await.unwrap();
    }
    let remaining = membership::active_members(&mut conn, &group).await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn group_never_becomes_headless() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 5).await;
    let ids: Vec<&str> = users.iter().map(|(id, _)| id.as_str()).collect();
    let group = common::create_test_group(&pool, ids[0], &ids[1..], "Crew").await;
    assert_not_headless(&pool, &group).await;

    let conversation = {
        let mut conn = pool.acquire().await.unwrap();
        access::require_conversation(&mut conn, &group).await.unwrap()
    };

    enum Step {
        Leave(usize),
        Remove { by: usize, target: usize },
        Add { by: usize, target: usize },
        Promote { by: usize, target: usize },
    }

    let steps = [
        Step::Leave(0),
        Step::Remove { by: 1, target: 2 },
        Step::Promote { by: 1, target: 3 },
        Step::Leave(1),
        Step::Add { by: 3, target: 0 },
        Step::Leave(3),
        Step::Remove { by: 0, target: 4 },
        Step::Add { by: 0, target: 2 },
        Step::Leave(0),
        Step::Leave(2),
    ];

    for step in steps {
        let mut tx = pool.begin().await.unwrap();
        let result = match step {
            Step::Leave(u) => membership::leave(&mut tx, ids[u], &conversation)
                .await
                .map(|_| ()),
            Step::Remove { by, target } => {
                membership::remove(&mut tx, ids[by], ids[target], &conversation)
                    .await
                    .map(|_| ())
            }
            Step::Add { by, target } => membership::add_participants(
                &mut tx,
                ids[by],
                &conversation,
                &[ids[target].to_string()],
            )
            .await
            .map(|_| ()),
            Step::Promote { by, target } => {
                membership::promote(&mut tx, ids[by], ids[target], &conversation)
                    .await
                    .map(|_| ())
            }
        };
        result.unwrap();
        tx.commit().await.unwrap();
        assert_not_headless(&pool, &group).await;
    }

    let mut conn = pool.acquire().await.unwrap();
    assert!(membership::active_members(&mut conn, &group)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_bulk_add_inside_transaction_leaves_no_rows() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 4).await;
    let group = common::create_test_group(
        &pool,
        &users[0].0,
        &[users[1].0.as_str(), users[2].0.as_str()],
        "Crew",
    )
    .await;

    let mut tx = pool.begin().await.unwrap();
    let conversation = access::require_conversation(&mut tx, &group).await.unwrap();
    let result = membership::add_participants(
        &mut tx,
        &users[1].0,
        &conversation,
        &[users[3].0.clone()],
    )
    .await;
    assert!(matches!(result, Err(ApiError::Forbidden(_))));
    drop(tx);

    let mut conn = pool.acquire().await.unwrap();
    assert!(access::check_membership(&mut conn, &users[3].0, &group)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn global_conversation_first_joiner_becomes_admin() {
    let pool = common::setup_test_db().await;
    let users = common::create_test_users(&pool, 2).await;

    let mut conn = pool.acquire().await.unwrap();
    for (id, _) in &users {
        directory::join_global_conversation(&mut conn, id, common::GLOBAL_CONVERSATION_ID)
            .await
            .unwrap();
    }
    let active = membership::active_members(&mut conn, common::GLOBAL_CONVERSATION_ID)
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(active[0].is_admin);
    assert!(!active[1].is_admin);
}
