//! End-to-end client flows against the in-process server

use std::sync::Arc;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use bazaar_sync::backend::realtime::LiveStatus;
use bazaar_sync::client::{
    ChatRoom, DeliveryStatus, FollowToggle, MutationError, OptimisticController, PresenceTracker,
    ToggleOutcome,
};

use crate::common::{eventually, TestApp};

#[tokio::test]
async fn test_two_users_chat_with_read_receipts() {
    let app = TestApp::new().await;
    let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = app.room_with(&[(ann, "ann"), (bob, "bob")]).await;
    let channel = app.channel();

    let ann_room = ChatRoom::open(&channel, Arc::new(app.api(Some(ann))), room_id, ann)
        .await
        .unwrap();
    let bob_room = ChatRoom::open(&channel, Arc::new(app.api(Some(bob))), room_id, bob)
        .await
        .unwrap();

    let sent = ann_room.send("hello bob").await.unwrap();
    assert_eq!(ann_room.view().messages(), vec![sent.clone()]);
    assert!(ann_room.view().snapshot().provisional.is_empty());

    // Bob receives the broadcast, marks it read, and the receipt flows back.
    let bob_view = bob_room.view().clone();
    assert!(eventually(|| bob_view.messages().iter().any(|m| m.id == sent.id)).await);
    let ann_view = ann_room.view().clone();
    assert!(eventually(|| ann_view.messages().iter().all(|m| m.is_read)).await);

    // Nothing of Ann's own is ever marked read by Ann.
    assert_eq!(ann_room.mark_read().await.unwrap().map(|r| r.read_ids), Some(vec![]));

    ann_room.close();
    bob_room.close();
}

#[tokio::test]
async fn test_reopened_room_recovers_missed_messages() {
    let app = TestApp::new().await;
    let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = app.room_with(&[(ann, "ann"), (bob, "bob")]).await;
    let channel = app.channel();

    let ann_room = ChatRoom::open(&channel, Arc::new(app.api(Some(ann))), room_id, ann)
        .await
        .unwrap();
    ann_room.send("while bob was away").await.unwrap();
    ann_room.send("still away").await.unwrap();

    let bob_room = ChatRoom::open(&channel, Arc::new(app.api(Some(bob))), room_id, bob)
        .await
        .unwrap();
    let payloads: Vec<String> = bob_room.view().messages().into_iter().map(|m| m.payload).collect();
    assert_eq!(payloads, vec!["while bob was away", "still away"]);

    let ann_view = ann_room.view().clone();
    assert!(eventually(|| ann_view.messages().iter().all(|m| m.is_read)).await);
}

#[tokio::test]
async fn test_invalid_send_shows_nothing() {
    let app = TestApp::new().await;
    let ann = Uuid::new_v4();
    let room_id = app.room_with(&[(ann, "ann")]).await;
    let room = ChatRoom::open(&app.channel(), Arc::new(app.api(Some(ann))), room_id, ann)
        .await
        .unwrap();

    let result = room.send("  ").await;
    assert!(matches!(result, Err(MutationError::Validation(_))));
    assert!(room.view().snapshot().provisional.is_empty());
    assert!(room.view().messages().is_empty());
}

#[tokio::test]
async fn test_removed_member_keeps_failed_message() {
    let app = TestApp::new().await;
    let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let room_id = app.room_with(&[(ann, "ann")]).await;
    let room = ChatRoom::open(&app.channel(), Arc::new(app.api(Some(bob))), room_id, bob).await;
    assert!(room.is_err());

    let room = ChatRoom::open(&app.channel(), Arc::new(app.api(Some(ann))), room_id, ann)
        .await
        .unwrap();
    sqlx::query("DELETE FROM chat_room_members WHERE user_id = ?")
        .bind(ann)
        .execute(&app.state.db_pool)
        .await
        .unwrap();

    let result = room.send("after removal").await;
    assert!(matches!(result, Err(MutationError::Forbidden(_))));
    let provisional = room.view().snapshot().provisional;
    assert_eq!(provisional.len(), 1);
    assert_eq!(provisional[0].status, DeliveryStatus::Failed);
    assert!(room.discard(provisional[0].local_id));
}

#[tokio::test]
async fn test_follow_toggle_converges_across_sessions() {
    let app = TestApp::new().await;
    let (viewer, other, target) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let channel = app.channel();

    let mine = FollowToggle::open(
        &channel,
        Arc::new(app.api(Some(viewer))),
        OptimisticController::default(),
        Some(viewer),
        target,
    )
    .await
    .unwrap();
    let theirs = FollowToggle::open(
        &channel,
        Arc::new(app.api(Some(other))),
        OptimisticController::default(),
        Some(other),
        target,
    )
    .await
    .unwrap();

    let outcome = mine.toggle().await;
    assert!(matches!(outcome, ToggleOutcome::Settled(_) | ToggleOutcome::Reconciled(_)));
    assert!(mine.state().is_following);
    assert_eq!(mine.state().followers, 1);

    // The other session sees the count move without its own flag changing.
    let their_view = theirs.view().clone();
    assert!(eventually(|| their_view.state().followers == 1).await);
    assert!(!theirs.state().is_following);

    mine.toggle().await;
    assert!(!mine.state().is_following);
    assert!(eventually(|| their_view.state().followers == 0).await);
}

#[tokio::test]
async fn test_anonymous_follow_requires_login() {
    let app = TestApp::new().await;
    let target = Uuid::new_v4();
    let toggle = FollowToggle::open(
        &app.channel(),
        Arc::new(app.api(None)),
        OptimisticController::default(),
        None,
        target,
    )
    .await
    .unwrap();

    let outcome = toggle.toggle().await;
    assert!(matches!(outcome, ToggleOutcome::LoginRequired));
    assert!(!toggle.state().is_following);
    assert_eq!(toggle.state().followers, 0);
}

#[tokio::test]
async fn test_presence_counts_distinct_viewers() {
    let app = TestApp::new().await;
    app.live.set("stream", "s-1", LiveStatus { is_live: true, owner_id: Uuid::new_v4() });
    let channel = app.channel();

    let first = PresenceTracker::join(&channel, ("stream", "s-1"), "tab-a", serde_json::json!({}))
        .await
        .unwrap();
    let second = PresenceTracker::join(&channel, ("stream", "s-1"), "tab-b", serde_json::json!({}))
        .await
        .unwrap();

    let count = first.subscribe();
    assert!(eventually(|| *count.borrow() == 2).await);

    second.leave();
    assert!(eventually(|| *count.borrow() == 1).await);
    assert_eq!(app.state.hub.presence_state("presence:stream:s-1").len(), 1);
}
