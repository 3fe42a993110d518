//! Writes, inbound routing and conversation switching through a live
//! client.

mod common;

use chatwire::prelude::*;
use common::*;
use serde_json::json;
use tokio::time::{self, Instant};

fn drain(sub: &mut Subscription) -> Vec<Update> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

// =========================================================================
// Outbound pacing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_hello_then_world_are_spaced_500ms() {
    let (client, _server, mut conn) = connected().await;

    let hello_id = client.send("hello", None).await.unwrap();
    let hello = next_frame(&mut conn).await;
    let hello_at = Instant::now();

    time::sleep(ms(100)).await;
    client.send("world", None).await.unwrap();
    let world = next_frame(&mut conn).await;
    let world_at = Instant::now();

    assert_eq!(hello["type"], "message");
    assert_eq!(hello["content"], "hello");
    assert_eq!(hello["channel"], "general");
    assert_eq!(hello["username"], "alice");
    assert_eq!(hello["id"], hello_id.as_str());
    assert!(hello.get("reply_to").is_none());
    assert_eq!(world["content"], "world");
    assert_eq!(world_at - hello_at, ms(500));
}

#[tokio::test(start_paused = true)]
async fn test_burst_keeps_order_and_spacing() {
    let (client, _server, mut conn) = connected().await;

    for i in 0..4 {
        client.send(format!("m{i}"), None).await.unwrap();
    }

    let mut last: Option<Instant> = None;
    for i in 0..4 {
        let frame = next_frame(&mut conn).await;
        assert_eq!(frame["content"], format!("m{i}"));
        let now = Instant::now();
        if let Some(prev) = last {
            assert!(now - prev >= ms(500));
        }
        last = Some(now);
    }
}

#[tokio::test(start_paused = true)]
async fn test_control_frames_bypass_send_queue() {
    let (client, _server, mut conn) = connected().await;

    client.send("first", None).await.unwrap();
    client.send("second", None).await.unwrap();
    let target = MessageId::new("m-1");
    client.edit_message(target.clone(), "fixed").await.unwrap();
    client.delete_message(target).await.unwrap();

    assert_eq!(next_frame(&mut conn).await["content"], "first");
    let edit = next_frame(&mut conn).await;
    assert_eq!(
        edit,
        json!({"type": "edit_message", "id": "m-1", "content": "fixed", "channel": "general"})
    );
    let delete = next_frame(&mut conn).await;
    assert_eq!(
        delete,
        json!({"type": "delete_message", "id": "m-1", "channel": "general"})
    );
    assert_eq!(next_frame(&mut conn).await["content"], "second");
}

#[tokio::test(start_paused = true)]
async fn test_reply_to_is_carried() {
    let (client, _server, mut conn) = connected().await;
    client
        .send("agreed", Some(MessageId::new("m-7")))
        .await
        .unwrap();
    assert_eq!(next_frame(&mut conn).await["reply_to"], "m-7");
}

#[tokio::test(start_paused = true)]
async fn test_typing_is_throttled_to_one_per_second() {
    let (client, _server, mut conn) = connected().await;

    client.send_typing().await.unwrap();
    client.send_typing().await.unwrap();
    time::sleep(ms(999)).await;
    client.send_typing().await.unwrap();

    let typing = next_frame(&mut conn).await;
    assert_eq!(
        typing,
        json!({"type": "typing", "username": "alice", "channel": "general"})
    );
    assert!(conn.try_recv().is_none());

    time::sleep(ms(1)).await;
    client.send_typing().await.unwrap();
    assert_eq!(sent_types(&mut conn), vec!["typing"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_typing_does_not_reopen_typing_window() {
    let (client, _server, mut conn) = connected().await;

    // Type a character, delete it, repeat.
    for _ in 0..5 {
        client.send_typing().await.unwrap();
        client.send_stop_typing().await.unwrap();
        time::sleep(ms(100)).await;
    }

    let sent = sent_types(&mut conn);
    assert_eq!(sent.iter().filter(|t| *t == "typing").count(), 1);
    assert_eq!(sent.iter().filter(|t| *t == "stop_typing").count(), 5);
    assert_eq!(sent[0], "typing");
}

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_fails_without_queueing() {
    let (client, mut server, conn) = connected().await;
    drop(conn);
    wait_status(&client, |s| !s.is_connected()).await;

    assert!(matches!(
        client.send("lost?", None).await,
        Err(ChatwireError::NotConnected)
    ));
    assert!(matches!(
        client.send_typing().await,
        Err(ChatwireError::NotConnected)
    ));

    let mut conn = server.accept().await.unwrap();
    assert_eq!(next_frame(&mut conn).await["type"], "join");
    time::sleep(ms(5_000)).await;
    assert!(conn.try_recv().is_none(), "nothing was held back");
}

#[tokio::test(start_paused = true)]
async fn test_queued_messages_are_dropped_with_the_connection() {
    let (client, mut server, mut conn) = connected().await;

    client.send("one", None).await.unwrap();
    client.send("two", None).await.unwrap();
    assert_eq!(next_frame(&mut conn).await["content"], "one");
    drop(conn);
    wait_status(&client, |s| s.reconnect_scheduled).await;

    let mut conn = server.accept().await.unwrap();
    assert_eq!(next_frame(&mut conn).await["type"], "join");
    time::sleep(ms(5_000)).await;
    assert!(conn.try_recv().is_none());
}

// =========================================================================
// Inbound
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_does_not_stop_the_next_one() {
    let (client, _server, conn) = connected().await;
    let mut updates = client
        .subscribe(EventFilter::kinds([EventKind::MessagePosted]))
        .await
        .unwrap();

    assert!(conn.send_text("{\"type\":\"message\",\"id\":"));
    push(
        &conn,
        json!({
            "type": "message", "id": "m1", "username": "bob",
            "content": "hi", "channel": "general", "timestamp": 1
        }),
    );

    let update = updates.recv().await.unwrap();
    assert!(matches!(
        update,
        Update::Event(InboundEvent::MessagePosted { ref content, .. }) if content == "hi"
    ));
    let _ = client.snapshot().await.unwrap();
    assert!(drain(&mut updates).is_empty());
    assert!(client.status().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_handler_runs_for_its_tag() {
    let (client, _server, conn) = connected().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client
        .on(EventKind::FriendRequestReceived, move |event: &InboundEvent| {
            let _ = tx.send(event.clone());
        })
        .await
        .unwrap();

    push(&conn, json!({"type": "friend_request", "sender_username": "bob"}));
    push(&conn, json!({"type": "unheard_of", "x": 1}));

    assert_eq!(
        rx.recv().await,
        Some(InboundEvent::FriendRequestReceived {
            sender_username: Username::new("bob")
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_typing_indicator_lapses_3000ms_after_last_mark() {
    let (client, _server, conn) = connected().await;
    let mut updates = client.subscribe(EventFilter::kinds([])).await.unwrap();

    push(&conn, json!({"type": "typing", "username": "bob", "channel": "general"}));
    assert!(matches!(updates.recv().await, Some(Update::TypingChanged { .. })));

    time::sleep(ms(1_200)).await;
    push(&conn, json!({"type": "typing", "username": "bob", "channel": "general"}));
    let marked_at = Instant::now();
    let _ = client.snapshot().await.unwrap();

    let update = updates.recv().await.unwrap();
    assert_eq!(
        update,
        Update::TypingChanged {
            conversation: ChannelId::new("general"),
            typing: vec![],
        }
    );
    assert_eq!(Instant::now() - marked_at, ms(3_000));
}

#[tokio::test(start_paused = true)]
async fn test_stop_typing_removes_before_expiry() {
    let (client, _server, conn) = connected().await;

    push(&conn, json!({"type": "typing", "username": "bob"}));
    push(&conn, json!({"type": "typing", "username": "carol"}));
    push(&conn, json!({"type": "stop_typing", "username": "bob"}));

    let snap = client.snapshot().await.unwrap();
    assert_eq!(snap.typing, vec![Username::new("carol")]);
}

#[tokio::test(start_paused = true)]
async fn test_presence_tracks_list_joins_and_leaves() {
    let (client, _server, conn) = connected().await;
    let mut joins = client
        .subscribe(EventFilter::kinds([EventKind::UserJoined]))
        .await
        .unwrap();

    push(&conn, json!({"type": "user_list", "users": ["bob", "alice"]}));
    push(&conn, json!({"type": "user_joined", "username": "carol"}));
    push(&conn, json!({"type": "user_joined", "username": "carol"}));
    push(&conn, json!({"type": "user_left", "username": "bob"}));

    let snap = client.snapshot().await.unwrap();
    assert_eq!(snap.presence, vec![Username::new("alice"), Username::new("carol")]);
    assert_eq!(drain(&mut joins).len(), 1, "duplicate join suppressed");
}

// =========================================================================
// Conversation switching
// =========================================================================

/// Connects with a [`Roster`] and seeds typing and presence state.
async fn seeded() -> (
    ChatClient<Roster>,
    Roster,
    chatwire_transport::memory::MemoryServer,
    chatwire_transport::memory::ServerConnection,
) {
    let roster = Roster::default();
    let (client, mut server) = start_with(builder(), roster.clone()).await;
    let mut conn = server.accept().await.unwrap();
    assert_eq!(next_frame(&mut conn).await["type"], "join");

    push(&conn, json!({"type": "user_list", "users": ["alice", "bob"]}));
    push(&conn, json!({"type": "typing", "username": "bob"}));
    let snap = client.snapshot().await.unwrap();
    assert_eq!(snap.typing, vec![Username::new("bob")]);
    (client, roster, server, conn)
}

#[tokio::test(start_paused = true)]
async fn test_switch_clears_state_and_reroutes_connection() {
    let (client, roster, server, mut conn) = seeded().await;
    let mut updates = client.subscribe(EventFilter::all()).await.unwrap();

    let previous = client.switch_conversation("random").await.unwrap();

    assert_eq!(previous, ChannelId::new("general"));
    assert_eq!(roster.joins(), 1);
    let snap = client.snapshot().await.unwrap();
    assert_eq!(snap.conversation, ChannelId::new("random"));
    assert!(snap.typing.is_empty());
    assert!(snap.presence.is_empty());

    assert_eq!(
        next_frame(&mut conn).await,
        json!({"type": "switch_channel", "username": "alice", "channel": "random"})
    );
    assert_eq!(server.attempts(), 1, "connection is reused");
    assert_eq!(
        updates.recv().await,
        Some(Update::ConversationSwitched {
            from: ChannelId::new("general"),
            to: ChannelId::new("random"),
        })
    );

    // Traffic still addressed to the old conversation is ignored.
    push(&conn, json!({"type": "typing", "username": "bob", "channel": "general"}));
    assert!(client.snapshot().await.unwrap().typing.is_empty());

    // New writes go to the new conversation.
    client.send("hi random", None).await.unwrap();
    assert_eq!(next_frame(&mut conn).await["channel"], "random");
}

#[tokio::test(start_paused = true)]
async fn test_failed_join_leaves_previous_conversation_untouched() {
    let (client, roster, _server, mut conn) = seeded().await;
    let before = client.snapshot().await.unwrap();

    let err = client.switch_conversation("staff").await.unwrap_err();

    assert!(matches!(
        err,
        ChatwireError::Session(SessionError::JoinFailed { .. })
    ));
    assert_eq!(roster.joins(), 0);
    assert_eq!(client.snapshot().await.unwrap(), before);
    assert!(conn.try_recv().is_none(), "no switch frame sent");
}

#[tokio::test(start_paused = true)]
async fn test_switch_to_empty_id_is_rejected_and_keeps_connection() {
    let (client, _roster, server, mut conn) = seeded().await;
    assert!(matches!(
        client.switch_conversation("  ").await,
        Err(ChatwireError::Session(SessionError::EmptyConversation))
    ));
    let snap = client.snapshot().await.unwrap();
    assert_eq!(snap.conversation, ChannelId::new("general"));
    assert!(snap.status.is_connected());
    assert!(conn.try_recv().is_none(), "no frame and no close");
    assert_eq!(server.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switch_does_not_reopen_typing_window() {
    let (client, _roster, _server, mut conn) = seeded().await;

    client.send_typing().await.unwrap();
    client.switch_conversation("random").await.unwrap();
    client.send_typing().await.unwrap();

    assert_eq!(sent_types(&mut conn), vec!["typing", "switch_channel"]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_while_disconnected_joins_new_conversation_on_reconnect() {
    let (client, _roster, mut server, conn) = seeded().await;
    drop(conn);
    wait_status(&client, |s| s.reconnect_scheduled).await;

    client.switch_conversation("random").await.unwrap();

    let mut conn = server.accept().await.unwrap();
    let join = next_frame(&mut conn).await;
    assert_eq!(join["type"], "join");
    assert_eq!(join["channel"], "random");
}
