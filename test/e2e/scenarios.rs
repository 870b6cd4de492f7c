//! End-to-end scenarios.
//!
//! Publishers and notification sessions talk through the in-memory hub, so
//! every scenario covers the full path: domain event, envelope, fan-out,
//! subscription routing, reaction and notification store.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p notecast-e2e --test scenarios
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notecast_broadcast::{PublishOptions, Publisher};
use notecast_events::{AuthorSnapshot, DomainEvent, NoteSnapshot, Severity, WireMessage};
use notecast_id::Identity;
use notecast_receiver::{
    transport_slot, NotificationSession, ReceiverConfig, SubscriptionState, TransportReady,
};
use notecast_testing::{HubConnection, InMemoryHub};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn publisher(hub: &InMemoryHub) -> Publisher {
    Publisher::new(Arc::new(hub.clone()))
}

fn session(conn: &Arc<HubConnection>) -> NotificationSession {
    NotificationSession::new(ReceiverConfig::default(), TransportReady::ready(conn.clone()))
}

fn note_created(id: i64, title: &str, author: &str) -> DomainEvent {
    DomainEvent::note_created(
        NoteSnapshot {
            id,
            title: title.to_string(),
            content: "C".to_string(),
            created_at: Utc::now(),
        },
        Some(AuthorSnapshot {
            id: 1,
            name: author.to_string(),
            email: "alice@example.com".to_string(),
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn note_created_reaches_public_subscribers() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);
    let mut refresh = observer.refresh_signals();
    observer.start(None).await.unwrap();

    publisher(&hub)
        .publish(&note_created(7, "T", "Alice"), PublishOptions::default())
        .await
        .unwrap();

    let published = hub.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channels, vec!["notes".to_string()]);
    assert_eq!(published[0].message.event_name, "note.created");
    assert_eq!(
        published[0].message.payload["message"],
        "Alice created a new note: T"
    );

    let active = observer.active_notifications();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "Alice created a new note: T");
    assert_eq!(active[0].severity, Severity::Info);
    assert_eq!(refresh.try_recv().unwrap().payload["note"]["id"], 7);
}

#[tokio::test(start_paused = true)]
async fn private_notification_is_shown_then_expires() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);
    observer.start(Some(Identity::from(42i64))).await.unwrap();

    publisher(&hub)
        .publish(
            &DomainEvent::notification("hi", Severity::Warning, Some(Identity::from(42i64))),
            PublishOptions::default(),
        )
        .await
        .unwrap();

    let active = observer.active_notifications();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "hi");
    assert_eq!(active[0].severity, Severity::Warning);

    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert!(observer.active_notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn identity_switch_touches_only_private_channel() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);

    observer.start(Some(Identity::from(42i64))).await.unwrap();
    observer.set_identity(Some(Identity::from(43i64))).unwrap();

    assert_eq!(hub.unsubscribe_count("notifications.42"), 1);
    assert_eq!(hub.subscribe_count("notifications.43"), 1);
    assert_eq!(hub.subscribe_count("notifications"), 1);
    assert_eq!(hub.subscribe_count("notes"), 1);
    assert_eq!(hub.unsubscribe_count("notifications"), 0);
    assert_eq!(observer.subscriptions().state(), SubscriptionState::Active);

    // The old identity's messages no longer arrive.
    publisher(&hub)
        .publish(
            &DomainEvent::notification("for 42", Severity::Info, Some(Identity::from(42i64))),
            PublishOptions::default(),
        )
        .await
        .unwrap();
    assert!(observer.active_notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_event_changes_nothing() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();

    // Route the foreign name to the dispatcher as well.
    let mut config = ReceiverConfig::default();
    config.plan.events.push("unknown.event".to_string());
    let mut observer =
        NotificationSession::new(config, TransportReady::ready(conn.clone()));
    let mut refresh = observer.refresh_signals();
    observer.start(None).await.unwrap();

    let delivered = hub.inject(
        "notes",
        &WireMessage::new("unknown.event", serde_json::json!({"message": "?"})),
    );

    assert_eq!(delivered, 1);
    assert!(observer.active_notifications().is_empty());
    assert!(refresh.try_recv().is_err());
    assert_eq!(observer.subscriptions().state(), SubscriptionState::Active);
}

#[tokio::test(start_paused = true)]
async fn starting_twice_subscribes_once() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);

    observer.start(Some(Identity::from(1i64))).await.unwrap();
    observer.start(Some(Identity::from(1i64))).await.unwrap();

    assert_eq!(hub.subscribe_count("notes"), 1);
    assert_eq!(hub.subscribe_count("notifications"), 1);
    assert_eq!(hub.subscribe_count("notifications.1"), 1);
}

#[tokio::test(start_paused = true)]
async fn second_shutdown_is_invisible_to_transport() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);
    observer.start(Some(Identity::from(1i64))).await.unwrap();

    observer.shutdown();
    let counts = |hub: &InMemoryHub| {
        ["notes", "notifications", "notifications.1"].map(|c| hub.unsubscribe_count(c))
    };
    let after_first = counts(&hub);
    observer.shutdown();

    assert_eq!(after_first, [1, 1, 1]);
    assert_eq!(counts(&hub), after_first);
    assert_eq!(hub.subscriber_count("notes"), 0);
}

#[tokio::test(start_paused = true)]
async fn originator_is_excluded_when_requested() {
    init_tracing();
    let hub = InMemoryHub::new();
    let author_conn = hub.connect();
    let other_conn = hub.connect();
    let mut author = session(&author_conn);
    let mut other = session(&other_conn);
    author.start(Some(Identity::from(1i64))).await.unwrap();
    other.start(Some(Identity::from(2i64))).await.unwrap();

    publisher(&hub)
        .publish(
            &note_created(1, "Mine", "Alice"),
            PublishOptions::to_others(Some(author_conn.socket_id().clone())),
        )
        .await
        .unwrap();

    assert!(author.active_notifications().is_empty());
    assert_eq!(other.active_notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn redelivery_shows_one_notification() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);
    observer.start(None).await.unwrap();

    let message = WireMessage::new(
        "notification.sent",
        serde_json::json!({"message": "once", "type": "info", "timestamp": "2025-03-14T09:26:53Z"}),
    );
    hub.inject("notifications", &message);
    hub.inject("notifications", &message);

    assert_eq!(observer.active_notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn private_notifications_do_not_leak() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn_a = hub.connect();
    let conn_b = hub.connect();
    let mut a = session(&conn_a);
    let mut b = session(&conn_b);
    a.start(Some(Identity::from(42i64))).await.unwrap();
    b.start(Some(Identity::from(43i64))).await.unwrap();

    publisher(&hub)
        .publish(
            &DomainEvent::notification("secret", Severity::Info, Some(Identity::from(42i64))),
            PublishOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(a.active_notifications().len(), 1);
    assert!(b.active_notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn session_subscribes_once_transport_arrives() {
    init_tracing();
    let hub = InMemoryHub::new();
    let (provider, ready) = transport_slot();
    let mut observer = NotificationSession::new(ReceiverConfig::default(), ready);

    let conn = hub.connect();
    let late = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        provider.provide(conn);
    });

    assert_eq!(hub.subscribe_count("notes"), 0);
    observer.start(None).await.unwrap();
    late.await.unwrap();

    assert_eq!(hub.subscribe_count("notes"), 1);
    assert_eq!(hub.subscriber_count("notifications"), 1);
}

#[tokio::test(start_paused = true)]
async fn dismissed_notification_stays_gone() {
    init_tracing();
    let hub = InMemoryHub::new();
    let conn = hub.connect();
    let mut observer = session(&conn);
    let mut changes = observer.notifications();
    observer.start(None).await.unwrap();

    publisher(&hub)
        .publish(
            &DomainEvent::notification("bye", Severity::Success, None),
            PublishOptions::default(),
        )
        .await
        .unwrap();
    changes.changed().await.unwrap();
    let id = changes.borrow_and_update()[0].id;

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(observer.dismiss(id));
    publisher(&hub)
        .publish(
            &DomainEvent::notification("later", Severity::Info, None),
            PublishOptions::default(),
        )
        .await
        .unwrap();

    // Past the dismissed entry's original expiry, before the new one's.
    tokio::time::sleep(Duration::from_millis(3000)).await;
    let active = observer.active_notifications();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "later");
}
