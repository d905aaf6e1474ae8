mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use courier_messenger::data_access::DataAccess;
use courier_messenger::inbox::{IMAGE_PREVIEW, NO_MESSAGES_PREVIEW};
use courier_messenger::messenger::MessengerConfig;
use courier_messenger::profile::UNKNOWN_NAME;
use courier_messenger::MessengerError;
use db_tests::{ADMIN, ATHLETE, BRAND, CLUB};
use uuid::Uuid;

use common::{expired_token_for, fast_timeout, fixture_db, messenger, messenger_with, token_for};

#[tokio::test]
async fn authenticates_known_users_only() {
    let db = fixture_db();
    let messenger = messenger(&db);

    assert_eq!(messenger.authenticate(&token_for(ATHLETE)).await.unwrap(), ATHLETE);

    let missing = messenger.authenticate("").await.unwrap_err();
    assert!(matches!(missing, MessengerError::Unauthenticated("Token is required for authentication!")));

    for token in [token_for(Uuid::new_v4()), expired_token_for(ATHLETE), "garbage".to_owned()] {
        let rejected = messenger.authenticate(&token).await.unwrap_err();
        assert!(matches!(rejected, MessengerError::Unauthenticated("Invalid token or user not found!")));
    }
}

#[tokio::test]
async fn room_lookup_is_symmetric_and_unique() {
    let db = fixture_db();
    let messenger = messenger(&db);

    let room = messenger.find_or_create_room(&ATHLETE, &CLUB).await.unwrap();
    assert_eq!(room.participant_a, ATHLETE);
    assert_eq!(room.participant_b, CLUB);

    let again = messenger.find_or_create_room(&CLUB, &ATHLETE).await.unwrap();
    assert_eq!(again.id, room.id);
    assert_eq!(again.participant_a, ATHLETE);

    assert!(matches!(
        messenger.find_or_create_room(&ATHLETE, &ATHLETE).await,
        Err(MessengerError::InvalidArgument(_))
    ));
    assert!(matches!(
        messenger.find_or_create_room(&ATHLETE, &Uuid::new_v4()).await,
        Err(MessengerError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_room_creation_yields_one_room() {
    let db = fixture_db();
    let messenger = Arc::new(messenger(&db));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let messenger = messenger.clone();
        tasks.push(tokio::spawn(async move {
            let (a, b) = if i % 2 == 0 { (ATHLETE, BRAND) } else { (BRAND, ATHLETE) };
            messenger.find_or_create_room(&a, &b).await.unwrap().id
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(db.find_users_rooms(&ATHLETE).await.unwrap().len(), 1);
    assert_eq!(db.find_users_rooms(&BRAND).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sends_messages_into_the_pairs_room() {
    let db = fixture_db();
    let messenger = messenger(&db);

    let first = messenger.send_message(&ATHLETE, &CLUB, Some("Hi club".into()), vec![]).await.unwrap();
    let reply = messenger
        .send_message(&CLUB, &ATHLETE, None, vec!["trial.png".into()])
        .await
        .unwrap();

    assert_eq!(first.room_id, reply.room_id);
    assert_eq!(first.sender, ATHLETE);
    assert_eq!(first.receiver, CLUB);
    assert!(!first.is_read);
    assert_eq!(reply.images, vec!["trial.png".to_owned()]);

    let history = messenger.history(&CLUB, &ATHLETE).await.unwrap();
    let ids: Vec<_> = history.iter().map(|message| message.id).collect();
    assert_eq!(ids, vec![first.id, reply.id]);

    assert!(matches!(
        messenger.send_message(&ATHLETE, &ATHLETE, Some("me".into()), vec![]).await,
        Err(MessengerError::InvalidArgument(_))
    ));
    assert!(messenger.history(&ATHLETE, &BRAND).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_rejects_outsiders() {
    let db = fixture_db();
    let messenger = messenger(&db);
    let room = messenger.find_or_create_room(&ATHLETE, &CLUB).await.unwrap();

    let outsider = messenger
        .messages()
        .append(&room.id, &BRAND, &CLUB, Some("let me in".into()), vec![])
        .await;
    assert!(matches!(outsider, Err(MessengerError::InvalidArgument(_))));

    let no_room = messenger
        .messages()
        .append(&Uuid::new_v4(), &ATHLETE, &CLUB, Some("hello?".into()), vec![])
        .await;
    assert!(matches!(no_room, Err(MessengerError::NotFound(_))));
}

#[tokio::test]
async fn fetch_chats_pages_newest_first_and_marks_read() {
    let db = fixture_db();
    let messenger = messenger(&db);
    for i in 0..5 {
        messenger.send_message(&CLUB, &ATHLETE, Some(format!("Message {i}")), vec![]).await.unwrap();
    }
    messenger.send_message(&ATHLETE, &CLUB, Some("Reply".into()), vec![]).await.unwrap();

    let page = messenger.fetch_chats(&ATHLETE, &CLUB, Some(1), Some(2)).await.unwrap().unwrap();
    let texts: Vec<_> = page.messages.iter().filter_map(|message| message.text()).collect();
    assert_eq!(texts, vec!["Reply", "Message 4"]);
    assert_eq!(page.counterpart.name, "FC Harbor");
    assert_eq!(page.counterpart.image, None);

    let second = messenger.fetch_chats(&ATHLETE, &CLUB, Some(2), Some(2)).await.unwrap().unwrap();
    let texts: Vec<_> = second.messages.iter().filter_map(|message| message.text()).collect();
    assert_eq!(texts, vec!["Message 3", "Message 2"]);

    // reading marks what was sent to the reader, not what the reader sent
    assert!(messenger.unread_messages(&ATHLETE, &CLUB).await.unwrap().unwrap().messages.is_empty());
    let club_unread = messenger.unread_messages(&CLUB, &ATHLETE).await.unwrap().unwrap();
    assert_eq!(club_unread.count, 1);
    assert_eq!(club_unread.messages[0].text(), Some("Reply"));

    let everything = messenger.fetch_chats(&CLUB, &ATHLETE, None, None).await.unwrap().unwrap();
    assert_eq!(everything.messages.len(), 6);
    assert_eq!(everything.counterpart.name, "Ana Runner");

    assert!(messenger.fetch_chats(&ATHLETE, &BRAND, Some(1), Some(10)).await.unwrap().is_none());
    assert!(messenger.unread_messages(&ATHLETE, &BRAND).await.unwrap().is_none());
}

#[tokio::test]
async fn inbox_lists_conversations_by_activity() {
    let db = fixture_db();
    let messenger = messenger(&db);

    messenger.send_message(&CLUB, &ATHLETE, Some("Tryouts on Friday".into()), vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    messenger.send_message(&ADMIN, &ATHLETE, None, vec!["notice.png".into()]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    messenger.find_or_create_room(&ATHLETE, &BRAND).await.unwrap();

    let inbox = messenger.inbox(&ATHLETE).await.unwrap();
    assert_eq!(inbox.len(), 3);

    assert_eq!(inbox[0].user.receiver_id, BRAND);
    assert_eq!(inbox[0].user.name, UNKNOWN_NAME);
    assert_eq!(inbox[0].last_message, NO_MESSAGES_PREVIEW);

    assert_eq!(inbox[1].user.receiver_id, ADMIN);
    assert_eq!(inbox[1].user.name, "Admin");
    assert_eq!(inbox[1].user.image.as_deref(), Some("admin.png"));
    assert_eq!(inbox[1].last_message, IMAGE_PREVIEW);

    assert_eq!(inbox[2].user.receiver_id, CLUB);
    assert_eq!(inbox[2].last_message, "Tryouts on Friday");

    assert!(inbox.iter().all(|entry| entry.unread_count == 0));
    assert!(messenger.inbox(&Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn inbox_counts_unread_when_enabled() {
    let db = fixture_db();
    let messenger = messenger_with(&db, MessengerConfig { inbox_unread_counts: true, ..MessengerConfig::default() });

    messenger.send_message(&CLUB, &ATHLETE, Some("one".into()), vec![]).await.unwrap();
    messenger.send_message(&CLUB, &ATHLETE, Some("two".into()), vec![]).await.unwrap();

    let inbox = messenger.inbox(&ATHLETE).await.unwrap();
    assert_eq!(inbox[0].unread_count, 2);
    assert_eq!(inbox[0].last_message, "two");

    let club_inbox = messenger.inbox(&CLUB).await.unwrap();
    assert_eq!(club_inbox[0].unread_count, 0);
    assert_eq!(club_inbox[0].user.name, "Ana Runner");
}

#[tokio::test]
async fn online_users_are_resolved_to_records() {
    let db = fixture_db();
    let messenger = messenger(&db);

    assert!(messenger.online_users(&[]).await.unwrap().is_empty());

    let records = messenger.online_users(&[CLUB, Uuid::new_v4()]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, CLUB);
    assert_eq!(records[0].email, "club@example.com");
}

#[tokio::test]
async fn slow_store_times_out() {
    let db = fixture_db();
    let messenger = messenger_with(&db, fast_timeout());
    db.set_latency(Duration::from_millis(500));

    let error = messenger.send_message(&ATHLETE, &CLUB, Some("hello".into()), vec![]).await.unwrap_err();
    assert!(matches!(error, MessengerError::Timeout { .. }));
    assert!(error.is_transient());

    let error = messenger.authenticate(&token_for(ATHLETE)).await.unwrap_err();
    assert!(matches!(error, MessengerError::Timeout { .. }));
}

#[tokio::test]
async fn store_failures_surface_as_transient() {
    let db = fixture_db();
    let messenger = messenger(&db);
    messenger.send_message(&ATHLETE, &CLUB, Some("before".into()), vec![]).await.unwrap();

    db.set_unavailable(true);
    let error = messenger.inbox(&ATHLETE).await.unwrap_err();
    assert!(matches!(error, MessengerError::Store(_)));
    assert!(error.is_transient());

    db.set_unavailable(false);
    assert_eq!(messenger.history(&ATHLETE, &CLUB).await.unwrap().len(), 1);
}
