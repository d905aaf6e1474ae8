//! Behaviour every `DataAccess` backend must share. A backend instantiates the
//! suite with [`data_access_tests!`], seeding [`fixture_users`] and
//! [`fixture_admin_profile`] into a fresh store before each test.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::{uuid, Uuid};

use courier_messenger::data_access::DataAccess;
use courier_messenger::profile::{OrganizationInfo, PersonInfo};
use courier_messenger::{AdminProfile, Message, Profile, Room, User, UserId};

#[macro_export]
macro_rules! data_access_tests {
    ($tester:ident) => {
        $tester!{fetches_seeded_users}
        $tester!{doesnt_fetch_nonexistent_users}
        $tester!{creates_one_room_per_pair}
        $tester!{lists_users_rooms_by_activity}
        $tester!{creating_message_bumps_room_activity}
        $tester!{late_commit_keeps_room_activity}
        $tester!{pages_messages_newest_first}
        $tester!{fetches_history_oldest_first}
        $tester!{orders_equal_timestamps_by_insertion}
        $tester!{tracks_unread_messages}
    };
}

pub const ATHLETE: UserId = uuid!("0b5e8f0a-5a43-4c57-9d2c-3c1f5b0f4a01");
pub const CLUB: UserId = uuid!("1f0a6a24-88c2-4c0e-a7a3-6f2e0d7b9b02");
pub const BRAND: UserId = uuid!("2c9d3e41-4b6f-4f7a-8b1e-9d4c2a6e5c03");
pub const ADMIN: UserId = uuid!("3a7b1c52-6d8e-4a9f-b0c1-2e3f4a5b6c04");

pub fn fixture_users() -> Vec<User> {
    vec![
        User {
            id: ATHLETE,
            email: "ana@example.com".into(),
            profile: Profile::Athlete(PersonInfo {
                full_name: Some("Ana Runner".into()),
                profile_image: Some("ana.png".into()),
            }),
        },
        User {
            id: CLUB,
            email: "club@example.com".into(),
            profile: Profile::Club(OrganizationInfo { name: Some("FC Harbor".into()), logo_image: None }),
        },
        User {
            id: BRAND,
            email: "brand@example.com".into(),
            profile: Profile::Brand(OrganizationInfo::default()),
        },
        User { id: ADMIN, email: "admin@example.com".into(), profile: Profile::Admin },
    ]
}

pub fn fixture_admin_profile() -> AdminProfile {
    AdminProfile { admin_image: Some("admin.png".into()) }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn message_at(room: &Room, from: UserId, to: UserId, text: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: Uuid::new_v4(),
        room_id: room.id,
        sender: from,
        receiver: to,
        message: Some(text.to_owned()),
        images: vec![],
        is_read: false,
        created_at,
    }
}

async fn room_between(db_access: &impl DataAccess, user_1: UserId, user_2: UserId) -> Room {
    let room = Room::new(user_1, user_2);
    assert!(db_access.create_room(&room).await.unwrap());
    room
}

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().filter_map(Message::text).collect()
}

pub async fn fetches_seeded_users(db_access: &impl DataAccess) {
    let athlete = db_access.fetch_user(&ATHLETE).await.unwrap().unwrap();
    assert_eq!(athlete.email, "ana@example.com");
    assert_eq!(athlete.profile, fixture_users()[0].profile);

    let admin = db_access.fetch_user(&ADMIN).await.unwrap().unwrap();
    assert_eq!(admin.profile, Profile::Admin);

    let mut users: Vec<UserId> = db_access
        .fetch_users(&[CLUB, BRAND, Uuid::new_v4()])
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect();
    users.sort();
    let mut expected = vec![CLUB, BRAND];
    expected.sort();
    assert_eq!(users, expected);

    assert_eq!(db_access.fetch_admin_profile().await.unwrap(), Some(fixture_admin_profile()));
}

pub async fn doesnt_fetch_nonexistent_users(db_access: &impl DataAccess) {
    assert!(db_access.fetch_user(&uuid!("4ec09097-45d5-43a0-bdea-614948bce47e")).await.unwrap().is_none());
    assert!(db_access.fetch_users(&[]).await.unwrap().is_empty());
}

pub async fn creates_one_room_per_pair(db_access: &impl DataAccess) {
    assert!(db_access.find_room(&ATHLETE, &CLUB).await.unwrap().is_none());

    let room = room_between(db_access, ATHLETE, CLUB).await;
    assert!(!db_access.create_room(&Room::new(CLUB, ATHLETE)).await.unwrap());

    let found = db_access.find_room(&CLUB, &ATHLETE).await.unwrap().unwrap();
    assert_eq!(found.id, room.id);
    assert_eq!(found.participant_a, ATHLETE);
    assert_eq!(db_access.fetch_room(&room.id).await.unwrap().map(|room| room.id), Some(room.id));
    assert!(db_access.fetch_room(&Uuid::new_v4()).await.unwrap().is_none());
    assert!(db_access.find_room(&ATHLETE, &BRAND).await.unwrap().is_none());
}

pub async fn lists_users_rooms_by_activity(db_access: &impl DataAccess) {
    let with_club = room_between(db_access, ATHLETE, CLUB).await;
    let with_brand = room_between(db_access, BRAND, ATHLETE).await;
    room_between(db_access, CLUB, BRAND).await;

    let start = base_time();
    db_access.create_message(&message_at(&with_brand, BRAND, ATHLETE, "first", start)).await.unwrap();
    db_access
        .create_message(&message_at(&with_club, ATHLETE, CLUB, "later", start + Duration::seconds(5)))
        .await
        .unwrap();

    let rooms: Vec<_> = db_access.find_users_rooms(&ATHLETE).await.unwrap().into_iter().map(|room| room.id).collect();
    assert_eq!(rooms, vec![with_club.id, with_brand.id]);
    assert!(db_access.find_users_rooms(&ADMIN).await.unwrap().is_empty());
}

pub async fn creating_message_bumps_room_activity(db_access: &impl DataAccess) {
    let room = room_between(db_access, ATHLETE, CLUB).await;
    let message = message_at(&room, CLUB, ATHLETE, "hello", base_time() + Duration::days(1));
    db_access.create_message(&message).await.unwrap();

    let stored = db_access.fetch_room(&room.id).await.unwrap().unwrap();
    assert_eq!(stored.last_activity, message.created_at);
    assert_eq!(db_access.fetch_last_message(&room.id).await.unwrap().map(|m| m.id), Some(message.id));
}

pub async fn late_commit_keeps_room_activity(db_access: &impl DataAccess) {
    let with_club = room_between(db_access, ATHLETE, CLUB).await;
    let with_brand = room_between(db_access, ATHLETE, BRAND).await;
    let start = base_time();

    let newest = message_at(&with_club, CLUB, ATHLETE, "newest", start + Duration::seconds(10));
    db_access.create_message(&newest).await.unwrap();
    // stamped earlier, stored later
    db_access
        .create_message(&message_at(&with_club, ATHLETE, CLUB, "late", start + Duration::seconds(1)))
        .await
        .unwrap();
    db_access
        .create_message(&message_at(&with_brand, BRAND, ATHLETE, "middle", start + Duration::seconds(5)))
        .await
        .unwrap();

    let stored = db_access.fetch_room(&with_club.id).await.unwrap().unwrap();
    assert_eq!(stored.last_activity, newest.created_at);

    let rooms: Vec<_> = db_access.find_users_rooms(&ATHLETE).await.unwrap().into_iter().map(|room| room.id).collect();
    assert_eq!(rooms, vec![with_club.id, with_brand.id]);
}

pub async fn pages_messages_newest_first(db_access: &impl DataAccess) {
    let room = room_between(db_access, ATHLETE, CLUB).await;
    let other = room_between(db_access, ATHLETE, BRAND).await;
    let start = base_time();
    for i in 0..5 {
        let (from, to) = if i % 2 == 0 { (ATHLETE, CLUB) } else { (CLUB, ATHLETE) };
        let text = format!("Message {i}");
        db_access
            .create_message(&message_at(&room, from, to, &text, start + Duration::seconds(i)))
            .await
            .unwrap();
    }
    db_access.create_message(&message_at(&other, BRAND, ATHLETE, "elsewhere", start)).await.unwrap();

    let first = db_access.fetch_messages_page(&room.id, 0, Some(2)).await.unwrap();
    assert_eq!(texts(&first), vec!["Message 4", "Message 3"]);

    let second = db_access.fetch_messages_page(&room.id, 2, Some(2)).await.unwrap();
    assert_eq!(texts(&second), vec!["Message 2", "Message 1"]);

    let rest = db_access.fetch_messages_page(&room.id, 4, None).await.unwrap();
    assert_eq!(texts(&rest), vec!["Message 0"]);

    let all = db_access.fetch_messages_page(&room.id, 0, None).await.unwrap();
    assert_eq!(all.len(), 5);

    assert!(db_access.fetch_messages_page(&room.id, 10, Some(2)).await.unwrap().is_empty());
}

pub async fn fetches_history_oldest_first(db_access: &impl DataAccess) {
    let room = room_between(db_access, ATHLETE, CLUB).await;
    assert!(db_access.fetch_room_history(&room.id).await.unwrap().is_empty());
    assert!(db_access.fetch_last_message(&room.id).await.unwrap().is_none());

    let start = base_time();
    for (i, text) in ["one", "two", "three"].iter().enumerate() {
        db_access
            .create_message(&message_at(&room, ATHLETE, CLUB, text, start + Duration::seconds(i as i64)))
            .await
            .unwrap();
    }

    let history = db_access.fetch_room_history(&room.id).await.unwrap();
    assert_eq!(texts(&history), vec!["one", "two", "three"]);
    assert_eq!(db_access.fetch_last_message(&room.id).await.unwrap().and_then(|m| m.message), Some("three".to_owned()));
}

pub async fn orders_equal_timestamps_by_insertion(db_access: &impl DataAccess) {
    let room = room_between(db_access, ATHLETE, CLUB).await;
    let at = base_time();
    for text in ["a", "b", "c"] {
        db_access.create_message(&message_at(&room, ATHLETE, CLUB, text, at)).await.unwrap();
    }

    let history = db_access.fetch_room_history(&room.id).await.unwrap();
    assert_eq!(texts(&history), vec!["a", "b", "c"]);

    let page = db_access.fetch_messages_page(&room.id, 0, Some(2)).await.unwrap();
    assert_eq!(texts(&page), vec!["c", "b"]);
}

pub async fn tracks_unread_messages(db_access: &impl DataAccess) {
    let room = room_between(db_access, ATHLETE, CLUB).await;
    let start = base_time();
    db_access.create_message(&message_at(&room, CLUB, ATHLETE, "to ana 1", start)).await.unwrap();
    db_access.create_message(&message_at(&room, ATHLETE, CLUB, "to club", start + Duration::seconds(1))).await.unwrap();
    db_access.create_message(&message_at(&room, CLUB, ATHLETE, "to ana 2", start + Duration::seconds(2))).await.unwrap();

    let unread = db_access.fetch_unread(&room.id, &ATHLETE).await.unwrap();
    assert_eq!(texts(&unread), vec!["to ana 1", "to ana 2"]);
    assert!(unread.iter().all(|message| !message.is_read));
    assert_eq!(db_access.count_unread(&room.id, &ATHLETE).await.unwrap(), 2);
    assert_eq!(db_access.count_unread(&room.id, &CLUB).await.unwrap(), 1);

    assert_eq!(db_access.mark_read(&room.id, &ATHLETE).await.unwrap(), 2);
    assert_eq!(db_access.mark_read(&room.id, &ATHLETE).await.unwrap(), 0);
    assert!(db_access.fetch_unread(&room.id, &ATHLETE).await.unwrap().is_empty());
    assert_eq!(db_access.count_unread(&room.id, &CLUB).await.unwrap(), 1);

    let history = db_access.fetch_room_history(&room.id).await.unwrap();
    let read: Vec<bool> = history.iter().map(|message| message.is_read).collect();
    assert_eq!(read, vec![true, false, true]);
}
