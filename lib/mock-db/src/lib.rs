use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

use courier_messenger::data_access::DataAccess;
use courier_messenger::profile::{OrganizationInfo, PersonInfo};
use courier_messenger::{AdminProfile, Message, Profile, Room, RoomId, User, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Thread poisoning error")]
    ThreadPoisonError,
    #[error("Mock database is unavailable")]
    Unavailable,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_value: PoisonError<T>) -> Self {
        Self::ThreadPoisonError
    }
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

/// In-memory store. Tables are kept in insertion order, which is what breaks
/// ties between messages sharing a timestamp.
#[derive(Clone, Default)]
pub struct Db {
    users: Arc<Mutex<Vec<User>>>,
    admin_profile: Arc<Mutex<Option<AdminProfile>>>,
    rooms: Arc<Mutex<Vec<Room>>>,
    messages: Arc<Mutex<Vec<Message>>>,
    faults: Arc<Faults>,
}

impl Db {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A store with one user of every role and a conversation between the
    /// athlete and the club.
    pub fn new() -> Self {
        let db = Self::empty();

        let athlete = User {
            id: uuid::Uuid::new_v4(),
            email: "athlete@courier.local".into(),
            profile: Profile::Athlete(PersonInfo {
                full_name: Some("Alex Sprinter".into()),
                profile_image: Some("https://cdn.courier.local/alex.png".into()),
            }),
        };
        let club = User {
            id: uuid::Uuid::new_v4(),
            email: "club@courier.local".into(),
            profile: Profile::Club(OrganizationInfo {
                name: Some("Riverside FC".into()),
                logo_image: Some("https://cdn.courier.local/riverside.png".into()),
            }),
        };
        let brand = User {
            id: uuid::Uuid::new_v4(),
            email: "brand@courier.local".into(),
            profile: Profile::Brand(OrganizationInfo { name: Some("Stride Gear".into()), logo_image: None }),
        };
        let individual = User {
            id: uuid::Uuid::new_v4(),
            email: "fan@courier.local".into(),
            profile: Profile::Individual(PersonInfo::default()),
        };
        let admin = User { id: uuid::Uuid::new_v4(), email: "admin@courier.local".into(), profile: Profile::Admin };

        let room = Room::new(athlete.id, club.id);
        let conversation = [
            (athlete.id, club.id, "Hi! Are you still looking for sprinters?"),
            (club.id, athlete.id, "We are, send us your latest times"),
            (athlete.id, club.id, "10.4 on the 100m last weekend"),
        ];
        let messages: Vec<Message> = conversation
            .into_iter()
            .map(|(from, to, text)| Message::new(room.id, from, to, Some(text.to_owned()), vec![]))
            .collect();

        let mut room = room;
        if let Some(last) = messages.last() {
            room.last_activity = last.created_at;
        }

        *db.users.lock().unwrap_or_else(PoisonError::into_inner) = vec![athlete, club, brand, individual, admin];
        *db.admin_profile.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(AdminProfile { admin_image: Some("https://cdn.courier.local/admin.png".into()) });
        db.rooms.lock().unwrap_or_else(PoisonError::into_inner).push(room);
        *db.messages.lock().unwrap_or_else(PoisonError::into_inner) = messages;
        db
    }

    pub fn users(&self) -> Result<Vec<User>, Error> {
        Ok(self.users.lock()?.clone())
    }

    /// Adds or replaces a user record.
    pub fn insert_user(&self, user: User) -> Result<(), Error> {
        let mut users = self.users.lock()?;
        users.retain(|known| known.id != user.id);
        users.push(user);
        Ok(())
    }

    pub fn set_admin_profile(&self, admin_profile: Option<AdminProfile>) -> Result<(), Error> {
        *self.admin_profile.lock()? = admin_profile;
        Ok(())
    }

    /// While set, every call fails with [`Error::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.faults.latency_ms.store(millis, Ordering::SeqCst);
    }

    async fn simulate_io(&self) -> Result<(), Error> {
        let latency = self.faults.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Unavailable);
        }
        Ok(())
    }

    fn room_history(&self, room_id: &RoomId) -> Result<Vec<Message>, Error> {
        let mut history: Vec<Message> = self.messages.lock()?
            .iter()
            .filter(|message| message.room_id == *room_id)
            .cloned()
            .collect();
        // stable, so equal timestamps keep insertion order
        history.sort_by_key(|message| message.created_at);
        Ok(history)
    }
}

impl DataAccess for Db {
    type Error = Error;

    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.simulate_io().await?;
        Ok(self.users.lock()?.iter().find(|user| user.id == *user_id).cloned())
    }

    async fn fetch_users(&self, user_ids: &[UserId]) -> Result<Vec<User>, Error> {
        self.simulate_io().await?;
        let res = self.users.lock()?
            .iter()
            .filter(|user| user_ids.contains(&user.id))
            .cloned()
            .collect();
        Ok(res)
    }

    async fn fetch_admin_profile(&self) -> Result<Option<AdminProfile>, Error> {
        self.simulate_io().await?;
        Ok(self.admin_profile.lock()?.clone())
    }

    async fn find_room(&self, user_id_1: &UserId, user_id_2: &UserId) -> Result<Option<Room>, Error> {
        self.simulate_io().await?;
        Ok(self.rooms.lock()?.iter().find(|room| room.matches(user_id_1, user_id_2)).cloned())
    }

    async fn fetch_room(&self, room_id: &RoomId) -> Result<Option<Room>, Error> {
        self.simulate_io().await?;
        Ok(self.rooms.lock()?.iter().find(|room| room.id == *room_id).cloned())
    }

    async fn create_room(&self, room: &Room) -> Result<bool, Error> {
        self.simulate_io().await?;
        let mut rooms = self.rooms.lock()?;
        if rooms.iter().any(|known| known.matches(&room.participant_a, &room.participant_b)) {
            return Ok(false);
        }
        rooms.push(room.clone());
        Ok(true)
    }

    async fn find_users_rooms(&self, user_id: &UserId) -> Result<Vec<Room>, Error> {
        self.simulate_io().await?;
        let mut rooms: Vec<Room> = self.rooms.lock()?.iter().filter(|room| room.involves(user_id)).cloned().collect();
        rooms.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(rooms)
    }

    async fn create_message(&self, message: &Message) -> Result<(), Error> {
        self.simulate_io().await?;
        self.messages.lock()?.push(message.clone());
        if let Some(room) = self.rooms.lock()?.iter_mut().find(|room| room.id == message.room_id) {
            room.last_activity = room.last_activity.max(message.created_at);
        }
        Ok(())
    }

    async fn fetch_messages_page(&self, room_id: &RoomId, offset: usize, limit: Option<usize>) -> Result<Vec<Message>, Error> {
        self.simulate_io().await?;
        let newest_first = self.room_history(room_id)?.into_iter().rev().skip(offset);
        let res = match limit {
            Some(limit) => newest_first.take(limit).collect(),
            None => newest_first.collect(),
        };
        Ok(res)
    }

    async fn fetch_room_history(&self, room_id: &RoomId) -> Result<Vec<Message>, Error> {
        self.simulate_io().await?;
        self.room_history(room_id)
    }

    async fn fetch_unread(&self, room_id: &RoomId, recipient_id: &UserId) -> Result<Vec<Message>, Error> {
        self.simulate_io().await?;
        let res = self.room_history(room_id)?
            .into_iter()
            .filter(|message| message.receiver == *recipient_id && !message.is_read)
            .collect();
        Ok(res)
    }

    async fn mark_read(&self, room_id: &RoomId, recipient_id: &UserId) -> Result<u64, Error> {
        self.simulate_io().await?;
        let mut marked = 0;
        for message in self.messages.lock()?.iter_mut() {
            if message.room_id == *room_id && message.receiver == *recipient_id && !message.is_read {
                message.is_read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_db() -> Db {
        let db = Db::empty();
        for user in db_tests::fixture_users() {
            db.insert_user(user).unwrap();
        }
        db.set_admin_profile(Some(db_tests::fixture_admin_profile())).unwrap();
        db
    }

    macro_rules! mock_db_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let db = fixture_db();
                db_tests::$name(&db).await;
            }
        };
    }

    db_tests::data_access_tests!(mock_db_test);

    #[tokio::test]
    async fn seeded_store_has_every_role_and_a_conversation() {
        let db = Db::new();
        let users = db.users().unwrap();
        assert_eq!(users.len(), 5);

        let athlete = &users[0];
        let rooms = db.find_users_rooms(&athlete.id).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(db.fetch_room_history(&rooms[0].id).await.unwrap().len(), 3);
        assert!(db.fetch_admin_profile().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn injects_faults() {
        let db = fixture_db();
        db.set_unavailable(true);
        assert!(matches!(db.fetch_user(&db_tests::ATHLETE).await, Err(Error::Unavailable)));
        db.set_unavailable(false);
        assert!(db.fetch_user(&db_tests::ATHLETE).await.unwrap().is_some());

        db.set_latency(Duration::from_millis(30));
        let started = std::time::Instant::now();
        db.fetch_admin_profile().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
