use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub mod authorization;
pub mod data_access;
pub mod error;
pub mod inbox;
pub mod messages;
pub mod messenger;
pub mod presence;
pub mod profile;
pub mod rooms;

pub use error::MessengerError;
pub use profile::{AdminProfile, DisplayProjection, Profile, Role};

pub type UserId = Uuid;
pub type RoomId = Uuid;
pub type MessageId = Uuid;

/// A platform user as seen by the messaging core. Owned by the CRUD side,
/// read-only here.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub profile: Profile,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn record(&self) -> UserRecord {
        UserRecord { id: self.id, email: self.email.clone(), role: self.role() }
    }
}

/// Basic user record pushed with `onlineUsers`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

/// The unique conversation between two distinct users.
///
/// `participant_a` is whoever caused the room to be created; lookups are
/// symmetric and the store keeps at most one room per unordered pair.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    #[serde(rename = "senderId")]
    pub participant_a: UserId,
    #[serde(rename = "receiverId")]
    pub participant_b: UserId,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub last_activity: DateTime<Utc>,
}

impl Room {
    pub fn new(participant_a: UserId, participant_b: UserId) -> Self {
        let now = Utc::now();
        Room {
            id: Uuid::new_v4(),
            participant_a,
            participant_b,
            created_at: now,
            last_activity: now,
        }
    }

    /// The participant pair in canonical order, smaller id first.
    pub fn pair(&self) -> (UserId, UserId) {
        canonical_pair(self.participant_a, self.participant_b)
    }

    pub fn matches(&self, user_1: &UserId, user_2: &UserId) -> bool {
        self.pair() == canonical_pair(*user_1, *user_2)
    }

    pub fn involves(&self, user_id: &UserId) -> bool {
        self.participant_a == *user_id || self.participant_b == *user_id
    }

    pub fn counterpart(&self, user_id: &UserId) -> Option<UserId> {
        if self.participant_a == *user_id {
            Some(self.participant_b)
        } else if self.participant_b == *user_id {
            Some(self.participant_a)
        } else {
            None
        }
    }
}

pub fn canonical_pair(user_1: UserId, user_2: UserId) -> (UserId, UserId) {
    if user_1 <= user_2 {
        (user_1, user_2)
    } else {
        (user_2, user_1)
    }
}

/// A single chat message inside a room.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    #[serde(rename = "senderId")]
    pub sender: UserId,
    #[serde(rename = "receiverId")]
    pub receiver: UserId,
    pub message: Option<String>,
    pub images: Vec<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(room_id: RoomId, sender: UserId, receiver: UserId, message: Option<String>, images: Vec<String>) -> Self {
        Message {
            id: Uuid::new_v4(),
            room_id,
            sender,
            receiver,
            message,
            images,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().filter(|text| !text.is_empty())
    }
}
