use std::time::Duration;

use serde::Serialize;

use crate::authorization::TokenVerifier;
use crate::data_access::DataAccess;
use crate::error::{bounded, MessengerError};
use crate::inbox::{InboxAggregator, InboxEntry};
use crate::messages::MessageStore;
use crate::profile::{display_projection, DisplayProjection};
use crate::rooms::RoomResolver;
use crate::{Message, Room, User, UserId, UserRecord};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Upper bound on every store, token or user lookup call.
    pub io_timeout: Duration,
    /// Compute real unread counts in the inbox instead of reporting `0`.
    pub inbox_unread_counts: bool,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        MessengerConfig { io_timeout: DEFAULT_IO_TIMEOUT, inbox_unread_counts: false }
    }
}

/// A page of a conversation as returned to the reader.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatPage {
    pub messages: Vec<Message>,
    pub counterpart: DisplayProjection,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UnreadMessages {
    pub messages: Vec<Message>,
    pub count: u64,
}

/// Everything the socket and HTTP transports do goes through here, so both
/// produce the same persisted state.
#[derive(Clone)]
pub struct Messenger<D, A> {
    data_access: D,
    token_verifier: A,
    rooms: RoomResolver<D>,
    messages: MessageStore<D>,
    inbox: InboxAggregator<D>,
    io_timeout: Duration,
}

impl<D: DataAccess, A: TokenVerifier> Messenger<D, A> {
    pub fn new(data_access: D, token_verifier: A) -> Self {
        Self::with_config(data_access, token_verifier, MessengerConfig::default())
    }

    pub fn with_config(data_access: D, token_verifier: A, config: MessengerConfig) -> Self {
        let io_timeout = config.io_timeout;
        let rooms = RoomResolver::new(data_access.clone(), io_timeout);
        let messages = MessageStore::new(data_access.clone(), io_timeout);
        let inbox = InboxAggregator::new(data_access.clone(), io_timeout, config.inbox_unread_counts);
        Messenger { data_access, token_verifier, rooms, messages, inbox, io_timeout }
    }

    pub fn rooms(&self) -> &RoomResolver<D> {
        &self.rooms
    }

    pub fn messages(&self) -> &MessageStore<D> {
        &self.messages
    }

    pub async fn authenticate(&self, token: &str) -> Result<UserId, MessengerError> {
        if token.is_empty() {
            return Err(MessengerError::Unauthenticated("Token is required for authentication!"));
        }

        let verified = bounded(
            self.io_timeout,
            self.token_verifier.verify(token),
            || "Couldn't verify token".to_owned(),
        )
        .await?;

        let rejected = MessengerError::Unauthenticated("Invalid token or user not found!");
        let Some(user_id) = verified else {
            return Err(rejected);
        };
        match self.fetch_user(&user_id).await? {
            Some(_) => Ok(user_id),
            None => Err(rejected),
        }
    }

    pub async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>, MessengerError> {
        bounded(
            self.io_timeout,
            self.data_access.fetch_user(user_id),
            || format!("Couldn't fetch user with id {user_id}"),
        )
        .await
    }

    pub async fn display_projection(&self, user_id: &UserId) -> Result<DisplayProjection, MessengerError> {
        let user = match self.fetch_user(user_id).await? {
            Some(user) => user,
            None => return Ok(DisplayProjection::unknown()),
        };

        let admin = bounded(
            self.io_timeout,
            self.data_access.fetch_admin_profile(),
            || "Couldn't fetch admin profile".to_owned(),
        )
        .await?;

        Ok(display_projection(&user.profile, admin.as_ref()))
    }

    pub async fn find_or_create_room(&self, user_id: &UserId, other_user: &UserId) -> Result<Room, MessengerError> {
        self.rooms.find_or_create(user_id, other_user).await
    }

    pub async fn send_message(
        &self,
        from: &UserId,
        to: &UserId,
        text: Option<String>,
        images: Vec<String>,
    ) -> Result<Message, MessengerError> {
        let room = self.rooms.find_or_create(from, to).await?;
        let message = self.messages.append(&room.id, from, to, text, images).await?;
        tracing::debug!(message_id = %message.id, room_id = %room.id, %from, %to, "message stored");
        Ok(message)
    }

    /// Newest-first page of the conversation with `other_user`. Marks what
    /// was sent to `user_id` in that room as read. `None` when the two never
    /// talked.
    pub async fn fetch_chats(
        &self,
        user_id: &UserId,
        other_user: &UserId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Option<ChatPage>, MessengerError> {
        let Some(room) = self.rooms.find(user_id, other_user).await? else {
            return Ok(None);
        };

        let (offset, limit) = page_window(page, limit);
        let messages = self.messages.page(&room.id, offset, limit).await?;
        let marked = self.messages.mark_read(&room.id, user_id).await?;
        if marked > 0 {
            tracing::debug!(room_id = %room.id, %user_id, marked, "messages marked as read");
        }

        let counterpart = self.display_projection(other_user).await?;
        Ok(Some(ChatPage { messages, counterpart }))
    }

    /// Whole conversation oldest first, empty when there is no room.
    pub async fn history(&self, user_id: &UserId, other_user: &UserId) -> Result<Vec<Message>, MessengerError> {
        match self.rooms.find(user_id, other_user).await? {
            Some(room) => self.messages.history(&room.id).await,
            None => Ok(vec![]),
        }
    }

    pub async fn unread_messages(&self, user_id: &UserId, other_user: &UserId) -> Result<Option<UnreadMessages>, MessengerError> {
        let Some(room) = self.rooms.find(user_id, other_user).await? else {
            return Ok(None);
        };

        let messages = self.messages.unread(&room.id, user_id).await?;
        let count = messages.len() as u64;
        Ok(Some(UnreadMessages { messages, count }))
    }

    pub async fn online_users(&self, user_ids: &[UserId]) -> Result<Vec<UserRecord>, MessengerError> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }

        let users = bounded(
            self.io_timeout,
            self.data_access.fetch_users(user_ids),
            || format!("Couldn't fetch {} online users", user_ids.len()),
        )
        .await?;

        Ok(users.iter().map(User::record).collect())
    }

    pub async fn inbox(&self, user_id: &UserId) -> Result<Vec<InboxEntry>, MessengerError> {
        self.inbox.build_inbox(user_id).await
    }
}

/// Translates 1-based `page` and `limit` into offset and take. A missing or
/// zero limit means "everything".
pub fn page_window(page: Option<u32>, limit: Option<u32>) -> (usize, Option<usize>) {
    let limit = limit.filter(|limit| *limit > 0).map(|limit| limit as usize);
    let offset = match (page, limit) {
        (Some(page), Some(limit)) => page.saturating_sub(1) as usize * limit,
        _ => 0,
    };
    (offset, limit)
}
