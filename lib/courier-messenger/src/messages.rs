use std::time::Duration;

use crate::data_access::DataAccess;
use crate::error::{bounded, MessengerError};
use crate::rooms::RoomResolver;
use crate::{Message, Room, RoomId, UserId};

/// Room-scoped message persistence. Every operation first checks that the
/// room exists.
#[derive(Clone)]
pub struct MessageStore<D> {
    data_access: D,
    rooms: RoomResolver<D>,
    io_timeout: Duration,
}

impl<D: DataAccess> MessageStore<D> {
    pub fn new(data_access: D, io_timeout: Duration) -> Self {
        let rooms = RoomResolver::new(data_access.clone(), io_timeout);
        MessageStore { data_access, rooms, io_timeout }
    }

    pub async fn append(
        &self,
        room_id: &RoomId,
        sender: &UserId,
        recipient: &UserId,
        text: Option<String>,
        images: Vec<String>,
    ) -> Result<Message, MessengerError> {
        let room = self.rooms.fetch(room_id).await?;
        if sender == recipient || !room.matches(sender, recipient) {
            return Err(MessengerError::InvalidArgument(format!(
                "{sender} and {recipient} are not the participants of room {room_id}"
            )));
        }

        let message = Message::new(room.id, *sender, *recipient, text, images);
        bounded(
            self.io_timeout,
            self.data_access.create_message(&message),
            || format!("Couldn't create message from {sender} to {recipient}"),
        )
        .await?;

        Ok(message)
    }

    /// Newest first; `limit: None` takes everything after `offset`.
    pub async fn page(&self, room_id: &RoomId, offset: usize, limit: Option<usize>) -> Result<Vec<Message>, MessengerError> {
        self.rooms.fetch(room_id).await?;
        bounded(
            self.io_timeout,
            self.data_access.fetch_messages_page(room_id, offset, limit),
            || format!("Couldn't fetch messages of room {room_id}, offset: {offset}, limit: {limit:?}"),
        )
        .await
    }

    /// Whole conversation, oldest first.
    pub async fn history(&self, room_id: &RoomId) -> Result<Vec<Message>, MessengerError> {
        self.rooms.fetch(room_id).await?;
        bounded(
            self.io_timeout,
            self.data_access.fetch_room_history(room_id),
            || format!("Couldn't fetch history of room {room_id}"),
        )
        .await
    }

    pub async fn latest(&self, room: &Room) -> Result<Option<Message>, MessengerError> {
        bounded(
            self.io_timeout,
            self.data_access.fetch_last_message(&room.id),
            || format!("Couldn't fetch last message of room {}", room.id),
        )
        .await
    }

    pub async fn unread(&self, room_id: &RoomId, recipient: &UserId) -> Result<Vec<Message>, MessengerError> {
        self.rooms.fetch(room_id).await?;
        bounded(
            self.io_timeout,
            self.data_access.fetch_unread(room_id, recipient),
            || format!("Couldn't fetch unread messages of room {room_id} for {recipient}"),
        )
        .await
    }

    pub async fn count_unread(&self, room_id: &RoomId, recipient: &UserId) -> Result<u64, MessengerError> {
        self.rooms.fetch(room_id).await?;
        bounded(
            self.io_timeout,
            self.data_access.count_unread(room_id, recipient),
            || format!("Couldn't count unread messages of room {room_id} for {recipient}"),
        )
        .await
    }

    pub async fn mark_read(&self, room_id: &RoomId, recipient: &UserId) -> Result<u64, MessengerError> {
        self.rooms.fetch(room_id).await?;
        bounded(
            self.io_timeout,
            self.data_access.mark_read(room_id, recipient),
            || format!("Couldn't mark messages of room {room_id} as read for {recipient}"),
        )
        .await
    }
}
