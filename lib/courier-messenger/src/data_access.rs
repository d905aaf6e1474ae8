use std::future::Future;

use crate::{AdminProfile, Message, Room, RoomId, User, UserId};

// written as a macro to use Self::Error
macro_rules! async_result {
    ($t:ty) => {
        impl Future<Output = Result<$t, Self::Error>> + Send
    };
}

/// Persistence and user lookup consumed by the messaging core.
///
/// Messages with equal timestamps are ordered by insertion, so "descending"
/// means newest-inserted first and paging is deterministic.
pub trait DataAccess: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    fn fetch_user(&self, user_id: &UserId) -> async_result!(Option<User>);
    fn fetch_users(&self, user_ids: &[UserId]) -> async_result!(Vec<User>);
    fn fetch_admin_profile(&self) -> async_result!(Option<AdminProfile>);

    /// Finds the room for the unordered pair.
    fn find_room(&self, user_id_1: &UserId, user_id_2: &UserId) -> async_result!(Option<Room>);
    fn fetch_room(&self, room_id: &RoomId) -> async_result!(Option<Room>);
    /// Returns `false` without inserting if a room for the pair already exists.
    fn create_room(&self, room: &Room) -> async_result!(bool);
    /// All rooms the user takes part in, most recently active first.
    fn find_users_rooms(&self, user_id: &UserId) -> async_result!(Vec<Room>);

    /// Inserts the message and moves the room's last activity forward to its
    /// timestamp, never backwards.
    fn create_message(&self, message: &Message) -> async_result!(());
    /// Newest first. `limit: None` returns everything after `offset`.
    fn fetch_messages_page(&self, room_id: &RoomId, offset: usize, limit: Option<usize>) -> async_result!(Vec<Message>);
    /// Oldest first.
    fn fetch_room_history(&self, room_id: &RoomId) -> async_result!(Vec<Message>);
    fn fetch_last_message(&self, room_id: &RoomId) -> async_result!(Option<Message>) {
        async move {
            let last = self.fetch_messages_page(room_id, 0, Some(1)).await?.into_iter().next();
            Ok(last)
        }
    }
    fn fetch_unread(&self, room_id: &RoomId, recipient_id: &UserId) -> async_result!(Vec<Message>);
    fn count_unread(&self, room_id: &RoomId, recipient_id: &UserId) -> async_result!(u64) {
        async move {
            let unread = self.fetch_unread(room_id, recipient_id).await?;
            Ok(unread.len() as u64)
        }
    }
    /// Flags every unread message addressed to `recipient_id` as read and
    /// returns how many changed.
    fn mark_read(&self, room_id: &RoomId, recipient_id: &UserId) -> async_result!(u64);
}
