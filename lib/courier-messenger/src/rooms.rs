use std::time::Duration;

use crate::data_access::DataAccess;
use crate::error::{bounded, MessengerError};
use crate::{Room, RoomId, UserId};

/// A lost creation race is resolved by re-fetching; more than a couple of
/// rounds means the store is misbehaving.
const ROOM_CREATE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct RoomResolver<D> {
    data_access: D,
    io_timeout: Duration,
}

impl<D: DataAccess> RoomResolver<D> {
    pub fn new(data_access: D, io_timeout: Duration) -> Self {
        RoomResolver { data_access, io_timeout }
    }

    pub async fn find(&self, user_id_1: &UserId, user_id_2: &UserId) -> Result<Option<Room>, MessengerError> {
        bounded(
            self.io_timeout,
            self.data_access.find_room(user_id_1, user_id_2),
            || format!("Couldn't look up room for {user_id_1} and {user_id_2}"),
        )
        .await
    }

    pub async fn fetch(&self, room_id: &RoomId) -> Result<Room, MessengerError> {
        bounded(
            self.io_timeout,
            self.data_access.fetch_room(room_id),
            || format!("Couldn't fetch room {room_id}"),
        )
        .await?
        .ok_or_else(|| MessengerError::NotFound(format!("room {room_id}")))
    }

    /// Returns the room for the pair, creating it with `user_a` as
    /// participant A when there is none yet.
    pub async fn find_or_create(&self, user_a: &UserId, user_b: &UserId) -> Result<Room, MessengerError> {
        if user_a == user_b {
            return Err(MessengerError::InvalidArgument(format!("user {user_a} cannot open a room with themselves")));
        }

        if let Some(room) = self.find(user_a, user_b).await? {
            return Ok(room);
        }

        self.ensure_user_exists(user_a).await?;
        self.ensure_user_exists(user_b).await?;

        for _ in 0..ROOM_CREATE_ATTEMPTS {
            let room = Room::new(*user_a, *user_b);
            let created = bounded(
                self.io_timeout,
                self.data_access.create_room(&room),
                || format!("Couldn't create room for {user_a} and {user_b}"),
            )
            .await?;

            if created {
                tracing::debug!(room_id = %room.id, %user_a, %user_b, "created room");
                return Ok(room);
            }

            // someone else created it in the meantime
            if let Some(room) = self.find(user_a, user_b).await? {
                return Ok(room);
            }
        }

        Err(MessengerError::Store(anyhow::anyhow!(
            "Room for {user_a} and {user_b} conflicts on create but cannot be found"
        )))
    }

    async fn ensure_user_exists(&self, user_id: &UserId) -> Result<(), MessengerError> {
        let user = bounded(
            self.io_timeout,
            self.data_access.fetch_user(user_id),
            || format!("Couldn't fetch user {user_id}"),
        )
        .await?;

        match user {
            Some(_) => Ok(()),
            None => Err(MessengerError::NotFound(format!("user {user_id}"))),
        }
    }
}
