use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data_access::DataAccess;
use crate::error::{bounded, MessengerError};
use crate::messages::MessageStore;
use crate::profile::{display_projection, DisplayProjection};
use crate::{Message, UserId};

pub const NO_MESSAGES_PREVIEW: &str = "No messages yet";
pub const IMAGE_PREVIEW: &str = "Sent an image";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboxCounterpart {
    pub receiver_id: UserId,
    pub name: String,
    pub image: Option<String>,
}

/// One row of a user's conversation list.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    pub user: InboxCounterpart,
    pub last_message: String,
    pub time: DateTime<Utc>,
    pub unread_count: u64,
}

pub fn preview_text(latest: Option<&Message>) -> String {
    match latest {
        Some(message) => match message.text() {
            Some(text) => text.to_owned(),
            None => IMAGE_PREVIEW.to_owned(),
        },
        None => NO_MESSAGES_PREVIEW.to_owned(),
    }
}

#[derive(Clone)]
pub struct InboxAggregator<D> {
    data_access: D,
    messages: MessageStore<D>,
    io_timeout: Duration,
    unread_counts: bool,
}

impl<D: DataAccess> InboxAggregator<D> {
    /// With `unread_counts` off every entry reports `0` unread.
    pub fn new(data_access: D, io_timeout: Duration, unread_counts: bool) -> Self {
        let messages = MessageStore::new(data_access.clone(), io_timeout);
        InboxAggregator { data_access, messages, io_timeout, unread_counts }
    }

    pub async fn build_inbox(&self, user_id: &UserId) -> Result<Vec<InboxEntry>, MessengerError> {
        let rooms = bounded(
            self.io_timeout,
            self.data_access.find_users_rooms(user_id),
            || format!("Couldn't fetch rooms for user {user_id}"),
        )
        .await?;

        if rooms.is_empty() {
            return Ok(vec![]);
        }

        let counterpart_ids: Vec<UserId> = rooms.iter().filter_map(|room| room.counterpart(user_id)).collect();
        let counterparts: HashMap<UserId, _> = bounded(
            self.io_timeout,
            self.data_access.fetch_users(&counterpart_ids),
            || format!("Couldn't fetch inbox counterparts for user {user_id}"),
        )
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

        let admin = bounded(
            self.io_timeout,
            self.data_access.fetch_admin_profile(),
            || "Couldn't fetch admin profile".to_owned(),
        )
        .await?;

        let mut inbox = Vec::with_capacity(rooms.len());
        for room in rooms {
            let Some(counterpart_id) = room.counterpart(user_id) else {
                continue;
            };

            let projection = match counterparts.get(&counterpart_id) {
                Some(counterpart) => display_projection(&counterpart.profile, admin.as_ref()),
                None => DisplayProjection::unknown(),
            };

            let latest = self.messages.latest(&room).await?;
            let unread_count = if self.unread_counts {
                self.messages.count_unread(&room.id, user_id).await?
            } else {
                0
            };

            inbox.push(InboxEntry {
                user: InboxCounterpart {
                    receiver_id: counterpart_id,
                    name: projection.name,
                    image: projection.image,
                },
                last_message: preview_text(latest.as_ref()),
                time: latest.as_ref().map(|message| message.created_at).unwrap_or(room.last_activity),
                unread_count,
            });
        }

        Ok(inbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message(text: Option<&str>, images: &[&str]) -> Message {
        Message::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            text.map(str::to_owned),
            images.iter().map(|image| image.to_string()).collect(),
        )
    }

    #[test]
    fn previews_latest_message() {
        assert_eq!(preview_text(None), "No messages yet");
        assert_eq!(preview_text(Some(&message(Some("see you"), &[]))), "see you");
        assert_eq!(preview_text(Some(&message(Some(""), &["a.png"]))), "Sent an image");
        assert_eq!(preview_text(Some(&message(None, &["a.png"]))), "Sent an image");
    }
}
