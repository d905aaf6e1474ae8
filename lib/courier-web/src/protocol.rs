//! Socket envelopes. Every frame is one JSON object discriminated by its
//! `event` field.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use courier_messenger::inbox::InboxEntry;
use courier_messenger::messenger::UnreadMessages;
use courier_messenger::presence::PresenceEvent;
use courier_messenger::{DisplayProjection, Message, UserId, UserRecord};

pub const PROJECT_EVENT: &str = "project";

/// Client to server. Payload fields are optional at this level so that a
/// missing field can be told apart from a frame that is not JSON at all.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Inbound {
    Authenticate {
        token: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Message {
        receiver_id: Option<UserId>,
        message: Option<String>,
        images: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    SendNotification {
        user_id: Option<UserId>,
        message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FetchChats {
        receiver_id: Option<UserId>,
        page: Option<u32>,
        limit: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    UnReadMessages {
        receiver_id: Option<UserId>,
    },
    OnlineUsers {},
    MessageList {},
    /// The whole envelope, echoed back as is.
    #[serde(skip_deserializing)]
    Project(Value),
    #[serde(other)]
    Unknown,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Value = serde_json::from_str(text)?;
        if envelope.get("event").and_then(Value::as_str) == Some(PROJECT_EVENT) {
            return Ok(Inbound::Project(envelope));
        }
        serde_json::from_value(envelope)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Inbound::Authenticate { .. } => "authenticate",
            Inbound::Message { .. } => "message",
            Inbound::SendNotification { .. } => "sendNotification",
            Inbound::FetchChats { .. } => "fetchChats",
            Inbound::UnReadMessages { .. } => "unReadMessages",
            Inbound::OnlineUsers {} => "onlineUsers",
            Inbound::MessageList {} => "messageList",
            Inbound::Project(_) => PROJECT_EVENT,
            Inbound::Unknown => "unknown",
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub is_online: bool,
}

/// Server to client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum Outbound {
    Authorization {
        message: String,
    },
    Message {
        data: Message,
    },
    Notification {
        data: Notification,
    },
    #[serde(rename_all = "camelCase")]
    FetchChats {
        data: Vec<Message>,
        #[serde(skip_serializing_if = "Option::is_none")]
        receiver_profile: Option<DisplayProjection>,
    },
    OnlineUsers {
        data: Vec<UserRecord>,
    },
    UnReadMessages {
        data: UnreadMessages,
    },
    NoUnreadMessages {
        data: Vec<Message>,
        count: u64,
    },
    MessageList {
        success: bool,
        message: String,
        data: Vec<InboxEntry>,
    },
    Error {
        success: bool,
        message: String,
    },
    UserStatus {
        data: UserStatus,
    },
    /// Reply to `project`; carries no `event` field of its own.
    #[serde(skip_serializing)]
    Echo(Value),
}

impl Outbound {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Outbound::Echo(envelope) => serde_json::to_string(&json!({ "parsedData": envelope })),
            event => serde_json::to_string(event),
        }
    }
}

impl PresenceEvent for Outbound {
    fn offline(user_id: UserId) -> Self {
        Outbound::UserStatus { data: UserStatus { user_id, is_online: false } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn parses_known_events() {
        let receiver = Uuid::new_v4();
        let text = format!(r#"{{"event":"message","receiverId":"{receiver}","message":"hi","images":["a.png"]}}"#);
        assert_eq!(
            Inbound::parse(&text).unwrap(),
            Inbound::Message {
                receiver_id: Some(receiver),
                message: Some("hi".into()),
                images: Some(vec!["a.png".into()]),
            }
        );

        let text = format!(r#"{{"event":"fetchChats","receiverId":"{receiver}","page":2,"limit":10}}"#);
        assert_eq!(
            Inbound::parse(&text).unwrap(),
            Inbound::FetchChats { receiver_id: Some(receiver), page: Some(2), limit: Some(10) }
        );

        assert_eq!(Inbound::parse(r#"{"event":"onlineUsers"}"#).unwrap(), Inbound::OnlineUsers {});
        assert_eq!(Inbound::parse(r#"{"event":"messageList","extra":1}"#).unwrap(), Inbound::MessageList {});
    }

    #[test]
    fn missing_fields_parse_as_absent() {
        assert_eq!(
            Inbound::parse(r#"{"event":"authenticate"}"#).unwrap(),
            Inbound::Authenticate { token: None }
        );
        assert_eq!(
            Inbound::parse(r#"{"event":"unReadMessages"}"#).unwrap(),
            Inbound::UnReadMessages { receiver_id: None }
        );
    }

    #[test]
    fn unknown_and_broken_frames() {
        assert_eq!(Inbound::parse(r#"{"event":"dance","x":1}"#).unwrap(), Inbound::Unknown);
        assert!(Inbound::parse("not json").is_err());
        assert!(Inbound::parse(r#"{"token":"abc"}"#).is_err());
        assert!(Inbound::parse(r#"{"event":"message","receiverId":"not-a-uuid"}"#).is_err());
    }

    #[test]
    fn project_keeps_whole_envelope() {
        let inbound = Inbound::parse(r#"{"event":"project","anything":[1,2]}"#).unwrap();
        let Inbound::Project(envelope) = &inbound else {
            panic!("unexpected {inbound:?}");
        };
        let echoed: Value = serde_json::from_str(&Outbound::Echo(envelope.clone()).to_text().unwrap()).unwrap();
        assert_eq!(echoed, json!({ "parsedData": { "event": "project", "anything": [1, 2] } }));
    }

    #[test]
    fn outbound_wire_shapes() {
        let user_id = Uuid::new_v4();
        let status: Value = serde_json::from_str(&Outbound::offline(user_id).to_text().unwrap()).unwrap();
        assert_eq!(status, json!({ "event": "userStatus", "data": { "userId": user_id, "isOnline": false } }));

        let empty: Value = serde_json::from_str(
            &Outbound::FetchChats { data: vec![], receiver_profile: None }.to_text().unwrap(),
        )
        .unwrap();
        assert_eq!(empty, json!({ "event": "fetchChats", "data": [] }));

        let none: Value = serde_json::from_str(
            &Outbound::NoUnreadMessages { data: vec![], count: 0 }.to_text().unwrap(),
        )
        .unwrap();
        assert_eq!(none, json!({ "event": "noUnreadMessages", "data": [], "count": 0 }));

        let auth: Value = serde_json::from_str(
            &Outbound::Authorization { message: "Token is required for authentication!".into() }.to_text().unwrap(),
        )
        .unwrap();
        assert_eq!(auth, json!({ "event": "authorization", "message": "Token is required for authentication!" }));
    }
}
