//! Per-connection protocol state machine.
//!
//! A connection starts `Unauthenticated`, becomes `Authenticated` after a
//! successful `authenticate` event and ends `Closed`. Envelopes are handled
//! one at a time in arrival order; a failing envelope is logged and never
//! closes the connection, with the single exception of a rejected token.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::data_access::DataAccess;
use courier_messenger::messenger::Messenger;
use courier_messenger::presence::{ConnectionHandle, ConnectionId, SessionRegistry};
use courier_messenger::{MessengerError, UserId};
use courier_utils::utils::log_internal_error;

use crate::protocol::{Inbound, Notification, Outbound};

pub const INBOX_FETCHED: &str = "Inbox preview fetched successfully";
pub const INBOX_FAILED: &str = "Failed to fetch inbox preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated(UserId),
    Closed,
}

/// What the socket loop should do after an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{event} received before authentication")]
    Unauthenticated { event: &'static str },
    #[error("malformed {event} envelope: {reason}")]
    Malformed { event: &'static str, reason: &'static str },
    #[error(transparent)]
    Messenger(#[from] MessengerError),
}

pub struct Connection<D, A> {
    messenger: Messenger<D, A>,
    registry: Arc<SessionRegistry<Outbound>>,
    handle: ConnectionHandle<Outbound>,
    state: ConnectionState,
}

impl<D, A> Connection<D, A> {
    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Leaves the registry; an authenticated user whose last connection this
    /// was goes offline. Safe to call more than once.
    pub fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return;
        }

        self.registry.detach(self.id());
        if let ConnectionState::Authenticated(user_id) = previous {
            self.registry.unregister(&user_id, self.id());
        }
        tracing::info!(connection_id = self.id(), "connection closed");
    }

    fn reply(&self, event: Outbound) {
        if !self.handle.send(event) {
            tracing::debug!(connection_id = self.id(), "writer gone, reply dropped");
        }
    }
}

impl<D: DataAccess, A: TokenVerifier> Connection<D, A> {
    /// Attaches a new connection whose outbound envelopes go to `sender`.
    pub fn open(messenger: Messenger<D, A>, registry: Arc<SessionRegistry<Outbound>>, sender: UnboundedSender<Outbound>) -> Self {
        let handle = registry.attach(sender);
        Connection { messenger, registry, handle, state: ConnectionState::Unauthenticated }
    }

    pub async fn handle_frame(&mut self, text: &str) -> Flow {
        if self.state == ConnectionState::Closed {
            return Flow::Close;
        }

        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(connection_id = self.id(), error = %e, "dropping unreadable envelope");
                return Flow::Continue;
            }
        };

        let event = inbound.name();
        match self.dispatch(inbound).await {
            Ok(flow) => flow,
            Err(e) => {
                self.report(event, &e);
                Flow::Continue
            }
        }
    }

    async fn dispatch(&mut self, inbound: Inbound) -> Result<Flow, EventError> {
        let user_id = match (self.state, &inbound) {
            (ConnectionState::Unauthenticated, Inbound::Authenticate { token }) => {
                let token = token.clone().unwrap_or_default();
                return self.authenticate(&token).await;
            }
            (ConnectionState::Unauthenticated, inbound) => {
                return Err(EventError::Unauthenticated { event: inbound.name() });
            }
            (ConnectionState::Authenticated(user_id), _) => user_id,
            (ConnectionState::Closed, _) => return Ok(Flow::Close),
        };

        match inbound {
            Inbound::Authenticate { .. } => {
                tracing::debug!(connection_id = self.id(), %user_id, "already authenticated, ignoring");
            }
            Inbound::Message { receiver_id, message, images } => {
                let receiver_id = receiver_id.ok_or(EventError::Malformed { event: "message", reason: "receiverId is required" })?;
                self.send_message(user_id, receiver_id, message, images.unwrap_or_default()).await?;
            }
            Inbound::SendNotification { user_id: target, message } => {
                let target = target.ok_or(EventError::Malformed { event: "sendNotification", reason: "userId is required" })?;
                let message = message
                    .filter(|message| !message.is_empty())
                    .ok_or(EventError::Malformed { event: "sendNotification", reason: "message is required" })?;
                match self.registry.lookup(&target) {
                    Some(connection) => {
                        connection.send(Outbound::Notification { data: Notification { message } });
                    }
                    None => tracing::debug!(connection_id = self.id(), %target, "notification target offline, dropped"),
                }
            }
            Inbound::FetchChats { receiver_id, page, limit } => {
                let receiver_id = receiver_id.ok_or(EventError::Malformed { event: "fetchChats", reason: "receiverId is required" })?;
                let chats = match self.messenger.fetch_chats(&user_id, &receiver_id, page, limit).await {
                    Ok(chats) => chats,
                    Err(MessengerError::NotFound(what)) => {
                        tracing::debug!(connection_id = self.id(), %what, "fetchChats degraded to empty result");
                        None
                    }
                    Err(e) => return Err(e.into()),
                };
                let reply = match chats {
                    Some(page) => Outbound::FetchChats { data: page.messages, receiver_profile: Some(page.counterpart) },
                    None => Outbound::FetchChats { data: vec![], receiver_profile: None },
                };
                self.reply(reply);
            }
            Inbound::UnReadMessages { receiver_id } => {
                let receiver_id = receiver_id.ok_or(EventError::Malformed { event: "unReadMessages", reason: "receiverId is required" })?;
                let unread = match self.messenger.unread_messages(&user_id, &receiver_id).await {
                    Ok(unread) => unread,
                    Err(MessengerError::NotFound(what)) => {
                        tracing::debug!(connection_id = self.id(), %what, "unReadMessages degraded to empty result");
                        None
                    }
                    Err(e) => return Err(e.into()),
                };
                let reply = match unread {
                    Some(unread) => Outbound::UnReadMessages { data: unread },
                    None => Outbound::NoUnreadMessages { data: vec![], count: 0 },
                };
                self.reply(reply);
            }
            Inbound::OnlineUsers {} => {
                let online: Vec<UserId> = self.registry.list_online().into_iter().collect();
                let data = self.messenger.online_users(&online).await?;
                self.reply(Outbound::OnlineUsers { data });
            }
            Inbound::MessageList {} => match self.messenger.inbox(&user_id).await {
                Ok(data) => self.reply(Outbound::MessageList { success: true, message: INBOX_FETCHED.to_owned(), data }),
                Err(e) => {
                    self.reply(Outbound::Error { success: false, message: INBOX_FAILED.to_owned() });
                    return Err(e.into());
                }
            },
            Inbound::Project(envelope) => self.reply(Outbound::Echo(envelope)),
            Inbound::Unknown => {
                tracing::debug!(connection_id = self.id(), %user_id, "ignoring unknown event");
            }
        }

        Ok(Flow::Continue)
    }

    async fn authenticate(&mut self, token: &str) -> Result<Flow, EventError> {
        match self.messenger.authenticate(token).await {
            Ok(user_id) => {
                self.registry.register(user_id, self.handle.clone());
                self.state = ConnectionState::Authenticated(user_id);
                tracing::info!(connection_id = self.id(), %user_id, "connection authenticated");
                Ok(Flow::Continue)
            }
            Err(MessengerError::Unauthenticated(reason)) => {
                tracing::warn!(connection_id = self.id(), reason, "authentication rejected");
                self.reply(Outbound::Authorization { message: reason.to_owned() });
                self.close();
                Ok(Flow::Close)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_message(&self, from: UserId, to: UserId, text: Option<String>, images: Vec<String>) -> Result<(), EventError> {
        let message = self.messenger.send_message(&from, &to, text, images).await?;
        let event = Outbound::Message { data: message };

        if let Some(recipient) = self.registry.lookup(&to) {
            if !recipient.send(event.clone()) {
                tracing::debug!(connection_id = self.id(), recipient = %to, "recipient connection gone, message kept for history");
            }
        }
        self.reply(event);
        Ok(())
    }

    fn report(&self, event: &'static str, error: &EventError) {
        let connection_id = self.id();
        match error {
            EventError::Unauthenticated { .. } | EventError::Malformed { .. } => {
                tracing::debug!(connection_id, event, %error, "event dropped");
            }
            EventError::Messenger(e) if e.is_transient() => {
                log_internal_error(format_args!("{event} failed on connection {connection_id}: {e}"));
            }
            EventError::Messenger(e) => {
                tracing::warn!(connection_id, event, error = %e, "event rejected");
            }
        }
    }
}

impl<D, A> Drop for Connection<D, A> {
    fn drop(&mut self) {
        self.close();
    }
}
