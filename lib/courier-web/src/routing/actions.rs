use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::data_access::DataAccess;
use courier_messenger::inbox::InboxEntry;
use courier_messenger::{Message, Room, UserId};
use courier_utils::http::bearer_token;

use crate::error::ApiError;
use crate::socket::serve_socket;
use crate::state::AppState;

/// Success envelope shared by the chat routes.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: &'static str,
    pub data: T,
}

fn respond<T>(message: &'static str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { success: true, message, data })
}

/// Caller identity taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub UserId);

impl<D: DataAccess, A: TokenVerifier> FromRequestParts<AppState<D, A>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<D, A>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(ApiError::unauthorized)?;
        let user_id = state.messenger.authenticate(token).await?;
        Ok(AuthenticatedUser(user_id))
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub receiver_id: UserId,
    pub message: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RoomBody {
    pub receiver_id: UserId,
}

pub async fn health<D: DataAccess, A: TokenVerifier>(State(state): State<AppState<D, A>>) -> Json<Value> {
    Json(json!({ "status": "ok", "online": state.registry.list_online().len() }))
}

pub async fn websocket<D: DataAccess, A: TokenVerifier>(State(state): State<AppState<D, A>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Persists like the socket `message` event but pushes nothing live.
pub async fn send_message<D: DataAccess, A: TokenVerifier>(
    State(state): State<AppState<D, A>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<SendMessageBody>, JsonRejection>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let message = state.messenger.send_message(&user_id, &body.receiver_id, body.message, body.images).await?;
    Ok(respond("Message sent successfully", message))
}

pub async fn find_or_create_room<D: DataAccess, A: TokenVerifier>(
    State(state): State<AppState<D, A>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<RoomBody>, JsonRejection>,
) -> Result<Json<ApiResponse<Room>>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let room = state.messenger.find_or_create_room(&user_id, &body.receiver_id).await?;
    Ok(respond("Room found or created successfully", room))
}

pub async fn inbox_preview<D: DataAccess, A: TokenVerifier>(
    State(state): State<AppState<D, A>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<InboxEntry>>>, ApiError> {
    let inbox = state.messenger.inbox(&user_id).await?;
    Ok(respond("Inbox preview fetched successfully", inbox))
}

/// Whole conversation with `receiver_id`, oldest first.
pub async fn history<D: DataAccess, A: TokenVerifier>(
    State(state): State<AppState<D, A>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(receiver_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Message>>>, ApiError> {
    let receiver_id: UserId = receiver_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid receiver id: {receiver_id}")))?;
    let messages = state.messenger.history(&user_id, &receiver_id).await?;
    Ok(respond("Chats fetched successfully", messages))
}
