mod actions;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::data_access::DataAccess;

use crate::state::AppState;

pub use actions::AuthenticatedUser;

pub fn build_router<D: DataAccess, A: TokenVerifier>(state: AppState<D, A>) -> Router {
    Router::new()
        .route("/api/v1/health", get(actions::health::<D, A>))
        .route("/ws", get(actions::websocket::<D, A>))
        .route("/api/v1/chat/send-message", post(actions::send_message::<D, A>))
        .route("/api/v1/chat/find-or-create-room", post(actions::find_or_create_room::<D, A>))
        .route("/api/v1/chat/inbox-preview", get(actions::inbox_preview::<D, A>))
        .route("/api/v1/chat/{receiver_id}", get(actions::history::<D, A>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
