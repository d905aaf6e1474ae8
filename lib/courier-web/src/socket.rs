use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::Instrument;

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::data_access::DataAccess;
use courier_utils::async_utils::pipe_unbounded_channel;
use courier_utils::utils::log_internal_error;

use crate::connection::{Connection, Flow};
use crate::protocol::Outbound;
use crate::state::AppState;

/// Drives one upgraded socket until either side closes it or the server
/// shuts down. Inbound frames are handled sequentially by the reader loop,
/// outbound envelopes are written by a separate task so pushes from other
/// connections are not held up by a slow event.
pub async fn serve_socket<D: DataAccess, A: TokenVerifier>(socket: WebSocket, state: AppState<D, A>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut connection = Connection::open(state.messenger.clone(), state.registry.clone(), sender);
    let span = tracing::info_span!("connection", connection_id = connection.id());

    let mut frames = pipe_unbounded_channel(receiver, |event: Outbound| match event.to_text() {
        Ok(text) => Some(text),
        Err(e) => {
            log_internal_error(format_args!("Couldn't serialize outbound envelope: {e}"));
            None
        }
    });

    let writer = tokio::spawn(
        async move {
            while let Some(text) = frames.recv().await {
                if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                    return;
                }
            }
            // every sender is gone, say goodbye
            let _ = ws_tx.send(WsMessage::Close(None)).await;
        }
        .instrument(span.clone()),
    );

    async move {
        tracing::info!("connection opened");
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,

                frame = ws_rx.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if connection.handle_frame(text.as_str()).await == Flow::Close {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "socket error");
                        break;
                    }
                    // ping, pong and binary frames carry no envelopes
                    Some(Ok(_)) => {}
                },
            }
        }

        connection.close();
        drop(connection);

        if let Err(e) = writer.await {
            log_internal_error(format_args!("Socket writer task failed: {e}"));
        }
    }
    .instrument(span)
    .await
}
