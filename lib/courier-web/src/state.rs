use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_messenger::messenger::Messenger;
use courier_messenger::presence::SessionRegistry;

use crate::protocol::Outbound;

/// Shared by every route and socket of one server instance.
#[derive(Clone)]
pub struct AppState<D, A> {
    pub messenger: Messenger<D, A>,
    pub registry: Arc<SessionRegistry<Outbound>>,
    pub shutdown: CancellationToken,
}

impl<D, A> AppState<D, A> {
    pub fn new(messenger: Messenger<D, A>, shutdown: CancellationToken) -> Self {
        AppState { messenger, registry: Arc::new(SessionRegistry::new()), shutdown }
    }
}
