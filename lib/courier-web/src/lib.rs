pub mod connection;
pub mod protocol;
pub mod routing;
pub mod server;
pub mod socket;
pub mod state;
mod error;

pub use error::{ApiError, ErrorBody, NOT_AUTHORIZED};
pub use routing::build_router;
pub use state::AppState;
