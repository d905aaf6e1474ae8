pub mod async_utils;
pub mod http;
pub mod utils;
