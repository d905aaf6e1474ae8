use std::future::Future;

use crate::UserId;

//TODO code duplication
macro_rules! async_result {
    ($t:ty) => {
        impl Future<Output = Result<$t, Self::Error>> + Send
    };
}

pub trait TokenVerifier: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    /// `Ok(None)` for a token that is malformed, badly signed or expired.
    fn verify(&self, token: &str) -> async_result!(Option<UserId>);
}
