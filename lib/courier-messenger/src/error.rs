use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("Authentication failed: {0}")]
    Unauthenticated(&'static str),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("Store failure: {0:#}")]
    Store(anyhow::Error),
}

impl MessengerError {
    /// Store failures and timeouts; the caller may try again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MessengerError::Timeout { .. } | MessengerError::Store(_))
    }
}

/// Runs one collaborator call under `timeout`, attaching `context` to
/// whatever goes wrong.
pub(crate) async fn bounded<T, E, F, C>(timeout: Duration, operation: F, context: C) -> Result<T, MessengerError>
where
    F: Future<Output = Result<T, E>>,
    E: 'static + std::error::Error + Send + Sync,
    C: FnOnce() -> String,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(MessengerError::Store(anyhow::Error::new(e).context(context()))),
        Err(_) => Err(MessengerError::Timeout { operation: context(), after: timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[tokio::test]
    async fn maps_errors_and_timeouts() {
        let ok = bounded(Duration::from_secs(1), async { Ok::<_, Boom>(5) }, || "op".into()).await;
        assert_eq!(ok.unwrap(), 5);

        let failed = bounded(Duration::from_secs(1), async { Err::<(), _>(Boom) }, || "Couldn't do op".into()).await;
        match failed {
            Err(MessengerError::Store(e)) => assert_eq!(format!("{e:#}"), "Couldn't do op: boom"),
            other => panic!("unexpected {other:?}"),
        }

        let slow = bounded(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Boom>(())
            },
            || "slow op".into(),
        )
        .await;
        assert!(matches!(slow, Err(MessengerError::Timeout { .. })));
        assert!(slow.unwrap_err().is_transient());
    }
}
