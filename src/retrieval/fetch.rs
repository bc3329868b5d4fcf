//! Fetch collaborator interface

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

use super::source::RequestClass;

/// Typed fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch task panicked or was dropped before producing a result
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Failures worth retrying after a cooldown
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::Connection(_) | FetchError::Io(_) | FetchError::Aborted(_)
        )
    }

    /// Whether a failure from a source of `class` should never be retried
    ///
    /// Only local sources fail permanently: a missing or corrupt file stays
    /// that way, a remote server may recover.
    pub fn is_permanent_for(&self, class: RequestClass) -> bool {
        class == RequestClass::Local
            && matches!(self, FetchError::NotFound | FetchError::Decode(_))
    }
}

/// What a fetcher is asked to load
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchTarget {
    Local(PathBuf),
    Remote(String),
}

impl FetchTarget {
    pub fn class(&self) -> RequestClass {
        match self {
            FetchTarget::Local(_) => RequestClass::Local,
            FetchTarget::Remote(_) => RequestClass::Remote,
        }
    }
}

/// Boxed future returned by fetchers
pub type FetchFuture<R> = Pin<Box<dyn Future<Output = Result<R, FetchError>> + Send + 'static>>;

/// Resolves a target into a decoded resource, asynchronously
///
/// Timeouts are the fetcher's business; the coordinator only sees the
/// outcome.
pub trait Fetcher<R>: Send + Sync + 'static {
    fn fetch(&self, target: FetchTarget) -> FetchFuture<R>;
}

/// Adapts an async closure into a [`Fetcher`]
pub struct FetchFn<F>(pub F);

impl<R, F, Fut> Fetcher<R> for FetchFn<F>
where
    F: Fn(FetchTarget) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, FetchError>> + Send + 'static,
{
    fn fetch(&self, target: FetchTarget) -> FetchFuture<R> {
        Box::pin((self.0)(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(FetchError::Timeout.is_transient());
        assert!(FetchError::Connection("reset".into()).is_transient());
        assert!(FetchError::Aborted("panicked".into()).is_transient());
        assert!(!FetchError::Aborted("panicked".into()).is_permanent_for(RequestClass::Local));
        assert!(!FetchError::NotFound.is_transient());

        assert!(FetchError::NotFound.is_permanent_for(RequestClass::Local));
        assert!(FetchError::Decode("bad png".into()).is_permanent_for(RequestClass::Local));
        assert!(!FetchError::NotFound.is_permanent_for(RequestClass::Remote));
        assert!(!FetchError::Timeout.is_permanent_for(RequestClass::Local));
    }

    #[test]
    fn test_target_class() {
        assert_eq!(FetchTarget::Local(PathBuf::from("a.png")).class(), RequestClass::Local);
        assert_eq!(FetchTarget::Remote("https://x".into()).class(), RequestClass::Remote);
    }

    #[tokio::test]
    async fn test_fetch_fn() {
        let fetcher = FetchFn(|target: FetchTarget| async move {
            match target {
                FetchTarget::Local(_) => Ok(1u32),
                FetchTarget::Remote(_) => Err(FetchError::Timeout),
            }
        });

        assert_eq!(fetcher.fetch(FetchTarget::Local(PathBuf::new())).await.unwrap(), 1);
        assert!(matches!(
            fetcher.fetch(FetchTarget::Remote(String::new())).await,
            Err(FetchError::Timeout)
        ));
    }
}
