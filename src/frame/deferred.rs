//! Single-assignment values resolved on another context
//!
//! Built on a `tokio::sync::watch` channel holding `Option<T>`: `None` until
//! the resolver fires, then the value forever. Every clone of the
//! [`Deferred`] observes the same value.

use tokio::sync::watch;

/// Create a linked resolver/waiter pair
pub fn deferred<T: Clone>() -> (DeferredResolver<T>, Deferred<T>) {
    let (tx, rx) = watch::channel(None);
    (DeferredResolver { tx }, Deferred { rx })
}

/// Write side; resolving consumes it, so a value is set at most once
#[derive(Debug)]
pub struct DeferredResolver<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T> DeferredResolver<T> {
    /// Publish the value to every waiter
    pub fn resolve(self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// True once every waiter has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side of a deferred value
#[derive(Clone, Debug)]
pub struct Deferred<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Deferred<T> {
    /// The value if already resolved
    pub fn try_get(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait for the value
    ///
    /// # Returns
    /// `None` if the resolver was dropped without resolving
    pub async fn wait(&self) -> Option<T> {
        let mut rx = self.rx.clone();
        let value = match rx.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        value
    }

    /// Block the current thread until the value arrives
    ///
    /// Must not be called from inside the async runtime.
    pub fn wait_blocking(&self) -> Option<T> {
        pollster::block_on(self.wait())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_get_before_and_after() {
        let (resolver, value) = deferred::<u32>();
        assert_eq!(value.try_get(), None);
        assert!(!value.is_resolved());

        resolver.resolve(7);
        assert_eq!(value.try_get(), Some(7));
        assert!(value.is_resolved());
    }

    #[tokio::test]
    async fn test_clones_all_observe_value() {
        let (resolver, value) = deferred::<String>();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let value = value.clone();
                tokio::spawn(async move { value.wait().await })
            })
            .collect();

        resolver.resolve("done".to_string());
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().as_deref(), Some("done"));
        }
    }

    #[tokio::test]
    async fn test_dropped_resolver_yields_none() {
        let (resolver, value) = deferred::<u32>();
        drop(resolver);
        assert_eq!(value.wait().await, None);
    }

    #[test]
    fn test_wait_blocking_across_threads() {
        let (resolver, value) = deferred::<u32>();
        let handle = std::thread::spawn(move || value.wait_blocking());
        resolver.resolve(42);
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    fn test_abandoned() {
        let (resolver, value) = deferred::<u32>();
        assert!(!resolver.is_abandoned());
        drop(value);
        assert!(resolver.is_abandoned());
    }
}
