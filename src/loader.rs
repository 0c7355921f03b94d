//! The loader seam: user-supplied value replacement.
//!
//! A [`Loader`] produces the value for a key, possibly blocking (network,
//! disk, computation). The cache guarantees it is invoked at most once per
//! in-flight key; errors are handed back verbatim to every caller that was
//! waiting on the invocation and are never cached.
//!
//! Because a single invocation's error is shared with every coalesced
//! waiter, the error type must be `Clone`. Error types that cannot be cloned
//! are typically used as `Arc<E>`.

use std::future::Future;

use async_trait::async_trait;

/// Loads the value for a key when the cache has no fresh one.
///
/// Implement this trait directly when the loader carries state (a database
/// pool, an HTTP client), or wrap a plain async closure with [`loader_fn`].
#[async_trait]
pub trait Loader<K, V, E>: Send + Sync + 'static {
    /// Produce the value for `key`, or an error.
    async fn load(&self, key: &K) -> Result<V, E>;
}

/// Adapter turning an async closure into a [`Loader`].
///
/// Constructed with [`loader_fn`].
pub struct LoaderFn<F> {
    f: F,
}

/// Wrap an async closure as a [`Loader`].
///
/// # Example
/// ```
/// use stampede::loader_fn;
///
/// let loader = loader_fn(|key: String| async move {
///     Ok::<_, std::convert::Infallible>(format!("value-{key}"))
/// });
/// ```
pub fn loader_fn<F>(f: F) -> LoaderFn<F> {
    LoaderFn { f }
}

#[async_trait]
impl<K, V, E, F, Fut> Loader<K, V, E> for LoaderFn<F>
where
    K: Clone + Send + Sync + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    async fn load(&self, key: &K) -> Result<V, E> {
        (self.f)(key.clone()).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the loader module.
    use super::*;

    /// Validates `loader_fn` behavior for the closure adapter scenario.
    ///
    /// Assertions:
    /// - Confirms the adapted closure receives the key and returns its value.
    #[tokio::test]
    async fn test_loader_fn_passes_key() {
        let loader = loader_fn(|key: String| async move {
            Ok::<_, std::convert::Infallible>(format!("value-{key}"))
        });

        let value = loader.load(&"k1".to_string()).await.unwrap();
        assert_eq!(value, "value-k1");
    }

    /// Validates `loader_fn` behavior for the error passthrough scenario.
    ///
    /// Assertions:
    /// - Confirms the closure's error is returned unchanged.
    #[tokio::test]
    async fn test_loader_fn_propagates_error() {
        let loader = loader_fn(|_key: u32| async move { Err::<u32, &str>("load failed") });

        let err = loader.load(&1).await.unwrap_err();
        assert_eq!(err, "load failed");
    }
}
