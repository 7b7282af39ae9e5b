//! Credential rotation across a pool of provider API keys.
//!
//! A rotator exposes the active key and a monotonic "try the next one" step.
//! Rotation wraps modulo the pool size; landing back on the first key reports
//! exhaustion so that callers stop instead of cycling forever.
//!
//! Rotators are handed to each fetch as `&mut`, so a single rotator can never
//! be advanced by two fetches at once. Concurrent callers either give every
//! worker its own [`KeyRotator`] or share one through [`SharedRotator`], which
//! holds the lock for the whole fetch.
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Header carrying the API key.
pub const KEY_HEADER: &str = "x-rapidapi-key";
/// Header naming the upstream provider host.
pub const HOST_HEADER: &str = "x-rapidapi-host";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotatorError {
    #[error("no API credentials configured")]
    NoCredentialsConfigured,
}

/// Key material for one request, bound to the provider host it targets.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHeaders {
    pub key: String,
    pub host: String,
}

impl fmt::Debug for CredentialHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHeaders")
            .field("key", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

pub trait CredentialRotator {
    /// Number of credentials in the pool.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the active credential, always in `0..len()`.
    fn cursor(&self) -> usize;

    /// The active credential.
    fn current(&self) -> Result<&str, RotatorError>;

    /// Advance to the next credential. Returns `false` when the cursor wrapped
    /// back to the first credential, meaning every key has been tried.
    fn rotate(&mut self) -> bool;

    /// Active credential paired with the provider host of a request.
    fn headers_for(&self, host: &str) -> Result<CredentialHeaders, RotatorError> {
        Ok(CredentialHeaders {
            key: self.current()?.to_string(),
            host: host.to_string(),
        })
    }
}

/// Ordered pool of keys with a wrapping cursor.
#[derive(Clone)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: usize,
}

impl KeyRotator {
    /// Build a rotator over `keys`; an empty pool is rejected.
    ///
    /// ```
    /// use pulse_social::rotation::{CredentialRotator, KeyRotator};
    ///
    /// let mut rotator = KeyRotator::new(vec!["a".into(), "b".into()]).unwrap();
    /// assert_eq!(rotator.current().unwrap(), "a");
    /// assert!(rotator.rotate());
    /// assert_eq!(rotator.current().unwrap(), "b");
    /// assert!(!rotator.rotate());
    /// assert_eq!(rotator.current().unwrap(), "a");
    /// ```
    pub fn new(keys: Vec<String>) -> Result<Self, RotatorError> {
        if keys.is_empty() {
            return Err(RotatorError::NoCredentialsConfigured);
        }
        Ok(Self { keys, cursor: 0 })
    }
}

impl fmt::Debug for KeyRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRotator")
            .field("keys", &self.keys.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl CredentialRotator for KeyRotator {
    fn len(&self) -> usize {
        self.keys.len()
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn current(&self) -> Result<&str, RotatorError> {
        self.keys
            .get(self.cursor)
            .map(String::as_str)
            .ok_or(RotatorError::NoCredentialsConfigured)
    }

    fn rotate(&mut self) -> bool {
        if self.keys.is_empty() {
            return false;
        }
        self.cursor = (self.cursor + 1) % self.keys.len();
        tracing::info!(cursor = self.cursor, pool = self.keys.len(), "rotation.advanced");
        self.cursor != 0
    }
}

/// A [`KeyRotator`] shared between concurrent workers.
///
/// Lock it for the duration of a whole fetch so that `current()` and
/// `rotate()` of one fetch are never interleaved with another's.
#[derive(Clone, Debug)]
pub struct SharedRotator {
    inner: Arc<Mutex<KeyRotator>>,
}

impl SharedRotator {
    pub fn new(rotator: KeyRotator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rotator)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, KeyRotator> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotator(n: usize) -> KeyRotator {
        KeyRotator::new((0..n).map(|i| format!("key-{i}")).collect()).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert_eq!(
            KeyRotator::new(vec![]).unwrap_err(),
            RotatorError::NoCredentialsConfigured
        );
    }

    #[test]
    fn rotate_reports_exhaustion_once_per_cycle() {
        for k in 1..=6 {
            let mut r = rotator(k);
            for cycle in 0..3 {
                let results: Vec<bool> = (0..k).map(|_| r.rotate()).collect();
                let falses = results.iter().filter(|ok| !**ok).count();
                assert_eq!(falses, 1, "k={k} cycle={cycle}");
                assert_eq!(results.last(), Some(&false), "wrap happens on the k-th call");
                assert_eq!(r.cursor(), 0);
            }
        }
    }

    #[test]
    fn exhaustion_holds_from_any_starting_cursor() {
        let k = 4;
        let mut r = rotator(k);
        r.rotate();
        r.rotate();
        let falses = (0..k).filter(|_| !r.rotate()).count();
        assert_eq!(falses, 1);
    }

    #[test]
    fn single_key_pool_is_exhausted_immediately() {
        let mut r = rotator(1);
        assert!(!r.rotate());
        assert_eq!(r.current().unwrap(), "key-0");
    }

    #[test]
    fn headers_are_bound_to_host() {
        let mut r = rotator(2);
        r.rotate();
        let headers = r.headers_for("api.example.com").unwrap();
        assert_eq!(headers.key, "key-1");
        assert_eq!(headers.host, "api.example.com");
    }

    #[test]
    fn debug_output_never_contains_keys() {
        let r = rotator(2);
        let rendered = format!("{r:?} {:?}", r.headers_for("h").unwrap());
        assert!(!rendered.contains("key-0"));
    }

    #[tokio::test]
    async fn shared_rotator_serialises_access() {
        let shared = SharedRotator::new(rotator(3));
        let other = shared.clone();
        {
            let mut guard = shared.lock().await;
            assert!(guard.rotate());
        }
        let guard = other.lock().await;
        assert_eq!(guard.cursor(), 1);
    }
}
