//! Session token generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::warn;

use crate::error::{Error, Result};

/// Number of random bytes behind every token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Source of random bytes for tokens.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| Error::Entropy(e.to_string()))
    }
}

/// Produces URL-safe session tokens.
///
/// Tokens are [`TOKEN_BYTES`] random bytes encoded as unpadded URL-safe
/// base64. If the entropy source fails the generator falls back to encoding
/// the wall-clock nanosecond timestamp followed by the caller's counter. That
/// fallback is predictable and can collide under concurrency, so every use of
/// it is logged and counted.
pub struct TokenGenerator {
    entropy: Arc<dyn EntropySource>,
    degraded: AtomicU64,
}

impl TokenGenerator {
    /// Create a generator over the given entropy source.
    pub fn new(entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            entropy,
            degraded: AtomicU64::new(0),
        }
    }

    /// Generate a token. `counter` only feeds the degraded path.
    pub fn generate(&self, counter: u64) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        match self.entropy.fill(&mut bytes) {
            Ok(()) => URL_SAFE_NO_PAD.encode(bytes),
            Err(e) => {
                warn!(error = %e, counter, "Entropy unavailable, issuing timestamp-derived session token");
                self.fallback(counter)
            }
        }
    }

    /// Produce a timestamp-derived token without consulting the entropy
    /// source. Counted as degraded.
    pub fn fallback(&self, counter: u64) -> String {
        self.degraded.fetch_add(1, Ordering::Relaxed);
        URL_SAFE_NO_PAD.encode(fallback_seed(counter))
    }

    /// How many tokens were produced through the fallback path.
    pub fn degraded_count(&self) -> u64 {
        self.degraded.load(Ordering::Relaxed)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(Arc::new(OsEntropy))
    }
}

impl std::fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGenerator")
            .field("degraded", &self.degraded_count())
            .finish_non_exhaustive()
    }
}

fn fallback_seed(counter: u64) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{nanos}{counter}")
}

/// Short, log-safe prefix of a token.
pub(crate) fn prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
