//! In-memory session registry with recency-ordered TTL eviction.
//!
//! This crate provides:
//! - A concurrent token → session map ([`SessionRegistry`])
//! - Per-session data partitioned by tenant/application key ([`Session`])
//! - An eviction order that lets expiry sweeps stop at the first live session
//! - Token issuance from an injectable entropy source with a logged fallback
//! - An optional tokio task that sweeps on an interval ([`Sweeper`])
//!
//! # Example
//!
//! ```rust,ignore
//! use sessionset::{RegistryConfig, SessionRegistry, partition_key};
//!
//! let registry = SessionRegistry::new(
//!     RegistryConfig::default().with_ttl(Duration::from_secs(3600)),
//! );
//!
//! let session = registry.get(cookie_token.unwrap_or_default());
//! session.scope(&partition_key(request.path())).set("user", "alice");
//! ```

mod clock;
mod config;
mod error;
mod order;
mod partition;
mod registry;
mod session;
mod sweeper;
mod token;
mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, RegistryConfig};
pub use error::{Error, Result};
pub use order::EvictionOrder;
pub use partition::{DEFAULT_PARTITION, partition_key};
pub use registry::{PruneReport, RegistryStats, SessionRegistry};
pub use session::{Partition, Scope, Session};
pub use sweeper::{Sweeper, SweeperHandle};
pub use token::{EntropySource, OsEntropy, TOKEN_BYTES, TokenGenerator};
pub use value::Value;
