//! Domain types for the o2o gateway.
//!
//! These types represent gateway concepts (credentials, channels, tokens,
//! usage, access policy) independent of any persistence or transport
//! concern.

pub mod access;
pub mod backend_stats;
pub mod channel;
pub mod credential;
pub mod ratelimit;
pub mod token;
pub mod usage;

pub use access::{AccessEntry, AccessMode, AccessPolicy};
pub use backend_stats::{BackendStats, DailyOutcome};
pub use channel::Channel;
pub use credential::Credential;
pub use ratelimit::RateLimitBucket;
pub use token::{AuthToken, RateLimitOverride, TokenValidation};
pub use usage::{DailyUsage, UsageRecord};
