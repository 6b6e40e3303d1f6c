//! In-memory backend, channel, token, rate-limit and access-control
//! registries for the o2o gateway: the process-wide mutable state the
//! request pipeline reads and updates on every call.

pub mod access_control;
pub mod channel_registry;
pub mod credential_registry;
pub mod error;
pub mod ids;
pub mod rate_limiter;
pub mod selector;
pub mod stats_registry;
pub mod token_registry;
pub mod url;

pub use access_control::AccessControlRegistry;
pub use channel_registry::ChannelRegistry;
pub use credential_registry::{AddKeyOutcome, CredentialRegistry};
pub use error::RegistryError;
pub use rate_limiter::{Decision, LimitType, RateLimiter};
pub use selector::{Selection, Selector};
pub use stats_registry::StatsRegistry;
pub use token_registry::{CreateTokenOptions, TokenOutcome, TokenRegistry};
