//! CLI crate for the o2o gateway: the composition root that wires the
//! registries, the HTTP client and the proxy server together, plus the
//! command surface operators use to manage them without a restart.

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod presentation;

pub use bootstrap::{bootstrap, CliContext};
pub use commands::{AccessCommand, ChannelsCommand, Cli, Commands, KeysCommand, TokensCommand};
