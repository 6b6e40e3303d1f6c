//! Domain types, port traits and configuration shared by every o2o gateway crate.
//!
//! This crate has no axum/reqwest/clap dependency: it is the composition
//! root's domain layer — pure domain modeling plus the trait boundaries
//! ("ports") that adapters elsewhere in the workspace implement.

pub mod config;
pub mod domain;
pub mod error;
pub mod paths;
pub mod ports;

pub use domain::*;
pub use error::{GatewayError, GatewayErrorKind};
