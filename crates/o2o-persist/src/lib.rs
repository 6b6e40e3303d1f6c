//! Debounced write-behind JSON persistence for the o2o gateway's stateful
//! registries: whole-file state snapshots rather than a query layer, so
//! persistence reduces to "serialize the current in-memory state to a
//! file, debounced."

pub mod error;
pub mod paths;
pub mod store;

pub use error::PersistError;
pub use store::{read_json, DebouncedJsonStore};
