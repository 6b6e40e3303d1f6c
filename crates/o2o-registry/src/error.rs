//! Registry-level errors, converted to `o2o_core::GatewayError` at the
//! crate boundary.

use o2o_core::{GatewayError, GatewayErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no backend credentials available")]
    NoBackends,
    #[error("no channel or credential permits model {0:?}")]
    ModelNotPermitted(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Persist(#[from] o2o_persist::PersistError),
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::NoBackends => GatewayError::new(GatewayErrorKind::NoBackends, err.to_string()),
            RegistryError::ModelNotPermitted(_) => {
                GatewayError::new(GatewayErrorKind::PermissionError, err.to_string())
            }
            RegistryError::InvalidInput(_) => {
                GatewayError::new(GatewayErrorKind::InvalidRequest, err.to_string())
            }
            RegistryError::Persist(_) => GatewayError::new(GatewayErrorKind::ServerError, err.to_string()),
        }
    }
}
