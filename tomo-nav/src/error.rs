//! Error types for tomo-nav

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("Geometry is empty: {0}")]
    EmptyGeometry(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl From<NavError> for tomo_core::Error {
    fn from(err: NavError) -> Self {
        tomo_core::Error::Validation(err.to_string())
    }
}
