use bridge_traits::BridgeError;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Flag store error: {0}")]
    Flags(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
