use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("job registry error: {0}")]
    Registry(#[from] StoreError),
    #[error("report queue closed")]
    QueueClosed,
}
