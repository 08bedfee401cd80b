use thiserror::Error;

pub type Result<T> = std::result::Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("not enough labeled outcomes to train: need {needed}, got {got}")]
    NotEnoughSamples { needed: usize, got: usize },

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
