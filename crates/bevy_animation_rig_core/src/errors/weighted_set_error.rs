use thiserror::Error;

/// Errors raised when editing a [`WeightedTransformSet`](crate::weighted::WeightedTransformSet).
#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WeightedSetError {
    #[error("weighted transform set is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("index {index} is out of range for a set of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
