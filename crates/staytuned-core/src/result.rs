//! Convenience result type alias for StayTuned.

use crate::error::AppError;

/// A specialized `Result` type for StayTuned operations.
pub type AppResult<T> = Result<T, AppError>;
