//! Convenience result type alias for hostkit.

use crate::error::AppError;

/// A specialized `Result` type for hostkit operations.
///
/// Plugin hooks and posted tasks return `AppResult<()>`.
pub type AppResult<T> = Result<T, AppError>;
