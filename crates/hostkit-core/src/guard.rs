//! Panic isolation for plugin hooks and posted tasks.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::AppError;
use crate::result::AppResult;

/// Runs `f`, turning a panic into an [`AppError`] of kind `Panic`.
///
/// `origin` is used in the error message, e.g. `"task"` or
/// `"plugin 'db' shutdown"`.
pub fn catch_panic<T>(origin: &str, f: impl FnOnce() -> AppResult<T>) -> AppResult<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(AppError::from_panic(origin, payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_passes_through_result() {
        assert_eq!(catch_panic("ok", || Ok(5)).unwrap(), 5);
        let err = catch_panic::<()>("err", || Err(AppError::task("nope"))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Task);
    }

    #[test]
    fn test_converts_panic() {
        let err = catch_panic::<()>("task", || panic!("boom")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Panic);
        assert!(err.message.contains("boom"));
    }
}
