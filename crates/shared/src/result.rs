//! Result helpers for shared error handling.

use crate::errors::ErrorEnvelope;

/// Shared result type used across the workspace.
pub type Result<T, E = ErrorEnvelope> = std::result::Result<T, E>;

/// Extension helpers for results carrying an [`ErrorEnvelope`].
pub trait ResultExt<T> {
    /// Attach a metadata entry to the error, leaving success untouched.
    fn with_error_metadata(self, key: &str, value: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_error_metadata(self, key: &str, value: impl Into<String>) -> Result<T> {
        self.map_err(|error| error.with_metadata(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn attaches_metadata_to_errors_only() {
        let error: Result<i32> = Err(ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad"));
        let tagged = error.with_error_metadata("field", "name");
        assert!(
            matches!(tagged, Err(ref e) if e.metadata.get("field").map(String::as_str) == Some("name"))
        );

        let ok: Result<i32> = Ok(1);
        assert!(matches!(ok.with_error_metadata("field", "name"), Ok(1)));
    }
}
