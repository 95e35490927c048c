//! Top-level error type for inference runs.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::CacheError;
use crate::compiler::CompileError;
use crate::framework::LoadError;
use crate::store::StoreError;

/// Any failure surfaced by the inference system.
///
/// Loader and compilation errors abort a run; query and update failures on
/// individual operations are recorded by the execution engine and do not
/// surface here (see [`crate::engine::RuleEngine::failures`]).
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// I/O failure on a user-supplied file
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Result type for inference operations
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Clip error-message context to at most 100 characters.
pub(crate) fn snippet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= 100 {
        return text.to_string();
    }
    let clipped: String = text.chars().take(100).collect();
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::snippet;

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("  hello  "), "hello");
    }

    #[test]
    fn test_snippet_long_text_clipped() {
        let long = "x".repeat(250);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), 103);
        assert!(s.ends_with("..."));
    }
}
