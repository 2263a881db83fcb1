//! Error taxonomy shared by the pipeline and the HTTP boundary.
//!
//! Functions propagate `anyhow::Error`; when a failure belongs to one of the
//! classes below it carries an [`AnalysisError`] so the request boundary can
//! recover the class by downcast and map it to an HTTP status. Messages are
//! user-facing (Spanish) and rendered verbatim in the error envelope.

use std::fmt;

/// Failure classes with distinct handling at the request boundary.
#[derive(Debug)]
pub enum AnalysisError {
    /// Client-caused input problem: empty question, missing or invalid file,
    /// disallowed extension, unknown preset. Mapped to 400, never logged as
    /// exceptional.
    InvalidInput(String),
    /// Missing API credential or an uninitialized reference base. Mapped to 500.
    Configuration(String),
    /// The PDF yielded no extractable text (typically a scan without OCR).
    /// Mapped to 400; the user can supply a different file.
    Extraction(String),
    /// Similarity search attempted on an unbuilt base. A call-ordering bug,
    /// not a user error. Mapped to 500 and logged as an error.
    NotBuilt(String),
    /// The embedding or completion provider failed after retries. Mapped to 500.
    Provider(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg)
            | AnalysisError::Configuration(msg)
            | AnalysisError::Extraction(msg)
            | AnalysisError::NotBuilt(msg)
            | AnalysisError::Provider(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}
