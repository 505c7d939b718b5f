use thiserror::Error;

use crate::model::SyntaxKind;

/// Errors that escape the core.
///
/// Most failures (stale edits, unreadable documents, unresolved targets) are
/// recovered locally and reported in summaries instead. Only the variants
/// below propagate to callers.
#[derive(Debug, Error)]
pub enum ImgrefError {
    #[error("cannot enumerate documents: {0}")]
    Enumeration(String),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("(de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ImgrefError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ImgrefError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Text resembles a link but does not cleanly match its grammar.
/// Never surfaced to users: the scanner just records no occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("text does not match the {kind} link grammar")]
pub struct ParseMiss {
    pub kind: SyntaxKind,
}
