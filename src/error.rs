//! Error type shared by derivation, interpretation and rasterization.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between a grammar and a persisted image.
#[derive(Debug, Error)]
pub enum LsysError {
    /// A production rule is malformed (bad weights, duplicate predecessor, ...).
    #[error("invalid rule for `{predecessor}`: {reason}")]
    InvalidRule { predecessor: String, reason: String },

    /// A symbol outside the declared alphabet of a strict grammar.
    #[error("unknown symbol `{symbol}` in {context}")]
    UnknownSymbol { symbol: String, context: String },

    /// A `]` was read while the branch stack was empty.
    #[error("unbalanced `]` at letter {index}")]
    UnbalancedBracket { index: usize },

    /// The word ended with branches still open.
    #[error("{depth} branch(es) left open at end of word")]
    UnclosedBranch { depth: usize },

    /// A rendering or derivation parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A derived word grew past the configured length cap.
    #[error("generation {generation} produced {length} letters (limit {limit})")]
    WordLimitExceeded {
        generation: usize,
        length: usize,
        limit: usize,
    },

    /// The canvas could not be written.
    #[error("failed to write image to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LsysError>;
