//! Error types for trellis-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A value could not be converted to or from its JSON form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `reactive_from` was given something that does not serialize to a
    /// field map.
    #[error("Expected a value with named fields, got {found}")]
    NotAnObject { found: &'static str },

    /// An effect cascade nested deeper than the configured limit.
    ///
    /// The write path is infallible, so this surfaces as a panic carrying
    /// this message.
    #[error("Effect depth exceeded: {depth} effects already running")]
    EffectDepthExceeded { depth: usize },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
