//! Shared error type and the next-character predictor seam.
//!
//! Everything that can fail in this crate returns [`GenResult`]. Failures are
//! configuration or programming errors, never transient ones, so nothing here
//! retries: an error means no partial tensor and no partial character.
//!
//! The [`Predictor`] trait is the only boundary to a trained model. The
//! sampler hands it a one-hot encoded window of shape `(1, maxlen, alphabet)`
//! and expects a probability vector over the alphabet back.

use ndarray::{Array1, Array3};
use std::path::PathBuf;
use thiserror::Error;

/// Error type for vectorization, sampling, and generation.
#[derive(Debug, Error)]
pub enum GenError {
    /// The corpus has no characters, so no alphabet can be built.
    #[error("corpus is empty")]
    EmptyCorpus,
    /// Window length or stride is zero, or the window does not fit the corpus.
    #[error("invalid window parameters: {0}")]
    InvalidWindowParams(String),
    /// A character outside the alphabet was encountered while encoding.
    #[error("character {0:?} is not in the alphabet")]
    UnknownCharacter(char),
    /// Sampling temperature is not strictly positive.
    #[error("temperature must be a finite value > 0, got {0}")]
    InvalidTemperature(f64),
    /// A probability vector has non-positive entries or does not sum to 1.
    #[error("invalid probability vector: {0}")]
    InvalidProbability(String),
    /// Tensor dimensions disagree with the alphabet or window length.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The predictor itself failed.
    #[error("predictor failed: {0}")]
    Predictor(String),
    /// Run configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem error with the path being processed, when known.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error.
        source: std::io::Error,
        /// Path associated with the failure.
        path: Option<PathBuf>,
    },
    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl GenError {
    /// Wrap an IO error, attaching the path that was being read or written.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }
}

impl From<serde_json::Error> for GenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type GenResult<T> = Result<T, GenError>;

/// Next-character model used by the generation loop.
///
/// `input` is a one-hot window of shape `(1, maxlen, alphabet_size)`. The
/// returned vector has one probability per alphabet index, each strictly
/// positive and summing to 1.
///
/// Any closure `Fn(&Array3<f32>) -> GenResult<Array1<f64>>` is a predictor,
/// which is how tests and callers plug in an external model.
pub trait Predictor {
    fn predict(&self, input: &Array3<f32>) -> GenResult<Array1<f64>>;
}

impl<F> Predictor for F
where
    F: Fn(&Array3<f32>) -> GenResult<Array1<f64>>,
{
    fn predict(&self, input: &Array3<f32>) -> GenResult<Array1<f64>> {
        self(input)
    }
}
