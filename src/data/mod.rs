//! Corpus loading, character alphabet, and window vectorization.
//!
//! ## Submodules
//!
//! - [`vocab`]: Sorted character alphabet and one-hot encoding
//! - [`samples`]: Window extraction and `(x, y)` tensor encoding

pub mod samples;
pub mod vocab;

pub use samples::{
    count_windows, encode, encode_window, extract_windows, EncodedBatch, Window, Windows,
};
pub use vocab::Alphabet;

use rand::Rng;
use std::path::Path;

use crate::core::{GenError, GenResult};

/// Lowercased corpus text as characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    chars: Vec<char>,
}

impl Corpus {
    /// Lowercase `text` and store it as characters.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            chars: text.to_lowercase().chars().collect(),
        }
    }

    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Number of characters (not bytes).
    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Alphabet of the distinct corpus characters.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::EmptyCorpus`] if the corpus is empty.
    pub fn alphabet(&self) -> GenResult<Alphabet> {
        Alphabet::from_corpus(&self.chars)
    }

    /// Pick a uniformly random window of `maxlen` characters to seed
    /// generation. The start is drawn from `0..=len - maxlen - 1`, the same
    /// range training window starts come from.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidWindowParams`] if `maxlen` is zero or does
    /// not leave room for at least one target character.
    pub fn random_seed_window<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        maxlen: usize,
    ) -> GenResult<String> {
        if maxlen == 0 || maxlen >= self.len() {
            return Err(GenError::InvalidWindowParams(format!(
                "seed window of {maxlen} chars does not fit a corpus of {} chars",
                self.len()
            )));
        }
        let start = rng.gen_range(0..self.len() - maxlen);
        Ok(self.chars[start..start + maxlen].iter().collect())
    }
}

/// Read a text file and lowercase it into a [`Corpus`].
///
/// # Errors
///
/// Returns [`GenError::Io`] if the file cannot be read and
/// [`GenError::EmptyCorpus`] if it holds no text.
pub fn load_corpus(path: &Path) -> GenResult<Corpus> {
    let text =
        std::fs::read_to_string(path).map_err(|e| GenError::io(e, Some(path.to_path_buf())))?;
    let corpus = Corpus::from_text(&text);
    if corpus.is_empty() {
        return Err(GenError::EmptyCorpus);
    }
    log::info!("loaded corpus {} ({} chars)", path.display(), corpus.len());
    Ok(corpus)
}
