//! Character alphabet for one-hot encoding.
//!
//! The alphabet is built from the corpus itself: every distinct character,
//! sorted by code point, gets the index of its sorted position. Two runs over
//! the same corpus therefore always agree on the encoding.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::core::{GenError, GenResult};

/// Bijective character-to-index mapping over the corpus characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlphabetRepr", into = "AlphabetRepr")]
pub struct Alphabet {
    /// Characters in index order (ascending code point).
    chars: Vec<char>,
    /// Reverse mapping from character to index.
    char_to_idx: HashMap<char, usize>,
}

/// On-disk form: only the ordered characters, the index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct AlphabetRepr {
    chars: Vec<char>,
}

impl TryFrom<AlphabetRepr> for Alphabet {
    type Error = String;

    /// Stored characters must already be strictly ascending; re-sorting would
    /// move indices away from the tensors they were written with.
    fn try_from(repr: AlphabetRepr) -> Result<Self, Self::Error> {
        if let Some(pair) = repr.chars.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(format!(
                "alphabet characters must be strictly ascending, found {:?} before {:?}",
                pair[0], pair[1]
            ));
        }
        Ok(Self::from_sorted(repr.chars.into_iter().collect::<BTreeSet<_>>()))
    }
}

impl From<Alphabet> for AlphabetRepr {
    fn from(alphabet: Alphabet) -> Self {
        Self {
            chars: alphabet.chars,
        }
    }
}

impl Alphabet {
    /// Build the alphabet of distinct characters in `corpus`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::EmptyCorpus`] if `corpus` has no characters.
    pub fn from_corpus(corpus: &[char]) -> GenResult<Self> {
        if corpus.is_empty() {
            return Err(GenError::EmptyCorpus);
        }
        Ok(Self::from_sorted(corpus.iter().copied().collect()))
    }

    /// Build the alphabet of distinct characters in a string.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::EmptyCorpus`] if `text` is empty.
    pub fn from_text(text: &str) -> GenResult<Self> {
        let chars: Vec<char> = text.chars().collect();
        Self::from_corpus(&chars)
    }

    fn from_sorted(set: BTreeSet<char>) -> Self {
        let chars: Vec<char> = set.into_iter().collect();
        let char_to_idx = chars.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { chars, char_to_idx }
    }

    /// Number of characters in the alphabet.
    #[must_use]
    pub fn size(&self) -> usize {
        self.chars.len()
    }

    /// Characters in index order.
    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Get the index for a character, or `None` if not in the alphabet.
    #[must_use]
    pub fn char_to_index(&self, c: char) -> Option<usize> {
        self.char_to_idx.get(&c).copied()
    }

    /// Get the character for an index, or `None` if out of bounds.
    #[must_use]
    pub fn index_to_char(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    /// Like [`Alphabet::char_to_index`], but unknown characters are an error.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownCharacter`] if `c` is not in the alphabet.
    pub fn index_of(&self, c: char) -> GenResult<usize> {
        self.char_to_index(c).ok_or(GenError::UnknownCharacter(c))
    }

    /// One-hot encode a single character as a vector of length `self.size()`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownCharacter`] if `c` is not in the alphabet.
    pub fn one_hot(&self, c: char) -> GenResult<Array1<f32>> {
        let idx = self.index_of(c)?;
        let mut v = Array1::zeros(self.size());
        v[idx] = 1.0;
        Ok(v)
    }

    /// Decode a one-hot row back to its character.
    ///
    /// Returns `None` unless the row has the alphabet's length, exactly one
    /// entry equal to 1, and zeros everywhere else.
    #[must_use]
    pub fn decode_one_hot(&self, row: ArrayView1<'_, f32>) -> Option<char> {
        one_hot_index(row, self.size()).and_then(|idx| self.index_to_char(idx))
    }
}

/// Index of the single hot entry in `row`, if `row` is a valid one-hot row of
/// length `size`.
pub(crate) fn one_hot_index(row: ArrayView1<'_, f32>, size: usize) -> Option<usize> {
    if row.len() != size {
        return None;
    }
    let mut hot = None;
    for (i, &v) in row.iter().enumerate() {
        if v == 1.0 {
            if hot.is_some() {
                return None;
            }
            hot = Some(i);
        } else if v != 0.0 {
            return None;
        }
    }
    hot
}
