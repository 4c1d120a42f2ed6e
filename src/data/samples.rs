//! Corpus windowing and one-hot encoding for next-character prediction.
//!
//! A window is `maxlen` consecutive characters starting at a multiple of
//! `step`, paired with the character right after it. Windows are encoded into
//! `x` of shape `(n_windows, maxlen, alphabet_size)` and `y` of shape
//! `(n_windows, alphabet_size)`, one-hot along the last axis.

use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

use super::vocab::Alphabet;
use crate::core::{GenError, GenResult};

/// One training window and its target character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Position of the first window character in the corpus.
    pub start: usize,
    /// The `maxlen` window characters.
    pub chars: &'a [char],
    /// The character following the window.
    pub target: char,
}

impl Window<'_> {
    /// Corpus position of the target character (`start + maxlen`).
    #[must_use]
    pub fn target_position(&self) -> usize {
        self.start + self.chars.len()
    }

    /// Window characters as a string.
    #[must_use]
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }
}

/// Lazy iterator over the windows of a corpus.
///
/// Cloning restarts from the clone's current position, so a fresh clone of
/// the value returned by [`extract_windows`] replays every window.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    corpus: &'a [char],
    maxlen: usize,
    step: usize,
    next_start: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start;
        let end = start.checked_add(self.maxlen)?;
        if end >= self.corpus.len() {
            return None;
        }
        self.next_start = start.saturating_add(self.step);
        Some(Window {
            start,
            chars: &self.corpus[start..end],
            target: self.corpus[end],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next_start.checked_add(self.maxlen) {
            Some(end) if end < self.corpus.len() => (self.corpus.len() - end - 1) / self.step + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

fn check_window_params(corpus_len: usize, maxlen: usize, step: usize) -> GenResult<()> {
    if maxlen == 0 {
        return Err(GenError::InvalidWindowParams(
            "maxlen must be greater than 0".to_string(),
        ));
    }
    if step == 0 {
        return Err(GenError::InvalidWindowParams(
            "step must be greater than 0".to_string(),
        ));
    }
    if maxlen >= corpus_len {
        return Err(GenError::InvalidWindowParams(format!(
            "maxlen ({maxlen}) must be smaller than the corpus length ({corpus_len})"
        )));
    }
    Ok(())
}

/// Windows of `maxlen` characters at stride `step` over `corpus`.
///
/// Starts are `0, step, 2 * step, ...` while `start + maxlen < corpus.len()`,
/// so every window has a target inside the corpus.
///
/// # Errors
///
/// Returns [`GenError::InvalidWindowParams`] if `maxlen` or `step` is zero or
/// `maxlen >= corpus.len()`.
pub fn extract_windows(corpus: &[char], maxlen: usize, step: usize) -> GenResult<Windows<'_>> {
    check_window_params(corpus.len(), maxlen, step)?;
    Ok(Windows {
        corpus,
        maxlen,
        step,
        next_start: 0,
    })
}

/// Number of windows [`extract_windows`] yields for the given parameters:
/// `(corpus_len - maxlen - 1) / step + 1`.
///
/// # Errors
///
/// Same conditions as [`extract_windows`].
pub fn count_windows(corpus_len: usize, maxlen: usize, step: usize) -> GenResult<usize> {
    check_window_params(corpus_len, maxlen, step)?;
    Ok((corpus_len - maxlen - 1) / step + 1)
}

/// One-hot encoded training tensors.
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    /// Inputs, shape `(n_windows, maxlen, alphabet_size)`.
    pub x: Array3<f32>,
    /// Targets, shape `(n_windows, alphabet_size)`.
    pub y: Array2<f32>,
}

impl EncodedBatch {
    /// Number of encoded windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len_of(Axis(0))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window length the batch was encoded with.
    #[must_use]
    pub fn maxlen(&self) -> usize {
        self.x.len_of(Axis(1))
    }

    /// Read-only views over rows `offset..offset + len`, clamped to the batch.
    #[must_use]
    pub fn section(&self, offset: usize, len: usize) -> (ArrayView3<'_, f32>, ArrayView2<'_, f32>) {
        let start = offset.min(self.len());
        let end = offset.saturating_add(len).min(self.len());
        (
            self.x.slice(s![start..end, .., ..]),
            self.y.slice(s![start..end, ..]),
        )
    }
}

/// Encode windows into one-hot `(x, y)` tensors.
///
/// Every character is resolved against the alphabet before the tensors are
/// allocated, so an unknown character leaves nothing half-built. Rows are
/// then filled in parallel; each worker owns a disjoint row of `x` and `y`.
///
/// # Errors
///
/// Returns [`GenError::UnknownCharacter`] for a character outside `alphabet`,
/// or [`GenError::ShapeMismatch`] if the windows differ in length.
pub fn encode<'a, I>(windows: I, alphabet: &Alphabet) -> GenResult<EncodedBatch>
where
    I: IntoIterator<Item = Window<'a>>,
{
    let mut maxlen = None;
    let rows = windows
        .into_iter()
        .map(|window| -> GenResult<(Vec<usize>, usize)> {
            let len = *maxlen.get_or_insert(window.chars.len());
            if window.chars.len() != len {
                return Err(GenError::ShapeMismatch(format!(
                    "window at {} has {} characters, expected {len}",
                    window.start,
                    window.chars.len()
                )));
            }
            let inputs = window
                .chars
                .iter()
                .map(|&c| alphabet.index_of(c))
                .collect::<GenResult<Vec<usize>>>()?;
            Ok((inputs, alphabet.index_of(window.target)?))
        })
        .collect::<GenResult<Vec<(Vec<usize>, usize)>>>()?;

    let n = rows.len();
    let maxlen = maxlen.unwrap_or(0);
    let vocab_size = alphabet.size();
    let mut x = Array3::<f32>::zeros((n, maxlen, vocab_size));
    let mut y = Array2::<f32>::zeros((n, vocab_size));

    x.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(y.axis_iter_mut(Axis(0)).into_par_iter())
        .zip(rows.par_iter())
        .for_each(|((mut x_row, mut y_row), (inputs, target))| {
            for (t, &idx) in inputs.iter().enumerate() {
                x_row[[t, idx]] = 1.0;
            }
            y_row[*target] = 1.0;
        });

    log::debug!("encoded {n} windows of {maxlen} chars over {vocab_size} symbols");
    Ok(EncodedBatch { x, y })
}

/// One-hot encode a single window as shape `(1, chars.len(), alphabet_size)`.
///
/// # Errors
///
/// Returns [`GenError::UnknownCharacter`] for a character outside `alphabet`.
pub fn encode_window(chars: &[char], alphabet: &Alphabet) -> GenResult<Array3<f32>> {
    let mut x = Array3::zeros((1, chars.len(), alphabet.size()));
    for (t, &c) in chars.iter().enumerate() {
        x[[0, t, alphabet.index_of(c)?]] = 1.0;
    }
    Ok(x)
}
