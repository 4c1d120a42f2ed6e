//! Reference next-character predictor fitted from encoded batches.
//!
//! [`CountModel`] counts which character follows the last `order` characters
//! of each training window, with additive smoothing so every probability it
//! reports is strictly positive. Unseen contexts back off to the smoothed
//! unigram distribution. It reads the same one-hot tensors an external
//! trainer would and implements [`Predictor`], so the whole pipeline runs
//! without a neural network library.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array3, ArrayView2, ArrayView3, Axis};
use serde::Serialize;
use std::collections::HashMap;

use crate::core::{GenError, GenResult, Predictor};
use crate::data::vocab::one_hot_index;
use crate::data::EncodedBatch;

/// Metrics computed while fitting one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    /// Rows fitted.
    pub rows: usize,
    /// Mean `-ln p(target | context)` under the table as it was just before
    /// each row was added.
    pub loss: f64,
    /// Fraction of rows whose target was the most likely character at the
    /// time it was seen.
    pub accuracy: f64,
    /// Distinct contexts in the table after fitting.
    pub contexts: usize,
}

#[derive(Debug, Clone)]
struct Counts {
    counts: Vec<u64>,
    total: u64,
}

impl Counts {
    fn new(size: usize) -> Self {
        Self {
            counts: vec![0; size],
            total: 0,
        }
    }

    fn add(&mut self, idx: usize) {
        self.counts[idx] += 1;
        self.total += 1;
    }
}

/// Smoothed frequency table of next characters keyed by the preceding
/// `order` characters.
#[derive(Debug, Clone)]
pub struct CountModel {
    alphabet_size: usize,
    order: usize,
    smoothing: f64,
    contexts: HashMap<Vec<usize>, Counts>,
    unigram: Counts,
}

impl CountModel {
    /// Create an empty model.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if `alphabet_size` or `order` is
    /// zero, or `smoothing` is not a finite value above zero.
    pub fn new(alphabet_size: usize, order: usize, smoothing: f64) -> GenResult<Self> {
        if alphabet_size == 0 {
            return Err(GenError::InvalidConfig(
                "alphabet_size must be greater than 0".to_string(),
            ));
        }
        if order == 0 {
            return Err(GenError::InvalidConfig(
                "order must be greater than 0".to_string(),
            ));
        }
        if !(smoothing.is_finite() && smoothing > 0.0) {
            return Err(GenError::InvalidConfig(format!(
                "smoothing must be a finite value > 0, got {smoothing}"
            )));
        }
        Ok(Self {
            alphabet_size,
            order,
            smoothing,
            contexts: HashMap::new(),
            unigram: Counts::new(alphabet_size),
        })
    }

    #[must_use]
    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of distinct contexts seen so far.
    #[must_use]
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    /// Total rows fitted so far.
    #[must_use]
    pub fn rows_seen(&self) -> u64 {
        self.unigram.total
    }

    /// Next-character distribution for a context of alphabet indices.
    #[must_use]
    pub fn distribution(&self, context: &[usize]) -> Array1<f64> {
        let counts = self.contexts.get(context).unwrap_or(&self.unigram);
        let denom = counts.total as f64 + self.smoothing * self.alphabet_size as f64;
        counts
            .counts
            .iter()
            .map(|&c| (c as f64 + self.smoothing) / denom)
            .collect()
    }

    /// Last `order` positions of a `(maxlen, alphabet_size)` window as indices.
    fn decode_context(&self, window: ArrayView2<'_, f32>) -> GenResult<Vec<usize>> {
        let maxlen = window.len_of(Axis(0));
        let from = maxlen.saturating_sub(self.order);
        (from..maxlen)
            .map(|t| {
                one_hot_index(window.index_axis(Axis(0), t), self.alphabet_size).ok_or_else(
                    || GenError::ShapeMismatch(format!("window position {t} is not one-hot")),
                )
            })
            .collect()
    }

    fn check_width(&self, width: usize, what: &str) -> GenResult<()> {
        if width != self.alphabet_size {
            return Err(GenError::ShapeMismatch(format!(
                "{what} has {width} columns, model alphabet has {}",
                self.alphabet_size
            )));
        }
        Ok(())
    }

    /// Add every `(x, y)` row to the table.
    ///
    /// Rows are decoded in parallel, then added in order. The reported loss
    /// is prequential: each row is scored before it is counted.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ShapeMismatch`] if the tensors disagree with each
    /// other or with the model alphabet, or a row is not one-hot. Nothing is
    /// added to the table in that case.
    pub fn fit(&mut self, x: ArrayView3<'_, f32>, y: ArrayView2<'_, f32>) -> GenResult<Metrics> {
        let (rows, _, x_width) = x.dim();
        let (y_rows, y_width) = y.dim();
        self.check_width(x_width, "x")?;
        self.check_width(y_width, "y")?;
        if rows != y_rows {
            return Err(GenError::ShapeMismatch(format!(
                "x has {rows} rows but y has {y_rows}"
            )));
        }

        let model = &*self;
        let observations = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(y.axis_iter(Axis(0)).into_par_iter())
            .map(|(window, target)| -> GenResult<(Vec<usize>, usize)> {
                let context = model.decode_context(window)?;
                let target = one_hot_index(target, model.alphabet_size).ok_or_else(|| {
                    GenError::ShapeMismatch("target row is not one-hot".to_string())
                })?;
                Ok((context, target))
            })
            .collect::<GenResult<Vec<(Vec<usize>, usize)>>>()?;

        let size = self.alphabet_size;
        let mut total_loss = 0.0;
        let mut hits = 0usize;
        for (context, target) in observations {
            let probs = self.distribution(&context);
            total_loss -= probs[target].ln();
            if argmax(&probs) == target {
                hits += 1;
            }
            self.unigram.add(target);
            self.contexts
                .entry(context)
                .or_insert_with(|| Counts::new(size))
                .add(target);
        }

        let metrics = if rows == 0 {
            Metrics {
                contexts: self.contexts.len(),
                ..Metrics::default()
            }
        } else {
            Metrics {
                rows,
                loss: total_loss / rows as f64,
                accuracy: hits as f64 / rows as f64,
                contexts: self.contexts.len(),
            }
        };
        log::debug!(
            "fitted {} rows: loss {:.4}, {} contexts",
            metrics.rows,
            metrics.loss,
            metrics.contexts
        );
        Ok(metrics)
    }
}

fn argmax(v: &Array1<f64>) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map_or(0, |(i, _)| i)
}

impl Predictor for CountModel {
    fn predict(&self, input: &Array3<f32>) -> GenResult<Array1<f64>> {
        let (batch, _, width) = input.dim();
        if batch != 1 {
            return Err(GenError::ShapeMismatch(format!(
                "expected a single window, got a batch of {batch}"
            )));
        }
        self.check_width(width, "input")?;
        let context = self.decode_context(input.index_axis(Axis(0), 0))?;
        Ok(self.distribution(&context))
    }
}

/// Fit the `epoch`-th section of `batch`: rows
/// `epoch * rows_per_epoch .. (epoch + 1) * rows_per_epoch`, clamped to the
/// batch. Once the batch is exhausted this fits nothing and returns metrics
/// with `rows == 0`.
///
/// # Errors
///
/// Propagates [`CountModel::fit`] errors.
pub fn train_epoch(
    model: &mut CountModel,
    batch: &EncodedBatch,
    epoch: usize,
    rows_per_epoch: usize,
) -> GenResult<Metrics> {
    let (x, y) = batch.section(epoch.saturating_mul(rows_per_epoch), rows_per_epoch);
    model.fit(x, y)
}

/// Section size for [`train_epoch`]: `requested` if given, otherwise
/// `ceil(rows / epochs)` so the whole batch is fitted once over the run.
///
/// # Errors
///
/// Returns [`GenError::InvalidConfig`] if `requested` is `Some(0)` or
/// `epochs` is zero.
pub fn rows_per_epoch(requested: Option<usize>, rows: usize, epochs: usize) -> GenResult<usize> {
    if epochs == 0 {
        return Err(GenError::InvalidConfig(
            "epochs must be greater than 0".to_string(),
        ));
    }
    match requested {
        Some(0) => Err(GenError::InvalidConfig(
            "rows_per_epoch must be greater than 0".to_string(),
        )),
        Some(n) => Ok(n),
        None => Ok(rows.div_ceil(epochs).max(1)),
    }
}
