//! # chargen
//!
//! Character-level corpus vectorization and temperature sampling for
//! next-character text generation.
//!
//! ## Overview
//!
//! A corpus is lowercased and cut into overlapping windows of `maxlen`
//! characters every `step` characters. Each window and the character after it
//! become one row of the one-hot training tensors `x` and `y`. After a model
//! has been fitted to those tensors, [`generate`] grows a seed window one
//! character at a time: the model's next-character distribution is sharpened
//! or flattened by a temperature and a single category is drawn from it.
//!
//! ```no_run
//! use chargen::{encode, extract_windows, Corpus, CountModel};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # fn main() -> chargen::GenResult<()> {
//! let corpus = Corpus::from_text("to be or not to be, that is the question");
//! let alphabet = corpus.alphabet()?;
//! let batch = encode(extract_windows(corpus.chars(), 8, 2)?, &alphabet)?;
//!
//! let mut model = CountModel::new(alphabet.size(), 3, 0.01)?;
//! model.fit(batch.x.view(), batch.y.view())?;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let seed = corpus.random_seed_window(&mut rng, 8)?;
//! let text = chargen::generate(&model, &seed, &alphabet, 8, 0.5, 100, &mut rng)?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Structure
//!
//! - [`core`]: Error type and the [`Predictor`] seam to a trained model
//! - [`data`]: Corpus loading, alphabet, windowing, one-hot encoding
//! - [`sampling`]: Temperature reweighting, categorical draws, generation loop
//! - [`training`]: Count-based reference predictor fitted from `(x, y)`
//! - [`persist`]: Alphabet JSON save/load

pub mod core;
pub mod data;
pub mod persist;
pub mod sampling;
pub mod training;

pub use crate::core::{GenError, GenResult, Predictor};
pub use data::{
    count_windows, encode, encode_window, extract_windows, load_corpus, Alphabet, Corpus,
    EncodedBatch, Window, Windows,
};
pub use sampling::{draw_index, generate, reweight, GenerationBuffer};
pub use training::{rows_per_epoch, train_epoch, CountModel, Metrics};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run configuration for vectorization, fitting, and generation.
///
/// Missing fields in a JSON file fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window length in characters.
    pub maxlen: usize,
    /// Stride between window starts.
    pub step: usize,
    /// Temperatures to sample at after every epoch.
    pub temperatures: Vec<f64>,
    /// Characters generated per temperature.
    pub generate_count: usize,
    /// Number of fit-then-sample rounds.
    pub epochs: usize,
    /// Context length of the count model.
    pub order: usize,
    /// Additive smoothing of the count model.
    pub smoothing: f64,
    /// RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maxlen: 60,
            step: 3,
            temperatures: vec![0.2, 0.5, 1.0, 1.2],
            generate_count: 400,
            epochs: 60,
            order: 3,
            smoothing: 0.01,
            seed: None,
        }
    }
}

impl Config {
    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::Io`] if the file cannot be read and
    /// [`GenError::Serialization`] if it is not valid JSON for this struct.
    pub fn load(path: &Path) -> GenResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GenError::io(e, Some(path.to_path_buf())))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Check the invariants a run needs.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] naming the first field that fails.
    pub fn validate(&self) -> GenResult<()> {
        if self.maxlen == 0 {
            return Err(GenError::InvalidConfig(
                "maxlen must be greater than 0".into(),
            ));
        }
        if self.step == 0 {
            return Err(GenError::InvalidConfig("step must be greater than 0".into()));
        }
        if self.temperatures.is_empty() {
            return Err(GenError::InvalidConfig(
                "at least one temperature is required".into(),
            ));
        }
        if let Some(t) = self
            .temperatures
            .iter()
            .find(|t| !(t.is_finite() && **t > 0.0))
        {
            return Err(GenError::InvalidConfig(format!(
                "temperatures must be finite values > 0, got {t}"
            )));
        }
        if self.epochs == 0 {
            return Err(GenError::InvalidConfig(
                "epochs must be greater than 0".into(),
            ));
        }
        if self.order == 0 {
            return Err(GenError::InvalidConfig(
                "order must be greater than 0".into(),
            ));
        }
        if !(self.smoothing.is_finite() && self.smoothing > 0.0) {
            return Err(GenError::InvalidConfig(format!(
                "smoothing must be a finite value > 0, got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}
