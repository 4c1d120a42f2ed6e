//! Temperature sampling and the character generation loop.
//!
//! ## Reweighting
//!
//! ```text
//! q_i = exp(ln(p_i) / T) / Σ_j exp(ln(p_j) / T)
//! ```
//!
//! `T = 1` returns the input distribution, `T → 0⁺` concentrates all mass on
//! the mode, and large `T` flattens towards uniform. The draw afterwards is a
//! single categorical trial, never an argmax.

use ndarray::Array1;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::collections::VecDeque;

use crate::core::{GenError, GenResult, Predictor};
use crate::data::{encode_window, Alphabet};

/// Allowed deviation of a probability vector's sum from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

fn check_temperature(temperature: f64) -> GenResult<()> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(GenError::InvalidTemperature(temperature))
    }
}

fn check_probabilities(probs: &Array1<f64>) -> GenResult<()> {
    if probs.is_empty() {
        return Err(GenError::InvalidProbability(
            "probability vector is empty".to_string(),
        ));
    }
    if let Some((i, p)) = probs
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
        return Err(GenError::InvalidProbability(format!(
            "entry {i} is {p}, every entry must be > 0"
        )));
    }
    let sum = probs.sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(GenError::InvalidProbability(format!(
            "entries sum to {sum}, expected 1"
        )));
    }
    Ok(())
}

/// Sharpen or flatten `probs` by `temperature` and renormalize.
///
/// Works in log space and subtracts the largest scaled log-probability before
/// exponentiating, so very small temperatures stay finite.
///
/// # Errors
///
/// Returns [`GenError::InvalidTemperature`] if `temperature` is not a finite
/// value above zero, and [`GenError::InvalidProbability`] if `probs` is empty,
/// has an entry `<= 0`, or does not sum to 1 within
/// [`PROBABILITY_TOLERANCE`].
pub fn reweight(probs: &Array1<f64>, temperature: f64) -> GenResult<Array1<f64>> {
    check_temperature(temperature)?;
    check_probabilities(probs)?;

    let scaled = probs.mapv(|p| p.ln() / temperature);
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = scaled.mapv(|s| (s - max).exp());
    let total = exp.sum();
    Ok(exp / total)
}

/// Draw one category from `probs`, weighted by its probabilities.
///
/// # Errors
///
/// Returns [`GenError::InvalidProbability`] if `probs` is empty, has negative
/// or non-finite weights, or sums to zero or past `f64::MAX`.
pub fn draw_index<R: Rng + ?Sized>(probs: &Array1<f64>, rng: &mut R) -> GenResult<usize> {
    if let Some((i, w)) = probs.iter().enumerate().find(|(_, w)| !w.is_finite()) {
        return Err(GenError::InvalidProbability(format!(
            "weight {i} is {w}, every weight must be finite"
        )));
    }
    // WeightedIndex panics on a non-finite total rather than returning Err.
    let total = probs.sum();
    if !total.is_finite() {
        return Err(GenError::InvalidProbability(format!(
            "weights sum to {total}"
        )));
    }
    let dist = WeightedIndex::<f64>::new(probs.iter())
        .map_err(|e| GenError::InvalidProbability(e.to_string()))?;
    Ok(dist.sample(rng))
}

/// Fixed-length sliding window of the most recent characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBuffer {
    chars: VecDeque<char>,
}

impl GenerationBuffer {
    /// Start a buffer from a seed; its length is the buffer length for good.
    #[must_use]
    pub fn new(seed: &str) -> Self {
        Self {
            chars: seed.chars().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Append `c` and drop the oldest character.
    pub fn push(&mut self, c: char) {
        self.chars.push_back(c);
        self.chars.pop_front();
    }

    /// Current contents, oldest first.
    #[must_use]
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// One-hot encode the buffer as shape `(1, len, alphabet_size)`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownCharacter`] for a character outside `alphabet`.
    pub fn encode(&mut self, alphabet: &Alphabet) -> GenResult<ndarray::Array3<f32>> {
        encode_window(self.chars.make_contiguous(), alphabet)
    }
}

/// Extend `seed` by `count` characters sampled from `predictor`.
///
/// Each step encodes the current `maxlen`-character buffer, asks the
/// predictor for a distribution, reweights it at `temperature`, draws an
/// index, and slides the buffer forward by the drawn character. Steps are
/// strictly sequential since every input depends on the previous draw.
///
/// Returns `seed` followed by the generated characters.
///
/// # Errors
///
/// - [`GenError::InvalidTemperature`] for a temperature that is not `> 0`
/// - [`GenError::InvalidWindowParams`] if `seed` is not exactly `maxlen` chars
/// - [`GenError::UnknownCharacter`] if `seed` has a character outside `alphabet`
/// - [`GenError::ShapeMismatch`] if the predictor returns the wrong length
/// - anything `predictor` or [`reweight`] reports
pub fn generate<P, R>(
    predictor: &P,
    seed: &str,
    alphabet: &Alphabet,
    maxlen: usize,
    temperature: f64,
    count: usize,
    rng: &mut R,
) -> GenResult<String>
where
    P: Predictor + ?Sized,
    R: Rng + ?Sized,
{
    check_temperature(temperature)?;
    let seed_len = seed.chars().count();
    if maxlen == 0 || seed_len != maxlen {
        return Err(GenError::InvalidWindowParams(format!(
            "seed has {seed_len} characters, expected maxlen = {maxlen} > 0"
        )));
    }
    if let Some(c) = seed.chars().find(|&c| alphabet.char_to_index(c).is_none()) {
        return Err(GenError::UnknownCharacter(c));
    }

    let mut buffer = GenerationBuffer::new(seed);
    let mut generated = String::with_capacity(seed.len() + count);
    generated.push_str(seed);

    for _ in 0..count {
        let input = buffer.encode(alphabet)?;
        let probs = predictor.predict(&input)?;
        if probs.len() != alphabet.size() {
            return Err(GenError::ShapeMismatch(format!(
                "predictor returned {} probabilities for an alphabet of {}",
                probs.len(),
                alphabet.size()
            )));
        }
        let adjusted = reweight(&probs, temperature)?;
        let idx = draw_index(&adjusted, rng)?;
        let next = alphabet.index_to_char(idx).ok_or_else(|| {
            GenError::ShapeMismatch(format!("drawn index {idx} is outside the alphabet"))
        })?;
        generated.push(next);
        buffer.push(next);
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reweight_sums_to_one() {
        let probs = arr1(&[0.1, 0.2, 0.3, 0.4]);
        for &t in &[0.05, 0.2, 0.5, 1.0, 1.2, 5.0] {
            let q = reweight(&probs, t).expect("valid input");
            assert_abs_diff_eq!(q.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reweight_identity_at_unit_temperature() {
        let probs = arr1(&[0.6, 0.25, 0.15]);
        let q = reweight(&probs, 1.0).expect("valid input");
        for (a, b) in probs.iter().zip(q.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reweight_high_temperature_flattens() {
        let probs = arr1(&[0.7, 0.2, 0.1]);
        let q = reweight(&probs, 100.0).expect("valid input");
        assert!(q[0] < probs[0]);
        assert!(q[2] > probs[2]);
        assert!(q[0] - q[2] < 0.05);
    }

    #[test]
    fn test_reweight_tiny_temperature_stays_finite() {
        let probs = arr1(&[0.5, 0.3, 0.2]);
        let q = reweight(&probs, 1e-6).expect("valid input");
        assert!(q.iter().all(|p| p.is_finite()));
        assert_abs_diff_eq!(q[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reweight_rejects_bad_temperature() {
        let probs = arr1(&[0.5, 0.5]);
        for &t in &[0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                reweight(&probs, t),
                Err(GenError::InvalidTemperature(_))
            ));
        }
    }

    #[test]
    fn test_reweight_rejects_bad_probabilities() {
        let cases = [
            arr1(&[]),
            arr1(&[1.0, 0.0]),
            arr1(&[1.2, -0.2]),
            arr1(&[0.5, 0.4]),
            arr1(&[f64::NAN, 0.5]),
        ];
        for probs in &cases {
            assert!(matches!(
                reweight(probs, 1.0),
                Err(GenError::InvalidProbability(_))
            ));
        }
    }

    #[test]
    fn test_reweight_accepts_sum_within_tolerance() {
        let probs = arr1(&[0.5, 0.5 + 5e-7]);
        assert!(reweight(&probs, 1.0).is_ok());
    }

    #[test]
    fn test_draw_index_single_category() {
        let mut rng = StdRng::seed_from_u64(1);
        let probs = arr1(&[1.0]);
        for _ in 0..10 {
            assert_eq!(draw_index(&probs, &mut rng).expect("valid"), 0);
        }
    }

    #[test]
    fn test_draw_index_is_not_argmax() {
        let mut rng = StdRng::seed_from_u64(2);
        let probs = arr1(&[0.6, 0.4]);
        let ones = (0..1000)
            .filter(|_| draw_index(&probs, &mut rng).expect("valid") == 1)
            .count();
        assert!(ones > 300 && ones < 500, "drew index 1 {ones} times");
    }

    #[test]
    fn test_draw_index_rejects_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            draw_index(&arr1(&[]), &mut rng),
            Err(GenError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_buffer_slides() {
        let mut buffer = GenerationBuffer::new("abcd");
        buffer.push('e');
        buffer.push('f');
        assert_eq!(buffer.text(), "cdef");
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_buffer_encode() {
        let alphabet = Alphabet::from_text("abc").expect("non-empty");
        let mut buffer = GenerationBuffer::new("cab");
        buffer.push('c');
        let x = buffer.encode(&alphabet).expect("encode");
        assert_eq!(x.shape(), &[1, 3, 3]);
        assert_eq!(x[[0, 0, 0]], 1.0); // 'a'
        assert_eq!(x[[0, 1, 1]], 1.0); // 'b'
        assert_eq!(x[[0, 2, 2]], 1.0); // 'c'
    }

    #[test]
    fn test_generate_zero_count_returns_seed() {
        let alphabet = Alphabet::from_text("abc").expect("non-empty");
        let predictor = |_: &Array3<f32>| -> GenResult<Array1<f64>> {
            Err(GenError::Predictor("must not be called".to_string()))
        };
        let mut rng = StdRng::seed_from_u64(0);
        let out = generate(&predictor, "abc", &alphabet, 3, 0.5, 0, &mut rng).expect("generate");
        assert_eq!(out, "abc");
    }

    #[test]
    fn test_generate_rejects_wrong_seed_length() {
        let alphabet = Alphabet::from_text("abc").expect("non-empty");
        let predictor =
            |_: &Array3<f32>| -> GenResult<Array1<f64>> { Ok(arr1(&[0.2, 0.3, 0.5])) };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            generate(&predictor, "ab", &alphabet, 3, 1.0, 5, &mut rng),
            Err(GenError::InvalidWindowParams(_))
        ));
        assert!(matches!(
            generate(&predictor, "abz", &alphabet, 3, 1.0, 5, &mut rng),
            Err(GenError::UnknownCharacter('z'))
        ));
        assert!(matches!(
            generate(&predictor, "abc", &alphabet, 3, 0.0, 5, &mut rng),
            Err(GenError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn test_generate_rejects_wrong_prediction_length() {
        let alphabet = Alphabet::from_text("abc").expect("non-empty");
        let predictor = |_: &Array3<f32>| -> GenResult<Array1<f64>> { Ok(arr1(&[0.5, 0.5])) };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            generate(&predictor, "abc", &alphabet, 3, 1.0, 1, &mut rng),
            Err(GenError::ShapeMismatch(_))
        ));
    }
}
