//! This crate provides an exact, non-iterative solver for one-dimensional
//! total variation denoising of sampled waveforms.
//!
//! Given samples `y` and a weight `λ ≥ 0` it returns the piecewise constant
//! `x` minimising
//! ```text
//! Σ (y[i] − x[i])² + 2λ · Σ |x[i+1] − x[i]|
//! ```
//! in `O(n)` time. Larger weights give fewer, longer constant segments.
//! Typical usage on a single channel trace looks like:
//! ```rust
//! let trace = [0.0, 0.0, 0.0, 10.0, 10.0, 10.0];
//! let cleaned = tv_denoise::denoise(&trace, 0.5)?;
//! assert_eq!(tv_denoise::breakpoints(&cleaned), vec![2]);
//! # Ok::<(), tv_denoise::DenoiseError>(())
//! ```
//! When denoising many traces of the same length, a [Denoiser] keeps its
//! scratch storage between calls.
//!
//! Non-finite samples are not detected; they propagate into unspecified output.

mod envelope;
mod error;
mod inspect;
mod solver;

use envelope::{Bound, EnvelopeChain};
use error::{validate_lambda, validate_lengths};
use solver::Pass;
use tracing::instrument;

pub use error::{DenoiseError, DenoiseResult};
pub use inspect::{Run, breakpoints, collapse_threshold, objective, segments, total_variation};

pub type Real = f64;

/// Reusable solver state. One instance serves one thread; run several
/// instances to denoise independent channels concurrently.
#[derive(Debug, Clone)]
pub struct Denoiser {
    lower: EnvelopeChain,
    upper: EnvelopeChain,
}

impl Default for Denoiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Denoiser {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Preallocates room for signals of up to `samples` values.
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            lower: EnvelopeChain::with_capacity(Bound::Lower, samples),
            upper: EnvelopeChain::with_capacity(Bound::Upper, samples),
        }
    }

    pub fn denoise(&mut self, samples: &[Real], lambda: Real) -> DenoiseResult<Vec<Real>> {
        let mut output = vec![Real::default(); samples.len()];
        self.denoise_into(samples, lambda, &mut output)?;
        Ok(output)
    }

    /// Writes the denoised signal into `output`, which must be as long as `samples`.
    #[instrument(skip_all, level = "trace", fields(samples = samples.len(), lambda))]
    pub fn denoise_into(
        &mut self,
        samples: &[Real],
        lambda: Real,
        output: &mut [Real],
    ) -> DenoiseResult<()> {
        let lambda = validate_lambda(lambda)?;
        validate_lengths(samples.len(), output.len())?;

        if samples.len() < 2 || lambda == 0.0 {
            output.copy_from_slice(samples);
            return Ok(());
        }

        self.lower.reserve(samples.len());
        self.upper.reserve(samples.len());
        Pass::new(samples, output, lambda, &mut self.lower, &mut self.upper).run();
        Ok(())
    }
}

/// Denoises `samples` with weight `lambda`, see the crate documentation.
///
/// # Errors
/// [DenoiseError::InvalidParameter] if `lambda` is negative or not finite.
pub fn denoise(samples: &[Real], lambda: Real) -> DenoiseResult<Vec<Real>> {
    Denoiser::with_capacity(samples.len()).denoise(samples, lambda)
}

/// As [denoise], writing into caller supplied storage.
///
/// # Errors
/// [DenoiseError::InvalidParameter] if `lambda` is negative or not finite,
/// [DenoiseError::LengthMismatch] if `output` and `samples` differ in length.
pub fn denoise_into(samples: &[Real], lambda: Real, output: &mut [Real]) -> DenoiseResult<()> {
    Denoiser::with_capacity(samples.len()).denoise_into(samples, lambda, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn assert_all_approx(output: &[Real], expected: &[Real]) {
        assert_eq!(output.len(), expected.len());
        for (o, e) in output.iter().zip(expected) {
            assert_approx_eq!(o, e, 1e-9);
        }
    }

    #[test]
    fn zero_data() {
        assert_eq!(denoise(&[], 3.0).unwrap(), Vec::<Real>::new());
    }

    #[test]
    fn single_sample() {
        assert_eq!(denoise(&[5.0], 3.0).unwrap(), vec![5.0]);
    }

    #[test]
    fn zero_lambda_is_identity() {
        let input = [1.0, -3.5, 2.25, 8.0, 8.0, 0.125];
        assert_eq!(denoise(&input, 0.0).unwrap(), input.to_vec());
    }

    #[test]
    fn negative_lambda_rejected() {
        assert_eq!(
            denoise(&[1.0, 2.0], -1.0),
            Err(DenoiseError::InvalidParameter(-1.0))
        );
    }

    #[test]
    fn negative_lambda_rejected_for_degenerate_input() {
        assert!(denoise(&[], -1.0).is_err());
        assert!(denoise(&[1.0], Real::NAN).is_err());
    }

    #[test]
    fn two_samples_pulled_together() {
        assert_all_approx(&denoise(&[0.0, 10.0], 1.0).unwrap(), &[1.0, 9.0]);
        assert_all_approx(&denoise(&[10.0, 0.0], 1.0).unwrap(), &[9.0, 1.0]);
        assert_all_approx(&denoise(&[0.0, 10.0], 5.0).unwrap(), &[5.0, 5.0]);
        assert_all_approx(&denoise(&[0.0, 10.0], 100.0).unwrap(), &[5.0, 5.0]);
    }

    #[test]
    fn alternating_collapses_to_mean() {
        let output = denoise(&[0.0, 10.0, 0.0, 10.0, 0.0], 100.0).unwrap();
        assert_all_approx(&output, &[4.0; 5]);
    }

    #[test]
    fn ramp_with_tiny_lambda() {
        let output = denoise(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.01).unwrap();
        assert_all_approx(&output, &[1.01, 2.0, 3.0, 4.0, 4.99]);
    }

    #[test]
    fn single_step() {
        let output = denoise(&[0.0, 0.0, 0.0, 10.0, 10.0, 10.0], 0.5).unwrap();
        let low = 0.5 / 3.0;
        let high = 10.0 - 0.5 / 3.0;
        assert_all_approx(&output, &[low, low, low, high, high, high]);
        assert_eq!(breakpoints(&output), vec![2]);
    }

    #[test]
    fn pulse_on_flat_baseline() {
        // A three sample pulse of height 9 survives with its edges shaved by λ.
        let input = [1.0, 1.0, 1.0, 10.0, 10.0, 10.0, 1.0, 1.0, 1.0];
        let output = denoise(&input, 1.5).unwrap();
        let inside = 10.0 - 2.0 * 1.5 / 3.0;
        let outside = 1.0 + 1.5 / 3.0;
        assert_all_approx(
            &output,
            &[
                outside, outside, outside, inside, inside, inside, outside, outside, outside,
            ],
        );
    }

    #[test]
    fn constant_signal_is_fixed_point() {
        let input = [2.5; 7];
        for lambda in [0.1, 1.0, 1000.0] {
            assert_all_approx(&denoise(&input, lambda).unwrap(), &input);
        }
    }

    #[test]
    fn output_length_checked() {
        let mut output = [0.0; 2];
        assert_eq!(
            denoise_into(&[1.0, 2.0, 3.0], 1.0, &mut output),
            Err(DenoiseError::LengthMismatch {
                input: 3,
                output: 2
            })
        );
    }

    #[test]
    fn denoiser_reuse_matches_fresh_calls() {
        let first = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let second = [2.0, 7.0, 1.0, 8.0];
        let mut denoiser = Denoiser::new();
        let reused_first = denoiser.denoise(&first, 1.0).unwrap();
        let reused_second = denoiser.denoise(&second, 0.75).unwrap();
        assert_eq!(reused_first, denoise(&first, 1.0).unwrap());
        assert_eq!(reused_second, denoise(&second, 0.75).unwrap());
    }
}
