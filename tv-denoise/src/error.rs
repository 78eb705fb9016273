use crate::Real;
use thiserror::Error;

pub type DenoiseResult<T> = Result<T, DenoiseError>;

#[derive(Debug, Error, PartialEq)]
pub enum DenoiseError {
    #[error("Regularisation weight must be finite and non-negative, got {0}")]
    InvalidParameter(Real),
    #[error("Output buffer holds {output} samples but the input has {input}")]
    LengthMismatch { input: usize, output: usize },
}

/// Rejects weights for which the objective is not convex.
pub(crate) fn validate_lambda(lambda: Real) -> DenoiseResult<Real> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(lambda)
    } else {
        Err(DenoiseError::InvalidParameter(lambda))
    }
}

pub(crate) fn validate_lengths(input: usize, output: usize) -> DenoiseResult<()> {
    if input == output {
        Ok(())
    } else {
        Err(DenoiseError::LengthMismatch { input, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_and_positive() {
        assert_eq!(validate_lambda(0.0), Ok(0.0));
        assert_eq!(validate_lambda(2.5), Ok(2.5));
    }

    #[test]
    fn rejects_negative() {
        assert_eq!(
            validate_lambda(-0.1),
            Err(DenoiseError::InvalidParameter(-0.1))
        );
    }

    #[test]
    fn rejects_non_finite() {
        assert!(validate_lambda(Real::INFINITY).is_err());
        assert!(validate_lambda(Real::NAN).is_err());
    }

    #[test]
    fn length_mismatch_reports_both_sizes() {
        let err = validate_lengths(4, 3).unwrap_err();
        assert_eq!(err, DenoiseError::LengthMismatch { input: 4, output: 3 });
        assert_eq!(
            err.to_string(),
            "Output buffer holds 3 samples but the input has 4"
        );
    }
}
