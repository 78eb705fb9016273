//! Helpers for reading the structure of a piecewise constant signal.
use crate::{
    Real,
    error::{DenoiseResult, validate_lambda, validate_lengths},
};
use itertools::Itertools;

/// A maximal run of equal values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    pub start: usize,
    pub len: usize,
    pub level: Real,
}

/// Indices `k` such that `signal[k] != signal[k + 1]`.
pub fn breakpoints(signal: &[Real]) -> Vec<usize> {
    signal
        .iter()
        .tuple_windows()
        .positions(|(a, b)| a != b)
        .collect()
}

pub fn segments(signal: &[Real]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (index, &value) in signal.iter().enumerate() {
        if let Some(run) = runs.last_mut().filter(|run| run.level == value) {
            run.len += 1;
        } else {
            runs.push(Run {
                start: index,
                len: 1,
                level: value,
            });
        }
    }
    runs
}

pub fn total_variation(signal: &[Real]) -> Real {
    signal
        .iter()
        .tuple_windows()
        .map(|(a, b)| (b - a).abs())
        .sum()
}

/// Value of `Σ (y − x)² + 2λ · TV(x)` for samples `y` and estimate `x`.
pub fn objective(samples: &[Real], estimate: &[Real], lambda: Real) -> DenoiseResult<Real> {
    let lambda = validate_lambda(lambda)?;
    validate_lengths(samples.len(), estimate.len())?;
    let fidelity: Real = samples
        .iter()
        .zip(estimate)
        .map(|(y, x)| (y - x).powi(2))
        .sum();
    Ok(fidelity + 2.0 * lambda * total_variation(estimate))
}

/// Smallest weight for which the solution is the constant sample mean.
///
/// This is the largest magnitude reached by the running sum of deviations
/// from the mean, taken before the final sample.
pub fn collapse_threshold(samples: &[Real]) -> Real {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = samples.iter().sum::<Real>() / samples.len() as Real;
    samples[..samples.len() - 1]
        .iter()
        .scan(0.0, |deviation, y| {
            *deviation += y - mean;
            Some(deviation.abs())
        })
        .fold(0.0, Real::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn breakpoints_of_steps() {
        assert_eq!(breakpoints(&[]), Vec::<usize>::new());
        assert_eq!(breakpoints(&[1.0]), Vec::<usize>::new());
        assert_eq!(breakpoints(&[1.0, 1.0, 2.0, 2.0, 0.0]), vec![1, 3]);
    }

    #[test]
    fn segments_of_steps() {
        assert_eq!(
            segments(&[1.0, 1.0, 2.0, 2.0, 2.0, 0.0]),
            vec![
                Run {
                    start: 0,
                    len: 2,
                    level: 1.0
                },
                Run {
                    start: 2,
                    len: 3,
                    level: 2.0
                },
                Run {
                    start: 5,
                    len: 1,
                    level: 0.0
                },
            ]
        );
        assert!(segments(&[]).is_empty());
    }

    #[test]
    fn total_variation_sums_jumps() {
        assert_approx_eq!(total_variation(&[0.0, 3.0, 1.0, 1.0, 4.0]), 8.0);
        assert_eq!(total_variation(&[]), 0.0);
    }

    #[test]
    fn objective_combines_terms() {
        let value = objective(&[0.0, 10.0], &[1.0, 9.0], 1.0).unwrap();
        assert_approx_eq!(value, 1.0 + 1.0 + 2.0 * 8.0);
        assert!(objective(&[0.0], &[0.0, 1.0], 1.0).is_err());
        assert!(objective(&[0.0], &[0.0], -1.0).is_err());
    }

    #[test]
    fn collapse_threshold_of_alternating() {
        // Deviations from the mean 4: -4, 6, -4, 6 give running sums -4, 2, -2, 4.
        assert_approx_eq!(collapse_threshold(&[0.0, 10.0, 0.0, 10.0, 0.0]), 4.0);
        assert_eq!(collapse_threshold(&[3.0]), 0.0);
        assert_eq!(collapse_threshold(&[]), 0.0);
    }

    #[test]
    fn collapse_threshold_of_step() {
        assert_approx_eq!(collapse_threshold(&[0.0, 0.0, 10.0, 10.0]), 10.0);
    }
}
