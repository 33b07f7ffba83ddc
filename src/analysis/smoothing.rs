//! Optional smoothing ahead of the extremum search.
//!
//! Smoothing only changes which indices are found as relative extrema; the
//! absolute resolution step always reads the raw levels. The detector takes
//! any `Smoother`, and the configured one is built by `smoother_for`.

use crate::config::SmoothingConfig;

pub trait Smoother {
    fn smooth(&self, values: &[f64]) -> Vec<f64>;

    fn name(&self) -> &'static str;
}

/// Pass-through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSmoothing;

impl Smoother for NoSmoothing {
    fn smooth(&self, values: &[f64]) -> Vec<f64> {
        values.to_vec()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Savitzky-Golay filter: each point is replaced by the value at the centre
/// of a least-squares polynomial fitted to its window. The first and last
/// `window / 2` points keep their raw values.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    coefficients: Vec<f64>,
}

impl SavitzkyGolay {
    /// Returns `None` unless `window` is odd and greater than `polyorder`.
    pub fn new(window: usize, polyorder: usize) -> Option<Self> {
        if window % 2 == 0 || polyorder >= window {
            return None;
        }
        let half = (window / 2) as f64;
        let offsets: Vec<f64> = (0..window).map(|j| j as f64 - half).collect();
        let order = polyorder + 1;

        // Normal equations (A^T A) c = e0, with A[j][k] = x_j^k
        let mut system = vec![vec![0.0; order + 1]; order];
        for (a, row) in system.iter_mut().enumerate() {
            for b in 0..order {
                row[b] = offsets.iter().map(|x| x.powi((a + b) as i32)).sum();
            }
            row[order] = if a == 0 { 1.0 } else { 0.0 };
        }
        let c = solve(system)?;

        let coefficients = offsets
            .iter()
            .map(|x| c.iter().enumerate().map(|(k, ck)| ck * x.powi(k as i32)).sum())
            .collect();
        Some(Self { coefficients })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Smoother for SavitzkyGolay {
    fn smooth(&self, values: &[f64]) -> Vec<f64> {
        let window = self.coefficients.len();
        let half = window / 2;
        let mut smoothed = values.to_vec();
        if values.len() < window {
            return smoothed;
        }
        for i in half..values.len() - half {
            smoothed[i] = values[i - half..=i + half]
                .iter()
                .zip(&self.coefficients)
                .map(|(v, c)| v * c)
                .sum();
        }
        smoothed
    }

    fn name(&self) -> &'static str {
        "savitzky-golay"
    }
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let n = m.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        let pivot_row = m[col].clone();
        for (row, values) in m.iter_mut().enumerate() {
            if row != col {
                let factor = values[col] / pivot_row[col];
                for k in col..=n {
                    values[k] -= factor * pivot_row[k];
                }
            }
        }
    }
    Some((0..n).map(|i| m[i][n] / m[i][i]).collect())
}

/// Builds the smoother selected in the extrema config. An invalid
/// Savitzky-Golay setting falls back to no smoothing.
pub fn smoother_for(config: &SmoothingConfig) -> Box<dyn Smoother> {
    match *config {
        SmoothingConfig::None => Box::new(NoSmoothing),
        SmoothingConfig::SavitzkyGolay { window, polyorder } => match SavitzkyGolay::new(window, polyorder) {
            Some(filter) => Box::new(filter),
            None => Box::new(NoSmoothing),
        },
    }
}
