//! Standardized ridge regression.

use crate::stats;

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// A fitted linear model over standardized regressors.
#[derive(Debug, Clone)]
pub struct LinearFit {
    intercept: f64,
    coefficients: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl LinearFit {
    /// Fits `targets ~ rows` with an L2 penalty of `ridge * n` on the
    /// standardized coefficients. The intercept is not penalized.
    ///
    /// Returns `None` for empty input or a singular system.
    #[allow(clippy::cast_precision_loss)]
    pub fn ridge(rows: &[Vec<f64>], targets: &[f64], ridge: f64) -> Option<Self> {
        let n = rows.len();
        let width = rows.first()?.len();
        if n == 0 || n != targets.len() {
            return None;
        }

        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);
        for j in 0..width {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            means.push(stats::mean(&column));
            let sd = stats::std_dev(&column);
            // Constant columns center to zero and drop out under the penalty.
            scales.push(if sd > 1e-12 { sd } else { 1.0 });
        }

        let z: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| {
                r.iter()
                    .zip(means.iter().zip(&scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect();

        let intercept = stats::mean(targets);
        let centered: Vec<f64> = targets.iter().map(|y| y - intercept).collect();

        let penalty = ridge.max(0.0) * n as f64;
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, y) in z.iter().zip(&centered) {
            for i in 0..width {
                moment[i] += row[i] * y;
                for k in 0..width {
                    gram[i][k] += row[i] * row[k];
                }
            }
        }
        for (i, diag) in gram.iter_mut().enumerate() {
            diag[i] += penalty.max(1e-9);
        }

        let coefficients = solve(gram, moment)?;

        Some(Self {
            intercept,
            coefficients,
            means,
            scales,
        })
    }

    /// Predicts the target for one raw regressor row.
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .zip(self.means.iter().zip(&self.scales))
                .map(|((v, c), (m, s))| c * (v - m) / s)
                .sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_system_is_none() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn recovers_linear_relationship() {
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let x = f64::from(i);
                vec![x, (x * 0.7).sin()]
            })
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 5.0 + 2.0 * r[0] - 3.0 * r[1]).collect();

        let fit = LinearFit::ridge(&rows, &targets, 0.0).unwrap();
        let predicted = fit.predict(&[40.0, 0.5]);
        assert!((predicted - (5.0 + 80.0 - 1.5)).abs() < 1e-4);
    }

    #[test]
    fn constant_column_is_ignored() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i), 1.0]).collect();
        let targets: Vec<f64> = (0..10).map(|i| f64::from(i) * 3.0).collect();
        let fit = LinearFit::ridge(&rows, &targets, 0.001).unwrap();
        assert!((fit.predict(&[4.0, 1.0]) - 12.0).abs() < 0.1);
    }
}
