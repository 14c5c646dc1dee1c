//! Reward-model capability and the built-in linear model.
//!
//! The controller treats its model as opaque: anything that can predict a
//! scalar reward from a feature row and refit from accumulated history
//! works. [`LinearModel`] is the default, a ridge-regularized least-squares
//! fit solved by normal equations; `partial_fit` offers an incremental SGD
//! alternative for controllers configured that way.

use crate::error::ControlError;

/// Opaque regression capability injected into the controller.
pub trait RewardModel: Send {
    /// Predicted reward for one feature row.
    fn predict(&self, features: &[f64]) -> Result<f64, ControlError>;

    /// Refit from the full accumulated history.
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ControlError>;

    /// Incremental update; defaults to a full refit.
    fn partial_fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ControlError> {
        self.fit(features, targets)
    }
}

/// Linear reward model with an intercept term.
#[derive(Debug, Clone, Default)]
pub struct LinearModel {
    /// Weights for each feature, with the intercept stored last.
    weights: Vec<f64>,
    ridge: f64,
    learning_rate: f64,
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            weights: Vec::new(),
            ridge: 1e-6,
            learning_rate: 1e-6,
        }
    }

    pub fn with_ridge(mut self, ridge: f64) -> Self {
        self.ridge = ridge;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    fn check_row(&self, features: &[f64]) -> Result<(), ControlError> {
        if self.weights.is_empty() {
            return Err(ControlError::NotFitted);
        }
        if features.len() + 1 != self.weights.len() {
            return Err(ControlError::FitFailed(format!(
                "feature row has {} columns, model expects {}",
                features.len(),
                self.weights.len() - 1,
            )));
        }
        Ok(())
    }
}

impl RewardModel for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ControlError> {
        self.check_row(features)?;
        let dot: f64 = features
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum();
        Ok(dot + self.weights[features.len()])
    }

    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ControlError> {
        let rows = features.len();
        if rows == 0 || rows != targets.len() {
            return Err(ControlError::FitFailed(format!(
                "history mismatch: {} feature rows vs {} targets",
                rows,
                targets.len(),
            )));
        }
        let cols = features[0].len();
        if features.iter().any(|row| row.len() != cols) {
            return Err(ControlError::FitFailed(
                "feature rows have inconsistent widths".to_string(),
            ));
        }

        // Normal equations on the intercept-augmented design matrix:
        // (A'A + ridge*I) w = A'y, with A = [X | 1].
        let dim = cols + 1;
        let augmented = |row: &[f64], j: usize| if j < cols { row[j] } else { 1.0 };

        let mut ata = vec![vec![0.0f64; dim]; dim];
        let mut aty = vec![0.0f64; dim];
        for (row, &y) in features.iter().zip(targets) {
            for i in 0..dim {
                let ai = augmented(row, i);
                aty[i] += ai * y;
                for j in 0..dim {
                    ata[i][j] += ai * augmented(row, j);
                }
            }
        }
        for (i, row) in ata.iter_mut().enumerate() {
            row[i] += self.ridge;
        }

        self.weights = solve(ata, aty)?;
        Ok(())
    }

    fn partial_fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), ControlError> {
        if features.len() != targets.len() {
            return Err(ControlError::FitFailed(format!(
                "history mismatch: {} feature rows vs {} targets",
                features.len(),
                targets.len(),
            )));
        }
        for (row, &y) in features.iter().zip(targets) {
            if self.weights.is_empty() {
                self.weights = vec![0.0; row.len() + 1];
            }
            self.check_row(row)?;
            let err = self.predict(row)? - y;
            for (w, &x) in self.weights.iter_mut().zip(row) {
                *w -= self.learning_rate * err * x;
            }
            let dim = self.weights.len();
            self.weights[dim - 1] -= self.learning_rate * err;
        }
        Ok(())
    }
}

/// Solve `m w = rhs` by Gaussian elimination with partial pivoting.
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, ControlError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .ok_or_else(|| ControlError::FitFailed("empty system".to_string()))?;
        if m[pivot][col].abs() < 1e-12 {
            return Err(ControlError::FitFailed(
                "singular normal equations".to_string(),
            ));
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut w = vec![0.0f64; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in row + 1..n {
            acc -= m[row][k] * w[k];
        }
        w[row] = acc / m[row][row];
        if !w[row].is_finite() {
            return Err(ControlError::FitFailed(
                "non-finite solution to normal equations".to_string(),
            ));
        }
    }
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_before_fit_is_an_error() {
        let model = LinearModel::new();
        assert!(matches!(
            model.predict(&[1.0, 2.0]),
            Err(ControlError::NotFitted)
        ));
    }

    #[test]
    fn test_fits_a_line() {
        let mut model = LinearModel::new();
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..6).map(|i| 2.0 * i as f64 + 1.0).collect();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&[10.0]).unwrap();
        assert!((pred - 21.0).abs() < 1e-3, "got {pred}");
    }

    #[test]
    fn test_fits_two_features() {
        let mut model = LinearModel::new();
        // y = 3a - 2b + 5
        let x = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![2.0, 1.0],
            vec![3.0, 4.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 5.0).collect();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&[5.0, 2.0]).unwrap();
        assert!((pred - 16.0).abs() < 1e-2, "got {pred}");
    }

    #[test]
    fn test_fit_rejects_mismatched_history() {
        let mut model = LinearModel::new();
        let err = model.fit(&[vec![1.0]], &[1.0, 2.0]);
        assert!(matches!(err, Err(ControlError::FitFailed(_))));
    }

    #[test]
    fn test_fit_rejects_ragged_rows() {
        let mut model = LinearModel::new();
        let err = model.fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]);
        assert!(matches!(err, Err(ControlError::FitFailed(_))));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let mut model = LinearModel::new();
        model.fit(&[vec![1.0], vec![2.0]], &[1.0, 2.0]).unwrap();
        assert!(model.predict(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_partial_fit_moves_toward_target() {
        let mut model = LinearModel::new().with_learning_rate(0.05);
        let x = vec![vec![1.0]];
        let y = vec![4.0];
        for _ in 0..200 {
            model.partial_fit(&x, &y).unwrap();
        }
        let pred = model.predict(&[1.0]).unwrap();
        assert!((pred - 4.0).abs() < 0.1, "got {pred}");
    }
}
