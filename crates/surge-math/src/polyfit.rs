// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Polynomial Fit
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Least-squares polynomial fitting.
//!
//! Normal equations `(VᵀV) c = Vᵀy` assembled in an `Array2` and solved
//! by Gaussian elimination with partial pivoting. Abscissae are centred
//! and scaled before assembly, then the coefficients are expanded back to
//! raw powers of `x`.

use ndarray::{Array1, Array2};
use surge_types::error::{SurgeError, SurgeResult};

/// Polynomial with coefficients in ascending powers: `c0 + c1 x + c2 x² ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        let coefficients = if coefficients.is_empty() {
            vec![0.0]
        } else {
            coefficients
        };
        Polynomial { coefficients }
    }

    /// Horner evaluation.
    pub fn value(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn derivative(&self) -> Polynomial {
        if self.coefficients.len() <= 1 {
            return Polynomial::new(vec![0.0]);
        }
        let coefficients = self
            .coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, &c)| k as f64 * c)
            .collect();
        Polynomial::new(coefficients)
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// Least-squares fit of `y ≈ p(x)`.
///
/// The effective degree is `min(degree, distinct_x − 1)` so that two
/// samples give a line and one distinct abscissa gives a constant.
pub fn fit(x: &[f64], y: &[f64], degree: usize) -> SurgeResult<Polynomial> {
    if x.len() != y.len() {
        return Err(SurgeError::InvalidInput(format!(
            "fit abscissae ({}) and ordinates ({}) differ in length",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(SurgeError::InvalidInput(
            "polynomial fit needs at least one sample".to_string(),
        ));
    }
    if let Some(bad) = x.iter().chain(y.iter()).find(|v| !v.is_finite()) {
        return Err(SurgeError::InvalidInput(format!(
            "non-finite fit sample {bad}"
        )));
    }

    let mut distinct = x.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let deg = degree.min(distinct.len() - 1);
    let k = deg + 1;

    let center = x.iter().sum::<f64>() / x.len() as f64;
    let scale = x
        .iter()
        .fold(0.0_f64, |acc, &v| acc.max((v - center).abs()))
        .max(1.0);

    let mut ata = Array2::<f64>::zeros((k, k));
    let mut aty = Array1::<f64>::zeros(k);
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let t = (xi - center) / scale;
        let mut powers = vec![1.0; 2 * k - 1];
        for p in 1..powers.len() {
            powers[p] = powers[p - 1] * t;
        }
        for r in 0..k {
            aty[r] += powers[r] * yi;
            for c in 0..k {
                ata[[r, c]] += powers[r + c];
            }
        }
    }

    let scaled = solve_dense(ata, aty)?;
    Ok(Polynomial::new(expand_shifted(&scaled.to_vec(), center, scale)))
}

/// Rewrite `Σ a_k ((x − center)/scale)^k` as ascending powers of `x`.
fn expand_shifted(a: &[f64], center: f64, scale: f64) -> Vec<f64> {
    let mut out = vec![0.0; a.len()];
    for (k, &ak) in a.iter().enumerate() {
        let lead = ak / scale.powi(k as i32);
        let mut binom = 1.0;
        for j in 0..=k {
            // C(k, j) x^j (−center)^(k−j)
            out[j] += lead * binom * (-center).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    out
}

/// Gaussian elimination with partial pivoting on a small dense system.
pub fn solve_dense(mut a: Array2<f64>, mut b: Array1<f64>) -> SurgeResult<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(SurgeError::InvalidInput(format!(
            "dense system shape {:?} does not match rhs {n}",
            a.shape()
        )));
    }
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);

    for col in 0..n {
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if a[[row, col]].abs() > a[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if a[[pivot_row, col]].abs() <= 1e-14 * scale {
            return Err(SurgeError::InvalidInput(format!(
                "singular normal equations at column {col}"
            )));
        }
        if pivot_row != col {
            for c in 0..n {
                a.swap([col, c], [pivot_row, c]);
            }
            b.swap(col, pivot_row);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[[row, c]] -= factor * a[[col, c]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let mut acc = b[row];
        for c in (row + 1)..n {
            acc -= a[[row, c]] * x[c];
        }
        x[row] = acc / a[[row, row]];
    }
    Ok(x)
}
