// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Tridiag
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Thomas algorithm for tridiagonal systems.
//!
//! Used by the natural cubic spline to solve for knot curvatures.

use surge_types::error::{SurgeError, SurgeResult};

/// Solve the tridiagonal system `sub·x[i-1] + diag·x[i] + sup·x[i+1] = rhs`.
///
/// All four bands have the system size; `sub[0]` and `sup[n-1]` are
/// ignored. Returns `InvalidInput` for an empty or mismatched system and
/// for a zero pivot.
pub fn thomas_solve(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> SurgeResult<Vec<f64>> {
    let n = rhs.len();
    if n == 0 {
        return Err(SurgeError::InvalidInput(
            "tridiagonal system size must be > 0".to_string(),
        ));
    }
    if sub.len() != n || diag.len() != n || sup.len() != n {
        return Err(SurgeError::InvalidInput(format!(
            "tridiagonal band lengths {}/{}/{} do not match rhs {n}",
            sub.len(),
            diag.len(),
            sup.len()
        )));
    }

    // Elimination: `ratio[i]` is the normalized super-diagonal, `x` holds
    // the normalized right-hand side until back substitution.
    let mut ratio = Vec::with_capacity(n);
    let mut x = Vec::with_capacity(n);
    let pivot = checked_pivot(diag[0], 0)?;
    ratio.push(sup[0] / pivot);
    x.push(rhs[0] / pivot);
    for row in 1..n {
        let pivot = checked_pivot(diag[row] - sub[row] * ratio[row - 1], row)?;
        ratio.push(if row + 1 < n { sup[row] / pivot } else { 0.0 });
        x.push((rhs[row] - sub[row] * x[row - 1]) / pivot);
    }

    for row in (0..n - 1).rev() {
        x[row] -= ratio[row] * x[row + 1];
    }
    Ok(x)
}

fn checked_pivot(value: f64, row: usize) -> SurgeResult<f64> {
    if value == 0.0 || !value.is_finite() {
        return Err(SurgeError::InvalidInput(format!(
            "singular tridiagonal system: pivot {value} at row {row}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64], x: &[f64]) -> f64 {
        let n = x.len();
        (0..n)
            .map(|i| {
                let mut lhs = diag[i] * x[i];
                if i > 0 {
                    lhs += sub[i] * x[i - 1];
                }
                if i + 1 < n {
                    lhs += sup[i] * x[i + 1];
                }
                (lhs - rhs[i]).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_diagonal_system() {
        let x = thomas_solve(&[0.0; 3], &[2.0, 4.0, 5.0], &[0.0; 3], &[2.0, 2.0, 10.0]).unwrap();
        assert_eq!(x, vec![1.0, 0.5, 2.0]);
    }

    #[test]
    fn test_natural_spline_rows() {
        // Curvature rows for knot spacings 1, 2, 1, 3
        let sub = [0.0, 2.0, 1.0];
        let diag = [6.0, 6.0, 8.0];
        let sup = [2.0, 1.0, 0.0];
        let rhs = [3.0, -1.5, 4.0];
        let x = thomas_solve(&sub, &diag, &sup, &rhs).unwrap();
        let r = residual(&sub, &diag, &sup, &rhs, &x);
        assert!(r < 1e-12, "residual = {r}");
    }

    #[test]
    fn test_single_unknown() {
        assert_eq!(thomas_solve(&[9.0], &[4.0], &[9.0], &[2.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        assert!(thomas_solve(&[], &[], &[], &[]).is_err());
        assert!(thomas_solve(&[0.0], &[1.0, 1.0], &[0.0], &[1.0]).is_err());
    }

    #[test]
    fn test_rejects_zero_pivot() {
        // Second pivot 1 - 1·1 vanishes
        let err = thomas_solve(&[0.0, 1.0], &[1.0, 1.0], &[1.0, 0.0], &[1.0, 1.0]);
        assert!(matches!(err, Err(SurgeError::InvalidInput(_))));
    }
}
