//! Linear interpolation and sorted-sequence helpers shared by the curve
//! and map code.

use surge_types::error::{SurgeError, SurgeResult};

/// Straight line through `(x0, y0)` and `(x1, y1)` evaluated at `x`.
///
/// Extrapolates outside `[x0, x1]`. When the two abscissae coincide the
/// line is undefined and `y0` is returned.
pub fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    let dx = x1 - x0;
    if dx == 0.0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / dx
}

/// Index of the first element `>= x` in an ascending slice.
pub fn bisect_left(sorted: &[f64], x: f64) -> usize {
    sorted.partition_point(|&v| v < x)
}

/// Index `i` of the segment `[xs[i], xs[i+1]]` used to evaluate at `x`,
/// clamped to the first and last segments. `xs.len()` must be ≥ 2.
pub fn segment_index(xs: &[f64], x: f64) -> usize {
    let n = xs.len();
    let pos = bisect_left(xs, x);
    pos.saturating_sub(1).min(n.saturating_sub(2))
}

/// Sort paired samples by `xs` and collapse equal abscissae.
///
/// When several samples share an abscissa the one appearing last in the
/// input wins. Returns the number of samples dropped alongside the pairs.
pub fn sort_dedup_pairs(xs: &[f64], ys: &[f64]) -> SurgeResult<(Vec<f64>, Vec<f64>, usize)> {
    if xs.len() != ys.len() {
        return Err(SurgeError::InvalidInput(format!(
            "paired samples differ in length: {} vs {}",
            xs.len(),
            ys.len()
        )));
    }
    if let Some(bad) = xs.iter().chain(ys.iter()).find(|v| !v.is_finite()) {
        return Err(SurgeError::InvalidInput(format!(
            "non-finite sample value {bad}"
        )));
    }

    // Stable sort keeps input order among equal keys.
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|&i, &j| xs[i].total_cmp(&xs[j]));

    let mut out_x: Vec<f64> = Vec::with_capacity(xs.len());
    let mut out_y: Vec<f64> = Vec::with_capacity(ys.len());
    for idx in order {
        match out_x.last() {
            Some(&last) if last == xs[idx] => {
                if let Some(y) = out_y.last_mut() {
                    *y = ys[idx];
                }
            }
            _ => {
                out_x.push(xs[idx]);
                out_y.push(ys[idx]);
            }
        }
    }
    let dropped = xs.len() - out_x.len();
    Ok((out_x, out_y, dropped))
}

/// Check that a slice is finite and strictly increasing.
pub fn require_strictly_increasing(xs: &[f64], what: &str) -> SurgeResult<()> {
    for (i, pair) in xs.windows(2).enumerate() {
        if !(pair[1] > pair[0]) {
            return Err(SurgeError::InvalidInput(format!(
                "{what} must be strictly increasing: x[{i}]={} x[{}]={}",
                pair[0],
                i + 1,
                pair[1]
            )));
        }
    }
    if let Some(bad) = xs.iter().find(|v| !v.is_finite()) {
        return Err(SurgeError::InvalidInput(format!("{what} contains {bad}")));
    }
    Ok(())
}
