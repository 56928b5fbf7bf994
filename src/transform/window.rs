//! Windowed feature helpers used by the feature builder.

/// Trailing rolling mean with a minimum window of one: position `i`
/// averages `values[i.saturating_sub(window - 1)..=i]`, skipping NaN
/// entries. A position whose window holds no finite value stays NaN.
pub fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = i.saturating_sub(window - 1);
            let slice = &values[start..=i];
            let finite: Vec<f64> = slice.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                f64::NAN
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            }
        })
        .collect()
}

/// Lag by one step, then forward-fill and backward-fill so the series has
/// no boundary NaN as long as at least one finite value exists.
pub fn lag_filled(values: &[f64]) -> Vec<f64> {
    let mut lagged: Vec<f64> = Vec::with_capacity(values.len());
    if values.is_empty() {
        return lagged;
    }
    lagged.push(f64::NAN);
    lagged.extend_from_slice(&values[..values.len() - 1]);

    // Forward fill.
    let mut last_valid = f64::NAN;
    for v in lagged.iter_mut() {
        if v.is_finite() {
            last_valid = *v;
        } else if last_valid.is_finite() {
            *v = last_valid;
        }
    }
    // Backward fill the leading gap.
    let mut next_valid = f64::NAN;
    for v in lagged.iter_mut().rev() {
        if v.is_finite() {
            next_valid = *v;
        } else if next_valid.is_finite() {
            *v = next_valid;
        }
    }

    lagged
}
