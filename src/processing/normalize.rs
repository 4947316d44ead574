// src/processing/normalize.rs
//! Gap filling, magnitudes and z-scores over columns with missing samples

use crate::config::constants::normalize::ZSCORE_EPSILON;

/// Linear interpolation over missing samples.
///
/// Interior gaps are interpolated by row position, trailing gaps hold the
/// last present value and leading gaps stay missing.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut previous: Option<(usize, f64)> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(v) = *value else {
            continue;
        };
        if let Some((p, pv)) = previous {
            let span = (i - p) as f64;
            for (k, slot) in out.iter_mut().enumerate().take(i).skip(p + 1) {
                let frac = (k - p) as f64 / span;
                *slot = Some(pv + (v - pv) * frac);
            }
        }
        previous = Some((i, v));
    }

    if let Some((p, pv)) = previous {
        for slot in out.iter_mut().skip(p + 1) {
            *slot = Some(pv);
        }
    }
    out
}

/// Dense copy for filtering: interpolated, with leading gaps taking the
/// first present value. `None` when the column has no present sample.
pub fn fill_for_filter(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = values.iter().flatten().next().copied()?;
    Some(
        interpolate_linear(values)
            .into_iter()
            .map(|v| v.unwrap_or(first))
            .collect(),
    )
}

/// Put `None` back on the rows that were missing in `original`
pub fn remask(filtered: Vec<f64>, original: &[Option<f64>]) -> Vec<Option<f64>> {
    filtered
        .into_iter()
        .zip(original)
        .map(|(f, o)| o.map(|_| f))
        .collect()
}

/// Row-wise Euclidean norm; missing when any component is missing
pub fn magnitude(axes: [&[Option<f64>]; 3]) -> Vec<Option<f64>> {
    let [x, y, z] = axes;
    x.iter()
        .zip(y)
        .zip(z)
        .map(|((x, y), z)| match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Some((x * x + y * y + z * z).sqrt()),
            _ => None,
        })
        .collect()
}

/// Mean and sample standard deviation (n - 1) of the present values
pub fn mean_std(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n = present.len();
    if n < 2 {
        return None;
    }

    let mean = present.iter().sum::<f64>() / n as f64;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some((mean, variance.sqrt()))
}

/// `(x - mean) / (std + ε)` using the column's own statistics.
///
/// Missing values stay missing; a column with fewer than two present values
/// has no defined spread and comes back all missing.
pub fn zscore(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let Some((mean, std)) = mean_std(values) else {
        return vec![None; values.len()];
    };
    values
        .iter()
        .map(|v| v.map(|x| (x - mean) / (std + ZSCORE_EPSILON)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_interior_and_edges() {
        let values = [None, Some(1.0), None, None, Some(4.0), None];
        assert_eq!(
            interpolate_linear(&values),
            vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn test_interpolate_all_missing() {
        assert_eq!(interpolate_linear(&[None, None]), vec![None, None]);
        assert_eq!(fill_for_filter(&[None, None]), None);
    }

    #[test]
    fn test_fill_and_remask() {
        let values = [None, Some(2.0), None, Some(4.0)];
        let filled = fill_for_filter(&values).unwrap();
        assert_eq!(filled, vec![2.0, 2.0, 3.0, 4.0]);
        assert_eq!(remask(filled, &values), vec![None, Some(2.0), None, Some(4.0)]);
    }

    #[test]
    fn test_magnitude_propagates_missing() {
        let x = [Some(3.0), Some(1.0)];
        let y = [Some(4.0), None];
        let z = [Some(0.0), Some(1.0)];
        assert_eq!(magnitude([&x, &y, &z]), vec![Some(5.0), None]);
    }

    #[test]
    fn test_sample_statistics_skip_missing() {
        // mean 3, sample std 2
        let values = [Some(1.0), Some(3.0), Some(5.0), None];
        let (mean, std) = mean_std(&values).unwrap();
        assert_eq!(mean, 3.0);
        assert!((std - 2.0).abs() < 1e-12);

        let z = zscore(&values);
        assert!((z[0].unwrap() + 1.0).abs() < 1e-7);
        assert_eq!(z[1], Some(0.0));
        assert_eq!(z[3], None);
    }

    #[test]
    fn test_zscore_of_seven_is_two() {
        // mean 3, sample std 2
        let values: Vec<Option<f64>> = [7.0, 2.0, 2.0, 2.0, 2.0, 3.0].into_iter().map(Some).collect();
        let z = zscore(&values)[0].unwrap();
        assert!((z - 2.0).abs() < 1e-7);
    }

    #[test]
    fn test_zscore_constant_and_short() {
        assert_eq!(zscore(&[Some(5.0), Some(5.0)]), vec![Some(0.0), Some(0.0)]);
        assert_eq!(zscore(&[Some(5.0), None]), vec![None, None]);
    }
}
