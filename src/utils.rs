use crate::errors::ReadmitError;

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), ReadmitError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ReadmitError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(ReadmitError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Values of a column with missing (`NaN`) entries removed.
#[inline]
pub fn drop_missing(v: &[f64]) -> Vec<f64> {
    v.iter().copied().filter(|x| !x.is_nan()).collect()
}

/// Median of the non-missing values of a slice, `None` if there are none.
///
/// For an even number of values the two middle values are averaged.
pub fn median(v: &[f64]) -> Option<f64> {
    let mut no_miss = drop_missing(v);
    if no_miss.is_empty() {
        return None;
    }
    no_miss.sort_unstable_by(f64::total_cmp);
    let mid = no_miss.len() / 2;
    if no_miss.len() % 2 == 0 {
        Some((no_miss[mid - 1] + no_miss[mid]) / 2.0)
    } else {
        Some(no_miss[mid])
    }
}

/// Mean of the non-missing values of a slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    let no_miss = drop_missing(v);
    if no_miss.is_empty() {
        None
    } else {
        Some(no_miss.iter().sum::<f64>() / no_miss.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator) of the non-missing values.
///
/// Fewer than two values yield `None`.
pub fn sample_std(v: &[f64]) -> Option<f64> {
    let no_miss = drop_missing(v);
    if no_miss.len() < 2 {
        return None;
    }
    let m = no_miss.iter().sum::<f64>() / no_miss.len() as f64;
    let ss: f64 = no_miss.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (no_miss.len() - 1) as f64).sqrt())
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round() {
        assert_eq!(0.3, precision_round(0.3333, 1));
        assert_eq!(0.2343, precision_round(0.2343123123123, 4));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, f64::NAN, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, f64::NAN]), None);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mean_and_std() {
        let v = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        let s = sample_std(&v).unwrap();
        assert!((s - 2.138089935299395).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_validate_float_parameter() {
        assert!(validate_float_parameter(0.5, 0.0, 1.0, "alpha").is_ok());
        assert!(validate_float_parameter(1.5, 0.0, 1.0, "alpha").is_err());
        assert!(validate_positive_float_parameter(f64::NAN, "eps").is_err());
    }
}
