/// Point estimate with uncertainty for one label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub mean: f64,
    pub std_err: f64,
    pub count: usize,
}

/// Mean and standard error using the unbiased (n - 1) sample variance.
///
/// Returns `None` when fewer than two samples are available.
pub fn summarize(samples: &[f64]) -> Option<SampleSummary> {
    let count = samples.len();
    if count < 2 {
        return None;
    }
    let n = count as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let sum_sq: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
    let variance = sum_sq / (n - 1.0);
    Some(SampleSummary {
        mean,
        std_err: (variance / n).sqrt(),
        count,
    })
}

/// Render like C's `%g`: six significant digits, trailing zeros trimmed.
pub fn format_g(x: f64) -> String {
    const PRECISION: i32 = 6;

    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round to the target precision first; the exponent is taken after rounding.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, x)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_one_two_three() {
        let summary = summarize(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 2.0).abs() < 1e-12);
        assert!((summary.std_err - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_summarize_needs_two_samples() {
        assert!(summarize(&[]).is_none());
        assert!(summarize(&[4.2]).is_none());
    }

    #[test]
    fn test_summarize_constant_series_has_zero_error() {
        let summary = summarize(&[5.0, 5.0, 5.0, 5.0]).unwrap();
        assert_eq!(summary.std_err, 0.0);
        assert_eq!(summary.mean, 5.0);
    }

    #[test]
    fn test_format_g_matches_printf() {
        assert_eq!(format_g(2.0), "2");
        assert_eq!(format_g((1.0f64 / 3.0).sqrt()), "0.57735");
        assert_eq!(format_g(3.1500000000000004), "3.15");
        assert_eq!(format_g(0.06454972243679), "0.0645497");
        assert_eq!(format_g(100000.0), "100000");
        assert_eq!(format_g(1000000.0), "1e+06");
        assert_eq!(format_g(123456789.0), "1.23457e+08");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001234), "1.234e-05");
        assert_eq!(format_g(-2.5), "-2.5");
        assert_eq!(format_g(0.0), "0");
    }
}
