/// Placeholder rendered for missing values.
pub const EMPTY_VALUE: &str = "--";

/// Render a measurement with a fixed number of decimals and `,` thousands
/// grouping. `None` and non-finite values render as [`EMPTY_VALUE`].
pub fn format_value(value: Option<f64>, decimals: usize) -> String {
    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => return EMPTY_VALUE.to_string(),
    };

    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + integer.len() / 3 + 1);
    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    if negative {
        grouped.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}
