//! Display formatting
//!
//! The stepper never shows raw values; every committed value passes through a
//! [`Formatter`] before it reaches the host.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Maps a raw value to the text the host displays
#[derive(Clone)]
pub struct Formatter(Arc<dyn Fn(f64) -> String + Send + Sync>);

impl Formatter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(f64) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Shortest decimal that round-trips the value (`90.0` displays as `90`)
    pub fn plain() -> Self {
        Self::new(|value| format!("{value}"))
    }

    pub fn format(&self, value: f64) -> String {
        (self.0)(value)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::plain()
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Formatter(..)")
    }
}

impl From<NumberFormat> for Formatter {
    fn from(format: NumberFormat) -> Self {
        Formatter::new(move |value| format.apply(value))
    }
}

/// Declarative number format, loadable from options files
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NumberFormat {
    /// Fixed number of fraction digits; shortest round-trip when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Thousands separator for the integer part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<char>,
}

impl NumberFormat {
    /// Largest precision honored; larger values are clamped when formatting
    pub const MAX_PRECISION: usize = 32;

    pub fn apply(&self, value: f64) -> String {
        let digits = match self.precision {
            Some(precision) => {
                let precision = precision.min(Self::MAX_PRECISION);
                format!("{value:.precision$}")
            }
            None => format!("{value}"),
        };
        let body = match self.separator {
            Some(separator) => group_thousands(&digits, separator),
            None => digits,
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let (sign, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let (integer, fraction) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };
    // Non-numeric renderings (inf, NaN) pass through untouched
    if !integer.bytes().all(|b| b.is_ascii_digit()) {
        return digits.to_string();
    }

    let mut grouped = String::with_capacity(digits.len() + integer.len() / 3);
    grouped.push_str(sign);
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped.push_str(fraction);
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_formatter() {
        let f = Formatter::plain();
        assert_eq!(f.format(90.0), "90");
        assert_eq!(f.format(2.5), "2.5");
        assert_eq!(f.format(-3.0), "-3");
    }

    #[test]
    fn test_number_format_precision_and_affixes() {
        let format = NumberFormat {
            precision: Some(2),
            prefix: "$".into(),
            suffix: " USD".into(),
            separator: None,
        };
        assert_eq!(format.apply(12.5), "$12.50 USD");
    }

    #[test]
    fn test_precision_clamped() {
        let format = NumberFormat {
            precision: Some(usize::MAX),
            ..Default::default()
        };
        let text = format.apply(1.5);
        assert_eq!(text.len(), "1.".len() + NumberFormat::MAX_PRECISION);
        assert!(text.starts_with("1.5000"));
    }

    #[test]
    fn test_thousands_grouping() {
        let format = NumberFormat {
            precision: Some(1),
            separator: Some(','),
            ..Default::default()
        };
        assert_eq!(format.apply(1234567.3), "1,234,567.3");
        assert_eq!(format.apply(-1000.0), "-1,000.0");
        assert_eq!(format.apply(999.0), "999.0");

        let whole = NumberFormat {
            precision: Some(0),
            separator: Some(' '),
            ..Default::default()
        };
        assert_eq!(whole.apply(45000.0), "45 000");
        assert_eq!(whole.apply(f64::INFINITY), "inf");
    }

    #[test]
    fn test_formatter_from_number_format() {
        let formatter: Formatter = NumberFormat {
            suffix: "%".into(),
            ..Default::default()
        }
        .into();
        assert_eq!(formatter.format(42.0), "42%");
    }
}
