//! Option serialization into native key/value settings.
//!
//! Every configuration field is described by a [`SetOp`]: the native key,
//! the typed value and an [`EmissionPolicy`]. Applying a list of operations
//! to a [`SettingsSink`] encodes each value to the string form the engine
//! expects and stops at the first rejected pair.
//!
//! # Example
//!
//! ```
//! use wkhtmlpdf::options::{apply_ops, ConverterOptions};
//!
//! let options = ConverterOptions::default();
//! let mut recorded: Vec<(String, String)> = Vec::new();
//! apply_ops(&options.ops(), &mut recorded).unwrap();
//!
//! assert_eq!(recorded.last().unwrap(), &("out".to_string(), String::new()));
//! ```

mod converter;
mod object;

pub use converter::{Colorspace, ConverterOptions, Orientation, PaperSize};
pub use object::{ErrorAction, HeaderFooter, ObjectOptions, Toc};

use crate::error::{Error, Result};

/// Native key that selects the in-memory output buffer when set to `""`.
pub const OUTPUT_KEY: &str = "out";

/// Decides whether a field's zero value is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionPolicy {
    /// Serialize even when the value is zero or empty.
    Always,
    /// Skip the value when it is zero or empty, leaving the native default.
    NonZero,
}

/// A typed option value before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue<'a> {
    /// Text, passed verbatim.
    Str(&'a str),
    /// Boolean, encoded as `true` or `false`.
    Bool(bool),
    /// Signed integer; non-zero only when positive.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Float, encoded in scientific notation.
    Float(f64),
}

impl SettingValue<'_> {
    /// Whether the value counts as non-zero for [`EmissionPolicy::NonZero`].
    ///
    /// Signed values must be strictly positive. Floats are truncated to an
    /// unsigned integer first, so anything in `(0, 1)` counts as zero.
    pub fn is_non_zero(&self) -> bool {
        match *self {
            SettingValue::Str(s) => !s.is_empty(),
            SettingValue::Bool(b) => b,
            SettingValue::Int(i) => i > 0,
            SettingValue::Uint(u) => u > 0,
            SettingValue::Float(f) => (f as u64) > 0,
        }
    }

    /// Encode the value to the string form expected by the engine.
    pub fn encode(&self) -> String {
        match *self {
            SettingValue::Str(s) => s.to_string(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Int(i) => i.to_string(),
            SettingValue::Uint(u) => u.to_string(),
            SettingValue::Float(f) => format_float(f),
        }
    }
}

/// One native setting operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOp<'a> {
    /// Native key, e.g. `margin.top`.
    pub name: &'static str,
    /// Typed value.
    pub value: SettingValue<'a>,
    /// Emission policy for the zero value.
    pub policy: EmissionPolicy,
}

impl<'a> SetOp<'a> {
    /// Operation that is serialized even for zero values.
    pub fn always(name: &'static str, value: SettingValue<'a>) -> Self {
        Self {
            name,
            value,
            policy: EmissionPolicy::Always,
        }
    }

    /// Operation that is skipped for zero values.
    pub fn non_zero(name: &'static str, value: SettingValue<'a>) -> Self {
        Self {
            name,
            value,
            policy: EmissionPolicy::NonZero,
        }
    }

    /// Encoded value, or `None` when the policy skips it.
    pub fn encode(&self) -> Option<String> {
        match self.policy {
            EmissionPolicy::Always => Some(self.value.encode()),
            EmissionPolicy::NonZero if self.value.is_non_zero() => Some(self.value.encode()),
            EmissionPolicy::NonZero => {
                if let SettingValue::Float(f) = self.value {
                    if f > 0.0 && f < 1.0 {
                        log::warn!(
                            "option `{}` = {} is truncated to zero and will not be set",
                            self.name,
                            f
                        );
                    }
                }
                None
            }
        }
    }
}

/// Destination for encoded settings.
///
/// Native settings handles implement this; so does `Vec<(String, String)>`,
/// which simply records every pair.
pub trait SettingsSink {
    /// Set a single option. Fails if the sink rejects the pair.
    fn set(&mut self, name: &str, value: &str) -> Result<()>;
}

impl SettingsSink for Vec<(String, String)> {
    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Apply operations in order, aborting on the first rejected pair.
///
/// Already applied settings are not rolled back.
pub fn apply_ops<S: SettingsSink + ?Sized>(ops: &[SetOp<'_>], sink: &mut S) -> Result<()> {
    for op in ops {
        if let Some(value) = op.encode() {
            sink.set(op.name, &value)?;
        }
    }
    Ok(())
}

/// Apply raw `(name, value)` overrides verbatim.
pub fn apply_raw<S: SettingsSink + ?Sized>(
    overrides: &[(String, String)],
    sink: &mut S,
) -> Result<()> {
    for (name, value) in overrides {
        sink.set(name, value)?;
    }
    Ok(())
}

/// Validate and normalize a raw option name.
pub(crate) fn option_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::EmptyOptionName);
    }
    Ok(name)
}

/// Format a float in shortest round-trip scientific notation.
///
/// The mantissa keeps as many digits as needed to round-trip, the exponent
/// always carries a sign and at least two digits: `1.5` becomes `1.5E+00`
/// and `0.001` becomes `1E-03`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let formatted = format!("{:E}", value);
    let (mantissa, exponent) = formatted
        .split_once('E')
        .unwrap_or((formatted.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };

    format!("{}E{}{:02}", mantissa, sign, exponent.unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectingSink(&'static str);

    impl SettingsSink for RejectingSink {
        fn set(&mut self, name: &str, value: &str) -> Result<()> {
            if name == self.0 {
                return Err(Error::InvalidOption {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1E+00");
        assert_eq!(format_float(1.5), "1.5E+00");
        assert_eq!(format_float(0.001), "1E-03");
        assert_eq!(format_float(1234.5), "1.2345E+03");
        assert_eq!(format_float(0.0), "0E+00");
        assert_eq!(format_float(-2.5), "-2.5E+00");
        assert_eq!(format_float(1e120), "1E+120");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NAN), "NaN");
    }

    #[test]
    fn test_non_zero_rules() {
        assert!(!SettingValue::Str("").is_non_zero());
        assert!(SettingValue::Str("a").is_non_zero());
        assert!(!SettingValue::Int(-3).is_non_zero());
        assert!(!SettingValue::Int(0).is_non_zero());
        assert!(SettingValue::Int(2).is_non_zero());
        assert!(!SettingValue::Uint(0).is_non_zero());
        assert!(!SettingValue::Float(0.75).is_non_zero());
        assert!(SettingValue::Float(1.5).is_non_zero());
        assert!(!SettingValue::Float(-4.0).is_non_zero());
    }

    #[test]
    fn test_always_emits_zero_values() {
        assert_eq!(
            SetOp::always("collate", SettingValue::Bool(false)).encode(),
            Some("false".to_string())
        );
        assert_eq!(
            SetOp::always("out", SettingValue::Str("")).encode(),
            Some(String::new())
        );
        assert_eq!(
            SetOp::always("pageOffset", SettingValue::Int(-2)).encode(),
            Some("-2".to_string())
        );
    }

    #[test]
    fn test_non_zero_skips_zero_values() {
        assert_eq!(SetOp::non_zero("copies", SettingValue::Uint(0)).encode(), None);
        assert_eq!(
            SetOp::non_zero("copies", SettingValue::Uint(1)).encode(),
            Some("1".to_string())
        );
        assert_eq!(
            SetOp::non_zero("load.zoomFactor", SettingValue::Float(0.5)).encode(),
            None
        );
    }

    #[test]
    fn test_apply_stops_at_first_rejection() {
        let ops = vec![
            SetOp::always("a", SettingValue::Bool(true)),
            SetOp::always("b", SettingValue::Uint(7)),
            SetOp::always("c", SettingValue::Bool(true)),
        ];
        let err = apply_ops(&ops, &mut RejectingSink("b")).unwrap_err();
        match err {
            Error::InvalidOption { name, value } => {
                assert_eq!(name, "b");
                assert_eq!(value, "7");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_option_name_validation() {
        assert_eq!(option_name("  dpi ").unwrap(), "dpi");
        assert!(matches!(option_name("   "), Err(Error::EmptyOptionName)));
    }
}
