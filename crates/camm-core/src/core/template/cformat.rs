//! C-style numeric conversion specifications, as embedded in template placeholders.
//!
//! Supports `%[flags][width][.precision][length]conversion` with the flags
//! `- + space 0 #`, the floating conversions `f F e E g G` and the integer
//! conversions `d i`. Length modifiers (`h l L`) are accepted and ignored.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PRECISION: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Format specification '{0}' must start with '%'")]
    MissingPercent(String),
    #[error("Format specification '{0}' has no conversion character")]
    MissingConversion(String),
    #[error("Unsupported conversion '{conversion}' in format specification '{spec}'")]
    UnsupportedConversion { spec: String, conversion: char },
    #[error("Unexpected trailing characters in format specification '{0}'")]
    TrailingCharacters(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub left_align: bool,
    pub force_sign: bool,
    pub space_sign: bool,
    pub zero_pad: bool,
    pub alternate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Fixed { upper: bool },
    Exponent { upper: bool },
    General { upper: bool },
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CFormat {
    pub flags: Flags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub conversion: Conversion,
}

impl CFormat {
    /// Parses a conversion specification at the start of `input`, returning it
    /// together with the number of bytes consumed.
    pub fn parse_prefix(input: &str) -> Result<(Self, usize), FormatError> {
        let bytes = input.as_bytes();
        if bytes.first() != Some(&b'%') {
            return Err(FormatError::MissingPercent(input.to_string()));
        }
        let mut pos = 1;

        let mut flags = Flags::default();
        while let Some(&b) = bytes.get(pos) {
            match b {
                b'-' => flags.left_align = true,
                b'+' => flags.force_sign = true,
                b' ' => flags.space_sign = true,
                b'0' => flags.zero_pad = true,
                b'#' => flags.alternate = true,
                _ => break,
            }
            pos += 1;
        }

        let (width, consumed) = read_number(&bytes[pos..]);
        pos += consumed;

        let mut precision = None;
        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            let (digits, consumed) = read_number(&bytes[pos..]);
            precision = Some(digits.unwrap_or(0));
            pos += consumed;
        }

        while matches!(bytes.get(pos), Some(b'h' | b'l' | b'L')) {
            pos += 1;
        }

        let conversion_char = input[pos..]
            .chars()
            .next()
            .ok_or_else(|| FormatError::MissingConversion(input.to_string()))?;
        let conversion = match conversion_char {
            'f' => Conversion::Fixed { upper: false },
            'F' => Conversion::Fixed { upper: true },
            'e' => Conversion::Exponent { upper: false },
            'E' => Conversion::Exponent { upper: true },
            'g' => Conversion::General { upper: false },
            'G' => Conversion::General { upper: true },
            'd' | 'i' => Conversion::Integer,
            other => {
                return Err(FormatError::UnsupportedConversion {
                    spec: input.to_string(),
                    conversion: other,
                });
            }
        };
        pos += conversion_char.len_utf8();

        Ok((
            Self {
                flags,
                width,
                precision,
                conversion,
            },
            pos,
        ))
    }

    pub fn format(&self, value: f64) -> String {
        let negative = value.is_sign_negative() && !value.is_nan();
        let magnitude = value.abs();

        let body = if magnitude.is_finite() {
            self.format_magnitude(magnitude)
        } else {
            let text = if value.is_nan() { "nan" } else { "inf" };
            if self.is_upper() {
                text.to_uppercase()
            } else {
                text.to_string()
            }
        };

        let sign = if negative {
            "-"
        } else if self.flags.force_sign {
            "+"
        } else if self.flags.space_sign {
            " "
        } else {
            ""
        };

        let len = sign.len() + body.len();
        let width = self.width.unwrap_or(0);
        if len >= width {
            return format!("{sign}{body}");
        }
        let fill = width - len;
        if self.flags.left_align {
            format!("{sign}{body}{}", " ".repeat(fill))
        } else if self.flags.zero_pad && magnitude.is_finite() {
            format!("{sign}{}{body}", "0".repeat(fill))
        } else {
            format!("{}{sign}{body}", " ".repeat(fill))
        }
    }

    fn is_upper(&self) -> bool {
        matches!(
            self.conversion,
            Conversion::Fixed { upper: true }
                | Conversion::Exponent { upper: true }
                | Conversion::General { upper: true }
        )
    }

    fn format_magnitude(&self, magnitude: f64) -> String {
        let precision = self.precision.unwrap_or(DEFAULT_PRECISION);
        match self.conversion {
            Conversion::Fixed { .. } => {
                let mut text = format!("{:.*}", precision, magnitude);
                if precision == 0 && self.flags.alternate {
                    text.push('.');
                }
                text
            }
            Conversion::Exponent { upper } => {
                let mut text = exponent_notation(magnitude, precision, upper);
                if precision == 0 && self.flags.alternate {
                    if let Some(e) = text.find(['e', 'E']) {
                        text.insert(e, '.');
                    }
                }
                text
            }
            Conversion::General { upper } => {
                general_notation(magnitude, precision, upper, self.flags.alternate)
            }
            Conversion::Integer => format!("{:.0}", magnitude.trunc()),
        }
    }
}

impl FromStr for CFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (format, consumed) = Self::parse_prefix(s)?;
        if consumed != s.len() {
            return Err(FormatError::TrailingCharacters(s.to_string()));
        }
        Ok(format)
    }
}

impl fmt::Display for CFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("%")?;
        let flags = [
            (self.flags.left_align, '-'),
            (self.flags.force_sign, '+'),
            (self.flags.space_sign, ' '),
            (self.flags.zero_pad, '0'),
            (self.flags.alternate, '#'),
        ];
        for (set, c) in flags {
            if set {
                write!(f, "{c}")?;
            }
        }
        if let Some(width) = self.width {
            write!(f, "{width}")?;
        }
        if let Some(precision) = self.precision {
            write!(f, ".{precision}")?;
        }
        let conversion = match self.conversion {
            Conversion::Fixed { upper } => if upper { 'F' } else { 'f' },
            Conversion::Exponent { upper } => if upper { 'E' } else { 'e' },
            Conversion::General { upper } => if upper { 'G' } else { 'g' },
            Conversion::Integer => 'd',
        };
        write!(f, "{conversion}")
    }
}

fn read_number(bytes: &[u8]) -> (Option<usize>, usize) {
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return (None, 0);
    }
    let value = bytes[..digits]
        .iter()
        .fold(0usize, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as usize));
    (Some(value), digits)
}

/// Splits Rust's `{:e}` output into mantissa and decimal exponent.
fn split_exponent(magnitude: f64, precision: usize) -> (String, i32) {
    let text = format!("{:.*e}", precision, magnitude);
    match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

pub(crate) fn exponent_notation(magnitude: f64, precision: usize, upper: bool) -> String {
    let (mantissa, exponent) = split_exponent(magnitude, precision);
    let sign = if exponent < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exponent.unsigned_abs())
}

fn general_notation(magnitude: f64, precision: usize, upper: bool, alternate: bool) -> String {
    let significant = precision.max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        split_exponent(magnitude, significant - 1).1
    };

    let mut text = if exponent >= -4 && (exponent as i64) < significant as i64 {
        let decimals = (significant as i64 - 1 - exponent as i64).max(0) as usize;
        format!("{:.*}", decimals, magnitude)
    } else {
        exponent_notation(magnitude, significant - 1, upper)
    };

    if !alternate {
        text = strip_trailing_zeros(&text);
    }
    text
}

fn strip_trailing_zeros(text: &str) -> String {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(idx) => text.split_at(idx),
        None => (text, ""),
    };
    if !mantissa.contains('.') {
        return text.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{exponent}")
}
