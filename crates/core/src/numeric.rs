//! Validation and display of decimal form input.
//!
//! Quantity and price fields arrive as untrusted text. [`parse_positive_decimal`]
//! turns them into an exact [`Decimal`] or a [`Rejection`] tag the caller can show
//! next to the offending field. [`format_decimal`] is the display counterpart and
//! never produces exponent notation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of digits a `Decimal` significand can hold.
const MAX_SIGNIFICANT_DIGITS: usize = 28;

const NON_FINITE_SPELLINGS: &[&str] = &["inf", "infinity", "nan", "snan"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("value is empty")]
    Empty,
    #[error("value is not a plain decimal number")]
    Malformed,
    #[error("exponent notation is not allowed")]
    ExponentNotAllowed,
    #[error("value is not a finite number")]
    NonFinite,
    #[error("value must be greater than zero")]
    NotPositive,
    #[error("value exceeds the allowed maximum")]
    TooLarge,
    #[error("value has too many fractional digits")]
    TooPrecise,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Malformed => "malformed",
            Self::ExponentNotAllowed => "exponent_not_allowed",
            Self::NonFinite => "non_finite",
            Self::NotPositive => "not_positive",
            Self::TooLarge => "too_large",
            Self::TooPrecise => "too_precise",
        }
    }

    /// Message shown next to the form field that produced the rejection.
    pub fn field_message(&self, label: &str, limits: &FieldLimits) -> String {
        match self {
            Self::Empty => format!("{label}: a value is required"),
            Self::Malformed => format!("{label}: enter a plain number such as 12.5"),
            Self::ExponentNotAllowed => format!("{label}: exponent notation is not allowed"),
            Self::NonFinite => format!("{label}: the value must be a finite number"),
            Self::NotPositive => format!("{label}: the value must be greater than zero"),
            Self::TooLarge => {
                format!("{label}: the value must be below {}", limits.max_exclusive.normalize())
            }
            Self::TooPrecise => format!(
                "{label}: at most {} digits after the decimal point",
                limits.max_fraction_digits
            ),
        }
    }
}

/// Range and precision accepted for one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLimits {
    /// Values must be strictly below this ceiling.
    pub max_exclusive: Decimal,
    pub max_fraction_digits: u32,
}

impl FieldLimits {
    pub fn new(max_exclusive: Decimal, max_fraction_digits: u32) -> Self {
        Self { max_exclusive, max_fraction_digits }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStyle {
    /// Exactly `n` fractional digits, zero padded.
    Fixed(u32),
    /// Up to `max_fraction_digits`, trailing zeros removed.
    Trimmed { max_fraction_digits: u32 },
}

impl DisplayStyle {
    pub fn fraction_digits(&self) -> u32 {
        match self {
            Self::Fixed(digits) => *digits,
            Self::Trimmed { max_fraction_digits } => *max_fraction_digits,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericField {
    pub limits: FieldLimits,
    pub display: DisplayStyle,
}

impl NumericField {
    pub fn quantity(max_exclusive: Decimal, max_fraction_digits: u32) -> Self {
        Self {
            limits: FieldLimits::new(max_exclusive, max_fraction_digits),
            display: DisplayStyle::Trimmed { max_fraction_digits },
        }
    }

    pub fn money(max_exclusive: Decimal, max_fraction_digits: u32) -> Self {
        Self {
            limits: FieldLimits::new(max_exclusive, max_fraction_digits),
            display: DisplayStyle::Fixed(max_fraction_digits),
        }
    }

    pub fn parse(&self, text: &str) -> Result<Decimal, Rejection> {
        parse_positive_decimal(text, &self.limits)
    }

    pub fn format(&self, value: Decimal) -> String {
        format_decimal(value, self.display)
    }
}

/// Field settings for purchase-request input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericLimits {
    pub quantity: NumericField,
    pub unit_price: NumericField,
}

impl Default for NumericLimits {
    fn default() -> Self {
        let ceiling = Decimal::from(1_000_000_000u64);
        Self {
            quantity: NumericField::quantity(ceiling, 4),
            unit_price: NumericField::money(ceiling, 2),
        }
    }
}

pub fn parse_positive_decimal(text: &str, limits: &FieldLimits) -> Result<Decimal, Rejection> {
    let token = text.trim();
    if token.is_empty() {
        return Err(Rejection::Empty);
    }
    if token.contains(['e', 'E']) {
        return Err(Rejection::ExponentNotAllowed);
    }
    if is_non_finite_spelling(token) {
        return Err(Rejection::NonFinite);
    }

    let parts = split_plain_decimal(token).ok_or(Rejection::Malformed)?;
    if parts.negative || parts.is_zero() {
        return Err(Rejection::NotPositive);
    }

    let value = parts.to_decimal(limits)?;
    if value.is_sign_negative() || value.is_zero() {
        return Err(Rejection::NotPositive);
    }
    if value >= limits.max_exclusive {
        return Err(Rejection::TooLarge);
    }
    if value.scale() > limits.max_fraction_digits {
        return Err(Rejection::TooPrecise);
    }

    Ok(value)
}

pub fn format_decimal(value: Decimal, style: DisplayStyle) -> String {
    match style {
        DisplayStyle::Fixed(digits) => {
            let rounded =
                value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
            render_plain(rounded, digits)
        }
        DisplayStyle::Trimmed { max_fraction_digits } => {
            let rounded = value
                .round_dp_with_strategy(max_fraction_digits, RoundingStrategy::MidpointAwayFromZero)
                .normalize();
            render_plain(rounded, rounded.scale())
        }
    }
}

fn is_non_finite_spelling(token: &str) -> bool {
    let unsigned = token.trim_start_matches(['+', '-']).to_ascii_lowercase();
    NON_FINITE_SPELLINGS.contains(&unsigned.as_str())
}

/// Builds the digit string by hand so the output never depends on how the
/// numeric library chooses to stringify very large or very small values.
fn render_plain(value: Decimal, fraction_digits: u32) -> String {
    let digits = value.mantissa().unsigned_abs().to_string();
    let scale = value.scale() as usize;
    let fraction_digits = fraction_digits as usize;

    let (integer, fraction) = if digits.len() > scale {
        let (integer, fraction) = digits.split_at(digits.len() - scale);
        (integer.to_string(), fraction.to_string())
    } else {
        ("0".to_string(), format!("{digits:0>scale$}"))
    };

    let mut fraction = fraction;
    if fraction.len() > fraction_digits {
        fraction.truncate(fraction_digits);
    }
    while fraction.len() < fraction_digits {
        fraction.push('0');
    }

    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    if fraction.is_empty() {
        format!("{sign}{integer}")
    } else {
        format!("{sign}{integer}.{fraction}")
    }
}

struct DecimalParts<'a> {
    negative: bool,
    integer: &'a str,
    fraction: &'a str,
}

impl DecimalParts<'_> {
    fn is_zero(&self) -> bool {
        self.integer.bytes().chain(self.fraction.bytes()).all(|digit| digit == b'0')
    }

    fn to_decimal(&self, limits: &FieldLimits) -> Result<Decimal, Rejection> {
        let integer = self.integer.trim_start_matches('0');
        if integer.len() > MAX_SIGNIFICANT_DIGITS {
            return Err(Rejection::TooLarge);
        }

        let integer = if integer.is_empty() { "0" } else { integer };
        let exact = if self.fraction.is_empty() {
            integer.to_string()
        } else {
            format!("{integer}.{}", self.fraction)
        };

        // A token that does not fit the significand at its written scale is
        // either too large or written with more digits than any bound allows.
        Decimal::from_str_exact(&exact).map_err(|_| match Decimal::from_str_exact(integer) {
            Ok(whole) if whole < limits.max_exclusive => Rejection::TooPrecise,
            _ => Rejection::TooLarge,
        })
    }
}

fn split_plain_decimal(token: &str) -> Option<DecimalParts<'_>> {
    let (negative, unsigned) = match token.as_bytes().first() {
        Some(b'+') => (false, &token[1..]),
        Some(b'-') => (true, &token[1..]),
        _ => (false, token),
    };

    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (unsigned, ""),
    };

    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if integer.is_empty() || !all_digits(integer) {
        return None;
    }
    if unsigned.contains('.') && (fraction.is_empty() || !all_digits(fraction)) {
        return None;
    }

    Some(DecimalParts { negative, integer, fraction })
}
