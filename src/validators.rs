//! Normalisation of the free-text identifiers found on invoices.
//!
//! These three functions are the only place where tax IDs, issue dates and
//! document numbers are interpreted. [`crate::model`] calls them for model
//! replies and for user edits alike, so both paths accept and reject exactly
//! the same inputs.

use crate::error::ValidationError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of digits in a Polish NIP.
pub const TAX_ID_DIGITS: usize = 10;

/// Strip every non-digit and require exactly ten ASCII digits.
///
/// Country prefixes (`PL`), dashes, dots and spaces are all treated as noise.
///
/// ```rust
/// use edgequake_invoice::validators::normalize_tax_id;
///
/// assert_eq!(normalize_tax_id("PL 123-456-78-90").unwrap(), "1234567890");
/// assert!(normalize_tax_id("123456789").is_err());
/// ```
pub fn normalize_tax_id(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.len() != TAX_ID_DIGITS {
        return Err(ValidationError::InvalidTaxId {
            digits: digits.len(),
        });
    }

    Ok(digits)
}

/// A date that is either already typed or still raw text.
///
/// Model replies carry strings; an edit form usually hands over a picked
/// calendar date. Both go through [`parse_date`].
///
/// Deserialising always yields [`DateInput::Text`], so JSON dates are read by
/// the layouts of [`parse_date`] and nothing else. A typed date serialises as
/// ISO `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateInput {
    Date(NaiveDate),
    Text(String),
}

impl Serialize for DateInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateInput::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            DateInput::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for DateInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(DateInput::Text)
    }
}

impl From<NaiveDate> for DateInput {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::Text(s)
    }
}

// Accepted layouts in priority order. First match wins.
static RE_DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})$").unwrap());
static RE_SLASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})$").unwrap());
static RE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").unwrap());

#[derive(Clone, Copy)]
enum Order {
    DayMonthYear,
    YearMonthDay,
}

/// Parse an issue date.
///
/// Typed dates pass through unchanged. Text is trimmed and tried against
/// `DD.MM.YYYY`, `DD/MM/YYYY` and `YYYY-MM-DD`, in that order. A string that
/// has the right shape but names an impossible day (`32.01.2025`,
/// `29.02.2023`) is rejected.
///
/// ```rust
/// use chrono::NaiveDate;
/// use edgequake_invoice::validators::parse_date;
///
/// let d = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
/// assert_eq!(parse_date("12.01.2025").unwrap(), d);
/// assert_eq!(parse_date("12/01/2025").unwrap(), d);
/// assert_eq!(parse_date("2025-01-12").unwrap(), d);
/// ```
pub fn parse_date(raw: impl Into<DateInput>) -> Result<NaiveDate, ValidationError> {
    let text = match raw.into() {
        DateInput::Date(d) => return Ok(d),
        DateInput::Text(s) => s,
    };
    let trimmed = text.trim();

    let layouts: [(&Regex, Order); 3] = [
        (&*RE_DOTTED, Order::DayMonthYear),
        (&*RE_SLASHED, Order::DayMonthYear),
        (&*RE_ISO, Order::YearMonthDay),
    ];

    for (re, order) in layouts {
        let Some(caps) = re.captures(trimmed) else {
            continue;
        };
        let field = |i: usize| caps[i].parse::<u32>().ok();
        let (day, month, year) = match order {
            Order::DayMonthYear => (field(1), field(2), field(3)),
            Order::YearMonthDay => (field(3), field(2), field(1)),
        };
        if let (Some(d), Some(m), Some(y)) = (day, month, year) {
            if let Some(date) = i32::try_from(y)
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, m, d))
            {
                return Ok(date);
            }
        }
    }

    Err(ValidationError::InvalidDate { input: text })
}

/// Remove every whitespace character from a document number.
///
/// ```rust
/// use edgequake_invoice::validators::normalize_document_number;
///
/// assert_eq!(normalize_document_number("FV 001 / 2025").unwrap(), "FV001/2025");
/// assert!(normalize_document_number("   ").is_err());
/// ```
pub fn normalize_document_number(raw: &str) -> Result<String, ValidationError> {
    let normalized: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    if normalized.is_empty() {
        return Err(ValidationError::EmptyDocumentNumber);
    }

    Ok(normalized)
}
