//! Client-side validation of card fields.
//!
//! Each field is checked independently so the payment form can show an
//! inline message per field; the submitted values are never modified.

use core::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Card details as typed into the payment form.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CardInput {
    pub number: String,
    /// `MM/YY` or `MM/YYYY`.
    pub expiry: String,
    pub cvc: String,
}

impl fmt::Debug for CardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardInput")
            .field("number", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .field("cvc", &"[REDACTED]")
            .finish()
    }
}

/// Per-field validation messages; `None` means the field is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardFieldErrors {
    pub card: Option<String>,
    pub expiry: Option<String>,
    pub cvc: Option<String>,
}

impl CardFieldErrors {
    /// Whether every field passed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.card.is_none() && self.expiry.is_none() && self.cvc.is_none()
    }
}

impl fmt::Display for CardFieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = [&self.card, &self.expiry, &self.cvc]
            .into_iter()
            .filter_map(Option::as_deref)
            .collect();
        f.write_str(&messages.join(" "))
    }
}

impl std::error::Error for CardFieldErrors {}

/// Card details that passed validation, normalised for the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidCard {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
}

impl ValidCard {
    /// Last four digits, for logs and receipts.
    #[must_use]
    pub fn last4(&self) -> &str {
        self.number
            .get(self.number.len().saturating_sub(4)..)
            .unwrap_or_default()
    }
}

impl fmt::Debug for ValidCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidCard")
            .field("last4", &self.last4())
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

impl CardInput {
    /// Validate against today's local date.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages for every invalid field.
    pub fn validate_now(&self) -> Result<ValidCard, CardFieldErrors> {
        self.validate(chrono::Local::now().date_naive())
    }

    /// Validate all three fields, reporting every failure at once.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages for every invalid field.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidCard, CardFieldErrors> {
        let number = validate_number(&self.number);
        let expiry = validate_expiry(&self.expiry, today);
        let cvc = validate_cvc(&self.cvc);

        match (number, expiry, cvc) {
            (Ok(number), Ok((exp_month, exp_year)), Ok(cvc)) => Ok(ValidCard {
                number,
                exp_month,
                exp_year,
                cvc,
            }),
            (number, expiry, cvc) => Err(CardFieldErrors {
                card: number.err(),
                expiry: expiry.err(),
                cvc: cvc.err(),
            }),
        }
    }
}

fn validate_number(raw: &str) -> Result<String, String> {
    let digits: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if digits.is_empty() {
        return Err("Your card number is incomplete.".to_string());
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err("Your card number is invalid.".to_string());
    }
    if digits.len() < 13 {
        return Err("Your card number is incomplete.".to_string());
    }
    if digits.len() > 19 || !luhn_valid(&digits) {
        return Err("Your card number is invalid.".to_string());
    }
    Ok(digits)
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn validate_expiry(raw: &str, today: NaiveDate) -> Result<(u32, i32), String> {
    let incomplete = || "Your card's expiration date is incomplete.".to_string();

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (month, year) = compact.split_once('/').ok_or_else(incomplete)?;
    if month.is_empty() || year.is_empty() {
        return Err(incomplete());
    }

    let month: u32 = month
        .parse()
        .map_err(|_| "Your card's expiration date is invalid.".to_string())?;
    if !(1..=12).contains(&month) {
        return Err("Your card's expiration month is invalid.".to_string());
    }

    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().map_err(|_| incomplete())?,
        4 => year.parse().map_err(|_| incomplete())?,
        _ => return Err(incomplete()),
    };

    if (year, month) < (today.year(), today.month()) {
        return Err("Your card's expiration date is in the past.".to_string());
    }
    Ok((month, year))
}

fn validate_cvc(raw: &str) -> Result<String, String> {
    let cvc = raw.trim();
    if cvc.len() < 3 {
        return Err("Your card's security code is incomplete.".to_string());
    }
    if cvc.len() > 4 || !cvc.bytes().all(|b| b.is_ascii_digit()) {
        return Err("Your card's security code is invalid.".to_string());
    }
    Ok(cvc.to_owned())
}
