//! Contact detail types: email addresses, Indian postal codes and phone numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("value cannot be empty")]
    Empty,
    /// The email is longer than RFC 5321 allows.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not `local@domain`.
    #[error("email must look like name@domain")]
    MalformedEmail,
    /// A PIN code must be exactly six digits and cannot start with zero.
    #[error("PIN code must be 6 digits")]
    InvalidPinCode,
    /// A phone number must be exactly ten digits.
    #[error("phone number must be 10 digits")]
    InvalidPhoneNumber,
}

/// An email address with a non-empty local part and domain.
///
/// ```
/// use hekto_core::Email;
///
/// assert!(Email::parse("shopper@example.in").is_ok());
/// assert!(Email::parse("no-at-symbol").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, or not `local@domain`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::EmailTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        match s.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(s.to_owned()))
            }
            _ => Err(ContactError::MalformedEmail),
        }
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A six-digit Indian postal index number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PinCode(String);

impl PinCode {
    /// Parse a PIN code, ignoring surrounding and embedded spaces (`"110 001"`).
    ///
    /// # Errors
    ///
    /// Returns an error unless the input is six ASCII digits not starting with `0`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            return Err(ContactError::Empty);
        }
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0') {
            return Err(ContactError::InvalidPinCode);
        }
        Ok(Self(digits))
    }

    /// Returns the PIN code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A ten-digit Indian mobile or landline number, stored without prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse a phone number.
    ///
    /// Spaces, dashes and a leading `+91` country code are accepted and
    /// stripped.
    ///
    /// # Errors
    ///
    /// Returns an error unless ten digits remain.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ContactError::Empty);
        }
        let without_prefix = trimmed.strip_prefix("+91").unwrap_or(trimmed);
        let digits: String = without_prefix
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ContactError::InvalidPhoneNumber);
        }
        Ok(Self(digits))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_conversions {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ContactError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ContactError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_conversions!(Email);
string_conversions!(PinCode);
string_conversions!(PhoneNumber);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::parse("user@example.com").is_ok());
        assert!(Email::parse("  a@b.c ").is_ok());
    }

    #[test]
    fn test_email_invalid() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty));
        assert_eq!(Email::parse("@domain.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("user@"), Err(ContactError::MalformedEmail));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            Email::parse(&long),
            Err(ContactError::EmailTooLong { .. })
        ));
    }

    #[test]
    fn test_pin_code() {
        assert_eq!(PinCode::parse("110 001").unwrap().as_str(), "110001");
        assert_eq!(PinCode::parse("11001"), Err(ContactError::InvalidPinCode));
        assert_eq!(PinCode::parse("011001"), Err(ContactError::InvalidPinCode));
        assert_eq!(PinCode::parse("11000a"), Err(ContactError::InvalidPinCode));
        assert_eq!(PinCode::parse("   "), Err(ContactError::Empty));
    }

    #[test]
    fn test_phone_number() {
        assert_eq!(PhoneNumber::parse("+91 98765-43210").unwrap().as_str(), "9876543210");
        assert_eq!(PhoneNumber::parse("98765"), Err(ContactError::InvalidPhoneNumber));
        assert_eq!(PhoneNumber::parse(""), Err(ContactError::Empty));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<PinCode>("\"560001\"").is_ok());
        assert!(serde_json::from_str::<PinCode>("\"56\"").is_err());
    }
}
