//! Shipping address captured at checkout.
//!
//! The UI submits a [`ShippingForm`] of raw strings; [`ShippingForm::validate`]
//! turns it into a [`ShippingInfo`] or reports every offending field at once
//! so the form can highlight all of them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContactError, PhoneNumber, PinCode};

/// A field of the shipping form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShippingField {
    Address,
    City,
    State,
    PinCode,
    PhoneNumber,
}

impl ShippingField {
    /// Wire name of the field, matching the JSON key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::PinCode => "pinCode",
            Self::PhoneNumber => "phoneNumber",
        }
    }
}

impl fmt::Display for ShippingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipping form validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShippingError {
    /// Required fields left blank.
    pub missing: Vec<ShippingField>,
    /// Fields that are present but malformed.
    pub invalid: Vec<(ShippingField, ContactError)>,
}

impl ShippingError {
    /// Whether no problems were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Per-field messages for inline display.
    pub fn field_errors(&self) -> impl Iterator<Item = (ShippingField, String)> + '_ {
        self.missing
            .iter()
            .map(|field| (*field, format!("{field} is required")))
            .chain(
                self.invalid
                    .iter()
                    .map(|(field, err)| (*field, err.to_string())),
            )
    }
}

impl fmt::Display for ShippingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            let names: Vec<_> = self.missing.iter().map(|m| m.as_str()).collect();
            parts.push(format!("missing required fields: {}", names.join(", ")));
        }
        if !self.invalid.is_empty() {
            let names: Vec<_> = self
                .invalid
                .iter()
                .map(|(field, err)| format!("{field} ({err})"))
                .collect();
            parts.push(format!("invalid fields: {}", names.join(", ")));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ShippingError {}

/// Raw shipping form input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    pub address: String,
    pub city: String,
    pub state: String,
    pub pin_code: String,
    pub phone_number: String,
    #[serde(default)]
    pub landmark: Option<String>,
}

impl ShippingForm {
    /// Validate every field and build a [`ShippingInfo`].
    ///
    /// # Errors
    ///
    /// Returns a [`ShippingError`] listing all blank required fields and all
    /// malformed PIN code / phone values.
    pub fn validate(&self) -> Result<ShippingInfo, ShippingError> {
        let mut error = ShippingError::default();

        let mut required = |field: ShippingField, value: &str| -> String {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                error.missing.push(field);
            }
            trimmed.to_owned()
        };
        let address = required(ShippingField::Address, &self.address);
        let city = required(ShippingField::City, &self.city);
        let state = required(ShippingField::State, &self.state);

        let pin_code = match PinCode::parse(&self.pin_code) {
            Ok(pin) => Some(pin),
            Err(ContactError::Empty) => {
                error.missing.push(ShippingField::PinCode);
                None
            }
            Err(e) => {
                error.invalid.push((ShippingField::PinCode, e));
                None
            }
        };
        let phone_number = match PhoneNumber::parse(&self.phone_number) {
            Ok(phone) => Some(phone),
            Err(ContactError::Empty) => {
                error.missing.push(ShippingField::PhoneNumber);
                None
            }
            Err(e) => {
                error.invalid.push((ShippingField::PhoneNumber, e));
                None
            }
        };

        match (pin_code, phone_number) {
            (Some(pin_code), Some(phone_number)) if error.is_empty() => Ok(ShippingInfo {
                address,
                city,
                state,
                pin_code,
                phone_number,
                landmark: self
                    .landmark
                    .as_deref()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned),
            }),
            _ => Err(error),
        }
    }
}

/// A validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub state: String,
    pub pin_code: PinCode,
    pub phone_number: PhoneNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
}

impl From<&ShippingInfo> for ShippingForm {
    fn from(info: &ShippingInfo) -> Self {
        Self {
            address: info.address.clone(),
            city: info.city.clone(),
            state: info.state.clone(),
            pin_code: info.pin_code.to_string(),
            phone_number: info.phone_number.to_string(),
            landmark: info.landmark.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ShippingForm {
        ShippingForm {
            address: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pin_code: "560001".to_string(),
            phone_number: "9876543210".to_string(),
            landmark: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_valid_form() {
        let info = form().validate().unwrap();
        assert_eq!(info.city, "Bengaluru");
        assert_eq!(info.pin_code.as_str(), "560001");
        assert_eq!(info.landmark, None);
    }

    #[test]
    fn test_missing_fields_all_listed() {
        let mut f = form();
        f.address = "   ".to_string();
        f.state = String::new();
        f.phone_number = String::new();

        let err = f.validate().unwrap_err();
        assert_eq!(
            err.missing,
            vec![
                ShippingField::Address,
                ShippingField::State,
                ShippingField::PhoneNumber
            ]
        );
        assert!(err.invalid.is_empty());
        assert_eq!(
            err.to_string(),
            "missing required fields: address, state, phoneNumber"
        );
    }

    #[test]
    fn test_invalid_pin_code_reported_separately() {
        let mut f = form();
        f.pin_code = "5600".to_string();
        f.city = String::new();

        let err = f.validate().unwrap_err();
        assert_eq!(err.missing, vec![ShippingField::City]);
        assert_eq!(
            err.invalid,
            vec![(ShippingField::PinCode, ContactError::InvalidPinCode)]
        );
        let messages: Vec<_> = err.field_errors().collect();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let info = form().validate().unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["pinCode"], "560001");
        assert_eq!(json["phoneNumber"], "9876543210");
        assert!(json.get("landmark").is_none());
    }

    #[test]
    fn test_round_trip_to_form() {
        let info = form().validate().unwrap();
        let again = ShippingForm::from(&info).validate().unwrap();
        assert_eq!(info, again);
    }
}
