//! Message domain types: echo, invoice and business premises registration.
mod invoice;
mod office;

pub use invoice::{
    Fee, Invoice, InvoiceFields, InvoiceNumber, MAX_AMOUNT, MAX_RATE, PaymentMethod, SequenceMark,
    Tax, TaxCategory,
};
pub use office::{Address, ClosureMark, Office, OfficeFields};
pub(crate) use invoice::format_amount;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Kind of message exchanged with the fiscalization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Echo,
    Invoice,
    Office,
}

impl MessageKind {
    /// Tag used as the prefix of the signed element `Id`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Echo => "echo",
            MessageKind::Invoice => "invoice",
            MessageKind::Office => "office",
        }
    }

    pub(crate) fn request_element(&self) -> &'static str {
        match self {
            MessageKind::Echo => "tns:EchoRequest",
            MessageKind::Invoice => "tns:RacunZahtjev",
            MessageKind::Office => "tns:PoslovniProstorZahtjev",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a rendered message, as embedded in its `Zaglavlje` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHeader {
    uuid: Uuid,
    time_sent: NaiveDateTime,
}

impl MessageHeader {
    pub fn new(uuid: Uuid, time_sent: NaiveDateTime) -> Self {
        Self { uuid, time_sent }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn time_sent(&self) -> NaiveDateTime {
        self.time_sent
    }
}

/// Borrowed view over one of the supported messages.
#[derive(Debug, Clone, Copy)]
pub enum Message<'a> {
    Echo(&'a Echo),
    Invoice(&'a Invoice),
    Office(&'a Office),
}

impl Message<'_> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Echo(_) => MessageKind::Echo,
            Message::Invoice(_) => MessageKind::Invoice,
            Message::Office(_) => MessageKind::Office,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Message::Echo(echo) => echo.uuid(),
            Message::Invoice(invoice) => invoice.uuid(),
            Message::Office(office) => office.uuid(),
        }
    }

    pub fn time_sent(&self) -> Option<NaiveDateTime> {
        match self {
            Message::Echo(echo) => echo.time_sent(),
            Message::Invoice(invoice) => invoice.time_sent(),
            Message::Office(office) => office.time_sent(),
        }
    }

    /// Re-checks the message against the protocol constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Message::Echo(echo) => echo.validate(),
            Message::Invoice(invoice) => invoice.validate(),
            Message::Office(office) => office.validate(),
        }
    }
}

impl<'a> From<&'a Echo> for Message<'a> {
    fn from(value: &'a Echo) -> Self {
        Message::Echo(value)
    }
}

impl<'a> From<&'a Invoice> for Message<'a> {
    fn from(value: &'a Invoice) -> Self {
        Message::Invoice(value)
    }
}

impl<'a> From<&'a Office> for Message<'a> {
    fn from(value: &'a Office) -> Self {
        Message::Office(value)
    }
}

/// Connectivity check carrying free text that the service sends back.
///
/// # Examples
/// ```rust
/// use fiskal_core::message::Echo;
///
/// let echo = Echo::new("ping-123")?;
/// assert_eq!(echo.text(), "ping-123");
/// # Ok::<(), fiskal_core::message::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Echo {
    text: String,
    uuid: Uuid,
    time_sent: Option<NaiveDateTime>,
}

impl Echo {
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        let echo = Self {
            text: text.into(),
            uuid: Uuid::new_v4(),
            time_sent: None,
        };
        echo.validate()?;
        Ok(echo)
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    pub fn with_time_sent(mut self, time_sent: NaiveDateTime) -> Self {
        self.time_sent = Some(time_sent);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn time_sent(&self) -> Option<NaiveDateTime> {
        self.time_sent
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(MessageField::Text, &self.text)
    }
}

/// Caller-supplied data that violates a protocol constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid field `{field}`: {kind}")]
pub struct ValidationError {
    pub field: MessageField,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn new(field: MessageField, kind: ValidationKind) -> Self {
        Self { field, kind }
    }
}

#[non_exhaustive]
/// Field associated with a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageField {
    Pin,
    Text,
    InvoiceNumber,
    Premises,
    Device,
    Taxes,
    TaxBase,
    TaxRate,
    TaxName,
    TaxExemptAmount,
    MarginAmount,
    NonTaxableAmount,
    FeeName,
    FeeAmount,
    Total,
    OperatorPin,
    SecurityCode,
    ParagonNumber,
    SpecificPurpose,
    Label,
    Address,
    WorkingHours,
}

impl MessageField {
    /// Field path as written in JSON input, e.g. `taxes.base`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageField::Pin => "pin",
            MessageField::Text => "text",
            MessageField::InvoiceNumber => "number.number",
            MessageField::Premises => "number.premises",
            MessageField::Device => "number.device",
            MessageField::Taxes => "taxes",
            MessageField::TaxBase => "taxes.base",
            MessageField::TaxRate => "taxes.rate",
            MessageField::TaxName => "taxes.name",
            MessageField::TaxExemptAmount => "tax_exempt_amount",
            MessageField::MarginAmount => "margin_amount",
            MessageField::NonTaxableAmount => "non_taxable_amount",
            MessageField::FeeName => "fees.name",
            MessageField::FeeAmount => "fees.amount",
            MessageField::Total => "total",
            MessageField::OperatorPin => "operator_pin",
            MessageField::SecurityCode => "security_code",
            MessageField::ParagonNumber => "paragon_number",
            MessageField::SpecificPurpose => "specific_purpose",
            MessageField::Label => "label",
            MessageField::Address => "address",
            MessageField::WorkingHours => "working_hours",
        }
    }
}

impl fmt::Display for MessageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[non_exhaustive]
/// Classification of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Missing,
    Empty,
    InvalidFormat,
    OutOfRange,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationKind::Missing => "missing",
            ValidationKind::Empty => "empty",
            ValidationKind::InvalidFormat => "invalid format",
            ValidationKind::OutOfRange => "out of range",
        };
        f.write_str(text)
    }
}

/// Checks a Croatian personal identification number (OIB): eleven digits
/// whose last digit is the ISO 7064 MOD 11,10 check digit of the first ten.
///
/// # Examples
/// ```rust
/// use fiskal_core::message::is_valid_oib;
///
/// assert!(is_valid_oib("69435151530"));
/// assert!(!is_valid_oib("69435151531"));
/// ```
pub fn is_valid_oib(value: &str) -> bool {
    if value.len() != 11 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = value.bytes().map(|b| u32::from(b - b'0')).collect();
    let mut product = 10;
    for digit in &digits[..10] {
        let mut sum = (digit + product) % 10;
        if sum == 0 {
            sum = 10;
        }
        product = (sum * 2) % 11;
    }
    let check = (11 - product) % 10;
    check == digits[10]
}

pub(crate) fn require_text(field: MessageField, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, ValidationKind::Missing));
    }
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, ValidationKind::Empty));
    }
    Ok(())
}

pub(crate) fn optional_text(field: MessageField, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(ValidationError::new(field, ValidationKind::Empty))
        }
        _ => Ok(()),
    }
}

pub(crate) fn require_oib(field: MessageField, value: &str) -> Result<(), ValidationError> {
    require_text(field, value)?;
    if !is_valid_oib(value) {
        return Err(ValidationError::new(field, ValidationKind::InvalidFormat));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oib_check_digit_is_verified() {
        for valid in ["12345678903", "69435151530", "94577403194"] {
            assert!(is_valid_oib(valid), "{valid} should be valid");
        }
        assert!(!is_valid_oib("12345678901"));
        assert!(!is_valid_oib("1234567890"));
        assert!(!is_valid_oib("1234567890a"));
    }

    #[test]
    fn echo_requires_text() {
        let err = Echo::new("").expect_err("empty echo");
        assert_eq!(err, ValidationError::new(MessageField::Text, ValidationKind::Missing));
        let err = Echo::new("   ").expect_err("blank echo");
        assert_eq!(err.kind, ValidationKind::Empty);
    }

    #[test]
    fn validation_error_names_field() {
        let err = ValidationError::new(MessageField::Pin, ValidationKind::Missing);
        assert_eq!(err.to_string(), "invalid field `pin`: missing");
        let err = ValidationError::new(MessageField::TaxBase, ValidationKind::OutOfRange);
        assert_eq!(err.to_string(), "invalid field `taxes.base`: out of range");
        for field in [
            MessageField::TaxExemptAmount,
            MessageField::FeeName,
            MessageField::OperatorPin,
            MessageField::WorkingHours,
        ] {
            assert!(
                field
                    .as_str()
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b == b'_' || b == b'.'),
                "{field}"
            );
        }
    }

    #[test]
    fn message_view_exposes_kind_and_identity() {
        let uuid = Uuid::parse_str("8e6000cf-1a98-4174-b3e7-b5d5954bc10d").expect("uuid");
        let echo = Echo::new("ping").expect("echo").with_uuid(uuid);
        let message = Message::from(&echo);
        assert_eq!(message.kind(), MessageKind::Echo);
        assert_eq!(message.uuid(), uuid);
        assert_eq!(message.time_sent(), None);
        assert_eq!(MessageKind::Office.to_string(), "office");
    }
}
