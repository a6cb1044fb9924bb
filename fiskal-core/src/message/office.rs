use super::{
    MessageField, ValidationError, ValidationKind, optional_text, require_oib, require_text,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location of the business premises. When `other` is set the premises are
/// reported by that free-text description (mobile shops, online sales, ...)
/// and the structured parts are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub house_number_addendum: Option<String>,
    pub postal_code: Option<String>,
    pub settlement: Option<String>,
    pub township: Option<String>,
    pub other: Option<String>,
}

impl Address {
    /// Free-text location used instead of a street address.
    pub fn other(description: impl Into<String>) -> Self {
        Self {
            other: Some(description.into()),
            ..Self::default()
        }
    }

    fn parts(&self) -> [Option<&str>; 6] {
        [
            self.street.as_deref(),
            self.house_number.as_deref(),
            self.house_number_addendum.as_deref(),
            self.postal_code.as_deref(),
            self.settlement.as_deref(),
            self.township.as_deref(),
        ]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(other) = self.other.as_deref() {
            return require_text(MessageField::Address, other);
        }
        let parts = self.parts();
        for part in parts {
            optional_text(MessageField::Address, part)?;
        }
        if parts.iter().all(Option::is_none) {
            return Err(ValidationError::new(
                MessageField::Address,
                ValidationKind::Missing,
            ));
        }
        Ok(())
    }
}

/// Marks the premises as closed from the effective date on (`OznakaZatvaranja`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClosureMark {
    #[serde(rename = "Z", alias = "closed")]
    Closed,
}

impl ClosureMark {
    pub fn code(&self) -> &'static str {
        match self {
            ClosureMark::Closed => "Z",
        }
    }
}

/// Inputs for [`Office::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeFields {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub time_sent: Option<NaiveDateTime>,
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub working_hours: String,
    pub take_effect_date: NaiveDate,
    #[serde(default)]
    pub closure_mark: Option<ClosureMark>,
    #[serde(default)]
    pub specific_purpose: Option<String>,
}

/// Business premises registration request (`PoslovniProstorZahtjev`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Office {
    uuid: Uuid,
    time_sent: Option<NaiveDateTime>,
    pin: String,
    label: String,
    address: Address,
    working_hours: String,
    take_effect_date: NaiveDate,
    closure_mark: Option<ClosureMark>,
    specific_purpose: Option<String>,
}

impl Office {
    pub fn new(fields: OfficeFields) -> Result<Self, ValidationError> {
        let office = Self {
            uuid: fields.uuid.unwrap_or_else(Uuid::new_v4),
            time_sent: fields.time_sent,
            pin: fields.pin,
            label: fields.label,
            address: fields.address,
            working_hours: fields.working_hours,
            take_effect_date: fields.take_effect_date,
            closure_mark: fields.closure_mark,
            specific_purpose: fields.specific_purpose,
        };
        office.validate()?;
        Ok(office)
    }

    pub fn with_time_sent(mut self, time_sent: NaiveDateTime) -> Self {
        self.time_sent = Some(time_sent);
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn time_sent(&self) -> Option<NaiveDateTime> {
        self.time_sent
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn working_hours(&self) -> &str {
        &self.working_hours
    }

    pub fn take_effect_date(&self) -> NaiveDate {
        self.take_effect_date
    }

    pub fn closure_mark(&self) -> Option<ClosureMark> {
        self.closure_mark
    }

    pub fn specific_purpose(&self) -> Option<&str> {
        self.specific_purpose.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        require_oib(MessageField::Pin, &self.pin)?;
        require_text(MessageField::Label, &self.label)?;
        self.address.validate()?;
        require_text(MessageField::WorkingHours, &self.working_hours)?;
        optional_text(MessageField::SpecificPurpose, self.specific_purpose.as_deref())
    }
}
