use super::{
    MessageField, ValidationError, ValidationKind, optional_text, require_oib, require_text,
};
use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest amount the schema accepts: fifteen integer digits and two decimals.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x5D89_FFFF, 0x0163_4578, 0, false, 2);
/// Largest tax rate the schema accepts, in percent.
pub const MAX_RATE: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);

const SECURITY_CODE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Whether invoice numbers run per business premises or per device (`OznSlijed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceMark {
    #[serde(rename = "P", alias = "premises")]
    Premises,
    #[serde(rename = "N", alias = "device")]
    Device,
}

impl SequenceMark {
    pub fn code(&self) -> &'static str {
        match self {
            SequenceMark::Premises => "P",
            SequenceMark::Device => "N",
        }
    }
}

/// Payment method (`NacinPlac`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "G", alias = "cash")]
    Cash,
    #[serde(rename = "K", alias = "card")]
    Card,
    #[serde(rename = "C", alias = "cheque")]
    Cheque,
    #[serde(rename = "T", alias = "transfer")]
    Transfer,
    #[serde(rename = "O", alias = "other")]
    Other,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "G",
            PaymentMethod::Card => "K",
            PaymentMethod::Cheque => "C",
            PaymentMethod::Transfer => "T",
            PaymentMethod::Other => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxCategory {
    Vat,
    Spending,
    Other,
}

/// Single tax line. Immutable once constructed.
///
/// # Examples
/// ```rust
/// use fiskal_core::message::Tax;
/// use rust_decimal::Decimal;
///
/// let tax = Tax::vat(Decimal::new(10000, 2), Decimal::new(2500, 2))?;
/// assert_eq!(tax.amount()?, Decimal::new(2500, 2));
/// # Ok::<(), fiskal_core::message::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    category: TaxCategory,
    base: Decimal,
    rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Tax {
    pub fn vat(base: Decimal, rate: Decimal) -> Result<Self, ValidationError> {
        Self::build(TaxCategory::Vat, base, rate, None)
    }

    pub fn spending(base: Decimal, rate: Decimal) -> Result<Self, ValidationError> {
        Self::build(TaxCategory::Spending, base, rate, None)
    }

    pub fn other(
        name: impl Into<String>,
        base: Decimal,
        rate: Decimal,
    ) -> Result<Self, ValidationError> {
        Self::build(TaxCategory::Other, base, rate, Some(name.into()))
    }

    fn build(
        category: TaxCategory,
        base: Decimal,
        rate: Decimal,
        name: Option<String>,
    ) -> Result<Self, ValidationError> {
        let tax = Self {
            category,
            base,
            rate,
            name,
        };
        tax.validate()?;
        Ok(tax)
    }

    pub fn category(&self) -> TaxCategory {
        self.category
    }

    pub fn base(&self) -> Decimal {
        self.base
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Tax amount: `base * rate / 100`, rounded to cents.
    pub fn amount(&self) -> Result<Decimal, ValidationError> {
        self.base
            .checked_mul(self.rate)
            .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
            .map(round_amount)
            .ok_or(ValidationError::new(
                MessageField::TaxBase,
                ValidationKind::OutOfRange,
            ))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        in_range(MessageField::TaxBase, self.base, MAX_AMOUNT)?;
        in_range(MessageField::TaxRate, self.rate, MAX_RATE)?;
        if self.category == TaxCategory::Other {
            match self.name.as_deref() {
                None => {
                    return Err(ValidationError::new(
                        MessageField::TaxName,
                        ValidationKind::Missing,
                    ));
                }
                Some(name) => require_text(MessageField::TaxName, name)?,
            }
        }
        Ok(())
    }
}

/// Invoice number triple (`BrRac`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceNumber {
    pub number: String,
    pub premises: String,
    pub device: String,
}

impl InvoiceNumber {
    pub fn new(
        number: impl Into<String>,
        premises: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            premises: premises.into(),
            device: device.into(),
        }
    }
}

/// Fee charged on top of the invoice amount (`Naknada`), e.g. bottle deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub name: String,
    pub amount: Decimal,
}

impl Fee {
    pub fn new(name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Inputs for [`Invoice::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFields {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub time_sent: Option<NaiveDateTime>,
    #[serde(default)]
    pub pin: String,
    pub in_vat_system: bool,
    pub time_issued: NaiveDateTime,
    pub sequence_mark: SequenceMark,
    pub number: InvoiceNumber,
    #[serde(default)]
    pub taxes: Vec<Tax>,
    #[serde(default)]
    pub tax_exempt_amount: Option<Decimal>,
    #[serde(default)]
    pub margin_amount: Option<Decimal>,
    #[serde(default)]
    pub non_taxable_amount: Option<Decimal>,
    #[serde(default)]
    pub fees: Vec<Fee>,
    /// Overrides the computed total when set.
    #[serde(default)]
    pub total: Option<Decimal>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub operator_pin: String,
    /// Issuer security code (ZKI). Computed from the signing key when absent.
    #[serde(default)]
    pub security_code: Option<String>,
    #[serde(default)]
    pub subsequent_delivery: bool,
    #[serde(default)]
    pub paragon_number: Option<String>,
    #[serde(default)]
    pub specific_purpose: Option<String>,
}

/// Invoice fiscalization request (`RacunZahtjev`).
///
/// # Examples
/// ```rust
/// use chrono::NaiveDate;
/// use fiskal_core::message::{
///     Invoice, InvoiceFields, InvoiceNumber, PaymentMethod, SequenceMark, Tax,
/// };
/// use rust_decimal::Decimal;
///
/// let issued = NaiveDate::from_ymd_opt(2024, 5, 14)
///     .and_then(|date| date.and_hms_opt(10, 15, 0))
///     .expect("valid timestamp");
/// let invoice = Invoice::new(InvoiceFields {
///     uuid: None,
///     time_sent: None,
///     pin: "69435151530".into(),
///     in_vat_system: true,
///     time_issued: issued,
///     sequence_mark: SequenceMark::Premises,
///     number: InvoiceNumber::new("1", "POS1", "1"),
///     taxes: vec![Tax::vat(Decimal::new(10000, 2), Decimal::new(2500, 2))?],
///     tax_exempt_amount: None,
///     margin_amount: None,
///     non_taxable_amount: None,
///     fees: Vec::new(),
///     total: None,
///     payment_method: PaymentMethod::Cash,
///     operator_pin: "12345678903".into(),
///     security_code: None,
///     subsequent_delivery: false,
///     paragon_number: None,
///     specific_purpose: None,
/// })?;
/// assert_eq!(invoice.total()?, Decimal::new(12500, 2));
/// # Ok::<(), fiskal_core::message::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    uuid: Uuid,
    time_sent: Option<NaiveDateTime>,
    pin: String,
    in_vat_system: bool,
    time_issued: NaiveDateTime,
    sequence_mark: SequenceMark,
    number: InvoiceNumber,
    taxes: Vec<Tax>,
    tax_exempt_amount: Option<Decimal>,
    margin_amount: Option<Decimal>,
    non_taxable_amount: Option<Decimal>,
    fees: Vec<Fee>,
    total: Option<Decimal>,
    payment_method: PaymentMethod,
    operator_pin: String,
    security_code: Option<String>,
    subsequent_delivery: bool,
    paragon_number: Option<String>,
    specific_purpose: Option<String>,
}

impl Invoice {
    /// Builds an invoice, reporting the first field that violates a protocol
    /// constraint. A missing uuid is generated.
    pub fn new(fields: InvoiceFields) -> Result<Self, ValidationError> {
        let invoice = Self {
            uuid: fields.uuid.unwrap_or_else(Uuid::new_v4),
            time_sent: fields.time_sent,
            pin: fields.pin,
            in_vat_system: fields.in_vat_system,
            time_issued: fields.time_issued,
            sequence_mark: fields.sequence_mark,
            number: fields.number,
            taxes: fields.taxes,
            tax_exempt_amount: fields.tax_exempt_amount,
            margin_amount: fields.margin_amount,
            non_taxable_amount: fields.non_taxable_amount,
            fees: fields.fees,
            total: fields.total,
            payment_method: fields.payment_method,
            operator_pin: fields.operator_pin,
            security_code: fields.security_code,
            subsequent_delivery: fields.subsequent_delivery,
            paragon_number: fields.paragon_number,
            specific_purpose: fields.specific_purpose,
        };
        invoice.validate()?;
        Ok(invoice)
    }

    /// Sets the issuer security code, replacing any previous one.
    pub fn with_security_code(mut self, code: impl Into<String>) -> Result<Self, ValidationError> {
        self.security_code = Some(code.into());
        self.validate()?;
        Ok(self)
    }

    /// Pins the header timestamp so a resubmission renders the same document.
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

    pub fn in_vat_system(&self) -> bool {
        self.in_vat_system
    }

    pub fn time_issued(&self) -> NaiveDateTime {
        self.time_issued
    }

    pub fn sequence_mark(&self) -> SequenceMark {
        self.sequence_mark
    }

    pub fn number(&self) -> &InvoiceNumber {
        &self.number
    }

    pub fn taxes(&self) -> &[Tax] {
        &self.taxes
    }

    /// Taxes of one category, in input order.
    pub fn taxes_in(&self, category: TaxCategory) -> impl Iterator<Item = &Tax> {
        self.taxes.iter().filter(move |tax| tax.category == category)
    }

    pub fn tax_exempt_amount(&self) -> Option<Decimal> {
        self.tax_exempt_amount
    }

    pub fn margin_amount(&self) -> Option<Decimal> {
        self.margin_amount
    }

    pub fn non_taxable_amount(&self) -> Option<Decimal> {
        self.non_taxable_amount
    }

    pub fn fees(&self) -> &[Fee] {
        &self.fees
    }

    /// Explicit total if one was given, otherwise every tax base and amount
    /// plus exempt, margin and non-taxable amounts and fees.
    pub fn total(&self) -> Result<Decimal, ValidationError> {
        if let Some(total) = self.total {
            return Ok(round_amount(total));
        }
        let overflow = || ValidationError::new(MessageField::Total, ValidationKind::OutOfRange);
        let mut total = Decimal::ZERO;
        for tax in &self.taxes {
            total = total
                .checked_add(tax.base)
                .and_then(|sum| sum.checked_add(tax.amount().ok()?))
                .ok_or_else(overflow)?;
        }
        let extras = [
            self.tax_exempt_amount,
            self.margin_amount,
            self.non_taxable_amount,
        ];
        let fees = self.fees.iter().map(|fee| Some(fee.amount));
        for amount in extras.into_iter().chain(fees).flatten() {
            total = total.checked_add(amount).ok_or_else(overflow)?;
        }
        Ok(round_amount(total))
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn operator_pin(&self) -> &str {
        &self.operator_pin
    }

    pub fn security_code(&self) -> Option<&str> {
        self.security_code.as_deref()
    }

    /// Text signed to produce the issuer security code: issuer OIB, issue
    /// time, the three parts of the invoice number and the total.
    ///
    /// # Examples
    /// ```rust
    /// # use chrono::NaiveDate;
    /// # use fiskal_core::message::{Invoice, InvoiceFields, InvoiceNumber, PaymentMethod, SequenceMark};
    /// # use rust_decimal::Decimal;
    /// # let issued = NaiveDate::from_ymd_opt(2024, 5, 14)
    /// #     .and_then(|date| date.and_hms_opt(10, 15, 0))
    /// #     .expect("valid timestamp");
    /// let invoice = Invoice::new(InvoiceFields {
    /// #   uuid: None,
    /// #   time_sent: None,
    ///     pin: "69435151530".into(),
    ///     in_vat_system: false,
    ///     time_issued: issued,
    /// #   sequence_mark: SequenceMark::Premises,
    ///     number: InvoiceNumber::new("1", "POS1", "1"),
    /// #   taxes: Vec::new(),
    /// #   tax_exempt_amount: None,
    /// #   margin_amount: None,
    ///     non_taxable_amount: Some(Decimal::new(1250, 2)),
    /// #   fees: Vec::new(),
    /// #   total: None,
    /// #   payment_method: PaymentMethod::Cash,
    /// #   operator_pin: "12345678903".into(),
    /// #   security_code: None,
    /// #   subsequent_delivery: false,
    /// #   paragon_number: None,
    /// #   specific_purpose: None,
    ///     // ...
    /// })?;
    /// assert_eq!(
    ///     invoice.security_code_input()?,
    ///     "6943515153014.05.2024 10:15:001POS1112.50"
    /// );
    /// # Ok::<(), fiskal_core::message::ValidationError>(())
    /// ```
    pub fn security_code_input(&self) -> Result<String, ValidationError> {
        Ok(format!(
            "{}{}{}{}{}{}",
            self.pin,
            self.time_issued.format(SECURITY_CODE_TIME_FORMAT),
            self.number.number,
            self.number.premises,
            self.number.device,
            format_amount(self.total()?)
        ))
    }

    pub fn subsequent_delivery(&self) -> bool {
        self.subsequent_delivery
    }

    pub fn paragon_number(&self) -> Option<&str> {
        self.paragon_number.as_deref()
    }

    pub fn specific_purpose(&self) -> Option<&str> {
        self.specific_purpose.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        require_oib(MessageField::Pin, &self.pin)?;
        require_text(MessageField::InvoiceNumber, &self.number.number)?;
        require_text(MessageField::Premises, &self.number.premises)?;
        require_text(MessageField::Device, &self.number.device)?;

        if self.in_vat_system && self.taxes.is_empty() {
            return Err(ValidationError::new(
                MessageField::Taxes,
                ValidationKind::Empty,
            ));
        }
        for tax in &self.taxes {
            tax.validate()?;
        }

        for (field, amount) in [
            (MessageField::TaxExemptAmount, self.tax_exempt_amount),
            (MessageField::MarginAmount, self.margin_amount),
            (MessageField::NonTaxableAmount, self.non_taxable_amount),
        ] {
            if let Some(amount) = amount {
                in_range(field, amount, MAX_AMOUNT)?;
            }
        }

        for fee in &self.fees {
            require_text(MessageField::FeeName, &fee.name)?;
            in_range(MessageField::FeeAmount, fee.amount, MAX_AMOUNT)?;
        }

        if let Some(total) = self.total {
            if total.abs() > MAX_AMOUNT {
                return Err(ValidationError::new(
                    MessageField::Total,
                    ValidationKind::OutOfRange,
                ));
            }
        }
        if self.total()? > MAX_AMOUNT {
            return Err(ValidationError::new(
                MessageField::Total,
                ValidationKind::OutOfRange,
            ));
        }

        require_oib(MessageField::OperatorPin, &self.operator_pin)?;
        if let Some(code) = self.security_code.as_deref() {
            require_text(MessageField::SecurityCode, code)?;
            let well_formed = code.len() == 32
                && code
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            if !well_formed {
                return Err(ValidationError::new(
                    MessageField::SecurityCode,
                    ValidationKind::InvalidFormat,
                ));
            }
        }

        optional_text(MessageField::ParagonNumber, self.paragon_number.as_deref())?;
        optional_text(MessageField::SpecificPurpose, self.specific_purpose.as_deref())?;
        Ok(())
    }
}

fn in_range(field: MessageField, value: Decimal, max: Decimal) -> Result<(), ValidationError> {
    if value < Decimal::ZERO || value > max {
        return Err(ValidationError::new(field, ValidationKind::OutOfRange));
    }
    Ok(())
}

pub(crate) fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Two decimal places with `.` as separator, independent of the host locale.
pub(crate) fn format_amount(value: Decimal) -> String {
    format!("{:.2}", round_amount(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn fields() -> InvoiceFields {
        InvoiceFields {
            uuid: None,
            time_sent: None,
            pin: "69435151530".into(),
            in_vat_system: true,
            time_issued: NaiveDate::from_ymd_opt(2024, 5, 14)
                .and_then(|date| date.and_hms_opt(10, 15, 0))
                .expect("timestamp"),
            sequence_mark: SequenceMark::Premises,
            number: InvoiceNumber::new("1", "POS1", "1"),
            taxes: vec![Tax::vat(dec!(100.00), dec!(25.00)).expect("vat")],
            tax_exempt_amount: None,
            margin_amount: None,
            non_taxable_amount: None,
            fees: Vec::new(),
            total: None,
            payment_method: PaymentMethod::Card,
            operator_pin: "12345678903".into(),
            security_code: Some("e4d909c290d0fb1ca068ffaddf22cbd0".into()),
            subsequent_delivery: false,
            paragon_number: None,
            specific_purpose: None,
        }
    }

    #[test]
    fn tax_amount_rounds_half_away_from_zero() {
        let tax = Tax::vat(dec!(10.10), dec!(5)).expect("vat");
        assert_eq!(tax.amount(), Ok(dec!(0.51)));
        let tax = Tax::spending(dec!(33.33), dec!(3)).expect("pnp");
        assert_eq!(tax.amount(), Ok(dec!(1.00)));
    }

    #[test]
    fn tax_rejects_negative_values_and_unnamed_other() {
        let err = Tax::vat(dec!(-1), dec!(25)).expect_err("negative base");
        assert_eq!(err.field, MessageField::TaxBase);
        assert_eq!(err.kind, ValidationKind::OutOfRange);

        let err = Tax::spending(dec!(1), dec!(-3)).expect_err("negative rate");
        assert_eq!(err.field, MessageField::TaxRate);

        let err = Tax::other("", dec!(1), dec!(3)).expect_err("unnamed");
        assert_eq!(err.field, MessageField::TaxName);
        assert!(Tax::other("Porez na luksuz", dec!(0), dec!(0)).is_ok());
    }

    #[test]
    fn total_sums_taxes_amounts_and_fees() {
        let mut input = fields();
        input.taxes.push(Tax::spending(dec!(10), dec!(3)).expect("pnp"));
        input.non_taxable_amount = Some(dec!(2.50));
        input.fees = vec![Fee::new("Povratna naknada", dec!(0.50))];
        let invoice = Invoice::new(input).expect("invoice");
        assert_eq!(invoice.total(), Ok(dec!(138.30)));
    }

    #[test]
    fn explicit_total_overrides_computed_one() {
        let mut input = fields();
        input.total = Some(dec!(99.999));
        let invoice = Invoice::new(input).expect("invoice");
        assert_eq!(invoice.total(), Ok(dec!(100.00)));
    }

    #[test]
    fn rejects_invalid_identifiers_in_order() {
        let mut input = fields();
        input.pin = String::new();
        input.operator_pin = "bad".into();
        let err = Invoice::new(input).expect_err("missing pin");
        assert_eq!(err, ValidationError::new(MessageField::Pin, ValidationKind::Missing));

        let mut input = fields();
        input.operator_pin = "12345678901".into();
        let err = Invoice::new(input).expect_err("bad operator pin");
        assert_eq!(
            err,
            ValidationError::new(MessageField::OperatorPin, ValidationKind::InvalidFormat)
        );

        let mut input = fields();
        input.security_code = Some("E4D909C290D0FB1CA068FFADDF22CBD0".into());
        let err = Invoice::new(input).expect_err("uppercase code");
        assert_eq!(err.field, MessageField::SecurityCode);

        let mut input = fields();
        input.security_code = None;
        let invoice = Invoice::new(input).expect("code is computed later");
        assert_eq!(invoice.security_code(), None);
        let err = invoice
            .clone()
            .with_security_code("xyz")
            .expect_err("malformed code");
        assert_eq!(
            err,
            ValidationError::new(MessageField::SecurityCode, ValidationKind::InvalidFormat)
        );
        let invoice = invoice
            .with_security_code("60462225290675a534bba9134dbc28b1")
            .expect("well-formed code");
        assert_eq!(invoice.security_code(), Some("60462225290675a534bba9134dbc28b1"));
    }

    #[test]
    fn vat_registered_issuer_needs_taxes() {
        let mut input = fields();
        input.taxes.clear();
        let err = Invoice::new(input.clone()).expect_err("no taxes");
        assert_eq!(err, ValidationError::new(MessageField::Taxes, ValidationKind::Empty));

        input.in_vat_system = false;
        input.non_taxable_amount = Some(dec!(10));
        let invoice = Invoice::new(input).expect("outside vat system");
        assert_eq!(invoice.total(), Ok(dec!(10.00)));
    }

    #[test]
    fn rejects_negative_amounts() {
        let mut input = fields();
        input.margin_amount = Some(dec!(-0.01));
        let err = Invoice::new(input).expect_err("negative margin");
        assert_eq!(
            err,
            ValidationError::new(MessageField::MarginAmount, ValidationKind::OutOfRange)
        );
    }

    #[test]
    fn oversized_amounts_are_out_of_range_instead_of_overflowing() {
        let err = Tax::vat(Decimal::MAX, dec!(25)).expect_err("huge base");
        assert_eq!(
            err,
            ValidationError::new(MessageField::TaxBase, ValidationKind::OutOfRange)
        );
        let err = Tax::vat(dec!(100), dec!(1000)).expect_err("huge rate");
        assert_eq!(err.field, MessageField::TaxRate);
        assert_eq!(MAX_AMOUNT.to_string(), "999999999999999.99");
        assert!(Tax::vat(MAX_AMOUNT, MAX_RATE).is_ok_and(|tax| tax.amount().is_ok()));

        let mut input = fields();
        input.taxes = vec![Tax::vat(MAX_AMOUNT, dec!(25)).expect("vat")];
        let err = Invoice::new(input).expect_err("total above schema limit");
        assert_eq!(
            err,
            ValidationError::new(MessageField::Total, ValidationKind::OutOfRange)
        );

        let mut input = fields();
        input.fees = vec![Fee::new("Povratna naknada", Decimal::MAX)];
        let err = Invoice::new(input).expect_err("huge fee");
        assert_eq!(err.field, MessageField::FeeAmount);

        let json = r#"{"category": "vat", "base": "79228162514264337593543950335", "rate": "25"}"#;
        let tax: Tax = serde_json::from_str(json).expect("unchecked tax");
        assert_eq!(
            tax.amount(),
            Err(ValidationError::new(MessageField::TaxBase, ValidationKind::OutOfRange))
        );
        let mut input = fields();
        input.taxes = vec![tax];
        let err = Invoice::new(input).expect_err("deserialized tax is validated");
        assert_eq!(err.field, MessageField::TaxBase);
    }

    #[test]
    fn security_code_input_joins_identifying_fields() {
        let invoice = Invoice::new(fields()).expect("invoice");
        assert_eq!(
            invoice.security_code_input(),
            Ok("6943515153014.05.2024 10:15:001POS11125.00".to_string())
        );
    }

    #[test]
    fn fields_deserialize_from_json_codes_and_aliases() {
        let json = r#"{
            "pin": "69435151530",
            "in_vat_system": true,
            "time_issued": "2024-05-14T10:15:00",
            "sequence_mark": "P",
            "number": {"number": "7", "premises": "POS1", "device": "2"},
            "taxes": [
                {"category": "other", "base": "10.00", "rate": "3", "name": "Luksuz"},
                {"category": "vat", "base": "100.00", "rate": "25.00"}
            ],
            "payment_method": "card",
            "operator_pin": "12345678903",
            "security_code": "e4d909c290d0fb1ca068ffaddf22cbd0"
        }"#;
        let fields: InvoiceFields = serde_json::from_str(json).expect("fields");
        let invoice = Invoice::new(fields).expect("invoice");
        assert_eq!(invoice.payment_method(), PaymentMethod::Card);
        assert_eq!(invoice.taxes_in(TaxCategory::Other).count(), 1);
        assert_eq!(invoice.total().map(format_amount), Ok("135.30".to_string()));
        assert_eq!(invoice.security_code(), Some("e4d909c290d0fb1ca068ffaddf22cbd0"));
    }

    #[test]
    fn format_amount_pads_to_two_places() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(25.5)), "25.50");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
    }
}
