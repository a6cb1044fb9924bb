use chrono::{NaiveDate, NaiveDateTime};
use fiskal_core::config::{Config, Environment};
use fiskal_core::credentials::SigningIdentity;
use fiskal_core::message::{
    Address, Invoice, InvoiceFields, InvoiceNumber, Office, OfficeFields, PaymentMethod,
    SequenceMark, Tax,
};
use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INVOICE_UUID: &str = "8e6000cf-1a98-4174-b3e7-b5d5954bc10d";
pub const OFFICE_UUID: &str = "4c3b2a10-5d6e-4f70-8a9b-0c1d2e3f4a5b";

#[allow(dead_code)]
pub fn fixture_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

#[allow(dead_code)]
pub fn read_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative)).expect("read fixture")
}

#[allow(dead_code)]
pub fn demo_config() -> Config {
    Config::new(
        Environment::Demo,
        fixture_path("credentials/demo-cert.pem"),
        fixture_path("credentials/demo-key.pem"),
    )
}

#[allow(dead_code)]
pub fn identity(environment: Environment) -> SigningIdentity {
    SigningIdentity::from_pem(
        &read_fixture("credentials/demo-cert.pem"),
        &read_fixture("credentials/demo-key.pem"),
        None,
        environment,
    )
    .expect("identity")
}

#[allow(dead_code)]
pub fn timestamp(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .expect("valid timestamp")
}

#[allow(dead_code)]
pub fn invoice_fields() -> InvoiceFields {
    InvoiceFields {
        uuid: Some(Uuid::parse_str(INVOICE_UUID).expect("uuid")),
        time_sent: Some(timestamp(14, 10, 15, 1)),
        pin: "69435151530".into(),
        in_vat_system: true,
        time_issued: timestamp(14, 10, 15, 0),
        sequence_mark: SequenceMark::Premises,
        number: InvoiceNumber::new("1", "POS1", "1"),
        taxes: vec![
            Tax::other("Porez na luksuz", dec!(10.00), dec!(3)).expect("other tax"),
            Tax::spending(dec!(20.00), dec!(3)).expect("spending tax"),
            Tax::vat(dec!(100.00), dec!(25.00)).expect("vat"),
        ],
        tax_exempt_amount: None,
        margin_amount: None,
        non_taxable_amount: None,
        fees: Vec::new(),
        total: None,
        payment_method: PaymentMethod::Cash,
        operator_pin: "12345678903".into(),
        security_code: None,
        subsequent_delivery: false,
        paragon_number: None,
        specific_purpose: None,
    }
}

#[allow(dead_code)]
pub fn sample_invoice() -> Invoice {
    Invoice::new(invoice_fields()).expect("invoice")
}

#[allow(dead_code)]
pub fn office_fields() -> OfficeFields {
    OfficeFields {
        uuid: Some(Uuid::parse_str(OFFICE_UUID).expect("uuid")),
        time_sent: Some(timestamp(14, 11, 0, 0)),
        pin: "69435151530".into(),
        label: "POS1".into(),
        address: Address {
            street: Some("Ilica".into()),
            house_number: Some("1".into()),
            postal_code: Some("10000".into()),
            settlement: Some("Zagreb".into()),
            township: Some("Zagreb".into()),
            ..Address::default()
        },
        working_hours: "Pon-Pet 08:00-16:00".into(),
        take_effect_date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
        closure_mark: None,
        specific_purpose: None,
    }
}

#[allow(dead_code)]
pub fn sample_office() -> Office {
    Office::new(office_fields()).expect("office")
}
