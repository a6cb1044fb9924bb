//! Renders messages into schema-ordered request elements.
use crate::message::{
    Echo, Invoice, Message, MessageField, MessageHeader, MessageKind, Office, TaxCategory,
    ValidationError, ValidationKind, format_amount,
};
use crate::xml::Element;
use crate::xml::constants::{DATE_FORMAT, DATE_TIME_FORMAT, SCHEMA_LOCATION, TNS_NS, XSI_NS};
use chrono::{Local, NaiveDateTime, SubsecRound};
use uuid::Uuid;

/// Request element ready to be enveloped and signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    kind: MessageKind,
    header: MessageHeader,
    message_id: String,
    root: Element,
}

impl RenderedMessage {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Header values exactly as embedded in the rendered XML.
    pub fn header(&self) -> MessageHeader {
        self.header
    }

    /// Value of the root `Id` attribute, referenced by the signature.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub(crate) fn into_parts(self) -> (MessageKind, MessageHeader, String, Element) {
        (self.kind, self.header, self.message_id, self.root)
    }
}

/// `<kind>-<uuid>`; stable for a given message so resubmissions keep their `Id`.
pub fn message_id(kind: MessageKind, uuid: Uuid) -> String {
    format!("{}-{}", kind.as_str(), uuid)
}

/// Renders `message`, stamping the header with the host wall clock when the
/// message carries no `time_sent` of its own.
///
/// An invoice must already carry its security code;
/// [`Fiscalizer`](crate::fiscalizer::Fiscalizer) fills it in from the signing key.
///
/// # Examples
/// ```rust
/// use fiskal_core::message::{Echo, Message};
/// use fiskal_core::render::render;
///
/// let echo = Echo::new("ping-123")?;
/// let rendered = render(Message::from(&echo))?;
/// assert_eq!(rendered.root().attribute("Id"), Some(rendered.message_id()));
/// # Ok::<(), fiskal_core::message::ValidationError>(())
/// ```
pub fn render(message: Message<'_>) -> Result<RenderedMessage, ValidationError> {
    message.validate()?;

    let time_sent = message
        .time_sent()
        .unwrap_or_else(|| Local::now().naive_local())
        .trunc_subsecs(0);
    let header = MessageHeader::new(message.uuid(), time_sent);
    let kind = message.kind();
    let message_id = message_id(kind, header.uuid());

    let mut root = Element::new(kind.request_element())
        .with_namespace(Some("tns"), TNS_NS)
        .with_namespace(Some("xsi"), XSI_NS)
        .with_attribute("xsi:schemaLocation", SCHEMA_LOCATION)
        .with_attribute("Id", message_id.as_str());
    root.push_child(render_header(&header));
    match message {
        Message::Echo(echo) => root.push_child(render_echo(echo)),
        Message::Invoice(invoice) => root.push_child(render_invoice(invoice)?),
        Message::Office(office) => root.push_child(render_office(office)),
    }

    Ok(RenderedMessage {
        kind,
        header,
        message_id,
        root,
    })
}

fn render_header(header: &MessageHeader) -> Element {
    Element::new("tns:Zaglavlje")
        .with_child(Element::text_element(
            "tns:IdPoruke",
            header.uuid().to_string(),
        ))
        .with_child(Element::text_element(
            "tns:DatumVrijeme",
            format_date_time(header.time_sent()),
        ))
}

fn render_echo(echo: &Echo) -> Element {
    Element::text_element("tns:Poruka", echo.text())
}

fn render_invoice(invoice: &Invoice) -> Result<Element, ValidationError> {
    let security_code = invoice.security_code().ok_or(ValidationError::new(
        MessageField::SecurityCode,
        ValidationKind::Missing,
    ))?;
    let number = invoice.number();
    let mut racun = Element::new("tns:Racun")
        .with_child(Element::text_element("tns:Oib", invoice.pin()))
        .with_child(Element::text_element(
            "tns:USustPdv",
            bool_text(invoice.in_vat_system()),
        ))
        .with_child(Element::text_element(
            "tns:DatumVrijeme",
            format_date_time(invoice.time_issued()),
        ))
        .with_child(Element::text_element(
            "tns:OznSlijed",
            invoice.sequence_mark().code(),
        ))
        .with_child(
            Element::new("tns:BrRac")
                .with_child(Element::text_element("tns:BrOznRac", number.number.as_str()))
                .with_child(Element::text_element("tns:OznPosPr", number.premises.as_str()))
                .with_child(Element::text_element("tns:OznNapUr", number.device.as_str())),
        );

    for (category, group_name) in [
        (TaxCategory::Vat, "tns:Pdv"),
        (TaxCategory::Spending, "tns:Pnp"),
        (TaxCategory::Other, "tns:OstaliPor"),
    ] {
        let mut group = Element::new(group_name);
        for tax in invoice.taxes_in(category) {
            let mut porez = Element::new("tns:Porez");
            if category == TaxCategory::Other {
                porez.push_optional("tns:Naziv", tax.name());
            }
            porez.push_child(Element::text_element("tns:Stopa", format_amount(tax.rate())));
            porez.push_child(Element::text_element(
                "tns:Osnovica",
                format_amount(tax.base()),
            ));
            porez.push_child(Element::text_element("tns:Iznos", format_amount(tax.amount()?)));
            group.push_child(porez);
        }
        if group.children().is_empty() {
            continue;
        }
        racun.push_child(group);
    }

    racun.push_optional(
        "tns:IznosOslobPdv",
        invoice.tax_exempt_amount().map(format_amount),
    );
    racun.push_optional("tns:IznosMarza", invoice.margin_amount().map(format_amount));
    racun.push_optional(
        "tns:IznosNePodlOpor",
        invoice.non_taxable_amount().map(format_amount),
    );

    if !invoice.fees().is_empty() {
        let mut naknade = Element::new("tns:Naknade");
        for fee in invoice.fees() {
            naknade.push_child(
                Element::new("tns:Naknada")
                    .with_child(Element::text_element("tns:NazivN", fee.name.as_str()))
                    .with_child(Element::text_element("tns:IznosN", format_amount(fee.amount))),
            );
        }
        racun.push_child(naknade);
    }

    racun.push_child(Element::text_element(
        "tns:IznosUkupno",
        format_amount(invoice.total()?),
    ));
    racun.push_child(Element::text_element(
        "tns:NacinPlac",
        invoice.payment_method().code(),
    ));
    racun.push_child(Element::text_element("tns:OibOper", invoice.operator_pin()));
    racun.push_child(Element::text_element("tns:ZastKod", security_code));
    racun.push_child(Element::text_element(
        "tns:NakDost",
        bool_text(invoice.subsequent_delivery()),
    ));
    racun.push_optional("tns:ParagonBrRac", invoice.paragon_number());
    racun.push_optional("tns:SpecNamj", invoice.specific_purpose());
    Ok(racun)
}

fn render_office(office: &Office) -> Element {
    let address = office.address();
    let location = match address.other.as_deref() {
        Some(other) => Element::text_element("tns:OstaliTipoviPP", other),
        None => {
            let mut adresa = Element::new("tns:Adresa");
            adresa.push_optional("tns:Ulica", address.street.as_deref());
            adresa.push_optional("tns:KucniBroj", address.house_number.as_deref());
            adresa.push_optional(
                "tns:KucniBrojDodatak",
                address.house_number_addendum.as_deref(),
            );
            adresa.push_optional("tns:BrojPoste", address.postal_code.as_deref());
            adresa.push_optional("tns:Naselje", address.settlement.as_deref());
            adresa.push_optional("tns:Opcina", address.township.as_deref());
            adresa
        }
    };

    let mut prostor = Element::new("tns:PoslovniProstor")
        .with_child(Element::text_element("tns:Oib", office.pin()))
        .with_child(Element::text_element("tns:OznPoslProstora", office.label()))
        .with_child(Element::new("tns:AdresniPodatak").with_child(location))
        .with_child(Element::text_element(
            "tns:RadnoVrijeme",
            office.working_hours(),
        ))
        .with_child(Element::text_element(
            "tns:DatumPocetkaPrimjene",
            office.take_effect_date().format(DATE_FORMAT).to_string(),
        ));
    prostor.push_optional(
        "tns:OznakaZatvaranja",
        office.closure_mark().map(|mark| mark.code()),
    );
    prostor.push_optional("tns:SpecNamj", office.specific_purpose());
    prostor
}

pub(crate) fn format_date_time(value: NaiveDateTime) -> String {
    value.format(DATE_TIME_FORMAT).to_string()
}

fn bool_text(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}
