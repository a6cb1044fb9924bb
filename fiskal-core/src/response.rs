//! Reading the service's SOAP replies.
use crate::message::MessageKind;
use crate::xml::constants::{DATE_TIME_FORMAT, SOAP_ENV_NS, TNS_NS};
use chrono::NaiveDateTime;
use libxml::{parser::Parser, tree::Document, xpath};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Errors emitted while reading a response document.
#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("XPath error: {0}")]
    XPath(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },
    #[error("response refers to message {actual}, expected {expected}")]
    UuidMismatch { expected: Uuid, actual: Uuid },
}

/// Outcome reported by the service for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalResponse {
    kind: MessageKind,
    processed_at: NaiveDateTime,
    uuid: Option<Uuid>,
    unique_identifier: Option<String>,
    errors: BTreeMap<String, String>,
    echo: Option<String>,
}

impl FiscalResponse {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn processed_at(&self) -> NaiveDateTime {
        self.processed_at
    }

    /// Request uuid echoed back in the response header, if any.
    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    /// JIR assigned to an accepted invoice.
    pub fn unique_identifier(&self) -> Option<&str> {
        self.unique_identifier.as_deref()
    }

    /// Error code to message, empty when the request was accepted.
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn echo(&self) -> Option<&str> {
        self.echo.as_deref()
    }

    pub fn is_accepted(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parses raw response bodies into [`FiscalResponse`].
///
/// # Examples
/// ```rust,no_run
/// use fiskal_core::message::MessageKind;
/// use fiskal_core::response::ResponseReader;
///
/// let raw = std::fs::read_to_string("response.xml")?;
/// let response = ResponseReader::parse(MessageKind::Invoice, &raw)?;
/// println!("{:?}", response.unique_identifier());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseReader;

impl ResponseReader {
    pub fn parse(kind: MessageKind, raw: &str) -> Result<FiscalResponse, ResponseParseError> {
        let doc = Parser::default()
            .parse_string(raw)
            .map_err(|e| ResponseParseError::Xml(format!("{e:?}")))?;
        parse_document(kind, &doc)
    }
}

fn parse_document(kind: MessageKind, doc: &Document) -> Result<FiscalResponse, ResponseParseError> {
    let ctx = build_context(doc)?;

    if !xpath_nodes(&ctx, "//soapenv:Fault")?.is_empty() {
        return Err(ResponseParseError::Fault {
            code: xpath_text_optional(&ctx, "//soapenv:Fault/faultcode")?.unwrap_or_default(),
            message: xpath_text_optional(&ctx, "//soapenv:Fault/faultstring")?
                .unwrap_or_default(),
        });
    }

    let element = response_element(kind);
    let root = format!("//tns:{element}");
    if xpath_nodes(&ctx, &root)?.is_empty() {
        return Err(ResponseParseError::MissingField(element));
    }

    let processed_at = xpath_text_required(
        &ctx,
        &format!("{root}/tns:Zaglavlje/tns:DatumVrijeme"),
        "DatumVrijeme",
    )?;
    let processed_at = NaiveDateTime::parse_from_str(&processed_at, DATE_TIME_FORMAT).map_err(
        |_| ResponseParseError::InvalidValue {
            field: "DatumVrijeme",
            value: processed_at.clone(),
        },
    )?;

    let uuid = xpath_text_optional(&ctx, &format!("{root}/tns:Zaglavlje/tns:IdPoruke"))?
        .map(|value| {
            Uuid::parse_str(&value).map_err(|_| ResponseParseError::InvalidValue {
                field: "IdPoruke",
                value,
            })
        })
        .transpose()?;

    let errors = parse_errors(&ctx, &root)?;

    let unique_identifier = xpath_text_optional(&ctx, &format!("{root}/tns:Jir"))?;
    if kind == MessageKind::Invoice && errors.is_empty() && unique_identifier.is_none() {
        return Err(ResponseParseError::MissingField("Jir"));
    }

    let echo = match kind {
        MessageKind::Echo => Some(xpath_text_required(
            &ctx,
            &format!("{root}/tns:Poruka"),
            "Poruka",
        )?),
        _ => None,
    };

    Ok(FiscalResponse {
        kind,
        processed_at,
        uuid,
        unique_identifier,
        errors,
        echo,
    })
}

fn response_element(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Echo => "EchoResponse",
        MessageKind::Invoice => "RacunOdgovor",
        MessageKind::Office => "PoslovniProstorOdgovor",
    }
}

fn parse_errors(
    ctx: &xpath::Context,
    root: &str,
) -> Result<BTreeMap<String, String>, ResponseParseError> {
    let mut errors = BTreeMap::new();
    for node in xpath_nodes(ctx, &format!("{root}/tns:Greske/tns:Greska"))? {
        let mut code = None;
        let mut message = String::new();
        for child in node.get_child_elements() {
            match child.get_name().as_str() {
                "SifraGreske" => code = Some(child.get_content().trim().to_string()),
                "PorukaGreske" => message = child.get_content().trim().to_string(),
                _ => {}
            }
        }
        let code = code
            .filter(|code| !code.is_empty())
            .ok_or(ResponseParseError::MissingField("SifraGreske"))?;
        errors.insert(code, message);
    }
    Ok(errors)
}

fn build_context(doc: &Document) -> Result<xpath::Context, ResponseParseError> {
    let ctx =
        xpath::Context::new(doc).map_err(|e| ResponseParseError::XPath(format!("{e:?}")))?;
    ctx.register_namespace("tns", TNS_NS)
        .map_err(|e| ResponseParseError::XPath(format!("{e:?}")))?;
    ctx.register_namespace("soapenv", SOAP_ENV_NS)
        .map_err(|e| ResponseParseError::XPath(format!("{e:?}")))?;
    Ok(ctx)
}

fn xpath_nodes(
    ctx: &xpath::Context,
    expr: &str,
) -> Result<Vec<libxml::tree::Node>, ResponseParseError> {
    Ok(ctx
        .evaluate(expr)
        .map_err(|e| ResponseParseError::XPath(format!("{e:?}")))?
        .get_nodes_as_vec())
}

fn xpath_text_required(
    ctx: &xpath::Context,
    expr: &str,
    label: &'static str,
) -> Result<String, ResponseParseError> {
    xpath_text_optional(ctx, expr)?.ok_or(ResponseParseError::MissingField(label))
}

fn xpath_text_optional(
    ctx: &xpath::Context,
    expr: &str,
) -> Result<Option<String>, ResponseParseError> {
    let nodes = xpath_nodes(ctx, expr)?;
    let node = match nodes.first() {
        Some(node) => node,
        None => return Ok(None),
    };
    let value = node.get_content().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<tns:Zaglavlje>\
        <tns:IdPoruke>8e6000cf-1a98-4174-b3e7-b5d5954bc10d</tns:IdPoruke>\
        <tns:DatumVrijeme>14.05.2024T09:05:08</tns:DatumVrijeme>\
        </tns:Zaglavlje>";

    fn envelope(body: &str) -> String {
        format!(
            "<soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
             <soap:Body>{body}</soap:Body></soap:Envelope>"
        )
    }

    #[test]
    fn reads_accepted_invoice() {
        let raw = envelope(&format!(
            "<tns:RacunOdgovor xmlns:tns=\"{TNS_NS}\" Id=\"r-1\">{HEADER}\
             <tns:Jir>a1b2c3d4-0000-4000-8000-000000000001</tns:Jir></tns:RacunOdgovor>"
        ));
        let response = ResponseReader::parse(MessageKind::Invoice, &raw).expect("parse");
        assert!(response.is_accepted());
        assert_eq!(
            response.unique_identifier(),
            Some("a1b2c3d4-0000-4000-8000-000000000001")
        );
        assert_eq!(
            response.processed_at().format(DATE_TIME_FORMAT).to_string(),
            "14.05.2024T09:05:08"
        );
        assert_eq!(
            response.uuid().map(|uuid| uuid.to_string()).as_deref(),
            Some("8e6000cf-1a98-4174-b3e7-b5d5954bc10d")
        );
    }

    #[test]
    fn collects_errors_in_code_order() {
        let raw = envelope(&format!(
            "<tns:RacunOdgovor xmlns:tns=\"{TNS_NS}\">{HEADER}<tns:Greske>\
             <tns:Greska><tns:SifraGreske>s005</tns:SifraGreske>\
             <tns:PorukaGreske>Neispravan OIB</tns:PorukaGreske></tns:Greska>\
             <tns:Greska><tns:SifraGreske>s001</tns:SifraGreske>\
             <tns:PorukaGreske>Poruka nije u skladu s XML shemom</tns:PorukaGreske></tns:Greska>\
             </tns:Greske></tns:RacunOdgovor>"
        ));
        let response = ResponseReader::parse(MessageKind::Invoice, &raw).expect("parse");
        assert!(!response.is_accepted());
        assert_eq!(response.unique_identifier(), None);
        let codes: Vec<&str> = response.errors().keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["s001", "s005"]);
        assert_eq!(response.errors()["s005"], "Neispravan OIB");
    }

    #[test]
    fn accepted_invoice_requires_jir() {
        let raw = envelope(&format!(
            "<tns:RacunOdgovor xmlns:tns=\"{TNS_NS}\">{HEADER}</tns:RacunOdgovor>"
        ));
        let err = ResponseReader::parse(MessageKind::Invoice, &raw).expect_err("no jir");
        assert!(matches!(err, ResponseParseError::MissingField("Jir")));
    }

    #[test]
    fn reads_echo_text() {
        let raw = envelope(&format!(
            "<tns:EchoResponse xmlns:tns=\"{TNS_NS}\">{HEADER}\
             <tns:Poruka>ping-123</tns:Poruka></tns:EchoResponse>"
        ));
        let response = ResponseReader::parse(MessageKind::Echo, &raw).expect("parse");
        assert_eq!(response.echo(), Some("ping-123"));
        assert!(response.errors().is_empty());
    }

    #[test]
    fn missing_or_malformed_timestamp_is_rejected() {
        let raw = envelope(&format!(
            "<tns:PoslovniProstorOdgovor xmlns:tns=\"{TNS_NS}\"><tns:Zaglavlje>\
             <tns:IdPoruke>8e6000cf-1a98-4174-b3e7-b5d5954bc10d</tns:IdPoruke>\
             </tns:Zaglavlje></tns:PoslovniProstorOdgovor>"
        ));
        let err = ResponseReader::parse(MessageKind::Office, &raw).expect_err("missing");
        assert!(matches!(err, ResponseParseError::MissingField("DatumVrijeme")));

        let raw = envelope(&format!(
            "<tns:PoslovniProstorOdgovor xmlns:tns=\"{TNS_NS}\"><tns:Zaglavlje>\
             <tns:DatumVrijeme>2024-05-14 09:05</tns:DatumVrijeme>\
             </tns:Zaglavlje></tns:PoslovniProstorOdgovor>"
        ));
        let err = ResponseReader::parse(MessageKind::Office, &raw).expect_err("malformed");
        assert!(matches!(
            err,
            ResponseParseError::InvalidValue { field: "DatumVrijeme", .. }
        ));
    }

    #[test]
    fn soap_fault_is_surfaced() {
        let raw = envelope(
            "<soap:Fault><faultcode>soap:Client</faultcode>\
             <faultstring>Invalid request</faultstring></soap:Fault>",
        );
        let err = ResponseReader::parse(MessageKind::Echo, &raw).expect_err("fault");
        assert!(matches!(
            err,
            ResponseParseError::Fault { ref code, ref message }
                if code == "soap:Client" && message == "Invalid request"
        ));
    }

    #[test]
    fn wrong_response_element_and_garbage_are_rejected() {
        let raw = envelope(&format!(
            "<tns:EchoResponse xmlns:tns=\"{TNS_NS}\">{HEADER}</tns:EchoResponse>"
        ));
        let err = ResponseReader::parse(MessageKind::Invoice, &raw).expect_err("wrong kind");
        assert!(matches!(err, ResponseParseError::MissingField("RacunOdgovor")));

        assert!(ResponseReader::parse(MessageKind::Echo, "not xml").is_err());
    }
}
