//! Render, sign, send and read back, for every message kind.
use std::borrow::Cow;

use crate::Error;
use crate::api::CisClient;
use crate::config::Config;
use crate::credentials::SigningIdentity;
use crate::envelope::wrap;
use crate::message::{Echo, Invoice, Message, Office};
use crate::render::render;
use crate::response::{FiscalResponse, ResponseParseError, ResponseReader};
use crate::sign::{SignedDocument, Signer};
use tracing::{debug, info, warn};

/// Signed request together with the service's parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fiscalized {
    document: SignedDocument,
    response: FiscalResponse,
}

impl Fiscalized {
    pub fn document(&self) -> &SignedDocument {
        &self.document
    }

    pub fn response(&self) -> &FiscalResponse {
        &self.response
    }

    pub fn into_parts(self) -> (SignedDocument, FiscalResponse) {
        (self.document, self.response)
    }
}

/// Entry point holding the configuration, signing identity and HTTP client.
///
/// A `Fiscalizer` is immutable after construction and can be shared between
/// tasks.
///
/// # Examples
/// ```rust,no_run
/// use fiskal_core::config::Config;
/// use fiskal_core::fiscalizer::Fiscalizer;
///
/// # async fn run() -> Result<(), fiskal_core::Error> {
/// let fiscalizer = Fiscalizer::new(Config::from_env()?)?;
/// let reply = fiscalizer.echo("ping").await?;
/// println!("{:?}", reply.response().echo());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fiscalizer {
    config: Config,
    identity: SigningIdentity,
    client: CisClient,
}

impl Fiscalizer {
    pub fn new(config: Config) -> Result<Self, Error> {
        let identity = SigningIdentity::from_config(&config)?;
        Self::with_identity(config, identity)
    }

    /// Uses an identity loaded elsewhere instead of the configured files.
    pub fn with_identity(config: Config, identity: SigningIdentity) -> Result<Self, Error> {
        let client = CisClient::from_config(&config)?;
        info!(
            environment = %config.environment(),
            endpoint = client.endpoint(),
            serial = identity.serial(),
            "fiscalizer ready"
        );
        Ok(Self {
            config,
            identity,
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub fn sign_echo(&self, text: &str) -> Result<SignedDocument, Error> {
        let echo = Echo::new(text)?;
        self.sign(Message::from(&echo))
    }

    /// Security code (ZKI) of `invoice`: the one it carries, or one computed
    /// with the identity's key.
    pub fn security_code(&self, invoice: &Invoice) -> Result<String, Error> {
        if let Some(code) = invoice.security_code() {
            return Ok(code.to_string());
        }
        let input = invoice.security_code_input()?;
        let code = Signer::new(&self.identity).security_code(&input)?;
        debug!(number = ?invoice.number(), "computed security code");
        Ok(code)
    }

    pub fn sign_invoice(&self, invoice: &Invoice) -> Result<SignedDocument, Error> {
        let invoice = self.with_security_code(invoice)?;
        self.sign(Message::from(invoice.as_ref()))
    }

    pub fn sign_office(&self, office: &Office) -> Result<SignedDocument, Error> {
        self.sign(Message::from(office))
    }

    pub async fn echo(&self, text: &str) -> Result<Fiscalized, Error> {
        let echo = Echo::new(text)?;
        self.fiscalize(Message::from(&echo)).await
    }

    pub async fn fiscalize_invoice(&self, invoice: &Invoice) -> Result<Fiscalized, Error> {
        let invoice = self.with_security_code(invoice)?;
        self.fiscalize(Message::from(invoice.as_ref())).await
    }

    pub async fn fiscalize_office(&self, office: &Office) -> Result<Fiscalized, Error> {
        self.fiscalize(Message::from(office)).await
    }

    fn with_security_code<'a>(&self, invoice: &'a Invoice) -> Result<Cow<'a, Invoice>, Error> {
        if invoice.security_code().is_some() {
            return Ok(Cow::Borrowed(invoice));
        }
        let code = self.security_code(invoice)?;
        Ok(Cow::Owned(invoice.clone().with_security_code(code)?))
    }

    fn sign(&self, message: Message<'_>) -> Result<SignedDocument, Error> {
        let rendered = render(message)?;
        debug!(message_id = rendered.message_id(), "rendered message");
        let document = Signer::new(&self.identity).sign(wrap(rendered))?;
        Ok(document)
    }

    async fn fiscalize(&self, message: Message<'_>) -> Result<Fiscalized, Error> {
        let document = self.sign(message)?;
        info!(
            message_id = document.message_id(),
            kind = %document.kind(),
            endpoint = self.client.endpoint(),
            "submitting message"
        );

        let raw = self.client.post(document.xml()).await?;
        let response = ResponseReader::parse(document.kind(), &raw)?;
        if let Some(actual) = response.uuid() {
            if actual != document.uuid() {
                return Err(ResponseParseError::UuidMismatch {
                    expected: document.uuid(),
                    actual,
                }
                .into());
            }
        }

        if response.is_accepted() {
            info!(
                message_id = document.message_id(),
                jir = ?response.unique_identifier(),
                "message accepted"
            );
        } else {
            warn!(
                message_id = document.message_id(),
                errors = ?response.errors(),
                "message rejected"
            );
        }
        Ok(Fiscalized { document, response })
    }
}
