//! HTTP transport to the fiscalization service.
use crate::config::Config;
use crate::credentials::TrustAnchor;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors returned by the HTTP client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Posts signed SOAP documents to one endpoint.
///
/// # Examples
/// ```rust,no_run
/// use std::time::Duration;
/// use fiskal_core::api::CisClient;
/// use fiskal_core::config::Environment;
///
/// let client = CisClient::new(Environment::Demo.endpoint_url(), Duration::from_secs(3), None)?;
/// # let _ = client;
/// # Ok::<(), fiskal_core::api::TransportError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CisClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl CisClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        trust_anchor: Option<TrustAnchor>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(anchor) = trust_anchor {
            builder = builder.add_root_certificate(anchor.into_certificate());
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Client for the configured endpoint, trusting the configured CA certificate.
    pub fn from_config(config: &Config) -> Result<Self, crate::Error> {
        let trust_anchor = config
            .ca_certificate_path()
            .map(TrustAnchor::load)
            .transpose()?;
        Ok(Self::new(
            config.endpoint_url(),
            config.timeout(),
            trust_anchor,
        )?)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends one signed document and returns the response body.
    ///
    /// The service reports rejected messages with status 500 and a regular
    /// SOAP body, so both 200 and 500 bodies are handed back for parsing.
    pub async fn post(&self, xml: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(xml.to_string())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        debug!(endpoint = %self.endpoint, status = status.as_u16(), "received response");

        match status.as_u16() {
            200 | 500 => Ok(body),
            status => Err(TransportError::UnexpectedStatus { status, body }),
        }
    }

    fn map_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Http(error)
        }
    }
}
