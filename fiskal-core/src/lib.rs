//! Signed XML messages for the Croatian fiscalization service (CIS):
//! rendering, enveloped signatures, transport and response reading.
//!
//! # Examples
//! ```rust
//! use fiskal_core::message::{Echo, Message};
//! use fiskal_core::render::render;
//!
//! let echo = Echo::new("ping-123")?;
//! let rendered = render(Message::from(&echo))?;
//! assert!(rendered.root().to_xml_string().contains("<tns:Poruka>ping-123</tns:Poruka>"));
//! # Ok::<(), fiskal_core::Error>(())
//! ```
pub mod api;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod fiscalizer;
pub mod message;
pub mod render;
pub mod response;
pub mod sign;
pub mod xml;

use thiserror::Error;

pub use fiscalizer::{Fiscalized, Fiscalizer};

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] message::ValidationError),
    #[error(transparent)]
    Canonicalization(#[from] xml::c14n::CanonicalizationError),
    #[error(transparent)]
    Signing(#[from] sign::SigningError),
    #[error(transparent)]
    KeyLoad(#[from] credentials::KeyLoadError),
    #[error(transparent)]
    Transport(#[from] api::TransportError),
    #[error(transparent)]
    Response(#[from] response::ResponseParseError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Xml(#[from] xml::parse::XmlParseError),
}
