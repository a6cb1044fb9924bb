//! SOAP envelope around a rendered request.
use crate::message::{MessageHeader, MessageKind};
use crate::render::RenderedMessage;
use crate::xml::Element;
use crate::xml::constants::SOAP_ENV_NS;

/// Path (child indices from the envelope) of the request element.
pub(crate) const REQUEST_PATH: [usize; 2] = [0, 0];

/// `soapenv:Envelope` whose body holds the rendered request unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopedMessage {
    kind: MessageKind,
    header: MessageHeader,
    message_id: String,
    envelope: Element,
}

impl EnvelopedMessage {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn header(&self) -> MessageHeader {
        self.header
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn envelope(&self) -> &Element {
        &self.envelope
    }

    /// The request element inside `soapenv:Body`.
    pub fn request(&self) -> Option<&Element> {
        self.envelope.element_at(&REQUEST_PATH)
    }

    pub(crate) fn into_parts(self) -> (MessageKind, MessageHeader, String, Element) {
        (self.kind, self.header, self.message_id, self.envelope)
    }
}

/// Moves the rendered request into a SOAP 1.1 envelope.
pub fn wrap(rendered: RenderedMessage) -> EnvelopedMessage {
    let (kind, header, message_id, root) = rendered.into_parts();
    let envelope = Element::new("soapenv:Envelope")
        .with_namespace(Some("soapenv"), SOAP_ENV_NS)
        .with_child(Element::new("soapenv:Body").with_child(root));
    EnvelopedMessage {
        kind,
        header,
        message_id,
        envelope,
    }
}
