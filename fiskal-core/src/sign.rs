//! Enveloped XML signature over the request element.
//!
//! The signature references the request by its `Id`, is canonicalized with
//! exclusive C14N, digested with SHA-256 and signed with RSASSA-PKCS1-v1_5.
//! It is appended as the last child of the request element.
use crate::credentials::SigningIdentity;
use crate::envelope::EnvelopedMessage;
use crate::message::{MessageHeader, MessageKind};
use crate::xml::c14n::{CanonicalizationError, canonicalize};
use crate::xml::constants::{
    DS_NS, ENVELOPED_SIGNATURE_TRANSFORM, EXC_C14N_ALGORITHM, RSA_SHA256_ALGORITHM,
    SHA256_DIGEST_ALGORITHM,
};
use crate::xml::parse::{XmlParseError, parse_element};
use crate::xml::{Element, NamespaceScope};
use base64ct::{Base64, Encoding};
use chrono::NaiveDateTime;
use md5::Md5;
use ring::{rand, signature};
use rsa::Pkcs1v15Sign;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
    #[error(transparent)]
    Xml(#[from] XmlParseError),
    #[error("no element with Id `{0}`")]
    ReferenceNotFound(String),
    #[error("more than one element with Id `{0}`")]
    DuplicateReference(String),
    #[error("RSA signing failed")]
    Rsa,
}

/// Final signed request, ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument {
    kind: MessageKind,
    header: MessageHeader,
    message_id: String,
    xml: String,
    digest_value: String,
    signature_value: String,
}

impl SignedDocument {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn header(&self) -> MessageHeader {
        self.header
    }

    pub fn uuid(&self) -> Uuid {
        self.header.uuid()
    }

    pub fn time_sent(&self) -> NaiveDateTime {
        self.header.time_sent()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Serialized envelope without XML declaration.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn into_xml(self) -> String {
        self.xml
    }

    /// Base64 SHA-256 digest of the canonicalized request element.
    pub fn digest_value(&self) -> &str {
        &self.digest_value
    }

    pub fn signature_value(&self) -> &str {
        &self.signature_value
    }
}

struct SignatureParts {
    digest_value: String,
    signature_value: String,
}

/// Signs documents with a borrowed [`SigningIdentity`].
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    identity: &'a SigningIdentity,
}

impl<'a> Signer<'a> {
    pub fn new(identity: &'a SigningIdentity) -> Self {
        Self { identity }
    }

    pub fn sign(&self, enveloped: EnvelopedMessage) -> Result<SignedDocument, SigningError> {
        let (kind, header, message_id, mut envelope) = enveloped.into_parts();
        let parts = self.sign_tree(&mut envelope, &message_id)?;
        Ok(SignedDocument {
            kind,
            header,
            message_id,
            xml: finalize(&envelope.to_xml_string()),
            digest_value: parts.digest_value,
            signature_value: parts.signature_value,
        })
    }

    /// Signs a document rendered elsewhere. The element whose `Id` equals
    /// `message_id` receives the signature.
    pub fn sign_xml(&self, xml: &str, message_id: &str) -> Result<String, SigningError> {
        let mut root = parse_element(xml)?;
        self.sign_tree(&mut root, message_id)?;
        Ok(finalize(&root.to_xml_string()))
    }

    /// Issuer security code (ZKI) over `input`, as built by
    /// [`Invoice::security_code_input`](crate::message::Invoice::security_code_input):
    /// the MD5 of its RSA-SHA1 signature, in lowercase hex.
    pub fn security_code(&self, input: &str) -> Result<String, SigningError> {
        let signature = self
            .identity
            .security_key()
            .sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(input.as_bytes()))
            .map_err(|_| SigningError::Rsa)?;
        Ok(hex::encode(Md5::digest(&signature)))
    }

    fn sign_tree(
        &self,
        root: &mut Element,
        message_id: &str,
    ) -> Result<SignatureParts, SigningError> {
        let path = match root.find_ids(message_id).as_slice() {
            [] => return Err(SigningError::ReferenceNotFound(message_id.to_string())),
            [path] => path.clone(),
            _ => return Err(SigningError::DuplicateReference(message_id.to_string())),
        };
        let not_found = || SigningError::ReferenceNotFound(message_id.to_string());
        let scope = root.scope_at(&path).ok_or_else(not_found)?;
        let target = root.element_at(&path).ok_or_else(not_found)?;

        let canonical = canonicalize(target, &scope)?;
        let digest_value = Base64::encode_string(&Sha256::digest(canonical.as_bytes()));

        let signed_info = signed_info(message_id, &digest_value);
        let mut signature_scope: NamespaceScope = scope;
        signature_scope.insert(String::new(), DS_NS.to_string());
        let canonical_signed_info = canonicalize(&signed_info, &signature_scope)?;
        let signature_value = self.rsa_sign(canonical_signed_info.as_bytes())?;

        let signature = Element::new("Signature")
            .with_namespace(None, DS_NS)
            .with_child(signed_info)
            .with_child(Element::text_element(
                "SignatureValue",
                signature_value.as_str(),
            ))
            .with_child(self.key_info());
        root.element_at_mut(&path)
            .ok_or_else(not_found)?
            .push_child(signature);

        debug!(message_id, digest = %digest_value, "signed request element");
        Ok(SignatureParts {
            digest_value,
            signature_value,
        })
    }

    fn rsa_sign(&self, message: &[u8]) -> Result<String, SigningError> {
        let key_pair = self.identity.key_pair();
        let rng = rand::SystemRandom::new();
        let mut signature = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &rng, message, &mut signature)
            .map_err(|_| SigningError::Rsa)?;
        Ok(Base64::encode_string(&signature))
    }

    fn key_info(&self) -> Element {
        Element::new("KeyInfo").with_child(
            Element::new("X509Data")
                .with_child(Element::text_element(
                    "X509Certificate",
                    Base64::encode_string(self.identity.certificate_der()),
                ))
                .with_child(
                    Element::new("X509IssuerSerial")
                        .with_child(Element::text_element(
                            "X509IssuerName",
                            self.identity.cert_issuer().as_str(),
                        ))
                        .with_child(Element::text_element(
                            "X509SerialNumber",
                            self.identity.serial(),
                        )),
                ),
        )
    }
}

fn signed_info(message_id: &str, digest_value: &str) -> Element {
    Element::new("SignedInfo")
        .with_child(
            Element::new("CanonicalizationMethod").with_attribute("Algorithm", EXC_C14N_ALGORITHM),
        )
        .with_child(Element::new("SignatureMethod").with_attribute("Algorithm", RSA_SHA256_ALGORITHM))
        .with_child(
            Element::new("Reference")
                .with_attribute("URI", format!("#{message_id}"))
                .with_child(
                    Element::new("Transforms")
                        .with_child(
                            Element::new("Transform")
                                .with_attribute("Algorithm", ENVELOPED_SIGNATURE_TRANSFORM),
                        )
                        .with_child(
                            Element::new("Transform").with_attribute("Algorithm", EXC_C14N_ALGORITHM),
                        ),
                )
                .with_child(
                    Element::new("DigestMethod").with_attribute("Algorithm", SHA256_DIGEST_ALGORITHM),
                )
                .with_child(Element::text_element("DigestValue", digest_value)),
        )
}

/// Drops the XML declaration and empty lines, the byte form the service expects.
pub(crate) fn finalize(xml: &str) -> String {
    let mut body = xml.trim_start();
    if body.starts_with("<?xml") {
        if let Some(end) = body.find("?>") {
            body = &body[end + 2..];
        }
    }
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::envelope::{REQUEST_PATH, wrap};
    use crate::message::{Echo, Message};
    use crate::render::render;
    use chrono::NaiveDate;
    use ring::signature::UnparsedPublicKey;
    use std::path::Path;

    fn identity(environment: Environment) -> SigningIdentity {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/credentials");
        let cert = std::fs::read_to_string(dir.join("demo-cert.pem")).expect("cert");
        let key = std::fs::read_to_string(dir.join("demo-key.pem")).expect("key");
        SigningIdentity::from_pem(&cert, &key, None, environment).expect("identity")
    }

    fn enveloped_echo(text: &str) -> EnvelopedMessage {
        let sent = NaiveDate::from_ymd_opt(2024, 5, 14)
            .and_then(|date| date.and_hms_opt(9, 5, 7))
            .expect("timestamp");
        let echo = Echo::new(text)
            .expect("echo")
            .with_uuid(Uuid::parse_str("8e6000cf-1a98-4174-b3e7-b5d5954bc10d").expect("uuid"))
            .with_time_sent(sent);
        wrap(render(Message::from(&echo)).expect("render"))
    }

    #[test]
    fn signing_is_deterministic() {
        let identity = identity(Environment::Demo);
        let signer = Signer::new(&identity);
        let first = signer.sign(enveloped_echo("ping-123")).expect("first");
        let second = signer.sign(enveloped_echo("ping-123")).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn signature_is_last_child_of_request_and_verifies() {
        let identity = identity(Environment::Demo);
        let signed = Signer::new(&identity)
            .sign(enveloped_echo("ping-123"))
            .expect("signed");
        assert!(!signed.xml().starts_with("<?xml"));

        let envelope = parse_element(signed.xml()).expect("parse signed");
        let mut request = envelope.element_at(&REQUEST_PATH).cloned().expect("request");
        let names: Vec<&str> = request.child_elements().map(Element::name).collect();
        assert_eq!(names, vec!["tns:Zaglavlje", "tns:Poruka", "Signature"]);

        let signature_element = request.remove_child("Signature").expect("signature");
        let scope = envelope.scope_at(&REQUEST_PATH).expect("scope");
        let digest = Sha256::digest(canonicalize(&request, &scope).expect("c14n").as_bytes());
        assert_eq!(Base64::encode_string(&digest), signed.digest_value());

        let signed_info = signature_element.child("SignedInfo").expect("signed info");
        let mut ds_scope = NamespaceScope::new();
        ds_scope.insert(String::new(), DS_NS.to_string());
        let canonical_signed_info = canonicalize(signed_info, &ds_scope).expect("c14n");
        assert!(canonical_signed_info.starts_with(
            "<SignedInfo xmlns=\"http://www.w3.org/2000/09/xmldsig#\"><CanonicalizationMethod"
        ));

        let signature_bytes =
            Base64::decode_vec(signed.signature_value()).expect("signature base64");
        let public_key = identity
            .certificate()
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes();
        UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, public_key)
            .verify(canonical_signed_info.as_bytes(), &signature_bytes)
            .expect("signature verifies");
    }

    #[test]
    fn key_info_carries_environment_issuer_and_serial() {
        for (environment, issuer) in [
            (Environment::Demo, "OU=DEMO,O=FINA,C=HR"),
            (Environment::Production, "OU=RDC,O=FINA,C=HR"),
        ] {
            let identity = identity(environment);
            let signed = Signer::new(&identity)
                .sign(enveloped_echo("ping"))
                .expect("signed");
            assert!(signed.xml().contains(&format!(
                "<X509IssuerSerial><X509IssuerName>{issuer}</X509IssuerName>\
                 <X509SerialNumber>4097</X509SerialNumber></X509IssuerSerial>"
            )));
            assert!(signed.xml().contains(&format!(
                "<Reference URI=\"#{}\">",
                signed.message_id()
            )));
        }
    }

    #[test]
    fn missing_or_duplicate_reference_is_rejected() {
        let identity = identity(Environment::Demo);
        let signer = Signer::new(&identity);

        let err = signer
            .sign_xml("<a Id=\"x\"></a>", "y")
            .expect_err("missing");
        assert!(matches!(err, SigningError::ReferenceNotFound(ref id) if id == "y"));

        let err = signer
            .sign_xml("<a Id=\"x\"><b Id=\"x\"></b></a>", "x")
            .expect_err("duplicate");
        assert!(matches!(err, SigningError::DuplicateReference(_)));
    }

    #[test]
    fn sign_xml_strips_declaration_and_signs_nested_element() {
        let identity = identity(Environment::Demo);
        let xml = "<?xml version=\"1.0\"?>\n<r><m Id=\"m-1\"><v>1</v></m></r>";
        let signed = Signer::new(&identity).sign_xml(xml, "m-1").expect("signed");
        assert!(signed.starts_with("<r><m Id=\"m-1\"><v>1</v><Signature xmlns="));
        assert!(signed.ends_with("</Signature></m></r>"));
    }

    #[test]
    fn invalid_characters_abort_signing() {
        let identity = identity(Environment::Demo);
        let err = Signer::new(&identity)
            .sign(enveloped_echo("bell\u{7}"))
            .expect_err("invalid char");
        assert!(matches!(
            err,
            SigningError::Canonicalization(CanonicalizationError::InvalidCharacter { code: 7, .. })
        ));
    }

    #[test]
    fn security_code_matches_known_vector() {
        let identity = identity(Environment::Demo);
        let signer = Signer::new(&identity);
        let code = signer
            .security_code("6943515153014.05.2024 10:15:001POS11155.90")
            .expect("zki");
        assert_eq!(code, "60462225290675a534bba9134dbc28b1");
        assert_ne!(
            signer
                .security_code("6943515153014.05.2024 10:15:001POS11155.91")
                .expect("zki"),
            code
        );
    }

    #[test]
    fn finalize_removes_prolog_and_blank_lines() {
        let xml = "<?xml version=\"1.0\"?>\n<a>\n\n<b></b>\n</a>\n";
        assert_eq!(finalize(xml), "<a>\n<b></b>\n</a>");
    }
}
