//! Exclusive XML Canonicalization 1.0, without comments, performed by libxml2.
//!
//! The element is serialized on its own, with the bindings it inherits
//! declared on it, and canonicalized as a whole document. Exclusive C14N keeps
//! only the namespaces each element visibly uses, so the extra declarations do
//! not reach the output.
use super::{Element, NamespaceScope, Node};
use libxml::parser::Parser;
use libxml::tree::c14n::{CanonicalizationMode, CanonicalizationOptions};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizationError {
    #[error("character U+{code:04X} cannot appear in canonical XML (in `{context}`)")]
    InvalidCharacter { code: u32, context: String },
    #[error("cannot parse `{element}` for canonicalization: {message}")]
    Parse { element: String, message: String },
    #[error("libxml2 failed to canonicalize `{0}`")]
    Failed(String),
}

/// Canonicalizes `element` as the apex of a document subset.
///
/// `inherited` holds the bindings declared by ancestors of `element`; they are
/// used to resolve prefixes the subtree uses without declaring.
pub fn canonicalize(
    element: &Element,
    inherited: &NamespaceScope,
) -> Result<String, CanonicalizationError> {
    check_characters(element)?;

    let mut apex = element.clone();
    for (prefix, uri) in inherited {
        let declared = element
            .namespaces()
            .iter()
            .any(|ns| ns.prefix().unwrap_or_default() == prefix);
        if !declared && !uri.is_empty() {
            apex = apex.with_namespace((!prefix.is_empty()).then_some(prefix.as_str()), uri.as_str());
        }
    }

    let document = Parser::default()
        .parse_string(apex.to_xml_string())
        .map_err(|e| CanonicalizationError::Parse {
            element: element.name().to_string(),
            message: format!("{e:?}"),
        })?;
    let options = CanonicalizationOptions {
        mode: CanonicalizationMode::ExclusiveCanonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    };
    document
        .canonicalize(options, None)
        .map_err(|_| CanonicalizationError::Failed(element.name().to_string()))
}

/// Rejects characters XML 1.0 cannot carry, naming the element that holds them.
fn check_characters(element: &Element) -> Result<(), CanonicalizationError> {
    let context = element.name();
    for attr in element.attributes() {
        check_str(attr.value(), context)?;
    }
    for node in element.children() {
        match node {
            Node::Element(child) => check_characters(child)?,
            Node::Text(text) => check_str(text, context)?,
        }
    }
    Ok(())
}

fn check_str(value: &str, context: &str) -> Result<(), CanonicalizationError> {
    match value.chars().find(|&ch| !is_xml_char(ch)) {
        Some(ch) => Err(CanonicalizationError::InvalidCharacter {
            code: ch as u32,
            context: context.to_string(),
        }),
        None => Ok(()),
    }
}

fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ch >= '\u{10000}'
}
