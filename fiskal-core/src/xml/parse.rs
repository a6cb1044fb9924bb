//! Reads an XML string back into an [`Element`] tree.
use super::{Element, Namespace};
use quick_xml::{Reader, events::BytesStart, events::Event};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlParseError {
    #[error("XML parse error: {0}")]
    Syntax(String),
    #[error("document has no root element")]
    MissingRoot,
    #[error("unexpected content after the root element")]
    TrailingContent,
}

/// Parses a document with a single root element.
///
/// The prolog, comments and processing instructions are dropped; whitespace
/// inside the root element is kept as text.
pub fn parse_element(xml: &str) -> Result<Element, XmlParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlParseError::Syntax(e.to_string()))?;
        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(XmlParseError::TrailingContent);
                }
                stack.push(start_element(&start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(XmlParseError::TrailingContent);
                }
                let element = start_element(&start)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlParseError::Syntax("unbalanced end tag".into()))?;
                close_element(element, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| XmlParseError::Syntax(e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(value.into_owned()),
                    None if value.trim().is_empty() => {}
                    None => return Err(XmlParseError::TrailingContent),
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| XmlParseError::Syntax(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(value);
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlParseError::Syntax("unclosed element".into()));
    }
    root.ok_or(XmlParseError::MissingRoot)
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, XmlParseError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlParseError::Syntax(e.to_string()))?
        .to_string();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlParseError::Syntax(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlParseError::Syntax(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| XmlParseError::Syntax(e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            element.push_namespace(Namespace::new(None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.push_namespace(Namespace::new(Some(prefix), value));
        } else {
            element.set_attribute(key, value);
        }
    }
    Ok(element)
}

fn close_element(element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None => *root = Some(element),
    }
}
