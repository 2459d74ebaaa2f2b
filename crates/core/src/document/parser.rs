//! Lossless tree builder for users.cfg documents.
//!
//! Tokenizing is done by `quick_xml`. Each event is stored together with the
//! exact slice of input it was read from, so an unmodified tree serializes
//! back to the original text byte for byte.

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::node::{Attribute, Element, Node};
use crate::errors::DocumentError;

const BOM: char = '\u{feff}';

/// Parse `input` into its top-level nodes.
///
/// The result contains exactly one [`Node::Element`] (the root); anything
/// else at the top level is whitespace or markup.
pub(crate) fn parse_nodes(input: &str) -> Result<Vec<Node>, DocumentError> {
    debug!("parsing XML document ({} bytes)", input.len());

    let mut builder = TreeBuilder::default();
    let body = match input.strip_prefix(BOM) {
        Some(rest) => {
            builder.top.push(Node::Markup(BOM.to_string()));
            rest
        }
        None => input,
    };

    let nodes = builder.run(body)?;
    if !nodes.iter().any(|n| matches!(n, Node::Element(_))) {
        return Err(DocumentError::NoRootElement);
    }
    Ok(nodes)
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    top: Vec<Node>,
    seen_root: bool,
}

impl TreeBuilder {
    fn run(mut self, input: &str) -> Result<Vec<Node>, DocumentError> {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = true;
        config.check_comments = true;

        let mut start = 0usize;
        loop {
            let event = reader.read_event().map_err(|e| {
                malformed(input, reader.buffer_position() as usize, e.to_string())
            })?;
            let mut end = reader.buffer_position() as usize;
            if let Event::Text(_) = event {
                // The reader may have consumed the `<` opening the next tag.
                if end > start && input.as_bytes()[end - 1] == b'<' {
                    end -= 1;
                }
            }
            let raw = &input[start..end];
            let fail = |detail: String| malformed(input, start, detail);

            match event {
                Event::Start(ref e) => {
                    let el = element(e, raw).map_err(fail)?;
                    self.open(el).map_err(fail)?;
                }
                Event::Empty(ref e) => {
                    let el = element(e, raw).map_err(fail)?;
                    if self.stack.is_empty() {
                        self.claim_root().map_err(fail)?;
                    }
                    self.attach(Node::Element(el)).map_err(fail)?;
                }
                Event::End(_) => {
                    let mut el = self
                        .stack
                        .pop()
                        .ok_or_else(|| fail("unexpected end tag".to_string()))?;
                    el.close(raw.to_string());
                    match self.stack.last_mut() {
                        Some(parent) => parent.push(Node::Element(el)),
                        None => self.top.push(Node::Element(el)),
                    }
                }
                Event::Text(_) => {
                    unescape(raw).map_err(|e| fail(e.to_string()))?;
                    self.attach(Node::Text(raw.to_string())).map_err(fail)?;
                }
                Event::CData(ref e) => {
                    let content = std::str::from_utf8(e).map_err(|e| fail(e.to_string()))?;
                    self.attach(Node::CData(content.to_string()))
                        .map_err(fail)?;
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {
                    self.attach(Node::Markup(raw.to_string())).map_err(fail)?;
                }
                Event::Eof => break,
            }
            start = end;
        }

        if let Some(open) = self.stack.last() {
            return Err(malformed(
                input,
                input.len(),
                format!("unclosed element <{}>", open.name()),
            ));
        }
        Ok(self.top)
    }

    fn open(&mut self, el: Element) -> Result<(), String> {
        if self.stack.is_empty() {
            self.claim_root()?;
        }
        self.stack.push(el);
        Ok(())
    }

    fn attach(&mut self, node: Node) -> Result<(), String> {
        if let Some(parent) = self.stack.last_mut() {
            parent.push(node);
            return Ok(());
        }
        match node {
            Node::Text(ref raw) if !raw.trim().is_empty() => {
                return Err("text outside the root element".to_string())
            }
            Node::CData(_) => return Err("CDATA outside the root element".to_string()),
            _ => {}
        }
        self.top.push(node);
        Ok(())
    }

    fn claim_root(&mut self) -> Result<(), String> {
        if self.seen_root {
            return Err("document has more than one root element".to_string());
        }
        self.seen_root = true;
        Ok(())
    }
}

/// Build an element from a start or empty tag, checking its name and
/// decoding every attribute value.
fn element(tag: &BytesStart<'_>, raw: &str) -> Result<Element, String> {
    let name = std::str::from_utf8(tag.name().as_ref())
        .map_err(|e| e.to_string())?
        .to_string();
    if !is_name(&name) {
        return Err(format!("invalid element name '{}'", name));
    }

    let mut attributes = Vec::new();
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|e| e.to_string())?;
        if !is_name(key) {
            return Err(format!("invalid attribute name '{}' on <{}>", key, name));
        }
        let value = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        if value.contains('<') {
            return Err(format!("'<' in value of attribute '{}' on <{}>", key, name));
        }
        let value = unescape(value).map_err(|e| format!("attribute '{}': {}", key, e))?;
        attributes.push(Attribute {
            name: key.to_string(),
            value: value.into_owned(),
        });
    }

    Ok(Element::new(name, attributes, raw.to_string()))
}

/// XML `Name` production, restricted to what `char` classification offers.
fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

fn malformed(input: &str, offset: usize, detail: String) -> DocumentError {
    let offset = offset.min(input.len());
    let line = input.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1;
    DocumentError::Malformed { line, detail }
}
