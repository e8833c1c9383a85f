//! # Generic XML Element Tree
//!
//! Small owned element tree built from quick-xml events. The codec reads
//! the parts of a hierarchy document it understands and carries every
//! other element and attribute through this tree untouched.

use crate::error::{DocumentError, DocumentResult};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

/// Ordered attribute list, keys kept fully qualified (`library:libraryId`)
pub type Attributes = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XmlElement {
    /// Qualified element name (`bpmn:subProcess`)
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_attribute(key, value);
        self
    }

    pub fn push_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Attribute value looked up by local name, ignoring the prefix
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_name(key) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.local_name() == local)
    }

    /// Concatenated text content of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

/// Part of a qualified name after the namespace prefix
pub fn local_name(qualified: &str) -> &str {
    match qualified.rsplit_once(':') {
        Some((_, local)) => local,
        None => qualified,
    }
}

/// Parse a document into its root element.
///
/// Whitespace-only text between elements is dropped; comments, processing
/// instructions and the declaration are not retained.
pub fn parse(input: &str) -> DocumentResult<XmlElement> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(read_start(&start, position)?),
            Ok(Event::Empty(start)) => {
                let element = read_start(&start, position)?;
                close_element(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocumentError::malformed(position, "unbalanced closing tag"))?;
                close_element(&mut stack, &mut root, element, position)?;
            }
            Ok(Event::Text(text)) => {
                let decoded = text
                    .decode()
                    .map_err(|e| DocumentError::malformed(position, e.to_string()))?;
                append_text(&mut stack, &decoded, position)?;
            }
            Ok(Event::CData(data)) => {
                let raw = data.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&raw), position)?;
            }
            Ok(Event::GeneralRef(reference)) => {
                let name = reference
                    .decode()
                    .map_err(|e| DocumentError::malformed(position, e.to_string()))?;
                let resolved = resolve_reference(&name).ok_or_else(|| {
                    DocumentError::malformed(position, format!("unknown entity '&{};'", name))
                })?;
                append_text(&mut stack, &resolved, position)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(DocumentError::malformed(
                    reader.error_position(),
                    err.to_string(),
                ))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::malformed(
            reader.buffer_position(),
            format!("unclosed element '{}'", open.name),
        ));
    }

    root.ok_or_else(|| DocumentError::malformed(0, "document has no root element"))
}

/// Serialize with an XML declaration, indented by two spaces
pub fn write(root: &XmlElement) -> DocumentResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| DocumentError::malformed(0, format!("serialized output is not UTF-8: {}", e)))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> std::io::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(inner) => write_element(writer, inner)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

fn read_start(start: &BytesStart<'_>, position: u64) -> DocumentResult<XmlElement> {
    let mut element = XmlElement::new(utf8(start.name().as_ref(), position)?);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DocumentError::malformed(position, e.to_string()))?;
        let key = utf8(attribute.key.as_ref(), position)?;
        let value = attribute
            .unescape_value()
            .map_err(|e| DocumentError::malformed(position, e.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn close_element(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    mut element: XmlElement,
    position: u64,
) -> DocumentResult<()> {
    element.children.retain(|child| match child {
        XmlNode::Text(text) => !text.trim().is_empty(),
        XmlNode::Element(_) => true,
    });

    match stack.last_mut() {
        Some(parent) => {
            parent.push_child(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocumentError::malformed(
            position,
            format!("second root element '{}'", element.name),
        )),
    }
}

fn append_text(stack: &mut [XmlElement], text: &str, position: u64) -> DocumentResult<()> {
    let Some(parent) = stack.last_mut() else {
        if text.trim().is_empty() {
            return Ok(());
        }
        return Err(DocumentError::malformed(position, "text outside the root element"));
    };

    // Entity references split text into several events; keep them as one node.
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.push_text(text);
    }
    Ok(())
}

fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

fn utf8(bytes: &[u8], position: u64) -> DocumentResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DocumentError::malformed(position, e.to_string()))
}
