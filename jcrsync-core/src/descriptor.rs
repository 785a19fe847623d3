//! Descriptor document reading and writing
//!
//! A descriptor is a small XML document whose root element describes one
//! node; every attribute of the root element is a property:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <jcr:root xmlns:jcr="http://www.jcp.org/jcr/1.0"
//!     jcr:primaryType="nt:unstructured"
//!     jcr:mixinTypes="[mix:versionable]"
//!     title="Hello"
//!     count="{Long}3"/>
//! ```
//!
//! A root element other than `jcr:root` names the node explicitly.

use crate::content_node::{ContentNode, ContentNodeBuilder};
use crate::error::{ImportError, Result};
use crate::names::{self, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, JCR_ROOT};
use crate::value::TypedValue;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::writer::Writer;

/// Default file name of a descriptor document inside a directory
pub const DESCRIPTOR_FILE_NAME: &str = ".content.xml";

/// A parsed descriptor and the content the node model leaves out
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDescriptor {
    pub node: ContentNode,
    /// Names of nested elements that were skipped, in document order
    pub skipped_elements: Vec<String>,
}

impl ParsedDescriptor {
    /// Whether writing `node` back would reproduce the whole document
    pub fn is_complete(&self) -> bool {
        self.skipped_elements.is_empty()
    }
}

/// Parse a descriptor document into a node
pub fn parse(data: &[u8], fallback_name: &str) -> Result<ContentNode> {
    parse_document(data, fallback_name).map(|parsed| parsed.node)
}

/// Parse a descriptor document, keeping track of skipped nested elements
pub fn parse_document(data: &[u8], fallback_name: &str) -> Result<ParsedDescriptor> {
    let mut reader = quick_xml::Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut node: Option<ContentNode> = None;
    let mut skipped_elements = Vec::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if depth == 0 {
                    node = Some(read_root(e, node.is_some(), fallback_name)?);
                } else {
                    skipped_elements.push(skip_nested(e));
                }
                depth += 1;
            }
            Ok(Event::Empty(ref e)) => {
                if depth == 0 {
                    node = Some(read_root(e, node.is_some(), fallback_name)?);
                } else {
                    skipped_elements.push(skip_nested(e));
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ImportError::MalformedDescriptor(format!(
                    "{} at position {}",
                    e,
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(ImportError::MalformedDescriptor(
            "unexpected end of document".to_string(),
        ));
    }
    let node =
        node.ok_or_else(|| ImportError::MalformedDescriptor("document has no root element".to_string()))?;
    Ok(ParsedDescriptor { node, skipped_elements })
}

fn read_root(element: &BytesStart<'_>, seen_root: bool, fallback_name: &str) -> Result<ContentNode> {
    if seen_root {
        return Err(ImportError::MalformedDescriptor(
            "document has more than one root element".to_string(),
        ));
    }

    let element_name = utf8(element.name().into_inner())?;
    let name = if element_name == JCR_ROOT {
        names::unmunge(fallback_name)
    } else {
        element_name.to_string()
    };

    let mut primary_type: Option<String> = None;
    let mut mixins: Vec<String> = Vec::new();
    let mut namespaces: Vec<(String, String)> = Vec::new();
    let mut properties: Vec<(String, TypedValue)> = Vec::new();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| ImportError::MalformedDescriptor(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let raw = attr
            .unescape_value()
            .map_err(|e| ImportError::MalformedDescriptor(e.to_string()))?;

        if key == "xmlns" {
            namespaces.push((String::new(), raw.into_owned()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push((prefix.to_string(), raw.into_owned()));
        } else if key == JCR_PRIMARY_TYPE {
            match TypedValue::parse_attribute(&raw)? {
                TypedValue::String(t) if !t.is_empty() => primary_type = Some(t),
                other => {
                    return Err(ImportError::MalformedDescriptor(format!(
                        "{} must be a single name, found {}",
                        JCR_PRIMARY_TYPE, other
                    )));
                }
            }
        } else if key == JCR_MIXIN_TYPES {
            match TypedValue::parse_attribute(&raw)? {
                v @ (TypedValue::String(_) | TypedValue::StringArray(_)) => {
                    mixins = v.to_strings().into_iter().filter(|m| !m.is_empty()).collect();
                }
                other => {
                    return Err(ImportError::MalformedDescriptor(format!(
                        "{} must be a list of names, found {}",
                        JCR_MIXIN_TYPES, other
                    )));
                }
            }
        } else {
            properties.push((key, TypedValue::parse_attribute(&raw)?));
        }
    }

    let primary_type = primary_type.ok_or_else(|| {
        ImportError::MalformedDescriptor(format!("missing {} on node '{}'", JCR_PRIMARY_TYPE, name))
    })?;

    let mut builder = ContentNode::builder(name, primary_type);
    for (prefix, uri) in namespaces {
        builder = builder.namespace(prefix, uri);
    }
    for mixin in mixins {
        builder = builder.mixin(mixin);
    }
    for (key, value) in properties {
        builder = builder.property(key, value);
    }
    Ok(builder.build())
}

fn skip_nested(element: &BytesStart<'_>) -> String {
    let name = String::from_utf8_lossy(element.name().into_inner()).into_owned();
    tracing::warn!("Ignoring nested element <{}> in descriptor", name);
    name
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| ImportError::MalformedDescriptor(e.to_string()))
}

/// Serialize a node to a descriptor document with a `jcr:root` element.
///
/// Every property is written with an explicit type prefix, and namespace
/// declarations are added for well-known prefixes the node uses.
pub fn write(node: &ContentNode) -> Result<String> {
    write_element(node, JCR_ROOT)
}

/// Serialize a node under an explicit element name, which then names the
/// node when the document is read back
pub fn write_element(node: &ContentNode, element: &str) -> Result<String> {
    let node = with_used_namespaces(node);

    let mut root = BytesStart::new(element);
    for (prefix, uri) in node.namespaces() {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        root.push_attribute((key.as_str(), uri.as_str()));
    }

    let primary_type = TypedValue::String(node.primary_type().to_string());
    root.push_attribute((JCR_PRIMARY_TYPE, bare_string(&primary_type).as_str()));
    if !node.mixin_types().is_empty() {
        let mixins = TypedValue::StringArray(node.mixin_types().to_vec());
        root.push_attribute((JCR_MIXIN_TYPES, mixins.to_attribute().as_str()));
    }
    for (name, value) in node.properties() {
        root.push_attribute((name, value.to_attribute().as_str()));
    }

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    writer.get_mut().push(b'\n');
    writer.write_event(Event::Empty(root)).map_err(write_error)?;
    writer.get_mut().push(b'\n');

    String::from_utf8(writer.into_inner())
        .map_err(|e| ImportError::MalformedDescriptor(e.to_string()))
}

/// Render a plain name without a type prefix when it reads back unchanged
fn bare_string(value: &TypedValue) -> String {
    match value {
        TypedValue::String(s) if !s.starts_with(|c: char| matches!(c, '{' | '[' | '\\')) => s.clone(),
        other => other.to_attribute(),
    }
}

fn write_error(err: impl std::fmt::Display) -> ImportError {
    ImportError::Io(std::io::Error::other(err.to_string()))
}

fn with_used_namespaces(node: &ContentNode) -> ContentNode {
    let mut builder: ContentNodeBuilder = node.to_builder();
    let declared: Vec<&str> = node.namespaces().iter().map(|(p, _)| p.as_str()).collect();

    let mut used: Vec<&str> = vec!["jcr"];
    used.extend(names::prefix_of(node.primary_type()));
    used.extend(node.mixin_types().iter().filter_map(|m| names::prefix_of(m)));
    used.extend(node.properties().filter_map(|(name, _)| names::prefix_of(name)));

    let mut added: Vec<&str> = Vec::new();
    for prefix in used {
        if declared.contains(&prefix) || added.contains(&prefix) {
            continue;
        }
        if let Some(uri) = names::namespace_uri(prefix) {
            builder = builder.namespace(prefix, uri);
            added.push(prefix);
        }
    }
    builder.build()
}
