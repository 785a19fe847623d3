//! JCR item names
//!
//! Well-known property and node type names, the set of properties the import
//! never copies, and the filesystem-safe namespace munging used for directory
//! names on disk.

/// Primary node type property
pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";

/// Mixin node types property
pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";

/// Creation timestamp (protected, set by the repository)
pub const JCR_CREATED: &str = "jcr:created";

/// Creating user (protected, set by the repository)
pub const JCR_CREATED_BY: &str = "jcr:createdBy";

/// Name of the resource child below a file node
pub const JCR_CONTENT: &str = "jcr:content";

/// Content type of a resource node
pub const JCR_MIME_TYPE: &str = "jcr:mimeType";

/// Binary payload of a resource node
pub const JCR_DATA: &str = "jcr:data";

/// Root element name of a descriptor document
pub const JCR_ROOT: &str = "jcr:root";

/// Generic unstructured node type
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";

/// Plain container node type
pub const NT_FOLDER: &str = "nt:folder";

/// File node type
pub const NT_FILE: &str = "nt:file";

/// Resource node type holding a binary payload
pub const NT_RESOURCE: &str = "nt:resource";

/// Primary type of the repository root node
pub const REP_ROOT: &str = "rep:root";

/// Properties that are never written through the generic property copy.
///
/// The primary type is consumed when the node is created, mixins go through
/// `add_mixin`, and the creation audit fields belong to the repository.
pub const RESERVED_PROPERTIES: [&str; 4] =
    [JCR_PRIMARY_TYPE, JCR_MIXIN_TYPES, JCR_CREATED, JCR_CREATED_BY];

/// Check if a property is excluded from the generic property copy
pub fn is_reserved_property(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

/// Well-known namespace prefixes and their URIs
pub const WELL_KNOWN_NAMESPACES: [(&str, &str); 6] = [
    ("jcr", "http://www.jcp.org/jcr/1.0"),
    ("nt", "http://www.jcp.org/jcr/nt/1.0"),
    ("mix", "http://www.jcp.org/jcr/mix/1.0"),
    ("rep", "internal"),
    ("sling", "http://sling.apache.org/jcr/sling/1.0"),
    ("cq", "http://www.day.com/jcr/cq/1.0"),
];

/// Look up the URI of a well-known namespace prefix
pub fn namespace_uri(prefix: &str) -> Option<&'static str> {
    WELL_KNOWN_NAMESPACES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

/// Namespace prefix of a qualified name (`jcr:title` -> `jcr`)
pub fn prefix_of(name: &str) -> Option<&str> {
    name.split_once(':').map(|(prefix, _)| prefix)
}

/// Encode a namespace-qualified name for use as a file or directory name.
///
/// `jcr:content` becomes `_jcr_content`. Names without a namespace are
/// returned unchanged.
pub fn munge(name: &str) -> String {
    match name.split_once(':') {
        Some((prefix, local)) if is_prefix(prefix) && !local.is_empty() => {
            format!("_{}_{}", prefix, local)
        }
        _ => name.to_string(),
    }
}

/// Reverse [`munge`].
///
/// Exactly one rule applies: a leading `_`, a namespace prefix, a second `_`
/// and a non-empty local name turn into `prefix:local`. Anything else is
/// returned unchanged, so `_private` or `a_b` keep their spelling.
pub fn unmunge(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('_') {
        if let Some((prefix, local)) = rest.split_once('_') {
            if is_prefix(prefix) && !local.is_empty() {
                return format!("{}:{}", prefix, local);
            }
        }
    }
    name.to_string()
}

fn is_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Check that a string can name a node below a parent
pub fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('[')
        && !name.contains(']')
        && !name.contains('|')
        && !name.contains('*')
}
