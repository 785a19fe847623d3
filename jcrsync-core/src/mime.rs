//! Content types for imported files
//!
//! Resolution only looks at the last extension of the file name; file
//! contents are never inspected.

use std::collections::HashMap;

/// Content type for files without a known extension
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

const MIME_TABLE: [(&str, &str); 8] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("ico", "image/vnd.microsoft.icon"),
    ("gif", "image/gif"),
    ("png", "image/png"),
    ("jsp", "text/plain"),
    ("css", "text/css"),
    ("js", "application/x-javascript"),
];

/// Content type of a file name from the built-in table
pub fn mime_type_for(file_name: &str) -> &'static str {
    extension(file_name)
        .and_then(|ext| {
            MIME_TABLE
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Lower-cased text after the last dot, if any
fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Resolves content types, with configured overrides taking precedence
#[derive(Debug, Clone, Default)]
pub struct MimeTypeResolver {
    overrides: HashMap<String, String>,
}

impl MimeTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with extra `extension -> content type` entries
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(ext, mime)| {
                    let ext = ext.as_ref().trim_start_matches('.').to_ascii_lowercase();
                    (ext, mime.into())
                })
                .collect(),
        }
    }

    pub fn resolve(&self, file_name: &str) -> &str {
        if let Some(mime) = extension(file_name).and_then(|ext| self.overrides.get(&ext)) {
            return mime;
        }
        mime_type_for(file_name)
    }
}
