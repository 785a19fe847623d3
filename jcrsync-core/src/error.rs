//! Import error taxonomy

use crate::repository::RepositoryError;
use crate::value::CodecError;
use std::path::PathBuf;

/// Result type for descriptor parsing and import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors that abort a descriptor parse or a directory import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Unsupported property type: {0}")]
    UnsupportedPropertyType(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Directory {0:?} is not below a content root")]
    OutsideContentRoot(PathBuf),
}

impl From<CodecError> for ImportError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedType(tag) => ImportError::UnsupportedPropertyType(tag),
            invalid @ CodecError::InvalidValue { .. } => {
                ImportError::MalformedDescriptor(invalid.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PropertyType;

    #[test]
    fn test_codec_errors_map_to_taxonomy() {
        let unsupported: ImportError = CodecError::UnsupportedType("Name".into()).into();
        assert!(matches!(unsupported, ImportError::UnsupportedPropertyType(ref t) if t == "Name"));

        let invalid: ImportError = CodecError::InvalidValue {
            ty: PropertyType::Long,
            text: "x".into(),
            reason: "invalid digit found in string".into(),
        }
        .into();
        match invalid {
            ImportError::MalformedDescriptor(msg) => assert!(msg.contains("Long")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
