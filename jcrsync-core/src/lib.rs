//! jcrsync Core Library
//!
//! Pushes a file tree of content into a hierarchical content repository:
//! - Typed property values and their textual encoding
//! - Content nodes parsed from per-directory descriptor documents
//! - Content types for imported files
//! - Repository session abstraction with in-memory and disk backends
//! - Destructive tree import (purge, rebuild, commit per directory)

pub mod config;
pub mod content_node;
pub mod descriptor;
pub mod disk_repository;
pub mod error;
pub mod import;
pub mod mime;
pub mod names;
pub mod repository;
pub mod source;
pub mod value;

pub use config::ImportConfig;
pub use content_node::{ContentNode, ContentNodeBuilder};
pub use descriptor::{ParsedDescriptor, DESCRIPTOR_FILE_NAME};
pub use disk_repository::DiskRepository;
pub use error::{ImportError, Result};
pub use import::{import_directories, DirectoryOutcome, ImportJob, ImportReport, ImportStats, TreeImporter};
pub use mime::{MimeTypeResolver, DEFAULT_MIME_TYPE};
pub use repository::{
    ContentRepository, MemoryRepository, NodeRecord, NodeTree, PropertyValue, RepositoryError, Value,
};
pub use source::{FsSourceTree, SourceTree};
pub use value::{CodecError, PropertyType, TypedValue};
