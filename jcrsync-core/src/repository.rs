//! Content repository write capability
//!
//! `ContentRepository` is the session the import engine writes through:
//! nodes are addressed by absolute paths (`/content/site/page`), changes are
//! staged until `commit`, and `discard` drops everything staged since the
//! last commit.
//!
//! `MemoryRepository` keeps the staged and committed trees in memory. It is
//! the session behind [`crate::DiskRepository`] and the fake used in tests.

use crate::names::{self, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, REP_ROOT};
use crate::value::TypedValue;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors raised by a repository session
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Item already exists: {0}")]
    ItemExists(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Property '{name}' cannot hold a value of type {ty}")]
    UnsupportedPropertyType { name: String, ty: String },

    #[error("Property '{0}' is protected")]
    Protected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A single value as stored by the repository
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    Binary(Bytes),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Boolean(_) => "Boolean",
            Value::Date(_) => "Date",
            Value::Binary(_) => "Binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A stored property: one value or an ordered sequence of values
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Single(Value),
    Multiple(Vec<Value>),
}

impl PropertyValue {
    pub fn values(&self) -> &[Value] {
        match self {
            PropertyValue::Single(v) => std::slice::from_ref(v),
            PropertyValue::Multiple(vs) => vs,
        }
    }

    /// String values, ignoring values of other types
    pub fn strings(&self) -> Vec<String> {
        self.values()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn type_name(&self) -> String {
        match self {
            PropertyValue::Single(v) => v.type_name().to_string(),
            PropertyValue::Multiple(vs) => {
                format!("{}[]", vs.first().map(Value::type_name).unwrap_or("String"))
            }
        }
    }
}

impl From<&TypedValue> for PropertyValue {
    fn from(value: &TypedValue) -> Self {
        match value {
            TypedValue::String(s) => PropertyValue::Single(Value::String(s.clone())),
            TypedValue::Long(v) => PropertyValue::Single(Value::Long(*v)),
            TypedValue::Double(v) => PropertyValue::Single(Value::Double(*v)),
            TypedValue::Boolean(v) => PropertyValue::Single(Value::Boolean(*v)),
            TypedValue::Date(v) => PropertyValue::Single(Value::Date(*v)),
            TypedValue::StringArray(vs) => {
                PropertyValue::Multiple(vs.iter().cloned().map(Value::String).collect())
            }
            TypedValue::LongArray(vs) => {
                PropertyValue::Multiple(vs.iter().copied().map(Value::Long).collect())
            }
            TypedValue::DoubleArray(vs) => {
                PropertyValue::Multiple(vs.iter().copied().map(Value::Double).collect())
            }
            TypedValue::BooleanArray(vs) => {
                PropertyValue::Multiple(vs.iter().copied().map(Value::Boolean).collect())
            }
            TypedValue::DateArray(vs) => {
                PropertyValue::Multiple(vs.iter().copied().map(Value::Date).collect())
            }
        }
    }
}

/// Repository session used by the import engine
pub trait ContentRepository {
    /// Check if a node exists at a path
    fn node_exists(&self, path: &str) -> bool;

    /// Paths of the children of a node, in order
    fn child_paths(&self, path: &str) -> Result<Vec<String>>;

    /// Create a child node and return its path
    fn add_node(&mut self, parent: &str, name: &str, primary_type: &str) -> Result<String>;

    /// Remove a node and its whole subtree
    fn remove_node(&mut self, path: &str) -> Result<()>;

    /// Add a mixin type to a node (no-op when already present)
    fn add_mixin(&mut self, path: &str, mixin: &str) -> Result<()>;

    /// Read a property; `jcr:primaryType` and `jcr:mixinTypes` are readable
    fn property(&self, path: &str, name: &str) -> Result<Option<PropertyValue>>;

    /// Set or overwrite a property
    fn set_property(&mut self, path: &str, name: &str, value: PropertyValue) -> Result<()>;

    /// Persist everything staged since the last commit
    fn commit(&mut self) -> Result<()>;

    /// Drop everything staged since the last commit
    fn discard(&mut self) -> Result<()>;
}

/// Stored state of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub name: String,
    pub primary_type: String,
    pub mixin_types: Vec<String>,
    pub properties: IndexMap<String, PropertyValue>,
    /// Child names in creation order
    pub children: Vec<String>,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, primary_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_type: primary_type.into(),
            mixin_types: Vec::new(),
            properties: IndexMap::new(),
            children: Vec::new(),
        }
    }
}

/// A whole node tree keyed by absolute path
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTree {
    nodes: BTreeMap<String, NodeRecord>,
}

impl NodeTree {
    /// A tree holding only the root node
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), NodeRecord::new("", REP_ROOT));
        Self { nodes }
    }

    /// Build a tree from path-keyed records; the root is added if missing
    pub fn from_records(records: impl IntoIterator<Item = (String, NodeRecord)>) -> Self {
        let mut tree = Self::new();
        tree.nodes.extend(records);
        tree
    }

    pub fn get(&self, path: &str) -> Option<&NodeRecord> {
        self.nodes.get(path)
    }

    fn get_mut(&mut self, path: &str) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))
    }

    /// All nodes in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(path, node)| (path.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a parent path and a child name
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parent path of a node path (`None` for the root)
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/"),
        Some((parent, _)) => Some(parent),
        None => None,
    }
}

/// In-memory repository session with commit/discard semantics
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    committed: NodeTree,
    staged: NodeTree,
}

impl MemoryRepository {
    /// Create an empty repository holding only the root node
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session over an already committed tree
    pub fn from_tree(tree: NodeTree) -> Self {
        Self {
            committed: tree.clone(),
            staged: tree,
        }
    }

    /// Node as seen by this session, including staged changes
    pub fn node(&self, path: &str) -> Option<&NodeRecord> {
        self.staged.get(path)
    }

    /// Tree as seen by this session
    pub fn staged(&self) -> &NodeTree {
        &self.staged
    }

    /// Tree as of the last commit
    pub fn committed(&self) -> &NodeTree {
        &self.committed
    }

    pub fn has_pending_changes(&self) -> bool {
        self.staged != self.committed
    }

    /// Create every missing node along a path, typed `primary_type`
    pub fn ensure_path(&mut self, path: &str, primary_type: &str) -> Result<()> {
        if self.node_exists(path) {
            return Ok(());
        }
        let parent = parent_path(path).ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))?;
        self.ensure_path(parent, primary_type)?;
        let name = path.rsplit('/').next().unwrap_or_default();
        self.add_node(parent, name, primary_type)?;
        Ok(())
    }
}

impl ContentRepository for MemoryRepository {
    fn node_exists(&self, path: &str) -> bool {
        self.staged.get(path).is_some()
    }

    fn child_paths(&self, path: &str) -> Result<Vec<String>> {
        let node = self
            .staged
            .get(path)
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))?;
        Ok(node.children.iter().map(|name| child_path(path, name)).collect())
    }

    fn add_node(&mut self, parent: &str, name: &str, primary_type: &str) -> Result<String> {
        if !names::is_valid_node_name(name) {
            return Err(RepositoryError::InvalidName(name.to_string()));
        }
        if primary_type.is_empty() {
            return Err(RepositoryError::InvalidName(primary_type.to_string()));
        }
        let path = child_path(parent, name);
        if self.staged.get(&path).is_some() {
            return Err(RepositoryError::ItemExists(path));
        }

        self.staged.get_mut(parent)?.children.push(name.to_string());
        self.staged
            .nodes
            .insert(path.clone(), NodeRecord::new(name, primary_type));
        Ok(path)
    }

    fn remove_node(&mut self, path: &str) -> Result<()> {
        let parent = parent_path(path).ok_or_else(|| RepositoryError::Protected(path.to_string()))?;
        let name = self
            .staged
            .get(path)
            .map(|node| node.name.clone())
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))?;

        let prefix = format!("{}/", path);
        self.staged
            .nodes
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        self.staged.get_mut(parent)?.children.retain(|c| *c != name);
        Ok(())
    }

    fn add_mixin(&mut self, path: &str, mixin: &str) -> Result<()> {
        if mixin.is_empty() {
            return Err(RepositoryError::InvalidName(mixin.to_string()));
        }
        let node = self.staged.get_mut(path)?;
        if !node.mixin_types.iter().any(|m| m == mixin) {
            node.mixin_types.push(mixin.to_string());
        }
        Ok(())
    }

    fn property(&self, path: &str, name: &str) -> Result<Option<PropertyValue>> {
        let node = self
            .staged
            .get(path)
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))?;
        let value = match name {
            JCR_PRIMARY_TYPE => Some(PropertyValue::Single(Value::String(node.primary_type.clone()))),
            JCR_MIXIN_TYPES if node.mixin_types.is_empty() => None,
            JCR_MIXIN_TYPES => Some(PropertyValue::Multiple(
                node.mixin_types.iter().cloned().map(Value::String).collect(),
            )),
            _ => node.properties.get(name).cloned(),
        };
        Ok(value)
    }

    fn set_property(&mut self, path: &str, name: &str, value: PropertyValue) -> Result<()> {
        if names::is_reserved_property(name) {
            return Err(RepositoryError::Protected(name.to_string()));
        }
        if name.is_empty() {
            return Err(RepositoryError::InvalidName(name.to_string()));
        }
        let node = self.staged.get_mut(path)?;
        node.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.committed = self.staged.clone();
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.staged = self.committed.clone();
        Ok(())
    }
}
