//! In-memory description of one typed node
//!
//! A `ContentNode` is built from one descriptor document: a name, a primary
//! type, mixins and the properties in declaration order. Once built it is not
//! mutated; edits go through [`ContentNodeBuilder`] and produce a new node.

use crate::error::Result;
use crate::value::TypedValue;
use indexmap::IndexMap;
use std::io::Read;

/// A node description parsed from a descriptor document
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    name: String,
    primary_type: String,
    mixin_types: Vec<String>,
    namespaces: Vec<(String, String)>,
    properties: IndexMap<String, TypedValue>,
}

impl ContentNode {
    /// Start building a node
    pub fn builder(name: impl Into<String>, primary_type: impl Into<String>) -> ContentNodeBuilder {
        ContentNodeBuilder {
            node: ContentNode {
                name: name.into(),
                primary_type: primary_type.into(),
                mixin_types: Vec::new(),
                namespaces: Vec::new(),
                properties: IndexMap::new(),
            },
        }
    }

    /// Parse a descriptor document.
    ///
    /// `fallback_name` is the owning directory's name as found on disk; it is
    /// unmunged and used unless the document names the node itself.
    pub fn parse(descriptor: &[u8], fallback_name: &str) -> Result<Self> {
        crate::descriptor::parse(descriptor, fallback_name)
    }

    /// Read a descriptor document from a byte source and parse it
    pub fn read_from<R: Read>(mut reader: R, fallback_name: &str) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(&data, fallback_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn mixin_types(&self) -> &[String] {
        &self.mixin_types
    }

    /// Namespace declarations `(prefix, uri)` in document order
    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    /// Properties in declaration order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.properties.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn property(&self, name: &str) -> Option<&TypedValue> {
        self.properties.get(name)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Copy this node into a builder for editing
    pub fn to_builder(&self) -> ContentNodeBuilder {
        ContentNodeBuilder { node: self.clone() }
    }
}

/// Builder for [`ContentNode`]
#[derive(Debug, Clone)]
pub struct ContentNodeBuilder {
    node: ContentNode,
}

impl ContentNodeBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.node.name = name.into();
        self
    }

    pub fn primary_type(mut self, primary_type: impl Into<String>) -> Self {
        self.node.primary_type = primary_type.into();
        self
    }

    /// Add a mixin unless it is already present
    pub fn mixin(mut self, mixin: impl Into<String>) -> Self {
        let mixin = mixin.into();
        if !self.node.mixin_types.contains(&mixin) {
            self.node.mixin_types.push(mixin);
        }
        self
    }

    /// Declare a namespace; a second declaration of a prefix replaces the URI
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.node.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(existing) => existing.1 = uri,
            None => self.node.namespaces.push((prefix, uri)),
        }
        self
    }

    /// Set a property; an existing property keeps its position
    pub fn property(mut self, name: impl Into<String>, value: TypedValue) -> Self {
        self.node.properties.insert(name.into(), value);
        self
    }

    /// Remove a property, keeping the order of the others
    pub fn remove_property(mut self, name: &str) -> Self {
        self.node.properties.shift_remove(name);
        self
    }

    pub fn build(self) -> ContentNode {
        self.node
    }
}
