//! `jcrsync edit`
//!
//! Loads the node described by a directory, applies the requested changes
//! and writes the descriptor back in place.

use crate::show::load_descriptor;
use anyhow::{Context, Result, bail};
use jcrsync_core::names::{self, JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, JCR_ROOT};
use jcrsync_core::source::file_name;
use jcrsync_core::{ContentNode, ImportConfig, TypedValue, descriptor};
use std::fs;
use std::path::Path;
use tracing::info;

/// Requested edits, applied in field order
#[derive(Debug, Default)]
pub struct NodeChanges {
    /// `name=value` pairs, value in descriptor attribute form
    pub set: Vec<String>,
    pub remove: Vec<String>,
    pub primary_type: Option<String>,
    pub add_mixins: Vec<String>,
}

pub fn run(path: &Path, changes: &NodeChanges, config_path: Option<&Path>) -> Result<()> {
    let config = ImportConfig::load_or_default(config_path)?;
    let (descriptor_file, parsed) = load_descriptor(path, &config.descriptor_name)?;
    if !parsed.is_complete() {
        bail!(
            "{:?} has nested elements ({}); writing it back would drop them",
            descriptor_file,
            parsed.skipped_elements.join(", ")
        );
    }
    let node = parsed.node;

    let edited = apply(&node, changes)?;
    if edited == node {
        println!("No changes to {:?}", descriptor_file);
        return Ok(());
    }

    // Keep an explicit element name; a directory-named node stays jcr:root
    let dir_name = descriptor_file.parent().map(file_name).unwrap_or_default();
    let element = if edited.name() == names::unmunge(&dir_name) {
        JCR_ROOT
    } else {
        edited.name()
    };
    let xml = descriptor::write_element(&edited, element)?;

    let tmp_path = descriptor_file.with_extension("tmp");
    fs::write(&tmp_path, xml).with_context(|| format!("Failed to write {:?}", tmp_path))?;
    fs::rename(&tmp_path, &descriptor_file).with_context(|| format!("Failed to replace {:?}", descriptor_file))?;

    info!("Updated {:?}", descriptor_file);
    println!("Updated {:?} ({} properties)", descriptor_file, edited.property_count());
    Ok(())
}

/// Apply edits to a copy of a node
pub fn apply(node: &ContentNode, changes: &NodeChanges) -> Result<ContentNode> {
    let mut builder = node.to_builder();

    for assignment in &changes.set {
        let (name, raw) = assignment
            .split_once('=')
            .with_context(|| format!("Expected name=value, got '{}'", assignment))?;
        if name.is_empty() {
            bail!("Empty property name in '{}'", assignment);
        }
        if name == JCR_PRIMARY_TYPE || name == JCR_MIXIN_TYPES {
            bail!("{} is set with --primary-type / --add-mixin", name);
        }
        let value = TypedValue::parse_attribute(raw).with_context(|| format!("Invalid value for {}", name))?;
        builder = builder.property(name, value);
    }

    for name in &changes.remove {
        builder = builder.remove_property(name);
    }
    if let Some(primary_type) = &changes.primary_type {
        builder = builder.primary_type(primary_type.as_str());
    }
    for mixin in &changes.add_mixins {
        builder = builder.mixin(mixin.as_str());
    }

    Ok(builder.build())
}
