//! `jcrsync show`

use anyhow::{Context, Result};
use jcrsync_core::source::{descriptor_path, file_name};
use jcrsync_core::{ContentNode, ImportConfig, ParsedDescriptor, descriptor};
use std::fs;
use std::path::{Path, PathBuf};

/// Descriptor file and parsed descriptor for a directory or descriptor path
pub fn load_descriptor(path: &Path, descriptor_name: &str) -> Result<(PathBuf, ParsedDescriptor)> {
    let descriptor_file = descriptor_path(path, descriptor_name)
        .with_context(|| format!("No {} found at {:?}", descriptor_name, path))?;
    // The node is named after the directory holding the descriptor
    let dir_name = descriptor_file.parent().map(file_name).unwrap_or_default();

    let data = fs::read(&descriptor_file).with_context(|| format!("Failed to read {:?}", descriptor_file))?;
    let parsed = descriptor::parse_document(&data, &dir_name)
        .with_context(|| format!("Failed to parse {:?}", descriptor_file))?;
    Ok((descriptor_file, parsed))
}

pub fn run(path: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = ImportConfig::load_or_default(config_path)?;
    let (descriptor, parsed) = load_descriptor(path, &config.descriptor_name)?;

    println!("Descriptor: {:?}", descriptor);
    print!("{}", render(&parsed.node));
    for element in &parsed.skipped_elements {
        println!("Not shown: nested element <{}>", element);
    }
    Ok(())
}

/// Human-readable listing of a node
pub fn render(node: &ContentNode) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name: {}\n", node.name()));
    out.push_str(&format!("Primary type: {}\n", node.primary_type()));
    if !node.mixin_types().is_empty() {
        out.push_str(&format!("Mixin types: {}\n", node.mixin_types().join(", ")));
    }
    for (prefix, uri) in node.namespaces() {
        out.push_str(&format!("Namespace: {} = {}\n", prefix, uri));
    }
    out.push_str(&format!("Properties: {}\n", node.property_count()));
    for (name, value) in node.properties() {
        out.push_str(&format!("  {} ({}) = {}\n", name, value.property_type(), value.encode()));
    }
    out
}
