//! `jcrsync tree`

use anyhow::{Context, Result, bail};
use jcrsync_core::repository::child_path;
use jcrsync_core::{DiskRepository, NodeTree, PropertyValue, Value};
use std::path::Path;

pub fn run(repo_path: &Path, path: &str) -> Result<()> {
    let repo = DiskRepository::open(repo_path)
        .with_context(|| format!("Failed to open repository {:?}", repo_path))?;
    print!("{}", render(repo.session().committed(), path)?);
    Ok(())
}

/// Indented listing of a subtree with its properties
pub fn render(tree: &NodeTree, path: &str) -> Result<String> {
    if tree.get(path).is_none() {
        bail!("Path not found: {}", path);
    }
    let mut out = String::new();
    render_node(tree, path, 0, &mut out);
    Ok(out)
}

fn render_node(tree: &NodeTree, path: &str, depth: usize, out: &mut String) {
    let Some(node) = tree.get(path) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let name = if path == "/" { "/" } else { node.name.as_str() };

    let mut types = node.primary_type.clone();
    for mixin in &node.mixin_types {
        types.push_str(", ");
        types.push_str(mixin);
    }
    out.push_str(&format!("{}{} [{}]\n", indent, name, types));

    for (prop, value) in &node.properties {
        out.push_str(&format!("{}  - {} = {}\n", indent, prop, format_property(value)));
    }
    for child in &node.children {
        render_node(tree, &child_path(path, child), depth + 1, out);
    }
}

fn format_property(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Single(v) => format_value(v),
        PropertyValue::Multiple(vs) => {
            let items: Vec<String> = vs.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Long(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Boolean(v) => v.to_string(),
        Value::Date(v) => v.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        Value::Binary(data) => format!("<binary, {} bytes>", data.len()),
    }
}
