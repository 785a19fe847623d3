//! Disk-persistent repository
//!
//! The session works on an in-memory tree; `commit` writes it out. Binary
//! values are stored content-addressed (like git objects) and the node tree
//! is stored as one JSON snapshot that references them.
//!
//! Each commit rewrites the whole snapshot and hashes every binary again;
//! objects already on disk are not rewritten. Objects the new snapshot no
//! longer references are removed once it is in place.

use crate::repository::{
    ContentRepository, MemoryRepository, NodeRecord, NodeTree, PropertyValue, RepositoryError,
    Result, Value,
};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "nodes.json";

/// On-disk form of a single value; binaries point into `objects/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
enum StoredValue {
    String(String),
    Long(i64),
    Double(#[serde(with = "double")] f64),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    Binary(String),
}

/// Doubles as JSON numbers when finite, as text (`inf`, `-inf`, `NaN`)
/// otherwise, since JSON has no literal for them
mod double {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredProperty {
    Single(StoredValue),
    Multiple(Vec<StoredValue>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    name: String,
    primary_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mixin_types: Vec<String>,
    #[serde(default)]
    properties: IndexMap<String, StoredProperty>,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    nodes: BTreeMap<String, StoredNode>,
}

/// Disk-persistent repository
///
/// Layout on disk:
/// ```text
/// {root}/
///   nodes.json                        - committed node tree
///   objects/{hash[0..2]}/{hash[2..]}  - binary values, keyed by sha256
/// ```
pub struct DiskRepository {
    root: PathBuf,
    session: MemoryRepository,
}

impl DiskRepository {
    /// Open or create a repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let root = path.to_path_buf();
        fs::create_dir_all(root.join("objects"))?;

        let snapshot_path = root.join(SNAPSHOT_FILE);
        let tree = if snapshot_path.exists() {
            let data = fs::read_to_string(&snapshot_path)?;
            let snapshot: Snapshot = serde_json::from_str(&data).map_err(|e| {
                RepositoryError::Serialization(format!("Failed to parse {:?}: {}", snapshot_path, e))
            })?;
            let tree = load_tree(&root, snapshot)?;
            tracing::debug!("Loaded {} nodes from {:?}", tree.len(), snapshot_path);
            tree
        } else {
            NodeTree::new()
        };

        Ok(Self {
            root,
            session: MemoryRepository::from_tree(tree),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The session's view of the tree, including staged changes
    pub fn session(&self) -> &MemoryRepository {
        &self.session
    }

    /// Create every missing node along a path
    pub fn ensure_path(&mut self, path: &str, primary_type: &str) -> Result<()> {
        self.session.ensure_path(path, primary_type)
    }

    fn save_snapshot(&self, tree: &NodeTree) -> Result<()> {
        let mut snapshot = Snapshot::default();
        for (path, node) in tree.iter() {
            snapshot.nodes.insert(path.to_string(), self.store_node(node)?);
        }

        let data = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let path = self.root.join(SNAPSHOT_FILE);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;

        // The snapshot is durable at this point; a failed cleanup only leaves garbage
        match prune_objects(&self.root, &referenced_objects(&snapshot)) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!("Removed {} unreferenced objects", removed),
            Err(e) => tracing::warn!("Could not prune objects in {:?}: {}", self.root, e),
        }
        Ok(())
    }

    fn store_node(&self, node: &NodeRecord) -> Result<StoredNode> {
        let mut properties = IndexMap::new();
        for (name, value) in &node.properties {
            let stored = match value {
                PropertyValue::Single(v) => StoredProperty::Single(self.store_value(v)?),
                PropertyValue::Multiple(vs) => StoredProperty::Multiple(
                    vs.iter().map(|v| self.store_value(v)).collect::<Result<_>>()?,
                ),
            };
            properties.insert(name.clone(), stored);
        }
        Ok(StoredNode {
            name: node.name.clone(),
            primary_type: node.primary_type.clone(),
            mixin_types: node.mixin_types.clone(),
            properties,
            children: node.children.clone(),
        })
    }

    fn store_value(&self, value: &Value) -> Result<StoredValue> {
        let stored = match value {
            Value::String(s) => StoredValue::String(s.clone()),
            Value::Long(v) => StoredValue::Long(*v),
            Value::Double(v) => StoredValue::Double(*v),
            Value::Boolean(v) => StoredValue::Boolean(*v),
            Value::Date(v) => StoredValue::Date(*v),
            Value::Binary(data) => StoredValue::Binary(store_object(&self.root, data)?),
        };
        Ok(stored)
    }
}

fn object_path(root: &Path, id: &str) -> PathBuf {
    root.join("objects").join(&id[..2]).join(&id[2..])
}

/// Store a binary value and return its id
fn store_object(root: &Path, data: &[u8]) -> Result<String> {
    let id = hex::encode(Sha256::digest(data));
    let path = object_path(root, &id);
    if path.exists() {
        return Ok(id); // Already stored (content-addressed = idempotent)
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, &path)?;
    Ok(id)
}

/// Ids of all binary values a snapshot refers to
fn referenced_objects(snapshot: &Snapshot) -> HashSet<String> {
    let mut ids = HashSet::new();
    for node in snapshot.nodes.values() {
        for prop in node.properties.values() {
            let values = match prop {
                StoredProperty::Single(v) => std::slice::from_ref(v),
                StoredProperty::Multiple(vs) => vs.as_slice(),
            };
            for value in values {
                if let StoredValue::Binary(id) = value {
                    ids.insert(id.clone());
                }
            }
        }
    }
    ids
}

/// Remove every object file not in `keep`, and shard directories left empty
fn prune_objects(root: &Path, keep: &HashSet<String>) -> Result<usize> {
    let mut removed = 0;
    for shard in fs::read_dir(root.join("objects"))? {
        let shard = shard?.path();
        if !shard.is_dir() {
            continue;
        }
        let prefix = shard
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for entry in fs::read_dir(&shard)? {
            let path = entry?.path();
            let rest = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !keep.contains(&format!("{}{}", prefix, rest)) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if fs::read_dir(&shard)?.next().is_none() {
            fs::remove_dir(&shard)?;
        }
    }
    Ok(removed)
}

fn load_object(root: &Path, id: &str) -> Result<Bytes> {
    if id.len() != 64 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RepositoryError::Serialization(format!("Invalid object id '{}'", id)));
    }
    Ok(Bytes::from(fs::read(object_path(root, id))?))
}

fn load_tree(root: &Path, snapshot: Snapshot) -> Result<NodeTree> {
    let mut records = Vec::with_capacity(snapshot.nodes.len());
    for (path, stored) in snapshot.nodes {
        let mut properties = IndexMap::new();
        for (name, prop) in stored.properties {
            let value = match prop {
                StoredProperty::Single(v) => PropertyValue::Single(load_value(root, v)?),
                StoredProperty::Multiple(vs) => PropertyValue::Multiple(
                    vs.into_iter().map(|v| load_value(root, v)).collect::<Result<_>>()?,
                ),
            };
            properties.insert(name, value);
        }
        records.push((
            path,
            NodeRecord {
                name: stored.name,
                primary_type: stored.primary_type,
                mixin_types: stored.mixin_types,
                properties,
                children: stored.children,
            },
        ));
    }
    Ok(NodeTree::from_records(records))
}

fn load_value(root: &Path, value: StoredValue) -> Result<Value> {
    let value = match value {
        StoredValue::String(s) => Value::String(s),
        StoredValue::Long(v) => Value::Long(v),
        StoredValue::Double(v) => Value::Double(v),
        StoredValue::Boolean(v) => Value::Boolean(v),
        StoredValue::Date(v) => Value::Date(v),
        StoredValue::Binary(id) => Value::Binary(load_object(root, &id)?),
    };
    Ok(value)
}

impl ContentRepository for DiskRepository {
    fn node_exists(&self, path: &str) -> bool {
        self.session.node_exists(path)
    }

    fn child_paths(&self, path: &str) -> Result<Vec<String>> {
        self.session.child_paths(path)
    }

    fn add_node(&mut self, parent: &str, name: &str, primary_type: &str) -> Result<String> {
        self.session.add_node(parent, name, primary_type)
    }

    fn remove_node(&mut self, path: &str) -> Result<()> {
        self.session.remove_node(path)
    }

    fn add_mixin(&mut self, path: &str, mixin: &str) -> Result<()> {
        self.session.add_mixin(path, mixin)
    }

    fn property(&self, path: &str, name: &str) -> Result<Option<PropertyValue>> {
        self.session.property(path, name)
    }

    fn set_property(&mut self, path: &str, name: &str, value: PropertyValue) -> Result<()> {
        self.session.set_property(path, name, value)
    }

    fn commit(&mut self) -> Result<()> {
        self.save_snapshot(self.session.staged())?;
        self.session.commit()?;
        tracing::debug!("Committed {} nodes to {:?}", self.session.committed().len(), self.root);
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.session.discard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_empty_repository() {
        let temp_dir = TempDir::new().unwrap();
        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        assert!(repo.node_exists("/"));
        assert!(repo.child_paths("/").unwrap().is_empty());
        assert!(temp_dir.path().join("objects").is_dir());
    }

    #[test]
    fn test_commit_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let date = DateTime::parse_from_rfc3339("2011-03-04T10:20:30+01:00").unwrap();

        let mut repo = DiskRepository::open(temp_dir.path()).unwrap();
        let page = repo.add_node("/", "page", "nt:unstructured").unwrap();
        repo.add_mixin(&page, "mix:versionable").unwrap();
        repo.set_property(&page, "title", PropertyValue::Single(Value::String("Hello".into())))
            .unwrap();
        repo.set_property(
            &page,
            "dates",
            PropertyValue::Multiple(vec![Value::Date(date), Value::Date(date)]),
        )
        .unwrap();
        repo.set_property(&page, "data", PropertyValue::Single(Value::Binary(Bytes::from_static(b"\x00\x01binary"))))
            .unwrap();
        repo.commit().unwrap();
        drop(repo);

        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        let node = repo.session().node("/page").unwrap();
        assert_eq!(node.primary_type, "nt:unstructured");
        assert_eq!(node.mixin_types, vec!["mix:versionable"]);
        assert_eq!(
            node.properties.get("title"),
            Some(&PropertyValue::Single(Value::String("Hello".into())))
        );
        assert_eq!(
            node.properties.get("dates"),
            Some(&PropertyValue::Multiple(vec![Value::Date(date), Value::Date(date)]))
        );
        assert_eq!(
            node.properties.get("data"),
            Some(&PropertyValue::Single(Value::Binary(Bytes::from_static(b"\x00\x01binary"))))
        );
        let names: Vec<&String> = node.properties.keys().collect();
        assert_eq!(names, vec!["title", "dates", "data"]);
    }

    #[test]
    fn test_uncommitted_changes_are_not_persisted() {
        let temp_dir = TempDir::new().unwrap();

        let mut repo = DiskRepository::open(temp_dir.path()).unwrap();
        repo.add_node("/", "committed", "nt:folder").unwrap();
        repo.commit().unwrap();
        repo.add_node("/", "staged", "nt:folder").unwrap();
        drop(repo);

        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        assert!(repo.node_exists("/committed"));
        assert!(!repo.node_exists("/staged"));
    }

    #[test]
    fn test_identical_binaries_share_one_object() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo = DiskRepository::open(temp_dir.path()).unwrap();
        let a = repo.add_node("/", "a", "nt:unstructured").unwrap();
        let b = repo.add_node("/", "b", "nt:unstructured").unwrap();
        let payload = PropertyValue::Single(Value::Binary(Bytes::from_static(b"same")));
        repo.set_property(&a, "data", payload.clone()).unwrap();
        repo.set_property(&b, "data", payload).unwrap();
        repo.commit().unwrap();

        let id = hex::encode(Sha256::digest(b"same"));
        assert!(object_path(temp_dir.path(), &id).is_file());
        let shards: Vec<_> = fs::read_dir(temp_dir.path().join("objects")).unwrap().collect();
        assert_eq!(shards.len(), 1);
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SNAPSHOT_FILE), "{ not json").unwrap();
        assert!(matches!(
            DiskRepository::open(temp_dir.path()),
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[test]
    fn test_non_finite_doubles_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo = DiskRepository::open(temp_dir.path()).unwrap();
        let node = repo.add_node("/", "n", "nt:unstructured").unwrap();
        repo.set_property(&node, "up", PropertyValue::Single(Value::Double(f64::INFINITY)))
            .unwrap();
        repo.set_property(
            &node,
            "many",
            PropertyValue::Multiple(vec![Value::Double(f64::NEG_INFINITY), Value::Double(f64::NAN), Value::Double(0.5)]),
        )
        .unwrap();
        repo.commit().unwrap();
        drop(repo);

        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        let node = repo.session().node("/n").unwrap();
        assert_eq!(
            node.properties.get("up"),
            Some(&PropertyValue::Single(Value::Double(f64::INFINITY)))
        );
        let many = node.properties.get("many").unwrap().values();
        assert_eq!(many.len(), 3);
        assert_eq!(many[0], Value::Double(f64::NEG_INFINITY));
        assert!(matches!(many[1], Value::Double(v) if v.is_nan()));
        assert_eq!(many[2], Value::Double(0.5));
    }

    #[test]
    fn test_snapshot_with_numeric_doubles_still_loads() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SNAPSHOT_FILE),
            r#"{"nodes": {"/": {"name": "", "primary_type": "rep:root",
                "properties": {"ratio": {"single": {"type": "Double", "value": 2}}}}}}"#,
        )
        .unwrap();

        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        assert_eq!(
            repo.session().node("/").unwrap().properties.get("ratio"),
            Some(&PropertyValue::Single(Value::Double(2.0)))
        );
    }

    #[test]
    fn test_replaced_binaries_are_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo = DiskRepository::open(temp_dir.path()).unwrap();
        let a = repo.add_node("/", "a", "nt:unstructured").unwrap();
        let b = repo.add_node("/", "b", "nt:unstructured").unwrap();
        repo.set_property(&a, "data", PropertyValue::Single(Value::Binary(Bytes::from_static(b"old"))))
            .unwrap();
        repo.set_property(&b, "data", PropertyValue::Single(Value::Binary(Bytes::from_static(b"kept"))))
            .unwrap();
        repo.commit().unwrap();

        let old_id = hex::encode(Sha256::digest(b"old"));
        let kept_id = hex::encode(Sha256::digest(b"kept"));
        assert!(object_path(temp_dir.path(), &old_id).is_file());

        repo.set_property(&a, "data", PropertyValue::Single(Value::Binary(Bytes::from_static(b"new"))))
            .unwrap();
        repo.commit().unwrap();

        assert!(!object_path(temp_dir.path(), &old_id).exists());
        assert!(object_path(temp_dir.path(), &kept_id).is_file());
        assert!(object_path(temp_dir.path(), &hex::encode(Sha256::digest(b"new"))).is_file());

        drop(repo);
        let repo = DiskRepository::open(temp_dir.path()).unwrap();
        assert_eq!(
            repo.session().node("/b").unwrap().properties.get("data"),
            Some(&PropertyValue::Single(Value::Binary(Bytes::from_static(b"kept"))))
        );
    }
}
