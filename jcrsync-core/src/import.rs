//! Destructive tree import
//!
//! Rebuilds a repository subtree from a source directory. For every
//! top-level job the destination's children are removed, the destination's
//! own properties are overwritten from its descriptor, and the source tree is
//! recreated below it:
//!
//! - a subdirectory with a descriptor becomes a node of the declared type
//! - a subdirectory without one becomes a folder node
//! - every other file becomes a file node with a resource child holding the
//!   content type and the raw bytes
//!
//! Each job is committed on success and discarded on failure, so one failing
//! directory never leaves a partial subtree behind or blocks the others.
//!
//! Properties already on the destination root and not named by its
//! descriptor are left in place: root properties are overwritten, never
//! cleared.

use crate::config::ImportConfig;
use crate::content_node::ContentNode;
use crate::error::{ImportError, Result};
use crate::mime::MimeTypeResolver;
use crate::names::{self, JCR_CONTENT, JCR_DATA, JCR_MIME_TYPE, JCR_MIXIN_TYPES};
use crate::repository::{ContentRepository, PropertyValue, RepositoryError, Value, parent_path};
use crate::source::{self, SourceTree};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One top-level directory to import and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub source: PathBuf,
    pub destination: String,
}

impl ImportJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Job whose destination is derived from the directory's position below
    /// the content root marker
    pub fn from_content_root(source: impl Into<PathBuf>, marker: &str) -> Result<Self> {
        let source = source.into();
        let destination = source::repository_path(&source, marker)?;
        Ok(Self { source, destination })
    }
}

/// Counters for one imported directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub nodes_removed: u64,
    pub nodes_created: u64,
    pub files_imported: u64,
    pub bytes_imported: u64,
    pub properties_written: u64,
    pub properties_skipped: u64,
}

/// Result of one top-level job
#[derive(Debug)]
pub struct DirectoryOutcome {
    pub job: ImportJob,
    pub result: Result<ImportStats>,
}

/// Results of all jobs, in the order they ran
#[derive(Debug, Default)]
pub struct ImportReport {
    pub outcomes: Vec<DirectoryOutcome>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&ImportJob, &ImportStats)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|stats| (&o.job, stats)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ImportJob, &ImportError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (&o.job, err)))
    }

    /// Counters summed over all successful jobs
    pub fn totals(&self) -> ImportStats {
        self.succeeded().fold(ImportStats::default(), |mut acc, (_, s)| {
            acc.nodes_removed += s.nodes_removed;
            acc.nodes_created += s.nodes_created;
            acc.files_imported += s.files_imported;
            acc.bytes_imported += s.bytes_imported;
            acc.properties_written += s.properties_written;
            acc.properties_skipped += s.properties_skipped;
            acc
        })
    }
}

/// Destructive import of source directories into a repository
pub struct TreeImporter<'a, S: SourceTree> {
    source: &'a S,
    config: &'a ImportConfig,
    mime: MimeTypeResolver,
}

impl<'a, S: SourceTree> TreeImporter<'a, S> {
    pub fn new(source: &'a S, config: &'a ImportConfig) -> Self {
        Self {
            source,
            config,
            mime: config.mime_resolver(),
        }
    }

    /// Run every job in order; a failing job is discarded and reported, the
    /// remaining jobs still run
    pub fn import_all<R>(&self, repo: &mut R, jobs: &[ImportJob]) -> ImportReport
    where
        R: ContentRepository + ?Sized,
    {
        let mut report = ImportReport::default();
        for job in jobs {
            let result = self.import_directory(repo, job);
            match &result {
                Ok(stats) => info!(
                    "Imported {:?} into {} ({} nodes, {} files)",
                    job.source, job.destination, stats.nodes_created, stats.files_imported
                ),
                Err(e) => {
                    error!("Could not import {:?} into {}: {}", job.source, job.destination, e);
                    if let Err(discard_err) = repo.discard() {
                        error!("Could not discard changes for {}: {}", job.destination, discard_err);
                    }
                }
            }
            report.outcomes.push(DirectoryOutcome {
                job: job.clone(),
                result,
            });
        }
        report
    }

    /// Import one directory and commit it
    pub fn import_directory<R>(&self, repo: &mut R, job: &ImportJob) -> Result<ImportStats>
    where
        R: ContentRepository + ?Sized,
    {
        info!("Importing {:?} into {}", job.source, job.destination);
        let mut stats = ImportStats::default();

        // Parse before touching the repository
        let root_node = match self.source.find_descriptor(&job.source) {
            Some(descriptor) => Some(self.read_node(&descriptor, &job.source)?),
            None => None,
        };

        if !repo.node_exists(&job.destination) {
            if !self.config.create_missing_roots {
                return Err(RepositoryError::PathNotFound(job.destination.clone()).into());
            }
            let primary_type = root_node
                .as_ref()
                .map(|n| n.primary_type())
                .unwrap_or(self.config.folder_type.as_str());
            self.create_root(repo, &job.destination, primary_type, &mut stats)?;
        }

        for child in repo.child_paths(&job.destination)? {
            repo.remove_node(&child)?;
            stats.nodes_removed += 1;
        }

        if let Some(node) = &root_node {
            self.apply_properties(repo, &job.destination, node, &mut stats)?;
        }

        self.import_children(repo, &job.destination, &job.source, &mut stats)?;

        repo.commit()?;
        info!("Committed {}", job.destination);
        Ok(stats)
    }

    fn create_root<R>(&self, repo: &mut R, path: &str, primary_type: &str, stats: &mut ImportStats) -> Result<()>
    where
        R: ContentRepository + ?Sized,
    {
        let parent = parent_path(path).ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))?;
        if !repo.node_exists(parent) {
            self.create_root(repo, parent, &self.config.folder_type, stats)?;
        }
        let name = path.rsplit('/').next().unwrap_or_default();
        repo.add_node(parent, name, primary_type)?;
        stats.nodes_created += 1;
        debug!("Created missing destination {} [{}]", path, primary_type);
        Ok(())
    }

    fn import_children<R>(&self, repo: &mut R, parent: &str, dir: &Path, stats: &mut ImportStats) -> Result<()>
    where
        R: ContentRepository + ?Sized,
    {
        for subdir in self.source.subdirectories(dir)? {
            let dir_name = source::file_name(&subdir);

            let child = match self.source.find_descriptor(&subdir) {
                Some(descriptor) => {
                    let node = self.read_node(&descriptor, &subdir)?;
                    let path = repo.add_node(parent, node.name(), node.primary_type())?;
                    debug!("Created {} [{}]", path, node.primary_type());
                    self.apply_properties(repo, &path, &node, stats)?;
                    path
                }
                None => {
                    let path = repo.add_node(parent, &names::unmunge(&dir_name), &self.config.folder_type)?;
                    debug!("Created {} [{}]", path, self.config.folder_type);
                    path
                }
            };
            stats.nodes_created += 1;

            self.import_children(repo, &child, &subdir, stats)?;
        }

        for file in self.source.files(dir)? {
            if source::file_name(&file) == self.config.descriptor_name {
                continue;
            }
            self.import_file(repo, parent, &file, stats)?;
        }
        Ok(())
    }

    fn read_node(&self, descriptor: &Path, dir: &Path) -> Result<ContentNode> {
        let data = self.source.read_bytes(descriptor)?;
        ContentNode::parse(&data, &source::file_name(dir))
            .inspect_err(|e| debug!("Could not read node from {:?}: {}", descriptor, e))
    }

    /// Make a destination node carry a content node's mixins and properties
    fn apply_properties<R>(&self, repo: &mut R, path: &str, node: &ContentNode, stats: &mut ImportStats) -> Result<()>
    where
        R: ContentRepository + ?Sized,
    {
        if let Some(existing) = repo.property(path, JCR_MIXIN_TYPES)? {
            for mixin in existing.strings() {
                repo.add_mixin(path, &mixin)?;
            }
        }
        for mixin in node.mixin_types() {
            repo.add_mixin(path, mixin)?;
        }

        for (name, value) in node.properties() {
            if names::is_reserved_property(name) {
                continue;
            }
            match repo.set_property(path, name, PropertyValue::from(value)) {
                Ok(()) => stats.properties_written += 1,
                Err(RepositoryError::UnsupportedPropertyType { name, ty }) => {
                    error!("Bad property type {} for {} on {}, skipping", ty, name, path);
                    stats.properties_skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn import_file<R>(&self, repo: &mut R, parent: &str, file: &Path, stats: &mut ImportStats) -> Result<()>
    where
        R: ContentRepository + ?Sized,
    {
        let name = source::file_name(file);
        let data = Bytes::from(self.source.read_bytes(file)?);
        let size = data.len() as u64;
        let mime_type = self.mime.resolve(&name).to_string();

        let file_path = repo.add_node(parent, &name, &self.config.file_type)?;
        let content_path = repo.add_node(&file_path, JCR_CONTENT, &self.config.resource_type)?;
        repo.set_property(&content_path, JCR_MIME_TYPE, PropertyValue::Single(Value::String(mime_type)))?;
        repo.set_property(&content_path, JCR_DATA, PropertyValue::Single(Value::Binary(data)))?;

        if size == 0 {
            warn!("Imported empty file {:?}", file);
        }
        debug!("Imported file {} ({} bytes)", file_path, size);
        stats.nodes_created += 2;
        stats.files_imported += 1;
        stats.bytes_imported += size;
        Ok(())
    }
}

/// Import directories with the local filesystem as source
pub fn import_directories<R>(repo: &mut R, jobs: &[ImportJob], config: &ImportConfig) -> ImportReport
where
    R: ContentRepository + ?Sized,
{
    let source = source::FsSourceTree::new(config.descriptor_name.clone());
    TreeImporter::new(&source, config).import_all(repo, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use std::collections::BTreeMap;
    use std::io;

    /// Source tree held in memory: directory path -> (subdirs, files)
    #[derive(Default)]
    struct FakeTree {
        files: BTreeMap<PathBuf, Vec<u8>>,
        dirs: Vec<PathBuf>,
    }

    impl FakeTree {
        fn dir(mut self, path: &str) -> Self {
            self.dirs.push(PathBuf::from(path));
            self
        }

        fn file(mut self, path: &str, data: &[u8]) -> Self {
            self.files.insert(PathBuf::from(path), data.to_vec());
            self
        }
    }

    impl SourceTree for FakeTree {
        fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            let mut dirs: Vec<PathBuf> = self.dirs.iter().filter(|d| d.parent() == Some(dir)).cloned().collect();
            dirs.sort();
            Ok(dirs)
        }

        fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
            Ok(self.files.keys().filter(|f| f.parent() == Some(dir)).cloned().collect())
        }

        fn find_descriptor(&self, dir: &Path) -> Option<PathBuf> {
            let path = dir.join(".content.xml");
            self.files.contains_key(&path).then_some(path)
        }

        fn read_bytes(&self, file: &Path) -> io::Result<Vec<u8>> {
            self.files
                .get(file)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{:?}", file)))
        }
    }

    fn repo_with_root() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_node("/", "site", "nt:unstructured").unwrap();
        repo.commit().unwrap();
        repo
    }

    #[test]
    fn test_plain_folder_and_file() {
        let tree = FakeTree::default()
            .dir("/src/images")
            .file("/src/images/logo.png", b"PNG");
        let config = ImportConfig::default();
        let mut repo = repo_with_root();

        let stats = TreeImporter::new(&tree, &config)
            .import_directory(&mut repo, &ImportJob::new("/src", "/site"))
            .unwrap();

        assert_eq!(repo.node("/site/images").unwrap().primary_type, "nt:folder");
        assert_eq!(repo.node("/site/images/logo.png").unwrap().primary_type, "nt:file");
        let resource = repo.node("/site/images/logo.png/jcr:content").unwrap();
        assert_eq!(resource.primary_type, "nt:resource");
        assert_eq!(
            resource.properties.get("jcr:mimeType"),
            Some(&PropertyValue::Single(Value::String("image/png".into())))
        );
        assert_eq!(stats.files_imported, 1);
        assert_eq!(stats.nodes_created, 3);
        assert!(!repo.has_pending_changes());
    }

    #[test]
    fn test_munged_directory_names() {
        let tree = FakeTree::default()
            .dir("/src/_cq_dialog")
            .dir("/src/_jcr_content")
            .file(
                "/src/_jcr_content/.content.xml",
                br#"<jcr:root jcr:primaryType="nt:unstructured"/>"#,
            );
        let config = ImportConfig::default();
        let mut repo = repo_with_root();

        TreeImporter::new(&tree, &config)
            .import_directory(&mut repo, &ImportJob::new("/src", "/site"))
            .unwrap();

        assert!(repo.node_exists("/site/cq:dialog"));
        assert_eq!(repo.node("/site/jcr:content").unwrap().primary_type, "nt:unstructured");
    }

    #[test]
    fn test_missing_destination_fails_without_create() {
        let tree = FakeTree::default().dir("/src/a");
        let config = ImportConfig::default();
        let mut repo = MemoryRepository::new();

        let err = TreeImporter::new(&tree, &config)
            .import_directory(&mut repo, &ImportJob::new("/src", "/content/site"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Repository(RepositoryError::PathNotFound(_))));
    }

    #[test]
    fn test_missing_destination_created_with_descriptor_type() {
        let tree = FakeTree::default().file(
            "/src/.content.xml",
            br#"<jcr:root jcr:primaryType="cq:Page" title="Home"/>"#,
        );
        let config = ImportConfig {
            create_missing_roots: true,
            ..ImportConfig::default()
        };
        let mut repo = MemoryRepository::new();

        let stats = TreeImporter::new(&tree, &config)
            .import_directory(&mut repo, &ImportJob::new("/src", "/content/site"))
            .unwrap();

        assert_eq!(repo.node("/content").unwrap().primary_type, "nt:folder");
        let site = repo.node("/content/site").unwrap();
        assert_eq!(site.primary_type, "cq:Page");
        assert_eq!(
            site.properties.get("title"),
            Some(&PropertyValue::Single(Value::String("Home".into())))
        );
        assert_eq!(stats.nodes_created, 2);
    }

    #[test]
    fn test_unreadable_file_aborts_directory() {
        struct Unreadable(FakeTree);
        impl SourceTree for Unreadable {
            fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
                self.0.subdirectories(dir)
            }
            fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
                let mut files = self.0.files(dir)?;
                files.push(dir.join("vanished.txt"));
                Ok(files)
            }
            fn find_descriptor(&self, dir: &Path) -> Option<PathBuf> {
                self.0.find_descriptor(dir)
            }
            fn read_bytes(&self, file: &Path) -> io::Result<Vec<u8>> {
                self.0.read_bytes(file)
            }
        }

        let tree = Unreadable(FakeTree::default().file("/src/ok.txt", b"ok"));
        let config = ImportConfig::default();
        let mut repo = repo_with_root();

        let report = TreeImporter::new(&tree, &config).import_all(&mut repo, &[ImportJob::new("/src", "/site")]);

        assert!(!report.is_success());
        assert!(matches!(report.failed().next(), Some((_, ImportError::Io(_)))));
        // Nothing from the failed job survives in the session
        assert!(!repo.node_exists("/site/ok.txt"));
        assert!(!repo.has_pending_changes());
    }

    #[test]
    fn test_report_totals() {
        let tree = FakeTree::default()
            .file("/a/one.txt", b"1")
            .file("/b/two.txt", b"22");
        let config = ImportConfig::default();
        let mut repo = MemoryRepository::new();
        repo.add_node("/", "a", "nt:folder").unwrap();
        repo.add_node("/", "b", "nt:folder").unwrap();

        let report = TreeImporter::new(&tree, &config).import_all(
            &mut repo,
            &[ImportJob::new("/a", "/a"), ImportJob::new("/b", "/b")],
        );

        assert!(report.is_success());
        let totals = report.totals();
        assert_eq!(totals.files_imported, 2);
        assert_eq!(totals.bytes_imported, 3);
    }

    #[test]
    fn test_job_from_content_root() {
        let job = ImportJob::from_content_root("/work/jcr_root/content/site", "jcr_root").unwrap();
        assert_eq!(job.destination, "/content/site");
        assert!(ImportJob::from_content_root("/work/content", "jcr_root").is_err());
    }
}
