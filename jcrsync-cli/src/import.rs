//! `jcrsync import`
//!
//! Runs the whole import in a blocking thread pool, since the repository
//! and the source tree are both synchronous disk I/O.

use anyhow::{Context, Result, bail};
use jcrsync_core::{DiskRepository, ImportConfig, ImportJob, ImportReport, import_directories};
use std::path::PathBuf;
use std::time::Instant;
use tokio::task;

pub async fn run(
    dirs: Vec<PathBuf>,
    repo_path: PathBuf,
    dest: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = ImportConfig::load_or_default(config_path.as_deref())?;
    let jobs = plan_jobs(&dirs, dest.as_deref(), &config)?;

    println!("Importing {} director{} into {:?}", jobs.len(), if jobs.len() == 1 { "y" } else { "ies" }, repo_path);
    let start_time = Instant::now();

    let report = task::spawn_blocking(move || -> Result<ImportReport> {
        let mut repo = DiskRepository::open(&repo_path)
            .with_context(|| format!("Failed to open repository {:?}", repo_path))?;
        Ok(import_directories(&mut repo, &jobs, &config))
    })
    .await
    .map_err(|e| anyhow::anyhow!("Import task failed: {:?}", e))??;

    print_report(&report);
    println!("Elapsed: {:.2}s", start_time.elapsed().as_secs_f64());

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} of {} directories failed to import", failed, report.outcomes.len());
    }
    Ok(())
}

/// One job per directory; `dest` overrides the content-root mapping and
/// only makes sense for a single directory
pub fn plan_jobs(dirs: &[PathBuf], dest: Option<&str>, config: &ImportConfig) -> Result<Vec<ImportJob>> {
    if let Some(dest) = dest {
        if dirs.len() != 1 {
            bail!("--dest takes exactly one source directory, got {}", dirs.len());
        }
        return Ok(vec![ImportJob::new(&dirs[0], dest)]);
    }

    dirs.iter()
        .map(|dir| {
            let absolute = std::path::absolute(dir).with_context(|| format!("Invalid path {:?}", dir))?;
            ImportJob::from_content_root(absolute, &config.content_root_marker)
                .with_context(|| format!("No destination for {:?}; pass --dest", dir))
        })
        .collect()
}

fn print_report(report: &ImportReport) {
    for (job, stats) in report.succeeded() {
        println!(
            "  OK     {} <- {:?}: {} removed, {} created, {} files, {} properties ({} skipped)",
            job.destination,
            job.source,
            stats.nodes_removed,
            stats.nodes_created,
            stats.files_imported,
            stats.properties_written,
            stats.properties_skipped
        );
    }
    for (job, err) in report.failed() {
        println!("  FAILED {} <- {:?}: {}", job.destination, job.source, err);
    }

    let totals = report.totals();
    println!("\nImport complete!");
    println!("  Nodes created: {}", totals.nodes_created);
    println!("  Files imported: {} ({} bytes)", totals.files_imported, totals.bytes_imported);
    println!("  Properties written: {}", totals.properties_written);
    if totals.properties_skipped > 0 {
        println!("  Properties skipped: {}", totals.properties_skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_destination_needs_single_dir() {
        let config = ImportConfig::default();
        let jobs = plan_jobs(&[PathBuf::from("/tmp/site")], Some("/content/site"), &config).unwrap();
        assert_eq!(jobs, vec![ImportJob::new("/tmp/site", "/content/site")]);

        let two = [PathBuf::from("/a"), PathBuf::from("/b")];
        assert!(plan_jobs(&two, Some("/content"), &config).is_err());
    }

    #[test]
    fn test_destinations_from_content_root() {
        let config = ImportConfig::default();
        let dirs = [
            PathBuf::from("/work/jcr_root/content/site"),
            PathBuf::from("/work/jcr_root/apps/_cq_config"),
        ];
        let jobs = plan_jobs(&dirs, None, &config).unwrap();
        assert_eq!(jobs[0].destination, "/content/site");
        assert_eq!(jobs[1].destination, "/apps/cq:config");

        assert!(plan_jobs(&[PathBuf::from("/work/content")], None, &config).is_err());
    }
}
