// src/utils/storage.rs: Output handles, the storage namespace and the run manifest

use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, info};
use serde::Serialize;

use crate::config::defs::{PipelineError, TaskSize};
use crate::utils::process::ToolRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    File,
    Dir,
}

/// A task output as seen by downstream tasks: where it lives locally and
/// where it was published in the storage namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputHandle {
    pub kind: HandleKind,
    pub local: PathBuf,
    pub remote: String,
}

impl OutputHandle {
    /// Wraps a user-supplied stage input that was not produced by this run.
    pub fn external(kind: HandleKind, local: PathBuf) -> Self {
        let remote = local.to_string_lossy().into_owned();
        OutputHandle { kind, local, remote }
    }

    /// Path of a file inside a directory handle.
    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.local.join(name)
    }
}

#[derive(Debug, Clone)]
pub struct StorageNamespace {
    scheme: String,
    workflow: String,
    root: Option<PathBuf>,
}

impl StorageNamespace {
    pub fn new(scheme: &str, workflow: &str, root: Option<PathBuf>) -> Self {
        StorageNamespace {
            scheme: scheme.to_string(),
            workflow: workflow.trim_matches('/').to_string(),
            root,
        }
    }

    /// `<scheme>:///<workflow>/<sample>/<rel>`
    pub fn remote_uri(&self, sample: &str, rel: &str) -> String {
        format!("{}:///{}/{}/{}", self.scheme, self.workflow, sample, rel.trim_start_matches('/'))
    }

    /// Where an output lands on disk when a storage root is configured.
    pub fn local_destination(&self, sample: &str, rel: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(&self.workflow).join(sample).join(rel.trim_start_matches('/')))
    }

    /// Relocates a task output into the namespace and returns its handle.
    ///
    /// # Arguments
    ///
    /// * `local` - File or directory the tool wrote.
    /// * `kind` - Whether `local` is a file or a directory.
    /// * `sample` - Sample name, second path component of the namespace.
    /// * `rel` - Path of the output below the sample.
    /// * `dry_run` - Skip existence checks and copying.
    ///
    /// # Returns
    /// OutputHandle pointing at the local output.
    pub async fn publish(
        &self,
        local: &Path,
        kind: HandleKind,
        sample: &str,
        rel: &str,
        dry_run: bool,
    ) -> Result<OutputHandle, PipelineError> {
        let handle = OutputHandle {
            kind,
            local: local.to_path_buf(),
            remote: self.remote_uri(sample, rel),
        };
        if dry_run {
            return Ok(handle);
        }

        let present = match kind {
            HandleKind::File => local.is_file(),
            HandleKind::Dir => local.is_dir(),
        };
        if !present {
            return Err(PipelineError::Storage(format!(
                "expected output {} was not produced",
                local.display()
            )));
        }

        if let Some(dest) = self.local_destination(sample, rel) {
            let src = local.to_path_buf();
            let target = dest.clone();
            tokio::task::spawn_blocking(move || copy_recursive(&src, &target))
                .await
                .map_err(|e| PipelineError::Storage(e.to_string()))?
                .map_err(|e| PipelineError::Storage(e.to_string()))?;
            debug!("Published {} to {}", local.display(), dest.display());
        }
        info!("Output {} -> {}", local.display(), handle.remote);
        Ok(handle)
    }
}

fn copy_recursive(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dest).map_err(|e| anyhow!("Failed to copy {}: {}", src.display(), e))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task: String,
    pub tool: String,
    pub command: Vec<String>,
    pub large: bool,
    pub executed: bool,
    pub elapsed_ms: u128,
    pub outputs: Vec<OutputHandle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub workflow: String,
    pub sample: String,
    pub dry_run: bool,
    pub started: String,
    pub tasks: Vec<TaskRecord>,
}

impl RunManifest {
    pub fn new(workflow: &str, sample: &str, dry_run: bool) -> Self {
        RunManifest {
            workflow: workflow.to_string(),
            sample: sample.to_string(),
            dry_run,
            started: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn push(&mut self, run: ToolRun, outputs: Vec<OutputHandle>) {
        let mut command = vec![run.tool.clone()];
        command.extend(run.args);
        self.tasks.push(TaskRecord {
            task: run.task,
            tool: run.tool,
            command,
            large: run.size == TaskSize::Large,
            executed: run.executed,
            elapsed_ms: run.elapsed_ms,
            outputs,
        });
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let ofile = fs::File::create(path)
            .map_err(|e| anyhow!("Couldn't open {}: {}", path.display(), e))?;
        let writer = BufWriter::new(ofile);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| anyhow!("Failed to write manifest {}: {}", path.display(), e))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn remote_uri_layout() {
        let ns = StorageNamespace::new("latch", "/metamage/", None);
        assert_eq!(ns.remote_uri("crohn", "kaiju/crohn_kaiju.tsv"), "latch:///metamage/crohn/kaiju/crohn_kaiju.tsv");
        assert_eq!(ns.remote_uri("crohn", "/MEGAHIT"), "latch:///metamage/crohn/MEGAHIT");
        assert!(ns.local_destination("crohn", "MEGAHIT").is_none());
    }

    #[tokio::test]
    async fn publish_copies_directory_tree() -> Result<()> {
        let work = tempdir()?;
        let root = tempdir()?;
        let out = work.path().join("gecco_results");
        fs::create_dir_all(out.join("nested"))?;
        fs::write(out.join("clusters.tsv"), "a\tb\n")?;
        fs::write(out.join("nested/genes.tsv"), "x\n")?;

        let ns = StorageNamespace::new("latch", "metamage", Some(root.path().to_path_buf()));
        let handle = ns.publish(&out, HandleKind::Dir, "s1", "gecco_results", false).await?;

        assert_eq!(handle.remote, "latch:///metamage/s1/gecco_results");
        assert_eq!(handle.local, out);
        let published = root.path().join("metamage/s1/gecco_results");
        assert_eq!(fs::read_to_string(published.join("clusters.tsv"))?, "a\tb\n");
        assert!(published.join("nested/genes.tsv").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn publish_rejects_missing_output() {
        let work = tempdir().unwrap();
        let ns = StorageNamespace::new("latch", "metamage", None);
        let missing = work.path().join("s1_kaiju.out");
        let err = ns.publish(&missing, HandleKind::File, "s1", "kaiju/s1_kaiju.out", false).await;
        assert!(matches!(err, Err(PipelineError::Storage(_))));

        // Same path is accepted when nothing ran
        let handle = ns.publish(&missing, HandleKind::File, "s1", "kaiju/s1_kaiju.out", true).await.unwrap();
        assert_eq!(handle.kind, HandleKind::File);
    }

    #[test]
    fn manifest_serializes_tasks() -> Result<()> {
        let mut manifest = RunManifest::new("metamage", "s1", true);
        manifest.push(
            ToolRun {
                task: "sort_bam".to_string(),
                tool: "samtools".to_string(),
                args: vec!["sort".to_string(), "in.bam".to_string()],
                size: TaskSize::Small,
                executed: false,
                elapsed_ms: 0,
            },
            vec![OutputHandle::external(HandleKind::File, PathBuf::from("/tmp/s1_sorted.bam"))],
        );
        let dir = tempdir()?;
        let path = dir.path().join("manifest.json");
        manifest.write(&path)?;
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["tasks"][0]["command"][0], "samtools");
        assert_eq!(value["tasks"][0]["outputs"][0]["kind"], "file");
        assert_eq!(value["tasks"][0]["large"], false);
        Ok(())
    }
}
