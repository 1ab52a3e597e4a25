//! Newline-separated text file sink.
//!
//! In [`WriteMode::Append`] each key's sorted results are appended as soon as
//! the key completes, so an interrupted batch keeps what it found. On
//! [`Sink::finish`] the file is compacted into one globally sorted, distinct
//! list. In [`WriteMode::Overwrite`] the file starts empty and the whole
//! accumulated set is rewritten after every key; each rewrite goes through a
//! temporary file and a rename so readers never see a partial list.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use subsift_core::{CoreError, Sink};

use crate::config::WriteMode;
use crate::error::{AppError, Result};

/// File-backed result sink.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    mode: WriteMode,
    /// Results seen so far. Only populated in overwrite mode. The lock also
    /// serializes every write to the file.
    accumulated: Mutex<BTreeSet<String>>,
}

impl FileSink {
    /// Prepare `path` for writing, creating parent directories as needed.
    ///
    /// Append mode keeps existing content; overwrite mode truncates it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Sink`] if the directory or file cannot be created.
    pub async fn create(path: impl Into<PathBuf>, mode: WriteMode) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::Sink(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Append => options.append(true),
            WriteMode::Overwrite => options.write(true).truncate(true),
        };
        options
            .open(&path)
            .await
            .map_err(|e| AppError::Sink(format!("cannot open {}: {e}", path.display())))?;

        Ok(Self {
            path,
            mode,
            accumulated: Mutex::new(BTreeSet::new()),
        })
    }

    /// The output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The write mode this sink was created with.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }
}

#[async_trait]
impl Sink for FileSink {
    fn destination(&self) -> String {
        self.path.display().to_string()
    }

    async fn append(&self, _key: &str, results: &BTreeSet<String>) -> subsift_core::Result<()> {
        let mut accumulated = self.accumulated.lock().await;
        match self.mode {
            WriteMode::Append => {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
                file.write_all(render(results.iter()).as_bytes()).await?;
                file.flush().await?;
            }
            WriteMode::Overwrite => {
                accumulated.extend(results.iter().cloned());
                write_atomic(&self.path, &render(accumulated.iter())).await?;
            }
        }
        Ok(())
    }

    async fn finish(&self) -> subsift_core::Result<()> {
        let _guard = self.accumulated.lock().await;
        if self.mode == WriteMode::Overwrite {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let distinct: BTreeSet<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        write_atomic(&self.path, &render(distinct.into_iter())).await?;
        tracing::debug!(path = %self.path.display(), "compacted output");
        Ok(())
    }
}

fn render<I, S>(lines: I) -> String
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

async fn write_atomic(path: &Path, content: &str) -> subsift_core::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| CoreError::Sink(format!("not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read a results file back as a set. Missing files read as empty.
///
/// # Errors
///
/// Returns [`AppError::Io`] for read failures other than not-found.
pub async fn read_results(path: &Path) -> Result<BTreeSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn append_mode_compacts_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("subdomains.txt");
        let sink = FileSink::create(&path, WriteMode::Append).await.unwrap();

        sink.append("b.com", &set(&["www.b.com", "api.b.com"])).await.unwrap();
        sink.append("a.com", &set(&["www.a.com", "api.b.com"])).await.unwrap();

        // Before compaction, per-key blocks are sorted but not globally.
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, "api.b.com\nwww.b.com\napi.b.com\nwww.a.com\n");

        sink.finish().await.unwrap();
        let compacted = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(compacted, "api.b.com\nwww.a.com\nwww.b.com\n");
    }

    #[tokio::test]
    async fn append_mode_merges_with_previous_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdomains.txt");
        tokio::fs::write(&path, "old.example.com\nwww.example.com\n")
            .await
            .unwrap();

        let sink = FileSink::create(&path, WriteMode::Append).await.unwrap();
        sink.append("example.com", &set(&["www.example.com", "new.example.com"]))
            .await
            .unwrap();
        sink.finish().await.unwrap();

        let results = read_results(&path).await.unwrap();
        assert_eq!(
            results,
            set(&["new.example.com", "old.example.com", "www.example.com"])
        );
    }

    #[tokio::test]
    async fn overwrite_mode_rewrites_accumulated_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdomains.txt");
        tokio::fs::write(&path, "stale.example.com\n").await.unwrap();

        let sink = FileSink::create(&path, WriteMode::Overwrite).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "");

        sink.append("b.com", &set(&["www.b.com"])).await.unwrap();
        sink.append("a.com", &set(&["www.a.com"])).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "www.a.com\nwww.b.com\n"
        );
        assert!(!dir.path().join("subdomains.txt.tmp").exists());
    }

    #[tokio::test]
    async fn uncreatable_directory_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let err = FileSink::create(blocker.join("out.txt"), WriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let sink = std::sync::Arc::new(FileSink::create(&path, WriteMode::Append).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let sink = std::sync::Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                let key = format!("k{i}.com");
                let results: BTreeSet<String> = [format!("a.{key}"), format!("b.{key}")].into();
                sink.append(&key, &results).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        sink.finish().await.unwrap();

        let results = read_results(&path).await.unwrap();
        assert_eq!(results.len(), 40);
        assert!(results.iter().all(|l| l.starts_with("a.k") || l.starts_with("b.k")));
    }

    #[tokio::test]
    async fn missing_results_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let results = read_results(&dir.path().join("nope.txt")).await.unwrap();
        assert!(results.is_empty());
    }
}
