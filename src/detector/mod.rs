//! # Change Detection
//!
//! One [`SecretWatcher`] runs per namespace, watching a single directory of
//! secret files. The checksum poll is the authoritative strategy: every
//! detection interval it lists the directory's regular files, hashes each
//! file's payload, and enqueues an update task whenever the hash differs
//! from the last one seen for that canonical name (including first sight).
//! OS file-event notification is an optional overlay that triggers an
//! immediate rescan for lower latency; missed or coalesced events are
//! harmless because the poll pass re-checks everything anyway.
//!
//! The last-seen hash map is owned exclusively by the watcher for its
//! namespace; nothing else reads or writes it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use chrono::Utc;
use notify::{EventKind, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::{Error, Result};
use crate::naming::canonicalize;
use crate::queue::{UpdateQueue, UpdateTask};

/// Detection strategy tuning.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Checksum poll period
    pub poll_interval: Duration,
    /// Layer OS file-event notification on top of the poll
    pub watch_events: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(5), watch_events: true }
    }
}

/// Long-lived change detector for one namespace's watched directory.
pub struct SecretWatcher {
    namespace: String,
    directory: PathBuf,
    queue: UpdateQueue,
    config: WatcherConfig,
    /// canonical name -> SHA-256 of the last enqueued payload
    seen: HashMap<String, String>,
}

impl SecretWatcher {
    /// Create a watcher. Fails (and the daemon must exit non-zero) when the
    /// directory cannot be opened at startup.
    pub fn new(
        namespace: impl Into<String>,
        directory: impl Into<PathBuf>,
        queue: UpdateQueue,
        config: WatcherConfig,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let directory = directory.into();
        std::fs::read_dir(&directory).map_err(|e| {
            Error::watch(format!(
                "Cannot open watched directory {} for namespace {}: {}",
                directory.display(),
                namespace,
                e
            ))
        })?;
        Ok(Self { namespace, directory, queue, config, seen: HashMap::new() })
    }

    /// One checksum pass over the directory. Unreadable entries are logged
    /// and skipped; only a failure to list the directory itself errors.
    pub async fn scan(&mut self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Cannot stat entry, skipping");
                    continue;
                }
            };
            if !file_type.is_file() {
                // subdirectories are not recursed
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            let canonical_name =
                canonicalize(&self.namespace, &self.directory.to_string_lossy(), &filename);
            debug!(secret = %canonical_name, "Checking secret file");

            let bytes = match tokio::fs::read(entry.path()).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        secret = %canonical_name,
                        path = %entry.path().display(),
                        error = %e,
                        "Cannot read secret file, skipping this pass"
                    );
                    continue;
                }
            };

            let content = base64::engine::general_purpose::STANDARD.encode(bytes);
            let digest = hex::encode(Sha256::digest(content.as_bytes()));
            if self.seen.get(&canonical_name).map(String::as_str) == Some(digest.as_str()) {
                debug!(secret = %canonical_name, "Checksum matched, no update");
                continue;
            }

            info!(secret = %canonical_name, "Secret content changed or first seen, scheduling rotation");
            self.seen.insert(canonical_name.clone(), digest);
            self.queue.push(UpdateTask {
                canonical_name,
                namespace: self.namespace.clone(),
                directory: self.directory.to_string_lossy().into_owned(),
                filename,
                content,
                detected_at: Utc::now(),
            });
        }
        Ok(())
    }

    /// Run the detection loop until the shutdown future resolves.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) {
        info!(
            namespace = %self.namespace,
            directory = %self.directory.display(),
            "Configuring namespace watch"
        );

        // Keep the watcher handle alive for the lifetime of the loop;
        // dropping it unsubscribes.
        let mut fs_events = None;
        let _watcher = if self.config.watch_events {
            match self.subscribe_fs_events() {
                Ok((watcher, rx)) => {
                    fs_events = Some(rx);
                    Some(watcher)
                }
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        error = %e,
                        "File-event subscription failed, falling back to polling only"
                    );
                    None
                }
            }
        } else {
            None
        };

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let rescan = tokio::select! {
                _ = interval.tick() => true,
                event = recv_event(&mut fs_events) => {
                    self.classify_event(event)
                }
                _ = &mut shutdown => {
                    info!(namespace = %self.namespace, "Shutdown signal received, stopping watch");
                    return;
                }
            };

            if rescan {
                if let Err(e) = self.scan().await {
                    error!(
                        namespace = %self.namespace,
                        directory = %self.directory.display(),
                        error = %e,
                        "Directory scan failed"
                    );
                }
            }
        }
    }

    fn subscribe_fs_events(
        &self,
    ) -> Result<(notify::RecommendedWatcher, mpsc::UnboundedReceiver<notify::Event>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "File watch error"),
            }
        })
        .map_err(|e| Error::watch(format!("Cannot create file watcher: {}", e)))?;
        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(format!("Cannot watch {}: {}", self.directory.display(), e)))?;
        Ok((watcher, rx))
    }

    /// Decide whether a filesystem event warrants a rescan. Renames have
    /// undefined rotation semantics: the canonical name derived from the new
    /// filename has no rotation history, so they are reported and ignored.
    fn classify_event(&self, event: notify::Event) -> bool {
        match event.kind {
            EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
                error!(
                    namespace = %self.namespace,
                    paths = ?event.paths,
                    "Secret file was renamed, this is undefined behavior"
                );
                false
            }
            EventKind::Create(_) | EventKind::Modify(_) => {
                debug!(namespace = %self.namespace, paths = ?event.paths, "File event, rescanning");
                true
            }
            _ => false,
        }
    }
}

/// Receive the next filesystem event, pending forever when the overlay is
/// disabled so the poll branch keeps the select loop alive.
async fn recv_event(rx: &mut Option<mpsc::UnboundedReceiver<notify::Event>>) -> notify::Event {
    match rx {
        Some(rx) => match rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WatcherConfig {
        WatcherConfig { poll_interval: Duration::from_millis(10), watch_events: false }
    }

    #[tokio::test]
    async fn test_first_scan_enqueues_all_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("db_password.txt"), b"hunter2").unwrap();
        std::fs::write(dir.path().join("api_token"), b"tok").unwrap();

        let queue = UpdateQueue::new();
        let mut watcher = SecretWatcher::new("ns", dir.path(), queue.clone(), test_config()).unwrap();
        watcher.scan().await.unwrap();

        let batch = queue.drain();
        assert_eq!(batch.len(), 2);
        let task = batch.iter().find(|t| t.filename == "db_password.txt").unwrap();
        assert_eq!(task.namespace, "ns");
        assert_eq!(
            task.content,
            base64::engine::general_purpose::STANDARD.encode(b"hunter2")
        );
    }

    #[tokio::test]
    async fn test_unchanged_content_is_not_reenqueued() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token"), b"v1").unwrap();

        let queue = UpdateQueue::new();
        let mut watcher = SecretWatcher::new("ns", dir.path(), queue.clone(), test_config()).unwrap();
        watcher.scan().await.unwrap();
        assert_eq!(queue.drain().len(), 1);

        watcher.scan().await.unwrap();
        assert!(queue.is_empty(), "same checksum must not enqueue again");
    }

    #[tokio::test]
    async fn test_changed_content_is_reenqueued() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, b"v1").unwrap();

        let queue = UpdateQueue::new();
        let mut watcher = SecretWatcher::new("ns", dir.path(), queue.clone(), test_config()).unwrap();
        watcher.scan().await.unwrap();
        queue.drain();

        std::fs::write(&path, b"v2").unwrap();
        watcher.scan().await.unwrap();
        let batch = queue.drain();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].content,
            base64::engine::general_purpose::STANDARD.encode(b"v2")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::write(&locked, b"hidden").unwrap();
        std::fs::write(dir.path().join("token"), b"tok").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read(&locked).is_ok() {
            // running as root, permissions cannot make the file unreadable
            return;
        }

        let queue = UpdateQueue::new();
        let mut watcher = SecretWatcher::new("ns", dir.path(), queue.clone(), test_config()).unwrap();
        watcher.scan().await.unwrap();

        let batch = queue.drain();
        assert_eq!(batch.len(), 1, "unreadable file skipped, readable one enqueued");
        assert_eq!(batch[0].filename, "token");

        // a later pass picks the file up once it becomes readable
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o600)).unwrap();
        watcher.scan().await.unwrap();
        let batch = queue.drain();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].filename, "locked");
    }

    #[tokio::test]
    async fn test_subdirectories_are_not_recursed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("inner"), b"x").unwrap();

        let queue = UpdateQueue::new();
        let mut watcher = SecretWatcher::new("ns", dir.path(), queue.clone(), test_config()).unwrap();
        watcher.scan().await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_fails_at_startup() {
        let result = SecretWatcher::new(
            "ns",
            "/nonexistent/secretspin-test",
            UpdateQueue::new(),
            test_config(),
        );
        assert!(matches!(result, Err(Error::Watch(_))));
    }

    #[test]
    fn test_rename_event_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let watcher =
            SecretWatcher::new("ns", dir.path(), UpdateQueue::new(), test_config()).unwrap();

        let rename = notify::Event::new(EventKind::Modify(notify::event::ModifyKind::Name(
            notify::event::RenameMode::Any,
        )));
        assert!(!watcher.classify_event(rename));

        let data_change = notify::Event::new(EventKind::Modify(
            notify::event::ModifyKind::Data(notify::event::DataChange::Any),
        ));
        assert!(watcher.classify_event(data_change));
    }
}
