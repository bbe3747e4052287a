use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::lock::LOCK_FILE;
use crate::io::recovery::RECOVERY_LOG;

/// Events sent from the file watcher to the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Files created or modified on disk
    Changed(Vec<PathBuf>),
    Removed(Vec<PathBuf>),
}

/// A file system watcher over a vault root.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl VaultWatcher {
    /// Start watching `root` recursively. Only files with one of
    /// `extensions` are reported.
    pub fn start(root: &Path, extensions: &[String]) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let root_owned = root.to_path_buf();
        let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!("watch error: {}", e);
                        return;
                    }
                };

                let removed = match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => false,
                    EventKind::Remove(_) => true,
                    _ => return,
                };

                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_relevant(p, &root_owned, &extensions))
                    .collect();
                if relevant.is_empty() {
                    return;
                }
                let _ = tx.send(if removed {
                    FileEvent::Removed(relevant)
                } else {
                    FileEvent::Changed(relevant)
                });
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(VaultWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }

    /// Wait up to `timeout` for the next event, then drain the rest.
    pub fn wait(&self, timeout: Duration) -> Vec<FileEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut events = vec![first];
                events.extend(self.poll());
                events
            }
            Err(_) => Vec::new(),
        }
    }
}

fn is_relevant(path: &Path, root: &Path, extensions: &[String]) -> bool {
    if !path.starts_with(root) {
        return false;
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str())
        && (name == LOCK_FILE || name == RECOVERY_LOG)
    {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_relevant() {
        let root = Path::new("/vault");
        let md = vec!["md".to_string()];
        assert!(is_relevant(Path::new("/vault/a/b.md"), root, &md));
        assert!(is_relevant(Path::new("/vault/B.MD"), root, &md));
        assert!(!is_relevant(Path::new("/vault/b.png"), root, &md));
        assert!(!is_relevant(Path::new("/elsewhere/b.md"), root, &md));
        assert!(!is_relevant(Path::new("/vault/.retag.lock"), root, &md));
    }
}
