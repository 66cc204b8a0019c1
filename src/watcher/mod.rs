//! Filesystem watcher (§4.8): debounced change notifications feeding
//! `SyncEngine::sync_paths`. Compiler configuration files are deliberately not
//! watched — the spec requires a restart to pick up tsconfig/package.json changes.
//!
//! Grounded on the teacher's `src/watcher/mod.rs` debouncer-plus-gitignore-matcher
//! shape, generalised to a configurable debounce duration and a simplified
//! two-variant `WatchEvent` (config files are no longer a trigger at all).

pub mod event;

use std::path::Path;
use std::time::Duration;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use crate::config::WatchConfig;
use crate::language::SOURCE_EXTENSIONS;
use event::WatchEvent;

/// Handle to a running watcher. Keeps the debouncer alive (dropping stops watching).
pub struct WatcherHandle {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    _bridge_task: JoinHandle<()>,
}

fn build_gitignore_matcher(project_root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(project_root);
    let gitignore_path = project_root.join(".gitignore");
    if gitignore_path.exists() {
        let _ = builder.add(&gitignore_path);
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Start a debounced file watcher on `watch_root`, using the project's configured
/// debounce duration (default 300ms, §4.8).
///
/// Returns a `WatcherHandle` (must be kept alive) and a tokio mpsc receiver that
/// yields classified `WatchEvent`s for `SyncEngine::sync_paths` to consume.
pub fn start_watcher(watch_root: &Path, config: &WatchConfig) -> anyhow::Result<(WatcherHandle, tokio_mpsc::Receiver<WatchEvent>)> {
    let (std_tx, std_rx) = std::sync::mpsc::channel::<DebounceEventResult>();

    let mut debouncer = new_debouncer(Duration::from_millis(config.debounce), move |res| {
        let _ = std_tx.send(res);
    })?;
    debouncer.watcher().watch(watch_root, RecursiveMode::Recursive)?;

    let gitignore = build_gitignore_matcher(watch_root);
    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchEvent>(256);

    let root = watch_root.to_path_buf();
    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(events) => {
                    for debounced_event in events {
                        let path = debounced_event.path;
                        if let Some(watch_event) = classify_event(&path, &root, &gitignore)
                            && tokio_tx.blocking_send(watch_event).is_err()
                        {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("watcher error: {err:?}");
                }
            }
        }
    });

    Ok((WatcherHandle { _debouncer: debouncer, _bridge_task: bridge_task }, tokio_rx))
}

/// Classify a filesystem event path into a `WatchEvent`, or `None` if it should be
/// ignored entirely — compiler config files, `node_modules`, the tool's own cache
/// directory, gitignored paths, and anything outside the TS/JS extension set.
fn classify_event(path: &Path, _project_root: &Path, gitignore: &Gitignore) -> Option<WatchEvent> {
    if path.components().any(|c| c.as_os_str() == "node_modules" || c.as_os_str() == ".code-graph") {
        return None;
    }

    let is_dir = path.is_dir();
    if gitignore.matched(path, is_dir).is_ignore() {
        return None;
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return None;
    }

    if path.exists() { Some(WatchEvent::Changed(path.to_path_buf())) } else { Some(WatchEvent::Removed(path.to_path_buf())) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_modules_path_is_ignored() {
        let gitignore = Gitignore::empty();
        let result = classify_event(Path::new("/proj/node_modules/x/index.ts"), Path::new("/proj"), &gitignore);
        assert!(result.is_none());
    }

    #[test]
    fn config_file_is_not_classified_as_a_watch_event() {
        let gitignore = Gitignore::empty();
        let result = classify_event(Path::new("/proj/tsconfig.json"), Path::new("/proj"), &gitignore);
        assert!(result.is_none());
    }

    #[test]
    fn non_source_extension_is_ignored() {
        let gitignore = Gitignore::empty();
        let result = classify_event(Path::new("/proj/README.md"), Path::new("/proj"), &gitignore);
        assert!(result.is_none());
    }
}
