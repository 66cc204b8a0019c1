use std::path::PathBuf;

/// Internal watch event after classification (§4.8). Compiler configuration changes
/// (tsconfig.json, package.json) are intentionally not represented here — the spec
/// treats those as requiring a restart rather than a watched full re-index.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A source file was created or modified.
    Changed(PathBuf),
    /// A source file was deleted.
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            WatchEvent::Changed(path) | WatchEvent::Removed(path) => path,
        }
    }
}
