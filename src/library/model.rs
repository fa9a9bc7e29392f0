use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity of one playlist insertion. Never reused within a session, so
/// the same file added twice gets two ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub title: String,
    /// `None` until the loader resolves it.
    pub duration: Option<Duration>,
    /// Embedded cover image bytes, filled best-effort after load.
    pub album_art: Option<Vec<u8>>,
}

impl Track {
    pub fn new(id: TrackId, path: PathBuf) -> Self {
        let title = title_from_path(&path);
        Self {
            id,
            path,
            title,
            duration: None,
            album_art: None,
        }
    }
}

/// The file stem, or the whole file name when there is no usable stem.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("UNKNOWN")
        .to_string()
}
