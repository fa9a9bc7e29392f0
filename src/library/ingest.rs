use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;

/// Whether `path` carries one of the configured audio extensions.
pub fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .any(|e| e.eq_ignore_ascii_case(ext))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Expand `inputs` into audio files, keeping the input order.
///
/// Files are kept when their extension is an audio type. Directories are
/// walked (recursively unless configured otherwise) and their audio files
/// appended in case-insensitive name order. Anything else is skipped.
pub fn collect_audio_files<P: AsRef<Path>>(inputs: &[P], settings: &LibrarySettings) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            out.extend(scan_dir(input, settings));
        } else if is_audio_file(input, settings) {
            out.push(input.to_path_buf());
        } else {
            debug!(path = %input.display(), "skipping non-audio input");
        }
    }
    out
}

fn scan_dir(dir: &Path, settings: &LibrarySettings) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).follow_links(true);
    // Non-recursive = only the root directory.
    if !settings.recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() || e.path().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| is_audio_file(p, settings))
        .collect();

    files.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    files
}
