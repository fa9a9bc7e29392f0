use std::path::Path;
use std::time::Duration;

use lofty::file::AudioFile;

/// Duration from the container headers, without decoding audio.
///
/// `None` when the file cannot be probed or reports a zero length.
pub fn probe_duration(path: &Path) -> Option<Duration> {
    let tagged = lofty::read_from_path(path).ok()?;
    let duration = tagged.properties().duration();
    (!duration.is_zero()).then_some(duration)
}
