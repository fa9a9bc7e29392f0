use std::io::Cursor;

use lofty::file::TaggedFileExt;
use lofty::picture::PictureType;
use lofty::probe::Probe;

/// Embedded cover image in a file's tags, from the raw file bytes.
///
/// Prefers the front cover and falls back to the first picture. Anything
/// unparsable yields `None`.
pub fn extract_album_art(bytes: &[u8]) -> Option<Vec<u8>> {
    let tagged = Probe::new(Cursor::new(bytes))
        .guess_file_type()
        .ok()?
        .read()
        .ok()?;

    let tag = tagged.primary_tag().or_else(|| tagged.first_tag())?;
    let pictures = tag.pictures();
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;

    let data = picture.data();
    (!data.is_empty()).then(|| data.to_vec())
}
