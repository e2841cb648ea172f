// Comic reference module
// Identity of one comic and its canonical on-disk name

use std::path::Path;

/// Prefix of every file the bulk downloader writes
pub const FILE_PREFIX: &str = "xkcd-";

/// A comic by number, with the fields only a remote fetch can fill in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicReference {
    /// Permanent index on the site, starting at 1
    pub number: u32,
    /// Direct image URL; empty when the comic came from disk
    pub hotlink_url: String,
    /// Title text; empty when unknown
    pub caption: String,
}

impl ComicReference {
    pub fn new(number: u32, hotlink_url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            number,
            hotlink_url: hotlink_url.into(),
            caption: caption.into(),
        }
    }

    /// Recover the number from a canonical file name such as `xkcd-0353.png`
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let number: u32 = stem.strip_prefix(FILE_PREFIX)?.parse().ok()?;
        (number > 0).then(|| Self::new(number, "", ""))
    }
}

/// Canonical stem for a comic number, zero-padded so files sort by number
pub fn file_stem(number: u32) -> String {
    format!("{}{:04}", FILE_PREFIX, number)
}
