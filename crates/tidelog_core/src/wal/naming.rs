//! Journal file naming and discovery.
//!
//! A journal file is named by its number as ten lowercase hex digits
//! followed by `.log`, so lexical and numeric order agree.

use crate::error::JournalResult;
use std::fs;
use std::path::Path;

/// Suffix of journal files.
pub const LOG_SUFFIX: &str = ".log";

/// Suffix appended to a journal file moved aside by rotation.
pub const BACKUP_SUFFIX: &str = ".bak";

const HEX_DIGITS: usize = 10;

/// Canonical file name for a journal file number.
#[must_use]
pub fn file_name_for(number: u32) -> String {
    format!("{number:010x}{LOG_SUFFIX}")
}

/// Backup name a rotation moves an existing file to.
#[must_use]
pub fn backup_name_for(number: u32) -> String {
    format!("{}{BACKUP_SUFFIX}", file_name_for(number))
}

/// Parses a canonical journal file name back to its number.
///
/// Only the exact canonical form is accepted: ten lowercase hex digits and
/// the `.log` suffix.
#[must_use]
pub fn parse_file_number(name: &str) -> Option<u32> {
    let digits = name.strip_suffix(LOG_SUFFIX)?;
    if digits.len() != HEX_DIGITS
        || !digits
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    u64::from_str_radix(digits, 16)
        .ok()
        .and_then(|n| u32::try_from(n).ok())
}

/// Returns the highest journal file number among `names`, ignoring names
/// that are not journal files. `None` if there is none.
pub fn find_highest_file_number<I, S>(names: I) -> Option<u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| parse_file_number(name.as_ref()))
        .max()
}

/// Lists the journal file numbers present in `dir`, ascending.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_journal_files(dir: &Path) -> JournalResult<Vec<u32>> {
    let mut numbers = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(n) = entry.file_name().to_str().and_then(parse_file_number) {
            numbers.push(n);
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

/// Lists backup files left behind by rotation in `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_backup_files(dir: &Path) -> JournalResult<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_backup = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_suffix(BACKUP_SUFFIX))
            .and_then(parse_file_number)
            .is_some();
        if is_backup {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Syncs the directory entries of `dir` so created, renamed and deleted
/// journal files survive a crash.
///
/// Windows has no directory fsync; NTFS journals metadata itself.
#[cfg(unix)]
pub(crate) fn sync_directory(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
