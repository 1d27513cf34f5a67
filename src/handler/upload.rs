//! Upload validation and local file storage

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Whether the text after the last `.` is an allowed extension
pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Reduce a client-supplied name to a safe flat file name
///
/// The name is NFKD-decomposed and reduced to ASCII, so accented letters
/// keep their base letter. Separators become spaces, whitespace runs
/// collapse to `_`, anything outside `[A-Za-z0-9._-]` is dropped, and
/// leading/trailing `.`/`_` are stripped. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Parse an ISO-8601 date or date-time into unix seconds
///
/// Date-times without an offset are read as UTC. Dates before the epoch are
/// rejected since the contract stores an unsigned value.
pub fn parse_issue_date(value: &str) -> Option<u64> {
    let value = value.trim();
    let seconds = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.timestamp()
    } else if let Some(naive) = parse_naive_datetime(value) {
        naive.and_utc().timestamp()
    } else {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0)?.and_utc().timestamp()
    };
    u64::try_from(seconds).ok()
}

fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Write the uploaded bytes under `dir`, creating it if needed
pub async fn save_upload(dir: &str, filename: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = Path::new(dir).join(filename);
    tokio::fs::write(&path, data).await?;
    Ok(path)
}
