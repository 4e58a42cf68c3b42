use std::io::BufRead;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::info;

use crate::db::Store;
use crate::error::ImportError;
use crate::types::parse_timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub added: usize,
    pub duplicates: usize,
}

/// Feed `id,date` rows through the store's dedup insert.
/// Blank lines are ignored; if the first non-blank line starts with `id` it
/// is taken as a header and skipped.
pub fn import_rows<R: BufRead>(store: &Store, reader: R) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();
    let mut at_start = true;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if std::mem::take(&mut at_start) && line.to_ascii_lowercase().starts_with("id") {
            continue;
        }

        let (id, date) = parse_row(line).ok_or_else(|| ImportError::Row {
            line: line_no,
            reason: format!("expected `id,date`, got {:?}", line),
        })?;
        let seen_at = parse_date(date).ok_or_else(|| ImportError::Row {
            line: line_no,
            reason: format!("unrecognised date {:?}", date),
        })?;

        summary.rows += 1;
        if store.insert_if_absent(id, &seen_at)? {
            summary.added += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    info!(
        rows = summary.rows,
        added = summary.added,
        duplicates = summary.duplicates,
        "import finished"
    );
    Ok(summary)
}

fn parse_row(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(2, ',');
    let id = parts.next()?.trim().trim_matches('"');
    let date = parts.next()?.trim().trim_matches('"');
    if id.is_empty() || date.is_empty() {
        return None;
    }
    Some((id, date))
}

/// `YYYY-MM-DD` (midnight UTC), `YYYY-MM-DD HH:MM:SS[.ffffff]` or RFC 3339.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Some(ts) = parse_timestamp(s) {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
