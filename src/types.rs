use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-width storage format; lexicographic order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    New,
    CrossListed,
    Replaced,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::New => "new",
            Category::CrossListed => "cross-listed",
            Category::Replaced => "replaced",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Category::New),
            "cross-listed" | "cross-list" => Ok(Category::CrossListed),
            "replaced" => Ok(Category::Replaced),
            other => Err(other.to_string()),
        }
    }
}

/// One configured listing source and the categories wanted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub categories: BTreeSet<Category>,
}

impl SourceConfig {
    pub fn new(name: &str, categories: &[Category]) -> Self {
        SourceConfig {
            name: name.to_string(),
            categories: categories.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRecord {
    pub id: String,
    pub first_seen: DateTime<Utc>,
}

/// Per-run summary: distinct identifiers seen vs. newly stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsEntry {
    pub run_time: DateTime<Utc>,
    pub found: u64,
    pub added: u64,
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
