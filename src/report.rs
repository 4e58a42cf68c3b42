use serde::Serialize;

use crate::types::{format_timestamp, MetricsEntry};

pub const CHART_TITLE: &str = "Identifiers found and added per run";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<u64>,
}

/// Time series keyed by run time, ready for an external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartArtifact {
    pub title: String,
    pub x: Vec<String>,
    pub series: Vec<Series>,
}

impl ChartArtifact {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `None` when there is no history to plot.
pub fn render(entries: &[MetricsEntry]) -> Option<ChartArtifact> {
    if entries.is_empty() {
        return None;
    }

    let x = entries.iter().map(|e| format_timestamp(&e.run_time)).collect();
    let found = entries.iter().map(|e| e.found).collect();
    let added = entries.iter().map(|e| e.added).collect();

    Some(ChartArtifact {
        title: CHART_TITLE.to_string(),
        x,
        series: vec![
            Series {
                name: "found".into(),
                values: found,
            },
            Series {
                name: "added".into(),
                values: added,
            },
        ],
    })
}
