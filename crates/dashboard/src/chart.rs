/// Chart projection of the displayed entries.
///
/// Pure and deterministic: the same `(displayed, mode)` always yields the same chart,
/// so callers recompute it on every view change instead of caching it.
///
/// - Search mode: one bar per result, x = page title, y = score (0 when absent).
/// - Browse mode: one bar per hostname in first-seen order, y = entry count. Entries
///   whose `page_url` has no parseable host are left out of the chart only.
use std::collections::HashMap;

use kb_common::entry::Entry;
use serde::Serialize;
use url::Url;

use crate::view_state::Mode;

pub const SEARCH_CHART_TITLE: &str = "Search Result Similarity Scores";
pub const DOMAIN_CHART_TITLE: &str = "Saved Entries by Domain";

const SEARCH_BAR_COLOR: Marker = Marker {
    color: "rgba(54, 162, 235, 0.7)",
    line: MarkerLine {
        color: "rgba(54, 162, 235, 1)",
        width: 2,
    },
};

const DOMAIN_BAR_COLOR: Marker = Marker {
    color: "rgba(75, 192, 192, 0.7)",
    line: MarkerLine {
        color: "rgba(75, 192, 192, 1)",
        width: 2,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub series: Vec<BarSeries>,
    pub layout: ChartLayout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    pub x: Vec<String>,
    pub y: Vec<f64>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub marker: Marker,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub color: &'static str,
    pub line: MarkerLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerLine {
    pub color: &'static str,
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    pub title: &'static str,
    pub xaxis: Axis,
    pub yaxis: Axis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: &'static str,
    pub automargin: bool,
}

pub fn project(displayed: &[Entry], mode: Mode) -> Chart {
    match mode {
        Mode::Search => Chart {
            series: vec![score_series(displayed)],
            layout: ChartLayout {
                title: SEARCH_CHART_TITLE,
                xaxis: Axis {
                    title: "Page Titles",
                    automargin: true,
                },
                yaxis: Axis {
                    title: "Similarity Score",
                    automargin: false,
                },
            },
        },
        Mode::Browse => Chart {
            series: vec![domain_series(displayed)],
            layout: ChartLayout {
                title: DOMAIN_CHART_TITLE,
                xaxis: Axis {
                    title: "Domains",
                    automargin: true,
                },
                yaxis: Axis {
                    title: "Entry Count",
                    automargin: false,
                },
            },
        },
    }
}

fn score_series(entries: &[Entry]) -> BarSeries {
    BarSeries {
        x: entries.iter().map(|e| e.page_title.clone()).collect(),
        y: entries.iter().map(|e| e.score.unwrap_or(0.0)).collect(),
        kind: "bar",
        marker: SEARCH_BAR_COLOR,
    }
}

fn domain_series(entries: &[Entry]) -> BarSeries {
    let mut hosts: Vec<String> = Vec::new();
    let mut counts: Vec<f64> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for host in entries.iter().filter_map(|e| hostname(&e.page_url)) {
        match index.get(&host) {
            Some(&i) => counts[i] += 1.0,
            None => {
                index.insert(host.clone(), hosts.len());
                hosts.push(host);
                counts.push(1.0);
            }
        }
    }

    BarSeries {
        x: hosts,
        y: counts,
        kind: "bar",
        marker: DOMAIN_BAR_COLOR,
    }
}

/// Hostname of an absolute URL. `None` for relative or host-less URLs.
pub fn hostname(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}
