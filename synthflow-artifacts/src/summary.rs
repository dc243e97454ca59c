//! Fixed-offset extraction of the utilization summary table.
//!
//! The tool's placement report lays its tables out as ASCII grids under a
//! numbered section title:
//!
//! ```text
//! 1. CLB Logic
//! ------------
//!
//! +----------------------------+--------+-------+-----------+-------+
//! |          Site Type         |  Used  | Fixed | Available | Util% |
//! +----------------------------+--------+-------+-----------+-------+
//! | CLB LUTs                   | 412345 |     0 |   1182240 | 34.89 |
//! ```
//!
//! Relative to the title line, the column header sits at +4 and the value
//! rows start at +6, running until the closing `+` rule.

use camino::Utf8Path;
use fs_err as fs;
use synthflow_types::report::{MetricRow, MetricsBlock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SummaryPolicy {
    /// Glob for the report file, relative to the run directory.
    pub report_glob: String,
    /// Section title to anchor on.
    pub section: String,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            report_glob: "**/*_utilization_placed.rpt".to_string(),
            section: "1. CLB Logic".to_string(),
        }
    }
}

/// Non-fatal: degrades the campaign report, never its verdict.
#[derive(Debug, Error)]
pub enum ReportParseError {
    #[error("no report matching {0}")]
    NoReportFile(String),

    #[error("could not read {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("section {0:?} not found in report")]
    SectionMissing(String),

    #[error("section {0:?} is truncated")]
    Truncated(String),
}

/// Pull the summary table for `policy.section` out of the first matching
/// report under `run_dir`.
pub fn extract_summary(
    run_dir: &Utf8Path,
    project: &str,
    policy: &SummaryPolicy,
) -> Result<MetricsBlock, ReportParseError> {
    let report = crate::first_match(run_dir, &policy.report_glob)
        .ok_or_else(|| ReportParseError::NoReportFile(policy.report_glob.clone()))?;
    let text = fs::read_to_string(&report).map_err(|e| ReportParseError::Unreadable {
        path: report.to_string(),
        message: e.to_string(),
    })?;
    debug!(%report, section = %policy.section, "extracting summary");

    let rows = parse_section(&text, &policy.section)?;
    Ok(MetricsBlock {
        project: project.to_string(),
        section: policy.section.clone(),
        rows,
    })
}

fn parse_section(text: &str, section: &str) -> Result<Vec<MetricRow>, ReportParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let title = lines
        .iter()
        .position(|l| l.trim() == section)
        .ok_or_else(|| ReportParseError::SectionMissing(section.to_string()))?;

    // Title, rule, blank, grid top, header, grid rule, then the value rows.
    let header = lines
        .get(title + 4)
        .filter(|l| l.trim_start().starts_with('|'))
        .ok_or_else(|| ReportParseError::Truncated(section.to_string()))?;
    let columns = split_grid_row(header);
    if columns.len() < 2 {
        return Err(ReportParseError::Truncated(section.to_string()));
    }

    let mut rows = Vec::new();
    for line in lines.iter().skip(title + 6) {
        if line.trim_start().starts_with('+') {
            break;
        }
        let cells = split_grid_row(line);
        if cells.len() < 2 {
            return Err(ReportParseError::Truncated(section.to_string()));
        }
        rows.push(MetricRow {
            name: cells[0].clone(),
            value: cells[1].clone(),
        });
    }
    if rows.is_empty() {
        return Err(ReportParseError::Truncated(section.to_string()));
    }
    Ok(rows)
}

fn split_grid_row(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}
