//! Rendering helpers (markdown) for human-readable campaign artifacts.

use synthflow_types::observation::{RunObservation, RunPhase};
use synthflow_types::report::RunReport;

/// The final campaign report, posted as a note and archived next to the
/// build artifacts.
pub fn render_report_md(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Build campaign for !{}\n\n", report.request_id));
    out.push_str(&format!(
        "- Branch: `{}` into `{}`\n",
        report.source_branch, report.target_branch
    ));
    if let Some(tag) = &report.tag {
        out.push_str(&format!("- Version: `{}`\n", tag));
    }
    out.push_str(&format!("- Started: {}\n", report.started_at));
    if let Some(ended) = &report.ended_at {
        out.push_str(&format!("- Ended: {}\n", ended));
    }
    out.push('\n');

    out.push_str("## Projects\n\n");
    if report.projects.is_empty() {
        out.push_str("_No projects discovered._\n");
    } else {
        out.push_str("| Project | State | Before | After |\n");
        out.push_str("| --- | --- | --- | --- |\n");
        for p in &report.projects {
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                p.name,
                p.state.label(),
                short_digest(p.fingerprint_before.as_deref()),
                short_digest(p.fingerprint_after.as_deref()),
            ));
        }
    }
    out.push('\n');

    for block in &report.metrics {
        out.push_str(&format!("## {} / {}\n\n", block.project, block.section));
        if block.rows.is_empty() {
            out.push_str("_No rows extracted._\n\n");
            continue;
        }
        out.push_str("| Metric | Value |\n| --- | --- |\n");
        for row in &block.rows {
            out.push_str(&format!("| {} | {} |\n", row.name, row.value));
        }
        out.push('\n');
    }

    if !report.notes.is_empty() {
        out.push_str("## Notes\n\n");
        for note in &report.notes {
            out.push_str(&format!("- {}\n", note));
        }
        out.push('\n');
    }

    out.push_str(if report.all_green() {
        "**Result: success**\n"
    } else {
        "**Result: failure**\n"
    });

    out
}

/// One polling round's view, posted while the external runs are in flight.
pub fn render_status_md(observations: &[RunObservation]) -> String {
    let mut out = String::new();
    out.push_str("# Synthesis status\n\n");
    if observations.is_empty() {
        out.push_str("_No runs found yet._\n");
        return out;
    }

    for obs in observations {
        out.push_str(&format!("## {}\n\n", obs.run));
        out.push_str(&format!("- Phase: `{}`\n", phase_label(obs.phase)));
        if let RunPhase::Running { pid: Some(pid) } = obs.phase {
            out.push_str(&format!("- Pid: {}\n", pid));
        }
        if let Some(alive) = obs.alive {
            out.push_str(&format!(
                "- Process: {}\n",
                if alive { "alive" } else { "not found" }
            ));
        }
        if !obs.milestones.is_empty() {
            out.push_str(&format!("- Milestones: {}\n", obs.milestones.join(", ")));
        }
        if !obs.log_tail.is_empty() {
            out.push_str("\n```\n");
            for line in &obs.log_tail {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push('\n');
    }

    out
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Queued => "queued",
        RunPhase::Running { .. } => "running",
        RunPhase::Done => "done",
        RunPhase::Error => "error",
        RunPhase::Indeterminate => "no marker",
    }
}

fn short_digest(digest: Option<&str>) -> String {
    match digest {
        Some(d) if d.len() > 12 => format!("`{}`", &d[..12]),
        Some(d) => format!("`{}`", d),
        None => "-".to_string(),
    }
}
