//! Terminal summary of a handoff run.
//!
//! Renders the handoff document as a short plain-text digest or as a
//! Markdown report. The summary is informational only and never written
//! next to the handoff files.

use crate::analysis::SeverityCounts;
use crate::cli::SummaryFormat;
use crate::models::{AgentKey, DedupCandidate, HandoffDocument, Severity};
use serde_json::Value;

/// Marker used for unknown or absent priorities.
const UNRANKED_EMOJI: &str = "⚪";

/// Render the summary in the requested format.
pub fn generate_summary(document: &HandoffDocument, format: SummaryFormat, max_rows: usize) -> String {
    match format {
        SummaryFormat::Text => generate_text_summary(document, max_rows),
        SummaryFormat::Markdown => generate_markdown_summary(document, max_rows),
    }
}

/// Generate a compact plain-text summary.
pub fn generate_text_summary(document: &HandoffDocument, max_rows: usize) -> String {
    let mut output = String::new();
    let counts = SeverityCounts::from_findings(&document.findings);

    output.push_str(&format!("📊 Handoff Summary (run {})\n", document.run_id));

    output.push_str("   Agents:\n");
    for (agent, agent_output) in &document.agent_outputs {
        output.push_str(&format!(
            "     - {}: {} ({} findings)\n",
            agent, agent_output.status, agent_output.finding_count
        ));
    }

    output.push_str(&format!(
        "   Findings: {} ({} Alta: {} | {} Media: {} | {} Baja: {} | {} Other: {})\n",
        counts.total,
        Severity::Alta.emoji(),
        counts.alta,
        Severity::Media.emoji(),
        counts.media,
        Severity::Baja.emoji(),
        counts.baja,
        UNRANKED_EMOJI,
        counts.unranked
    ));
    output.push_str(&format!(
        "   Patch candidates: {} raw, {} deduplicated\n",
        document.raw_patch_candidates.len(),
        document.deduplicated_patch_candidates.len()
    ));

    let candidates = &document.deduplicated_patch_candidates;
    if !candidates.is_empty() && max_rows > 0 {
        output.push_str("   Deduplicated candidates:\n");
        for candidate in candidates.iter().take(max_rows) {
            output.push_str(&format!(
                "     [{}] {} {} ({})\n",
                candidate.id,
                priority_label(&candidate.priority),
                value_text(&candidate.change_summary)
                    .unwrap_or_else(|| "(no recommendation)".to_string()),
                agent_list(&candidate.source_agents)
            ));
        }
        if candidates.len() > max_rows {
            output.push_str(&format!("     ... and {} more\n", candidates.len() - max_rows));
        }
    }

    output
}

/// Generate a Markdown summary.
pub fn generate_markdown_summary(document: &HandoffDocument, max_rows: usize) -> String {
    let mut output = String::new();

    output.push_str("# Review Handoff\n\n");
    output.push_str(&generate_metadata_section(document));
    output.push_str(&generate_agents_section(document));
    output.push_str(&generate_severity_section(&SeverityCounts::from_findings(
        &document.findings,
    )));
    output.push_str(&generate_candidates_section(
        &document.deduplicated_patch_candidates,
        max_rows,
    ));

    output.push_str("## Next Step\n\n");
    output.push_str(&format!("> {}\n", document.next_step_for_parent_agent));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(document: &HandoffDocument) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Run:** `{}`\n", document.run_id));
    section.push_str(&format!("- **Session:** {}\n", document.session_name));
    section.push_str(&format!("- **Plan:** `{}`\n", document.plan_path));
    section.push_str(&format!("- **Generated:** {}\n", document.generated_at));
    section.push_str(&format!(
        "- **Patch Candidates:** {} raw, {} deduplicated\n",
        document.raw_patch_candidates.len(),
        document.deduplicated_patch_candidates.len()
    ));
    section.push('\n');

    section
}

fn generate_agents_section(document: &HandoffDocument) -> String {
    let mut section = String::new();

    section.push_str("## Agents\n\n");
    section.push_str("| Agent | Status | Findings | Report |\n");
    section.push_str("|:---|:---:|:---:|:---|\n");

    for (agent, agent_output) in &document.agent_outputs {
        section.push_str(&format!(
            "| {} | {} | {} | `{}` |\n",
            agent, agent_output.status, agent_output.finding_count, agent_output.path
        ));
    }
    section.push('\n');

    section
}

/// Generate the severity breakdown table.
fn generate_severity_section(counts: &SeverityCounts) -> String {
    let mut section = String::new();

    section.push_str("## Severity Breakdown\n\n");
    section.push_str(&format!(
        "| {} Alta | {} Media | {} Baja | {} Other | **Total** |\n",
        Severity::Alta.emoji(),
        Severity::Media.emoji(),
        Severity::Baja.emoji(),
        UNRANKED_EMOJI,
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        counts.alta, counts.media, counts.baja, counts.unranked, counts.total
    ));

    section
}

/// Generate the deduplicated candidates table.
fn generate_candidates_section(candidates: &[DedupCandidate], max_rows: usize) -> String {
    let mut section = String::new();

    section.push_str("## Deduplicated Patch Candidates\n\n");

    if candidates.is_empty() {
        section.push_str("No patch candidates were proposed.\n\n");
        return section;
    }

    section.push_str("| Id | Priority | Agents | Change | Risk if not applied |\n");
    section.push_str("|:---|:---:|:---|:---|:---|\n");

    for candidate in candidates.iter().take(max_rows) {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            candidate.id,
            priority_label(&candidate.priority),
            agent_list(&candidate.source_agents),
            table_cell(&candidate.change_summary),
            table_cell(&candidate.risk_if_not_applied),
        ));
    }

    if candidates.len() > max_rows {
        section.push_str(&format!(
            "\n*{} more candidates in the handoff document.*\n",
            candidates.len() - max_rows
        ));
    }
    section.push('\n');

    section
}

fn priority_label(priority: &Value) -> String {
    match priority.as_str().and_then(Severity::parse) {
        Some(severity) => format!("{} {}", severity.emoji(), severity),
        None => match value_text(priority) {
            Some(label) => format!("{} {}", UNRANKED_EMOJI, label),
            None => format!("{} (none)", UNRANKED_EMOJI),
        },
    }
}

/// Display text of a candidate field: strings as-is, other values as JSON.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn agent_list(agents: &[AgentKey]) -> String {
    agents
        .iter()
        .map(AgentKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Keep free text from breaking a Markdown table row.
fn table_cell(value: &Value) -> String {
    match value_text(value) {
        Some(text) => text.replace('|', "\\|").replace('\n', " "),
        None => "-".to_string(),
    }
}
