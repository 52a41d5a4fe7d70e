//! Finding aggregation across agent reports.
//!
//! Reads the per-agent reports of a run, tags every finding with the
//! agent that produced it and flattens them into one severity-sorted list.

use crate::error::{HandoffError, HandoffResult};
use crate::models::{AgentKey, AgentReport, Finding, Severity, STATUS_COMPLETED};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// On-disk shape of an agent report. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct ReportFile {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    findings: Vec<Finding>,
}

/// Reports of every agent plus the flat, severity-sorted finding list.
#[derive(Debug, Clone)]
pub struct Aggregation {
    reports: BTreeMap<AgentKey, AgentReport>,
    findings: Vec<Finding>,
}

impl Aggregation {
    /// Aggregate already-loaded reports.
    ///
    /// Agents without a report get the pending placeholder, so every
    /// [`AgentKey`] is always present.
    pub fn from_reports(run_dir: &Path, reports: Vec<AgentReport>) -> Self {
        let mut by_agent: BTreeMap<AgentKey, AgentReport> = reports
            .into_iter()
            .map(|report| (report.agent, report))
            .collect();

        for agent in AgentKey::ALL {
            by_agent
                .entry(agent)
                .or_insert_with(|| AgentReport::pending(agent, agent.report_path(run_dir)));
        }

        // BTreeMap iterates in enumeration order, which is the tie-break
        // order between findings of equal severity.
        let mut findings: Vec<Finding> = by_agent
            .values()
            .flat_map(|report| {
                report
                    .findings
                    .iter()
                    .cloned()
                    .map(move |finding| finding.tagged(report.agent))
            })
            .collect();
        sort_by_severity(&mut findings);

        Self {
            reports: by_agent,
            findings,
        }
    }

    /// Report for `agent`: the parsed one, or its pending placeholder.
    pub fn report(&self, agent: AgentKey) -> &AgentReport {
        &self.reports[&agent]
    }

    /// All reports in enumeration order.
    pub fn reports(&self) -> impl Iterator<Item = &AgentReport> {
        self.reports.values()
    }

    /// Every finding, severity-sorted.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
}

/// Load every agent report of a run and aggregate their findings.
pub fn load_reports(run_dir: &Path) -> HandoffResult<Aggregation> {
    let mut reports = Vec::with_capacity(AgentKey::ALL.len());

    for agent in AgentKey::ALL {
        reports.push(load_report(agent, run_dir)?);
    }

    let aggregation = Aggregation::from_reports(run_dir, reports);
    info!(
        "Aggregated {} findings from {} agent reports",
        aggregation.findings.len(),
        aggregation.reports().filter(|r| !r.is_pending()).count()
    );

    Ok(aggregation)
}

/// Load one agent's report, substituting a placeholder if the file is missing.
fn load_report(agent: AgentKey, run_dir: &Path) -> HandoffResult<AgentReport> {
    let path = agent.report_path(run_dir);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("No report for agent {} at {}, marking pending", agent, path.display());
            return Ok(AgentReport::pending(agent, path));
        }
        Err(source) => return Err(HandoffError::ReadReport { path, source }),
    };

    let parsed: ReportFile = match serde_json::from_str(&content) {
        Ok(parsed) => parsed,
        Err(source) => return Err(HandoffError::MalformedReport { path, source }),
    };

    debug!(
        "Loaded {} findings from {} ({})",
        parsed.findings.len(),
        agent,
        path.display()
    );

    Ok(AgentReport {
        agent,
        path,
        status: parsed.status.unwrap_or_else(|| STATUS_COMPLETED.to_string()),
        findings: parsed.findings,
    })
}

/// Stable sort by severity rank: known severities first, ties keep input order.
pub fn sort_by_severity(findings: &mut [Finding]) {
    findings.sort_by_key(Finding::rank);
}

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub total: usize,
    pub alta: usize,
    pub media: usize,
    pub baja: usize,
    /// Unknown or absent severities.
    pub unranked: usize,
}

impl SeverityCounts {
    /// Tally a list of findings.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self {
            total: findings.len(),
            ..Self::default()
        };

        for finding in findings {
            match finding.severity().as_str().and_then(Severity::parse) {
                Some(Severity::Alta) => counts.alta += 1,
                Some(Severity::Media) => counts.media += 1,
                Some(Severity::Baja) => counts.baja += 1,
                None => counts.unranked += 1,
            }
        }

        counts
    }
}
