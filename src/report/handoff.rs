//! Handoff document and confirmation template generation.
//!
//! Builds the two cross-referenced output documents of a run and writes
//! them into the run directory.

use crate::analysis::{deduplicate, load_reports, raw_candidates, Aggregation};
use crate::error::{HandoffError, HandoffResult};
use crate::models::{
    AgentKey, AgentOutput, ConfirmationSlot, ConfirmationTemplate, DecisionRules, DedupCandidate,
    HandoffDocument, RawCandidate, RunContext, UserDecision,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Version of the document layout. 2.1 maps each agent in `agent_outputs`
/// to an object instead of a bare path.
pub const SCHEMA_VERSION: &str = "2.1";
pub const HANDOFF_VERSION: &str = "2.0";

/// File name of the handoff document inside the run directory.
pub const HANDOFF_FILE: &str = "handoff.json";

/// File name of the confirmation template inside the run directory.
pub const CONFIRMATION_FILE: &str = "patch-confirmation-template.json";

/// Instruction for whoever consumes the handoff.
pub const NEXT_STEP: &str = "Presentar deduplicated_patch_candidates al usuario, capturar user_decision por patch y aplicar solo approved.";

/// Render a local timestamp the way `generated_at` stores it.
pub fn timestamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl HandoffDocument {
    /// Assemble the handoff from an aggregation and its candidates.
    pub fn build(
        run: &RunContext,
        aggregation: &Aggregation,
        raw: Vec<RawCandidate>,
        dedup: Vec<DedupCandidate>,
        generated_at: String,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            handoff_version: HANDOFF_VERSION.to_string(),
            generated_at,
            run_id: run.run_id.clone(),
            session_name: run.session_name.clone(),
            plan_path: run.plan_path.clone(),
            agent_outputs: AgentKey::ALL
                .into_iter()
                .map(|agent| (agent, AgentOutput::from(aggregation.report(agent))))
                .collect(),
            findings: aggregation.findings().to_vec(),
            raw_patch_candidates: raw,
            deduplicated_patch_candidates: dedup,
            decision_rules: DecisionRules::default(),
            next_step_for_parent_agent: NEXT_STEP.to_string(),
        }
    }
}

impl ConfirmationTemplate {
    /// One deferred, empty slot per deduplicated candidate, same order.
    pub fn from_candidates(run_id: &str, candidates: &[DedupCandidate]) -> Self {
        Self {
            run_id: run_id.to_string(),
            decisions: candidates
                .iter()
                .map(|candidate| ConfirmationSlot {
                    patch_id: candidate.id.clone(),
                    user_decision: UserDecision::Deferred,
                    user_notes: String::new(),
                    approved_by: String::new(),
                    approved_at: String::new(),
                })
                .collect(),
        }
    }
}

/// Paths of the two documents written for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub handoff: PathBuf,
    pub confirmation: PathBuf,
}

impl OutputPaths {
    /// Conventional output locations inside `run_dir`.
    pub fn in_dir(run_dir: &Path) -> Self {
        Self {
            handoff: run_dir.join(HANDOFF_FILE),
            confirmation: run_dir.join(CONFIRMATION_FILE),
        }
    }
}

/// Everything a run produces, ready to be written.
#[derive(Debug, Clone)]
pub struct HandoffArtifacts {
    pub document: HandoffDocument,
    pub template: ConfirmationTemplate,
}

impl HandoffArtifacts {
    /// Run aggregation and deduplication for `run`.
    ///
    /// Fails if any present agent report cannot be read or parsed; nothing
    /// has been written at that point.
    pub fn prepare(run: &RunContext, generated_at: String) -> HandoffResult<Self> {
        let aggregation = load_reports(&run.run_dir)?;
        Ok(Self::from_aggregation(run, &aggregation, generated_at))
    }

    /// Build both documents from an existing aggregation.
    pub fn from_aggregation(
        run: &RunContext,
        aggregation: &Aggregation,
        generated_at: String,
    ) -> Self {
        let raw = raw_candidates(aggregation.findings());
        let dedup = deduplicate(&raw);
        info!(
            "Prepared {} raw and {} deduplicated patch candidates",
            raw.len(),
            dedup.len()
        );

        let template = ConfirmationTemplate::from_candidates(&run.run_id, &dedup);
        let document = HandoffDocument::build(run, aggregation, raw, dedup, generated_at);

        Self { document, template }
    }

    /// Write the handoff, then the confirmation template, into `run_dir`.
    ///
    /// Existing files are overwritten. If the second write fails the first
    /// file stays on disk.
    pub fn write(&self, run_dir: &Path) -> HandoffResult<OutputPaths> {
        let paths = OutputPaths::in_dir(run_dir);

        write_json(&paths.handoff, &self.document)?;
        write_json(&paths.confirmation, &self.template)?;

        Ok(paths)
    }
}

/// Serialize `value` as indented JSON and write it to `path`.
fn write_json<T: Serialize>(path: &Path, value: &T) -> HandoffResult<()> {
    let content = serde_json::to_string_pretty(value)?;

    std::fs::write(path, content).map_err(|source| HandoffError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentReport, Finding, STATUS_COMPLETED};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn create_run(run_dir: &Path) -> RunContext {
        RunContext {
            run_dir: run_dir.to_path_buf(),
            run_id: "audit-phase2-1772192472".to_string(),
            session_name: "fase-2".to_string(),
            plan_path: "docs/plan.md".to_string(),
        }
    }

    fn create_test_finding(severity: &str, recommendation: &str, risk: &str) -> Finding {
        serde_json::from_value(json!({
            "severity": severity,
            "recommendation": recommendation,
            "risk": risk
        }))
        .unwrap()
    }

    fn create_report(agent: AgentKey, findings: Vec<Finding>) -> AgentReport {
        AgentReport {
            agent,
            path: agent.report_path(Path::new("/run")),
            status: STATUS_COMPLETED.to_string(),
            findings,
        }
    }

    fn write_report(dir: &Path, agent: AgentKey, value: Value) {
        fs::write(agent.report_path(dir), value.to_string()).unwrap();
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        let now = NaiveDate::from_ymd_opt(2026, 2, 27)
            .unwrap()
            .and_hms_micro_opt(12, 41, 12, 345678)
            .unwrap();
        assert_eq!(timestamp(now), "2026-02-27T12:41:12.345678");
    }

    #[test]
    fn test_template_matches_deduplicated_candidates() {
        let aggregation = Aggregation::from_reports(
            Path::new("/run"),
            vec![
                create_report(
                    AgentKey::Logic,
                    vec![
                        create_test_finding("Baja", "low", "r"),
                        create_test_finding("Alta", "dup", "r"),
                    ],
                ),
                create_report(
                    AgentKey::CodeQuality,
                    vec![
                        create_test_finding("Alta", "dup", "r"),
                        create_test_finding("Desconocida", "odd", "r"),
                    ],
                ),
            ],
        );

        let artifacts = HandoffArtifacts::from_aggregation(
            &create_run(Path::new("/run")),
            &aggregation,
            "now".to_string(),
        );
        let dedup = &artifacts.document.deduplicated_patch_candidates;
        let decisions = &artifacts.template.decisions;

        assert_eq!(dedup.len(), 3);
        assert_eq!(decisions.len(), dedup.len());
        for (slot, candidate) in decisions.iter().zip(dedup) {
            assert_eq!(slot.patch_id, candidate.id);
            assert_eq!(slot.user_decision, UserDecision::Deferred);
            assert!(slot.approved_by.is_empty());
            assert!(slot.approved_at.is_empty());
        }
        assert_eq!(dedup[0].source_agents, vec![AgentKey::Logic, AgentKey::CodeQuality]);
        assert_eq!(dedup[2].priority.as_str(), Some("Desconocida"));
        assert_eq!(artifacts.template.run_id, "audit-phase2-1772192472");
    }

    #[test]
    fn test_truncation_keeps_all_findings() {
        let findings: Vec<Finding> = (0..35)
            .map(|i| {
                let severity = if i < 5 { "Baja" } else { "Alta" };
                create_test_finding(severity, &format!("fix {}", i), "r")
            })
            .collect();
        let aggregation = Aggregation::from_reports(
            Path::new("/run"),
            vec![create_report(AgentKey::SilentFailure, findings)],
        );

        let artifacts = HandoffArtifacts::from_aggregation(
            &create_run(Path::new("/run")),
            &aggregation,
            "now".to_string(),
        );
        let document = &artifacts.document;

        assert_eq!(document.findings.len(), 35);
        assert_eq!(document.raw_patch_candidates.len(), 30);
        assert_eq!(document.deduplicated_patch_candidates.len(), 30);
        // The five Baja findings sort last and fall outside the cap.
        assert!(document
            .raw_patch_candidates
            .iter()
            .all(|c| c.priority.as_str() == Some("Alta")));
        assert_eq!(document.raw_patch_candidates[0].change_summary.as_str(), Some("fix 5"));
        assert_eq!(document.findings[34].recommendation().as_str(), Some("fix 4"));
    }

    #[test]
    fn test_prepare_and_write() {
        let temp = TempDir::new().unwrap();
        write_report(
            temp.path(),
            AgentKey::Logic,
            json!({"findings": [{
                "severity": "Alta",
                "recommendation": "Añadir validación de esquema",
                "risk": "Pérdida de datos"
            }]}),
        );
        write_report(
            temp.path(),
            AgentKey::CodeQuality,
            json!({"findings": [{
                "severity": "Alta",
                "recommendation": "Añadir validación de esquema",
                "risk": "Pérdida de datos"
            }]}),
        );
        let run = create_run(temp.path());

        let artifacts = HandoffArtifacts::prepare(&run, "2026-02-27T12:00:00.000000".to_string())
            .unwrap();
        let paths = artifacts.write(temp.path()).unwrap();

        assert_eq!(paths, OutputPaths::in_dir(temp.path()));

        let raw_text = fs::read_to_string(&paths.handoff).unwrap();
        assert!(raw_text.contains("Añadir validación de esquema"));
        assert!(raw_text.contains("\n  \"schema_version\""));

        let handoff = read_json(&paths.handoff);
        assert_eq!(handoff["schema_version"], json!("2.1"));
        assert_eq!(handoff["handoff_version"], json!("2.0"));
        assert_eq!(handoff["run_id"], json!("audit-phase2-1772192472"));
        assert_eq!(handoff["session_name"], json!("fase-2"));
        assert_eq!(handoff["plan_path"], json!("docs/plan.md"));
        assert_eq!(handoff["generated_at"], json!("2026-02-27T12:00:00.000000"));
        assert_eq!(handoff["next_step_for_parent_agent"], json!(NEXT_STEP));
        assert_eq!(handoff["decision_rules"]["default"], json!("deferred"));

        let outputs = handoff["agent_outputs"].as_object().unwrap();
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs["logic"]["status"], json!("completed"));
        assert_eq!(outputs["silent_failure"]["status"], json!("pending"));
        assert_eq!(outputs["testing_static"]["finding_count"], json!(0));

        assert_eq!(handoff["findings"][0]["agent"], json!("logic"));
        assert_eq!(handoff["findings"][1]["agent"], json!("code_quality"));
        assert_eq!(handoff["raw_patch_candidates"][1]["id"], json!("patch-2"));
        assert_eq!(
            handoff["deduplicated_patch_candidates"],
            json!([{
                "id": "patch-dedup-1",
                "priority": "Alta",
                "change_summary": "Añadir validación de esquema",
                "risk_if_not_applied": "Pérdida de datos",
                "source_agents": ["logic", "code_quality"],
                "status": "proposed",
                "requires_user_confirmation": true,
                "user_decision": "deferred",
                "user_notes": ""
            }])
        );

        let template = read_json(&paths.confirmation);
        assert_eq!(
            template,
            json!({
                "run_id": "audit-phase2-1772192472",
                "decisions": [{
                    "patch_id": "patch-dedup-1",
                    "user_decision": "deferred",
                    "user_notes": "",
                    "approved_by": "",
                    "approved_at": ""
                }]
            })
        );
    }

    #[test]
    fn test_sample_run_fixture() {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample-run");
        let temp = TempDir::new().unwrap();
        for agent in [AgentKey::Logic, AgentKey::CodeQuality] {
            fs::copy(fixture.join(agent.file_name()), agent.report_path(temp.path())).unwrap();
        }
        let run = create_run(temp.path());

        let artifacts = HandoffArtifacts::prepare(&run, "now".to_string()).unwrap();
        let document = &artifacts.document;

        assert_eq!(document.findings.len(), 5);
        assert_eq!(document.findings[0].field("id"), Some(&json!("L-2")));
        assert_eq!(document.findings[1].field("id"), Some(&json!("CQ-1")));
        assert_eq!(document.findings[4].field("id"), Some(&json!("L-3")));
        assert_eq!(document.agent_outputs[&AgentKey::Logic].finding_count, 3);
        assert_eq!(document.agent_outputs[&AgentKey::TestingStatic].status, "pending");

        let ids: Vec<_> = document
            .deduplicated_patch_candidates
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["patch-dedup-1", "patch-dedup-2", "patch-dedup-3", "patch-dedup-4"]);
        assert_eq!(
            document.deduplicated_patch_candidates[0].source_agents,
            vec![AgentKey::Logic, AgentKey::CodeQuality]
        );
        assert_eq!(
            document.deduplicated_patch_candidates[2].risk_if_not_applied,
            Value::Null
        );
        assert_eq!(
            document.deduplicated_patch_candidates[3].priority.as_str(),
            Some("Desconocida")
        );
    }

    #[test]
    fn test_findings_are_written_verbatim() {
        let temp = TempDir::new().unwrap();
        write_report(
            temp.path(),
            AgentKey::TestingStatic,
            json!({"findings": [{
                "id": "T-1",
                "risk": null,
                "severity": ["Alta"],
                "recommendation": null,
                "agent": "someone-else",
                "file": "tests/test_sync.py"
            }]}),
        );
        let run = create_run(temp.path());

        let artifacts = HandoffArtifacts::prepare(&run, "now".to_string()).unwrap();
        let paths = artifacts.write(temp.path()).unwrap();

        let finding: serde_json::Map<String, Value> =
            serde_json::from_value(read_json(&paths.handoff)["findings"][0].clone()).unwrap();
        let keys: Vec<_> = finding.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "risk", "severity", "recommendation", "agent", "file"]);
        assert_eq!(finding["risk"], Value::Null);
        assert_eq!(finding["recommendation"], Value::Null);
        assert_eq!(finding["agent"], json!("testing_static"));

        let candidate = &artifacts.document.deduplicated_patch_candidates[0];
        assert_eq!(candidate.priority, json!(["Alta"]));
        assert_eq!(candidate.change_summary, Value::Null);
    }

    #[test]
    fn test_write_overwrites_previous_outputs() {
        let temp = TempDir::new().unwrap();
        let paths = OutputPaths::in_dir(temp.path());
        fs::write(&paths.handoff, "stale").unwrap();
        fs::write(&paths.confirmation, "stale").unwrap();

        let run = create_run(temp.path());
        let artifacts = HandoffArtifacts::prepare(&run, "now".to_string()).unwrap();
        artifacts.write(temp.path()).unwrap();

        let template = read_json(&paths.confirmation);
        assert_eq!(template["decisions"], json!([]));
        assert_eq!(read_json(&paths.handoff)["findings"], json!([]));
    }

    #[test]
    fn test_malformed_report_writes_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(AgentKey::CodeQuality.report_path(temp.path()), "not json").unwrap();

        let run = create_run(temp.path());
        let result = HandoffArtifacts::prepare(&run, "now".to_string());

        assert!(matches!(result, Err(HandoffError::MalformedReport { .. })));
        let paths = OutputPaths::in_dir(temp.path());
        assert!(!paths.handoff.exists());
        assert!(!paths.confirmation.exists());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let run = create_run(temp.path());
        let artifacts = HandoffArtifacts::prepare(&run, "now".to_string()).unwrap();

        let missing = temp.path().join("gone");
        match artifacts.write(&missing) {
            Err(HandoffError::WriteOutput { path, .. }) => {
                assert_eq!(path, missing.join(HANDOFF_FILE));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
