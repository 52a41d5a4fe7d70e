//! Data models for the review handoff.
//!
//! This module contains the core data structures shared by the
//! aggregator, the deduplicator and the handoff emitter: agent reports,
//! findings, patch candidates and the two output documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Status given to an agent whose report file does not exist.
pub const STATUS_PENDING: &str = "pending";

/// Status given to a present report that does not declare one.
pub const STATUS_COMPLETED: &str = "completed";

/// Rank shared by every severity outside the known set (and by absent ones).
pub const UNRANKED: u8 = 9;

/// What an absent finding field reads as.
static NULL: Value = Value::Null;

/// The review agents whose reports are aggregated.
///
/// Declaration order is the enumeration order used everywhere: report
/// loading, tie-breaking between equal severities and `agent_outputs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKey {
    Logic,
    CodeQuality,
    SilentFailure,
    TestingStatic,
}

impl AgentKey {
    /// Every agent, in enumeration order.
    pub const ALL: [AgentKey; 4] = [
        AgentKey::Logic,
        AgentKey::CodeQuality,
        AgentKey::SilentFailure,
        AgentKey::TestingStatic,
    ];

    /// Key as it appears in the JSON documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKey::Logic => "logic",
            AgentKey::CodeQuality => "code_quality",
            AgentKey::SilentFailure => "silent_failure",
            AgentKey::TestingStatic => "testing_static",
        }
    }

    /// Conventional report file name inside a run directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            AgentKey::Logic => "agent-logic.json",
            AgentKey::CodeQuality => "agent-code-quality.json",
            AgentKey::SilentFailure => "agent-silent-failure.json",
            AgentKey::TestingStatic => "agent-testing-static.json",
        }
    }

    /// Full path of this agent's report inside `run_dir`.
    pub fn report_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(self.file_name())
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known severity levels reported by the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// High severity - must be addressed first
    Alta,
    /// Medium severity
    Media,
    /// Low severity
    Baja,
}

impl Severity {
    /// Parse an exact severity label. Anything else is unranked.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Alta" => Some(Severity::Alta),
            "Media" => Some(Severity::Media),
            "Baja" => Some(Severity::Baja),
            _ => None,
        }
    }

    /// Sort rank: lower comes first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Alta => 0,
            Severity::Media => 1,
            Severity::Baja => 2,
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Alta => "🔴",
            Severity::Media => "🟡",
            Severity::Baja => "🟢",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Alta => write!(f, "Alta"),
            Severity::Media => write!(f, "Media"),
            Severity::Baja => write!(f, "Baja"),
        }
    }
}

/// Rank of a raw severity value. Unknown and absent values share [`UNRANKED`].
pub fn severity_rank(value: Option<&str>) -> u8 {
    value
        .and_then(Severity::parse)
        .map_or(UNRANKED, |severity| severity.rank())
}

/// Rank of a severity as written in a report. Non-string values are unranked.
pub fn value_rank(value: &Value) -> u8 {
    severity_rank(value.as_str())
}

/// A single issue reported by a review agent.
///
/// The agent's object is kept as-is, key order and explicit `null`s
/// included; the handoff only reads `severity`, `recommendation` and
/// `risk` out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Finding {
    fields: Map<String, Value>,
    /// Originating agent, assigned during aggregation.
    #[serde(skip)]
    pub agent: Option<AgentKey>,
}

impl Finding {
    /// Tag the finding with its originating agent.
    ///
    /// The tag is written into the `agent` field, replacing whatever the
    /// agent itself put there.
    pub fn tagged(mut self, agent: AgentKey) -> Self {
        self.fields
            .insert("agent".to_string(), Value::String(agent.as_str().to_string()));
        self.agent = Some(agent);
        self
    }

    /// Raw value of a field, `None` if the key is absent.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Severity as written; absent reads as `null`.
    pub fn severity(&self) -> &Value {
        self.field("severity").unwrap_or(&NULL)
    }

    /// Recommendation as written; absent reads as `null`.
    pub fn recommendation(&self) -> &Value {
        self.field("recommendation").unwrap_or(&NULL)
    }

    /// Risk as written; absent reads as `null`.
    pub fn risk(&self) -> &Value {
        self.field("risk").unwrap_or(&NULL)
    }

    /// Sort rank of this finding's severity.
    pub fn rank(&self) -> u8 {
        value_rank(self.severity())
    }
}

/// A parsed agent report, or the pending placeholder for a missing one.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    /// Agent that produced the report.
    pub agent: AgentKey,
    /// Conventional location of the report file.
    pub path: PathBuf,
    /// Report status (`pending` for missing files).
    pub status: String,
    /// Findings in the order the agent reported them.
    pub findings: Vec<Finding>,
}

impl AgentReport {
    /// Placeholder for an agent whose report file does not exist.
    pub fn pending(agent: AgentKey, path: PathBuf) -> Self {
        Self {
            agent,
            path,
            status: STATUS_PENDING.to_string(),
            findings: Vec::new(),
        }
    }

    /// Whether this is a placeholder for a missing report.
    pub fn is_pending(&self) -> bool {
        self.status == STATUS_PENDING
    }
}

/// Decisions the downstream consumer may record for a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserDecision {
    Approved,
    Rejected,
    #[default]
    Deferred,
}

impl UserDecision {
    /// Every allowed decision.
    pub const ALL: [UserDecision; 3] = [
        UserDecision::Approved,
        UserDecision::Rejected,
        UserDecision::Deferred,
    ];
}

/// Lifecycle status of a patch candidate. Candidates are only ever proposed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    #[default]
    Proposed,
}

/// A finding reframed as a proposed change, before deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    /// `patch-N`, 1-based within the capped subset.
    pub id: String,
    pub priority: Value,
    pub source_agent: Option<AgentKey>,
    pub change_summary: Value,
    pub risk_if_not_applied: Value,
    pub status: CandidateStatus,
    pub requires_user_confirmation: bool,
    pub user_decision: UserDecision,
    pub user_notes: String,
}

impl RawCandidate {
    /// Project a finding into the candidate numbered `number`.
    pub fn from_finding(number: usize, finding: &Finding) -> Self {
        Self {
            id: format!("patch-{}", number),
            priority: finding.severity().clone(),
            source_agent: finding.agent,
            change_summary: finding.recommendation().clone(),
            risk_if_not_applied: finding.risk().clone(),
            status: CandidateStatus::Proposed,
            requires_user_confirmation: true,
            user_decision: UserDecision::Deferred,
            user_notes: String::new(),
        }
    }
}

/// Raw candidates merged by priority, summary and risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupCandidate {
    /// `patch-dedup-N`, numbered by first occurrence of the key.
    pub id: String,
    pub priority: Value,
    pub change_summary: Value,
    pub risk_if_not_applied: Value,
    /// Contributing agents, first-seen order, no duplicates.
    pub source_agents: Vec<AgentKey>,
    pub status: CandidateStatus,
    pub requires_user_confirmation: bool,
    pub user_decision: UserDecision,
    pub user_notes: String,
}

impl DedupCandidate {
    /// Start a merged candidate from the first raw candidate seen for its key.
    pub fn seed(number: usize, raw: &RawCandidate) -> Self {
        Self {
            id: format!("patch-dedup-{}", number),
            priority: raw.priority.clone(),
            change_summary: raw.change_summary.clone(),
            risk_if_not_applied: raw.risk_if_not_applied.clone(),
            source_agents: raw.source_agent.into_iter().collect(),
            status: CandidateStatus::Proposed,
            requires_user_confirmation: true,
            user_decision: UserDecision::Deferred,
            user_notes: String::new(),
        }
    }

    /// Sort rank of this candidate's priority.
    pub fn rank(&self) -> u8 {
        value_rank(&self.priority)
    }
}

/// One empty decision slot in the confirmation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationSlot {
    pub patch_id: String,
    pub user_decision: UserDecision,
    pub user_notes: String,
    pub approved_by: String,
    pub approved_at: String,
}

/// Scaffold the consumer fills in, one slot per deduplicated candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationTemplate {
    pub run_id: String,
    pub decisions: Vec<ConfirmationSlot>,
}

/// Rules the consumer must follow when recording decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRules {
    pub allowed_user_decisions: Vec<UserDecision>,
    pub default: UserDecision,
    pub requires_user_confirmation: bool,
}

impl Default for DecisionRules {
    fn default() -> Self {
        Self {
            allowed_user_decisions: UserDecision::ALL.to_vec(),
            default: UserDecision::Deferred,
            requires_user_confirmation: true,
        }
    }
}

/// Where an agent's report lives and what came out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub path: String,
    pub status: String,
    pub finding_count: usize,
}

impl From<&AgentReport> for AgentOutput {
    fn from(report: &AgentReport) -> Self {
        Self {
            path: report.path.display().to_string(),
            status: report.status.clone(),
            finding_count: report.findings.len(),
        }
    }
}

/// The handoff artifact summarizing a run for the downstream decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffDocument {
    pub schema_version: String,
    pub handoff_version: String,
    pub generated_at: String,
    pub run_id: String,
    pub session_name: String,
    pub plan_path: String,
    pub agent_outputs: BTreeMap<AgentKey, AgentOutput>,
    /// Every finding, severity-sorted and untruncated.
    pub findings: Vec<Finding>,
    pub raw_patch_candidates: Vec<RawCandidate>,
    pub deduplicated_patch_candidates: Vec<DedupCandidate>,
    pub decision_rules: DecisionRules,
    pub next_step_for_parent_agent: String,
}

/// Identity of one handoff run, threaded through every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Directory holding the agent reports and receiving the outputs.
    pub run_dir: PathBuf,
    pub run_id: String,
    pub session_name: String,
    pub plan_path: String,
}
