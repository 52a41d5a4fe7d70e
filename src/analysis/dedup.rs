//! Patch candidate projection and deduplication.

use crate::models::{AgentKey, DedupCandidate, Finding, RawCandidate};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Maximum number of findings turned into patch candidates.
pub const CANDIDATE_LIMIT: usize = 30;

/// Project the highest-severity findings into raw candidates.
///
/// `findings` must already be severity-sorted; only the first
/// [`CANDIDATE_LIMIT`] entries are kept, numbered from 1.
pub fn raw_candidates(findings: &[Finding]) -> Vec<RawCandidate> {
    findings
        .iter()
        .take(CANDIDATE_LIMIT)
        .enumerate()
        .map(|(i, finding)| RawCandidate::from_finding(i + 1, finding))
        .collect()
}

/// Identity of a patch for deduplication purposes.
///
/// Each component is the canonical JSON text of the candidate field, so
/// any JSON value can take part in the key. Absent fields are `null`, a
/// value of their own: two candidates both missing a risk match each
/// other, but never one that has a risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub priority: String,
    pub change_summary: String,
    pub risk_if_not_applied: String,
}

impl From<&RawCandidate> for DedupKey {
    fn from(raw: &RawCandidate) -> Self {
        Self {
            priority: canonical_json(&raw.priority),
            change_summary: canonical_json(&raw.change_summary),
            risk_if_not_applied: canonical_json(&raw.risk_if_not_applied),
        }
    }
}

/// Compact JSON with object keys sorted, so equal values give equal text
/// whatever order their keys were written in.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| {
                    format!("{}:{}", Value::from(key.as_str()), canonical_json(value))
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// Merges raw candidates by [`DedupKey`], keeping first-insertion order.
#[derive(Debug, Default)]
pub struct Deduplicator {
    positions: HashMap<DedupKey, usize>,
    merged: Vec<DedupCandidate>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw candidate in.
    pub fn push(&mut self, raw: &RawCandidate) {
        let key = DedupKey::from(raw);

        match self.positions.get(&key) {
            Some(&position) => {
                let candidate = &mut self.merged[position];
                if let Some(agent) = raw.source_agent {
                    add_source_agent(&mut candidate.source_agents, agent);
                }
                debug!("Merged {} into {}", raw.id, candidate.id);
            }
            None => {
                let candidate = DedupCandidate::seed(self.merged.len() + 1, raw);
                self.positions.insert(key, self.merged.len());
                self.merged.push(candidate);
            }
        }
    }

    /// Finish merging and return candidates sorted by priority rank.
    ///
    /// Ids keep their insertion numbering; the sort is stable.
    pub fn finish(self) -> Vec<DedupCandidate> {
        let mut merged = self.merged;
        merged.sort_by_key(DedupCandidate::rank);
        merged
    }
}

fn add_source_agent(agents: &mut Vec<AgentKey>, agent: AgentKey) {
    if !agents.contains(&agent) {
        agents.push(agent);
    }
}

/// Collapse raw candidates sharing priority, summary and risk.
pub fn deduplicate(raw: &[RawCandidate]) -> Vec<DedupCandidate> {
    let mut deduplicator = Deduplicator::new();
    for candidate in raw {
        deduplicator.push(candidate);
    }

    let merged = deduplicator.finish();
    debug!(
        "Deduplicated {} raw candidates into {}",
        raw.len(),
        merged.len()
    );
    merged
}
