//! Per-agent failure statistics and agent selection.
//!
//! Clusters carry the agent that produced the failing run when the input
//! made it derivable; aggregating over that field shows which agent keeps
//! tripping over which root cause.

use super::ClassifiedCluster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weakness profiles keyed by agent name.
pub type AgentWeaknessMap = BTreeMap<String, AgentWeakness>;

/// Score every agent starts from before failure deductions.
const BASE_SCORE: i32 = 100;

/// Points deducted per recorded failure.
const FAILURE_PENALTY: i32 = 10;

/// Agents scoring below this are flagged to avoid.
const AVOID_THRESHOLD: i32 = 50;

/// Aggregated failure profile for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWeakness {
    pub agent: String,
    /// Total error occurrences attributed to this agent.
    pub total_failures: usize,
    /// Occurrences per error-type label.
    pub failure_types: BTreeMap<String, usize>,
    /// Occurrences per root-cause label.
    pub root_causes: BTreeMap<String, usize>,
    /// Up to three representative messages.
    pub examples: Vec<String>,
    /// The root-cause label this agent fails on most.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_weakness: Option<String>,
}

/// Aggregate classified clusters by the agent that produced them.
pub fn agent_weaknesses(clusters: &[ClassifiedCluster]) -> BTreeMap<String, AgentWeakness> {
    let mut weaknesses: BTreeMap<String, AgentWeakness> = BTreeMap::new();

    for classified in clusters {
        let Some(agent) = &classified.agent else {
            continue;
        };
        let entry = weaknesses
            .entry(agent.clone())
            .or_insert_with(|| AgentWeakness {
                agent: agent.clone(),
                total_failures: 0,
                failure_types: BTreeMap::new(),
                root_causes: BTreeMap::new(),
                examples: Vec::new(),
                primary_weakness: None,
            });

        entry.total_failures += classified.cluster.count;
        *entry
            .failure_types
            .entry(classified.cluster.kind_label())
            .or_insert(0) += classified.cluster.count;
        *entry
            .root_causes
            .entry(classified.label.clone())
            .or_insert(0) += classified.cluster.count;
        if entry.examples.len() < 3 {
            entry
                .examples
                .push(classified.cluster.representative.clone());
        }
    }

    for weakness in weaknesses.values_mut() {
        weakness.primary_weakness = weakness
            .root_causes
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(label, _)| label.clone());
    }

    weaknesses
}

/// One agent's position in a recommendation ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent: String,
    pub score: i32,
    pub failures: usize,
}

/// Which agent to prefer for the next run, given recorded weaknesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecommendation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_agent: Option<String>,
    pub ranking: Vec<AgentScore>,
    pub avoid_agents: Vec<String>,
    pub reasoning: String,
}

/// Rank candidate agents by failure count.
///
/// Every agent starts at 100 and loses 10 points per recorded failure,
/// floored at 0. Agents below 50 are flagged to avoid.
pub fn agent_recommendation(
    weaknesses: &AgentWeaknessMap,
    agents: &[String],
) -> AgentRecommendation {
    let mut ranking: Vec<AgentScore> = agents
        .iter()
        .map(|agent| {
            let failures = weaknesses
                .get(agent)
                .map(|w| w.total_failures)
                .unwrap_or(0);
            let score =
                (BASE_SCORE - FAILURE_PENALTY * failures as i32).max(0);
            AgentScore {
                agent: agent.clone(),
                score,
                failures,
            }
        })
        .collect();

    // Stable sort keeps the caller's roster order among ties.
    ranking.sort_by(|a, b| b.score.cmp(&a.score));

    let avoid_agents: Vec<String> = ranking
        .iter()
        .filter(|s| s.score < AVOID_THRESHOLD)
        .map(|s| s.agent.clone())
        .collect();

    let best = ranking.first().cloned();
    let reasoning = match &best {
        None => "no candidate agents provided".to_string(),
        Some(top) if top.failures == 0 => {
            format!("{} has zero recorded failures", top.agent)
        }
        Some(top) => format!(
            "{} has the fewest recorded failures ({})",
            top.agent, top.failures
        ),
    };

    AgentRecommendation {
        best_agent: best.map(|s| s.agent),
        ranking,
        avoid_agents,
        reasoning,
    }
}
