use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RenumberError, Result};

/// A position in identifier space.
pub type Slot = i64;

/// Dense index of a node inside a [`LinkGraph`](crate::graph::LinkGraph).
pub type NodeIx = usize;

/// Attempts per refinement batch.
pub const REFINE_BATCH_SIZE: usize = 1000;

// One record as delivered by the markup reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub original_id: String,
    #[serde(default)]
    pub content: String,
}

impl NodeRecord {
    pub fn new(original_id: impl Into<String>, content: impl Into<String>) -> Self {
        NodeRecord {
            original_id: original_id.into(),
            content: content.into(),
        }
    }
}

// Swap acceptance policy of the violation repairer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairStrategy {
    /// Commit only swaps that strictly shorten the total link distance.
    #[serde(rename = "reduce-average")]
    ReduceAverage,
    /// Commit any swap that does not raise the number of broken links,
    /// even if links get longer on average.
    #[serde(rename = "satisfy-constraint")]
    SatisfyConstraint,
}

impl RepairStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStrategy::ReduceAverage => "reduce-average",
            RepairStrategy::SatisfyConstraint => "satisfy-constraint",
        }
    }
}

impl Default for RepairStrategy {
    fn default() -> Self {
        RepairStrategy::ReduceAverage
    }
}

// Configuration options for a renumbering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenumberConfig {
    pub start: Slot,
    pub min_distance: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<u64>,
    pub locked: Vec<String>,
    pub attempts: usize,
    pub repair_passes: usize,
    pub refine_batches: usize,
    pub clustering: bool,
    pub repair_strategy: RepairStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for RenumberConfig {
    fn default() -> Self {
        RenumberConfig {
            start: 1,
            min_distance: 5,
            max_distance: None,
            locked: Vec::new(),
            attempts: 1,
            repair_passes: 0,
            refine_batches: 0,
            clustering: true,
            repair_strategy: RepairStrategy::default(),
            seed: None,
        }
    }
}

impl RenumberConfig {
    pub fn validate(&self) -> Result<()> {
        if self.attempts == 0 {
            return Err(RenumberError::config("attempts must be at least 1"));
        }
        if let Some(max) = self.max_distance {
            if max < self.min_distance {
                return Err(RenumberError::config(format!(
                    "max_distance {} is below min_distance {}",
                    max, self.min_distance
                )));
            }
        }
        Ok(())
    }

    /// Strategy the repair phase actually runs with.
    ///
    /// Without a maximum there is nothing for `ReduceAverage` to pull in, and
    /// fixing a too-close link almost always lengthens it.
    pub fn effective_repair_strategy(&self) -> RepairStrategy {
        match self.max_distance {
            Some(_) => self.repair_strategy,
            None => RepairStrategy::SatisfyConstraint,
        }
    }

    /// The rules every phase checks links against.
    pub fn rules(&self) -> Vec<DistanceRule> {
        let mut rules = Vec::with_capacity(2);
        if self.min_distance > 0 {
            rules.push(DistanceRule::Min(self.min_distance));
        }
        if let Some(max) = self.max_distance {
            rules.push(DistanceRule::Max(max));
        }
        rules
    }
}

/// Split a lock list written as `"1,21,5"` or `"1 21 5"`.
pub fn parse_locked_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "threshold", rename_all = "lowercase")]
pub enum DistanceRule {
    Min(u64),
    Max(u64),
}

impl DistanceRule {
    /// How far `distance` is from satisfying the rule, or `None` if it does.
    #[inline]
    pub fn severity(&self, distance: u64) -> Option<u64> {
        match *self {
            DistanceRule::Min(min) if distance < min => Some(min - distance),
            DistanceRule::Max(max) if distance > max => Some(distance - max),
            _ => None,
        }
    }

    #[inline]
    pub fn is_violated(&self, distance: u64) -> bool {
        self.severity(distance).is_some()
    }

    pub fn threshold(&self) -> u64 {
        match *self {
            DistanceRule::Min(d) | DistanceRule::Max(d) => d,
        }
    }
}

/// A link breaking one of the distance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub source: NodeIx,
    pub dest: NodeIx,
    pub distance: u64,
    pub rule: DistanceRule,
    pub severity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistanceStats {
    pub average: f64,
    pub maximum: u64,
    pub minimum: u64,
    pub links: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub before: DistanceStats,
    pub after: DistanceStats,
}

/// A node the placer had to put somewhere that breaks the minimum distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedPlacement {
    pub node: String,
    pub slot: Slot,
    /// Slots of already placed neighbors that end up too close.
    pub conflicts: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unsatisfiable {
    /// Both endpoints are locked, no swap can touch the link.
    LockedEndpoints {
        source: String,
        dest: String,
        distance: u64,
        rule: DistanceRule,
    },
    /// No draft met the maximum distance; the best one was kept.
    MaxDistanceUnmet {
        threshold: u64,
        best_maximum: u64,
        attempts: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenumberReport {
    pub zones: usize,
    pub attempts_used: usize,
    pub dropped_links: usize,
    pub forced: Vec<ForcedPlacement>,
    pub unsatisfiable: Vec<Unsatisfiable>,
    pub repair_passes: usize,
    pub repair_swaps: usize,
    pub refine_swaps: usize,
    /// Violations still present after every phase ran.
    pub residual_violations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberedRecord {
    pub original_id: String,
    pub new_id: Slot,
    pub content: String,
    /// Raw text of every `[[...]]` marker in the original content.
    pub original_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenumberOutcome {
    pub records: Vec<RenumberedRecord>,
    pub mapping: IndexMap<String, Slot>,
    pub stats: StatsSnapshot,
    pub report: RenumberReport,
}

impl RenumberOutcome {
    /// Records ordered by their new identifier, the order an exporter writes them in.
    pub fn records_by_new_id(&self) -> Vec<&RenumberedRecord> {
        let mut sorted: Vec<&RenumberedRecord> = self.records.iter().collect();
        sorted.sort_by_key(|r| r.new_id);
        sorted
    }
}

/// Engine progression. Strictly sequential, never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Built,
    Clustered,
    Drafted,
    Repaired,
    Refined,
    Finalized,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Built => "built",
            Stage::Clustered => "clustered",
            Stage::Drafted => "drafted",
            Stage::Repaired => "repaired",
            Stage::Refined => "refined",
            Stage::Finalized => "finalized",
        }
    }
}
