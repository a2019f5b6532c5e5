use crate::cost::{count_violations, evaluate};
use crate::error::Result;
use crate::graph::LinkGraph;
use crate::placement::place_groups;
use crate::references::{marker_texts, rewrite_destinations};
use crate::refine::refine;
use crate::repair::repair;
use crate::slots::SlotMap;
use crate::types::{
    DistanceRule, DistanceStats, ForcedPlacement, NodeIx, NodeRecord, RenumberConfig,
    RenumberOutcome, RenumberReport, RenumberedRecord, Slot, Stage, StatsSnapshot, Unsatisfiable,
    REFINE_BATCH_SIZE,
};
use crate::utils::{slot_bounds, slot_range, unlocked_nodes};
use crate::zones::{build_zones, order_zones};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

/// Renumber `records`, drawing randomness from `config.seed` or from entropy.
pub fn renumber(records: &[NodeRecord], config: &RenumberConfig) -> Result<RenumberOutcome> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    renumber_with_rng(records, config, &mut rng)
}

/// JSON boundary of the bindings: an array of records and an optional config
/// object in, the outcome out. Fields missing from the config take their defaults.
pub fn renumber_json(records_json: &str, config_json: Option<&str>) -> Result<RenumberOutcome> {
    let records: Vec<NodeRecord> = serde_json::from_str(records_json)?;
    let config: RenumberConfig = match config_json {
        Some(raw) => serde_json::from_str(raw)?,
        None => RenumberConfig::default(),
    };
    renumber(&records, &config)
}

/// Tracks the engine stage; stages only ever move forward.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn new() -> Self {
        Progress { stage: Stage::Built }
    }

    fn advance(&mut self, next: Stage) {
        assert!(
            next > self.stage,
            "stage {} cannot follow {}",
            next.as_str(),
            self.stage.as_str()
        );
        tracing::trace!("stage {} -> {}", self.stage.as_str(), next.as_str());
        self.stage = next;
    }
}

struct Draft {
    map: SlotMap,
    forced: Vec<ForcedPlacement>,
    stats: DistanceStats,
    too_close: usize,
}

impl Draft {
    fn meets_max(&self, max_distance: Option<u64>) -> bool {
        !matches!(max_distance, Some(max) if self.stats.maximum > max)
    }

    fn better_than(&self, other: &Draft) -> bool {
        self.too_close < other.too_close
            || (self.too_close == other.too_close && self.stats.average < other.stats.average)
    }
}

/// Renumber `records` with a caller supplied random source.
///
/// The run builds the link graph, pins the locked nodes onto the lowest slots,
/// clusters and orders the rest, drafts a placement (retrying up to
/// `config.attempts` times), then repairs violations and refines globally.
/// Only a slot pool that cannot hold every node is an error; every other
/// shortcoming is listed in the returned report.
pub fn renumber_with_rng<R: Rng + ?Sized>(
    records: &[NodeRecord],
    config: &RenumberConfig,
    rng: &mut R,
) -> Result<RenumberOutcome> {
    let total_start = Instant::now();
    config.validate()?;

    let mut step_start = Instant::now();
    let g = LinkGraph::from_records(records)?;
    let n = g.node_count();
    let pool = slot_range(config.start, n)?;
    let mut progress = Progress::new();
    if g.dropped_links() > 0 {
        tracing::info!(
            "{} links ignored (self links or unknown destinations)",
            g.dropped_links()
        );
    }
    tracing::debug!(
        "[PERF] build graph: {:?}, {} nodes, {} links",
        step_start.elapsed(),
        n,
        g.link_count()
    );

    let mut base = SlotMap::new(n);
    let locked_count = seed_locked(&g, &mut base, &config.locked, &pool);
    let free = unlocked_nodes(&base);
    let remaining = &pool[locked_count..];

    step_start = Instant::now();
    let zones: Vec<Vec<NodeIx>> = if free.is_empty() {
        Vec::new()
    } else if config.clustering {
        let zones = build_zones(&g, &free);
        order_zones(&g, zones, rng)
    } else {
        vec![free.clone()]
    };
    progress.advance(Stage::Clustered);
    tracing::info!("{} zones for {} free nodes", zones.len(), free.len());
    tracing::debug!("[PERF] zones: {:?}", step_start.elapsed());

    step_start = Instant::now();
    let min_rules: Vec<DistanceRule> = if config.min_distance > 0 {
        vec![DistanceRule::Min(config.min_distance)]
    } else {
        Vec::new()
    };
    let mut kept: Option<Draft> = None;
    let mut attempts_used = 0;
    let mut met_max = false;
    let mut best_maximum = u64::MAX;
    for attempt in 1..=config.attempts {
        attempts_used = attempt;
        let mut map = base.clone();
        let forced = place_groups(&mut map, &g, &zones, remaining, config.min_distance, rng)?;
        let stats = evaluate(&map, &g);
        let draft = Draft {
            too_close: count_violations(&map, &g, &min_rules),
            map,
            forced,
            stats,
        };
        let meets_max = draft.meets_max(config.max_distance);
        met_max |= meets_max;
        best_maximum = best_maximum.min(draft.stats.maximum);
        tracing::debug!(
            "draft {}/{}: average {:.2}, maximum {}, {} too close",
            attempt,
            config.attempts,
            draft.stats.average,
            draft.stats.maximum,
            draft.too_close
        );

        let accepted = meets_max && draft.too_close == 0;
        let improves = match &kept {
            Some(best) => draft.better_than(best),
            None => true,
        };
        if accepted || improves {
            kept = Some(draft);
        }
        if accepted {
            break;
        }
    }
    progress.advance(Stage::Drafted);
    tracing::debug!("[PERF] drafts: {:?}", step_start.elapsed());

    let Draft {
        mut map, forced, ..
    } = kept.expect("attempts >= 1 is validated");

    let mut report = RenumberReport {
        zones: zones.len(),
        attempts_used,
        dropped_links: g.dropped_links(),
        forced,
        ..RenumberReport::default()
    };
    if let Some(threshold) = config.max_distance {
        if !met_max {
            tracing::warn!(
                "no draft out of {} kept links within {} (best maximum {})",
                attempts_used,
                threshold,
                best_maximum
            );
            report.unsatisfiable.push(Unsatisfiable::MaxDistanceUnmet {
                threshold,
                best_maximum,
                attempts: attempts_used,
            });
        }
    }

    let before = evaluate(&map, &g);
    let rules = config.rules();
    let strategy = config.effective_repair_strategy();

    step_start = Instant::now();
    let summary = repair(
        &mut map,
        &g,
        &free,
        &rules,
        strategy,
        config.repair_passes,
        slot_bounds(&pool),
        rng,
    );
    report.repair_passes = summary.passes;
    report.repair_swaps = summary.swaps;
    report.unsatisfiable.extend(summary.unsatisfiable);
    progress.advance(Stage::Repaired);
    if config.repair_passes > 0 {
        tracing::info!(
            "repair: {} swaps in {} passes ({})",
            report.repair_swaps,
            report.repair_passes,
            strategy.as_str()
        );
    }
    tracing::debug!("[PERF] repair: {:?}", step_start.elapsed());

    step_start = Instant::now();
    report.refine_swaps = refine(&mut map, &g, &free, &rules, config.refine_batches, rng);
    progress.advance(Stage::Refined);
    if config.refine_batches > 0 {
        tracing::info!(
            "refine: {} swaps in {} attempts",
            report.refine_swaps,
            config.refine_batches.saturating_mul(REFINE_BATCH_SIZE)
        );
    }
    tracing::debug!("[PERF] refine: {:?}", step_start.elapsed());

    let after = evaluate(&map, &g);
    if let Err(reason) = map.verify_bijection(config.start, n) {
        panic!("slot assignment is no longer a bijection: {}", reason);
    }
    report.residual_violations = count_violations(&map, &g, &rules);
    progress.advance(Stage::Finalized);

    let outcome = assemble(records, &g, &map, StatsSnapshot { before, after }, report);
    tracing::info!(
        "renumbered {} nodes: average distance {:.2} -> {:.2}, maximum {} -> {}, {} violations left",
        n,
        before.average,
        after.average,
        before.maximum,
        after.maximum,
        outcome.report.residual_violations
    );
    tracing::debug!("[PERF] total renumber: {:?}", total_start.elapsed());
    Ok(outcome)
}

/// Pin the locked ids, in list order, onto the lowest slots of `pool`.
///
/// Unknown and repeated ids are skipped with a warning. Returns how many
/// slots were taken.
fn seed_locked(g: &LinkGraph, map: &mut SlotMap, locked: &[String], pool: &[Slot]) -> usize {
    let mut taken = 0;
    let mut seen: HashSet<NodeIx> = HashSet::new();
    for id in locked {
        let Some(v) = g.index_of(id) else {
            tracing::warn!("locked id '{}' names no node, ignored", id);
            continue;
        };
        if !seen.insert(v) {
            tracing::warn!("locked id '{}' listed twice, ignored", id);
            continue;
        }
        map.lock(v, pool[taken]);
        taken += 1;
    }
    if taken > 0 {
        tracing::info!("{} nodes locked onto slots {:?}", taken, slot_bounds(&pool[..taken]));
    }
    taken
}

fn assemble(
    records: &[NodeRecord],
    g: &LinkGraph,
    map: &SlotMap,
    stats: StatsSnapshot,
    report: RenumberReport,
) -> RenumberOutcome {
    let mut mapping: IndexMap<String, Slot> = IndexMap::with_capacity(records.len());
    let mut by_token: HashMap<&str, Slot> = HashMap::with_capacity(records.len());
    for (v, id) in g.node_ids().enumerate() {
        if let Some(slot) = map.slot(v) {
            mapping.insert(id.to_string(), slot);
            by_token.insert(id, slot);
        }
    }

    let records = records
        .iter()
        .filter_map(|record| {
            let new_id = *mapping.get(&record.original_id)?;
            Some(RenumberedRecord {
                original_id: record.original_id.clone(),
                new_id,
                content: rewrite_destinations(&record.content, &by_token),
                original_links: marker_texts(&record.content),
            })
        })
        .collect();

    RenumberOutcome {
        records,
        mapping,
        stats,
        report,
    }
}
