//! Event consolidation.
//!
//! Raw detection output can contain several peaks in a row (a wobbling
//! crest) or a peak/trough pair that is really a single flat-topped event.
//! Two passes reduce it:
//!
//! - `remove_duplicate_runs` collapses consecutive events of the same kind
//!   into their most extreme member.
//! - `remove_close_events` groups neighbours that are close in both index
//!   and level, whatever their kind, and decides what the group is from the
//!   slope at its boundaries. Groups with an ambiguous slope are dropped.

use crate::logging::{PipelineLog, Stage};
use crate::model::{ExtremumEvent, ExtremumKind, WaterSample};

/// Most extreme member of `members` for `kind`, earliest on ties.
fn most_extreme(members: &[ExtremumEvent], samples: &[WaterSample], kind: ExtremumKind) -> Option<ExtremumEvent> {
    let mut best: Option<ExtremumEvent> = None;
    for &e in members {
        let level = samples[e.sample_index].level;
        let better = match best {
            None => true,
            Some(b) => match kind {
                ExtremumKind::Peak => level > samples[b.sample_index].level,
                ExtremumKind::Trough => level < samples[b.sample_index].level,
            },
        };
        if better {
            best = Some(e);
        }
    }
    best.map(|e| ExtremumEvent { sample_index: e.sample_index, kind })
}

/// Collapses each run of consecutive same-kind events into one: the highest
/// member of a peak run, the lowest member of a trough run.
pub fn remove_duplicate_runs(mut events: Vec<ExtremumEvent>, samples: &[WaterSample]) -> Vec<ExtremumEvent> {
    events.sort_by_key(|e| e.sample_index);
    events
        .chunk_by(|a, b| a.kind == b.kind)
        .filter_map(|run| most_extreme(run, samples, run[0].kind))
        .collect()
}

/// Boundary-slope classification of a multi-member cluster.
fn classify_cluster(
    cluster: &[ExtremumEvent],
    samples: &[WaterSample],
    width: usize,
) -> Option<ExtremumKind> {
    let n = samples.len();
    let (first, last) = (cluster.first()?, cluster.last()?);
    let delta = width / 2;

    let left = first.sample_index;
    let right = last.sample_index;
    let left_boundary = left.saturating_sub(delta);
    let right_boundary = (right + delta).min(n - 1);

    let a = samples[left].level - samples[left_boundary].level;
    let b = samples[right].level - samples[right_boundary].level;

    if a > 0 && b > 0 {
        Some(ExtremumKind::Peak)
    } else if a < 0 && b < 0 {
        Some(ExtremumKind::Trough)
    } else {
        None
    }
}

/// Merges events that lie within `width` samples and `height` level units of
/// the previous cluster member.
///
/// Singletons pass through unchanged. A larger cluster becomes a single peak
/// (its highest member) when both boundaries slope up into it, a single
/// trough (its lowest member) when both slope down into it, and is discarded
/// otherwise.
pub fn remove_close_events(
    mut events: Vec<ExtremumEvent>,
    samples: &[WaterSample],
    height: i32,
    width: usize,
    log: &dyn PipelineLog,
) -> Vec<ExtremumEvent> {
    events.sort_by_key(|e| e.sample_index);

    let mut clusters: Vec<Vec<ExtremumEvent>> = Vec::new();
    for event in events {
        let joins = clusters
            .last()
            .and_then(|c| c.last())
            .is_some_and(|prev| {
                let index_gap = event.sample_index - prev.sample_index;
                let level_gap = (samples[event.sample_index].level - samples[prev.sample_index].level).abs();
                index_gap <= width && level_gap <= height
            });
        match clusters.last_mut() {
            Some(cluster) if joins => cluster.push(event),
            _ => clusters.push(vec![event]),
        }
    }

    let mut kept = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        if cluster.len() == 1 {
            kept.push(cluster[0]);
            continue;
        }
        match classify_cluster(&cluster, samples, width).and_then(|kind| most_extreme(&cluster, samples, kind)) {
            Some(merged) => {
                log.debug(
                    Stage::Consolidate,
                    format_args!(
                        "merged {} events into {} at index {}",
                        cluster.len(),
                        merged.kind,
                        merged.sample_index
                    ),
                );
                kept.push(merged);
            }
            None => {
                log.warn(
                    Stage::Consolidate,
                    format_args!(
                        "dropping ambiguous cluster of {} events (indices {}..={})",
                        cluster.len(),
                        cluster[0].sample_index,
                        cluster[cluster.len() - 1].sample_index
                    ),
                );
            }
        }
    }
    kept
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
