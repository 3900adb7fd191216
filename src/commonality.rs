use std::collections::HashMap;
use std::collections::HashSet;

use super::network::{Edge, Path, PathId};
use super::choice::{choice_probabilities, ChoiceModel};


/// Memoized overlap lengths, in kilometres, between pairs of paths of the same OD pair.
/// Keyed by the unordered pair of path ids, so lookups are symmetric by construction.
/// Overlaps depend only on which edges a path uses, so the cache stays valid for a whole
/// run while flows and travel times change.
#[derive(Clone, Debug, Default)]
pub struct OverlapCache {
    overlaps_km: HashMap<(PathId, PathId), f64>,
}

fn pair_key(aa: PathId, bb: PathId) -> (PathId, PathId) {
    if aa <= bb {
        return (aa, bb);
    } else {
        return (bb, aa);
    }
}

impl OverlapCache {
    pub fn new() -> OverlapCache {
        return OverlapCache{overlaps_km: HashMap::new()};
    }

    pub fn get(&self, aa: PathId, bb: PathId) -> Option<f64> {
        return self.overlaps_km.get(&pair_key(aa, bb)).map(|ov| *ov);
    }

    pub fn len(&self) -> usize {
        return self.overlaps_km.len();
    }

    /// Computes and stores the overlap of every pair in `path_set` that isn't cached yet.
    /// A single-path set is skipped, since it never needs overlaps.
    pub fn populate(&mut self, path_set: &[Path], edges: &[Edge]) {
        if path_set.len() < 2 {
            return;
        }
        for (ii, path_one) in path_set.iter().enumerate() {
            let mut edge_set = None;
            for path_two in &path_set[ii..] {
                let key = pair_key(path_one.id, path_two.id);
                if self.overlaps_km.contains_key(&key) {
                    continue;
                }
                let edge_set = edge_set.get_or_insert_with(
                    || path_one.edges.iter().cloned().collect::<HashSet<_>>());
                let overlap_m: f64 = path_two.edges.iter()
                    .filter(|ei| edge_set.contains(*ei))
                    .map(|ei| edges[*ei].length)
                    .sum();
                self.overlaps_km.insert(key, overlap_m / 1000.);
            }
        }
    }
}

/// Commonality factor of each path in `path_set`, in order:
/// `alpha * ln(sum_q (overlap(p, q) / sqrt(len(p) * len(q)))^gamma)`, lengths in km.
/// Overlaps must already be in `cache`.
pub fn commonality_factors(path_set: &[Path], cache: &OverlapCache, alpha: f64, gamma: f64)
                           -> Vec<f64> {
    if path_set.len() < 2 {
        return vec![0.; path_set.len()];
    }
    return path_set.iter().map(|path_one| {
        let len_one = path_one.length / 1000.;
        let mut sum_overlap = 0.;
        for path_two in path_set {
            let len_two = path_two.length / 1000.;
            let overlap = cache.get(path_one.id, path_two.id).unwrap_or(0.);
            let denom = len_one.sqrt() * len_two.sqrt();
            if denom > 0. {
                sum_overlap += (overlap / denom).powf(gamma);
            }
        }
        if sum_overlap > 0. {
            alpha * sum_overlap.ln()
        } else {
            // only zero-length paths get here; treat them as independent
            0.
        }
    }).collect();
}

/// Sets the commonality factor and choice probability of every path in `path_set`, from
/// cached overlaps and the paths' current travel times.  Takes the cache read-only so that
/// many OD pairs can be processed in parallel once it's populated.
pub fn commonality_and_choice(path_set: &mut [Path], cache: &OverlapCache, alpha: f64,
                              gamma: f64, model: ChoiceModel) {
    if path_set.len() == 1 {
        path_set[0].commfactor = 0.;
        path_set[0].choice_prob = 1.;
        return;
    }
    let commfactors = commonality_factors(path_set, cache, alpha, gamma);
    for (path, cf) in path_set.iter_mut().zip(commfactors) {
        path.commfactor = cf;
    }
    let probs = choice_probabilities(path_set, model);
    for (path, prob) in path_set.iter_mut().zip(probs) {
        path.choice_prob = prob;
    }
}

/// Fills in any missing overlaps for `path_set`, then computes commonality factors and
/// choice probabilities.
pub fn compute_commonality_and_choice(path_set: &mut [Path], edges: &[Edge],
                                      cache: &mut OverlapCache, alpha: f64, gamma: f64,
                                      model: ChoiceModel) {
    cache.populate(path_set, edges);
    commonality_and_choice(path_set, cache, alpha, gamma, model);
}
