use super::network::Edge;
use super::link_performance::LinkPerformance;


/// Outcome of a convergence check after one iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Convergence {
    /// Keep iterating.
    Continue,
    /// The model's stability criterion is met.
    Stable,
    /// The iteration cap was reached before the criterion was met.
    Forced,
}

impl Convergence {
    /// Whether the iteration loop should stop.
    pub fn is_stable(&self) -> bool {
        return *self != Convergence::Continue;
    }
}

/// Counts the real edges whose flow changed, relative to the new flow, by more than
/// `tolerance` since `previous` was recorded.  An edge whose flow fell to zero counts if
/// its old flow was non-zero.
pub fn count_unstable_edges(edges: &[Edge], previous: &[f64], tolerance: f64) -> usize {
    let mut not_stable = 0;
    for (edge, old_flow) in edges.iter().zip(previous) {
        if !edge.is_real() {
            continue;
        }
        let changed = if edge.flow > 0. {
            (edge.flow - old_flow).abs() / edge.flow > tolerance
        } else {
            *old_flow != 0.
        };
        if changed {
            not_stable += 1;
        }
    }
    return not_stable;
}

pub fn count_stable_edges(edges: &[Edge], link_perf: &dyn LinkPerformance) -> usize {
    return edges.iter().filter(|ee| link_perf.is_stable(ee)).count();
}

#[derive(Clone, Debug)]
pub struct ConvergenceChecker {
    pub max_iterations: usize,
}

impl ConvergenceChecker {
    pub fn new(max_iterations: usize) -> ConvergenceChecker {
        return ConvergenceChecker{max_iterations};
    }

    /// C-Logit criterion: from the fourth iteration on, stable when fewer than 5% of all
    /// edges changed their flow by more than the tolerance.
    pub fn check_clogit(&self, iteration: usize, num_unstable: usize, num_edges: usize)
                        -> Convergence {
        if iteration > 3 && (num_unstable == 0 ||
                             (num_unstable as f64) < num_edges as f64 * 0.05) {
            return Convergence::Stable;
        }
        return self.cap(iteration);
    }

    /// Lohse criterion: from the second iteration on, stable when every edge passes its
    /// own stability test, or when 95% do and more than 50 iterations have run.
    pub fn check_lohse(&self, iteration: usize, num_stable: usize, num_edges: usize)
                       -> Convergence {
        if iteration > 1 {
            if num_stable == num_edges {
                return Convergence::Stable;
            }
            if iteration > 50 && (num_stable as f64) >= num_edges as f64 * 0.95 {
                return Convergence::Stable;
            }
        }
        return self.cap(iteration);
    }

    fn cap(&self, iteration: usize) -> Convergence {
        if iteration >= self.max_iterations {
            return Convergence::Forced;
        }
        return Convergence::Continue;
    }
}
