use super::network::Edge;


/// Parameters of the Lohse smoothing of edge travel times.
#[derive(Clone, Debug, PartialEq)]
pub struct LohseParams {
    /// lower and upper bounds of the smoothing step
    pub under: f64,
    pub upper: f64,
    /// shape of the step's decay as the relative travel time deviation grows
    pub v1: f64,
    pub v2: f64,
    /// maximum relative change of the smoothed travel time for an edge to count as stable
    pub stop_tolerance: f64,
}

impl Default for LohseParams {
    fn default() -> LohseParams {
        return LohseParams {
            under: 0.15,
            upper: 0.5,
            v1: 2.5,
            v2: 4.,
            stop_tolerance: 0.05,
        };
    }
}

/// Computes edge travel times from edge flows, and the per-edge state the Lohse model
/// uses to decide convergence.
pub trait LinkPerformance: Send + Sync {
    /// The travel time on `edge` at its current flow.
    fn travel_time(&self, edge: &Edge) -> f64;

    /// Moves the edge's smoothed travel time towards its actual travel time.
    fn update_help_time(&self, edge: &mut Edge);

    /// Whether the edge's smoothed travel time has settled.
    fn is_stable(&self, edge: &Edge) -> bool;

    /// Recomputes the actual travel time of `edge`, and its smoothed travel time if the
    /// Lohse model is running.
    fn update_edge(&self, edge: &mut Edge, lohse: bool) {
        edge.actual_time = self.travel_time(edge);
        if lohse {
            self.update_help_time(edge);
        }
    }
}

/// The BPR volume-delay function, `t = t0 * (1 + alpha * (flow / capacity)^beta)`.
#[derive(Clone, Debug)]
pub struct BprLinkPerformance {
    pub alpha: f64,
    pub beta: f64,
    pub lohse: LohseParams,
}

impl BprLinkPerformance {
    pub fn new(alpha: f64, beta: f64, lohse: LohseParams) -> BprLinkPerformance {
        return BprLinkPerformance{alpha, beta, lohse};
    }
}

impl Default for BprLinkPerformance {
    fn default() -> BprLinkPerformance {
        return BprLinkPerformance::new(0.15, 4., LohseParams::default());
    }
}

impl LinkPerformance for BprLinkPerformance {
    fn travel_time(&self, edge: &Edge) -> f64 {
        if edge.flow <= 0. || !edge.is_real() || edge.capacity <= 0. {
            return edge.freeflow_time;
        }
        let saturation = edge.flow / edge.capacity;
        return edge.freeflow_time * (1. + self.alpha * saturation.powf(self.beta));
    }

    fn update_help_time(&self, edge: &mut Edge) {
        edge.prev_help_time = edge.help_time;
        if edge.help_time <= 0. {
            edge.help_time = edge.actual_time;
            return;
        }
        // the further the actual time is from the smoothed one, the smaller the step
        let deviation = (edge.actual_time - edge.help_time).abs() / edge.help_time;
        let params = &self.lohse;
        let step = params.under + (params.upper - params.under) /
            (1. + deviation).powf(params.v1 * deviation.powf(params.v2));
        edge.help_time += step * (edge.actual_time - edge.help_time);
    }

    fn is_stable(&self, edge: &Edge) -> bool {
        if edge.help_time <= 0. {
            return true;
        }
        let change = (edge.help_time - edge.prev_help_time).abs() / edge.help_time;
        return change <= self.lohse.stop_tolerance;
    }
}
