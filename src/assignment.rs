use std::collections::HashMap;
use std::error::Error;
use std::path::Path as FsPath;
use std::sync::Arc;

use itertools::Itertools;
use rayon::prelude::*;

use super::choice::ChoiceModel;
use super::commonality::{commonality_and_choice, OverlapCache};
use super::config::{AssignConfig, AssignModel};
use super::convergence::{count_stable_edges, count_unstable_edges, Convergence,
                         ConvergenceChecker};
use super::flow_update::{accumulate_help_flow, blend_edge_flows, check_edge_flows,
                         distribute_demand, incremental_assign};
use super::link_performance::{BprLinkPerformance, LinkPerformance};
use super::network::{Network, Path};
use super::od_matrix::OdMatrix;
use super::trace::{LogTracer, Tracer};
use super::vehicles::{Vehicle, VehicleEmitter};
use super::AssignError;


/// Summary of the assignment of one OD matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixReport {
    /// SUE iterations run, or increments loaded for the incremental model
    pub iterations: usize,
    /// false if the iteration cap stopped the run before the stability criterion was met
    pub converged: bool,
    /// candidate paths considered when emitting vehicles
    pub used_paths: usize,
}

#[derive(Clone, Debug)]
pub struct AssignResults {
    pub vehicles: Vec<Vehicle>,
    pub reports: Vec<MatrixReport>,
}

/// Runs a traffic assignment model over a network and a sequence of OD matrices.  Edge
/// flows and travel times carry over from one matrix to the next, as do the assigned trip
/// and vehicle tallies.
pub struct TrafficAssigner {
    cfg: AssignConfig,
    network: Network,
    overlaps: OverlapCache,
    emitter: VehicleEmitter,
    link_perf: Box<dyn LinkPerformance>,
    tracer: Arc<dyn Tracer>,
    checker: ConvergenceChecker,
    used_paths: usize,
}

impl TrafficAssigner {
    pub fn new(network: Network, cfg: AssignConfig) -> TrafficAssigner {
        let link_perf = BprLinkPerformance::new(cfg.bpr_alpha, cfg.bpr_beta, cfg.lohse.clone());
        return TrafficAssigner {
            network,
            overlaps: OverlapCache::new(),
            emitter: VehicleEmitter::new(cfg.seed),
            link_perf: Box::new(link_perf),
            tracer: Arc::new(LogTracer),
            checker: ConvergenceChecker::new(cfg.max_iterations),
            used_paths: 0,
            cfg,
        };
    }

    /// Builds an assigner from a yaml config file, loading the network, the candidate
    /// paths and the OD matrices it names.
    pub fn from_cfg(config_path: &FsPath)
                    -> Result<(TrafficAssigner, Vec<OdMatrix>), Box<dyn Error>> {
        let cfg = AssignConfig::from_file(config_path)?;
        log::debug!("loading network");
        let mut network = Network::from_xml(&cfg.network_path)?;
        network.load_paths_xml(&cfg.paths_path)?;
        log::debug!("loading matrices");
        let mut matrices = vec![];
        for matrix_spec in &cfg.matrices {
            matrices.push(OdMatrix::from_csv(&matrix_spec.path, matrix_spec.begin_s,
                                             matrix_spec.end_s)?);
        }
        return Ok((TrafficAssigner::new(network, cfg), matrices));
    }

    pub fn set_tracer(&mut self, tracer: Arc<dyn Tracer>) {
        self.tracer = tracer;
    }

    pub fn set_link_performance(&mut self, link_perf: Box<dyn LinkPerformance>) {
        self.link_perf = link_perf;
    }

    pub fn config(&self) -> &AssignConfig {
        return &self.cfg;
    }

    pub fn network(&self) -> &Network {
        return &self.network;
    }

    pub fn emitter(&self) -> &VehicleEmitter {
        return &self.emitter;
    }

    /// Total candidate paths used over every matrix assigned so far.
    pub fn used_paths(&self) -> usize {
        return self.used_paths;
    }

    /// Assigns each matrix in turn with the configured model.  Returns every vehicle
    /// emitted so far, along with a report per matrix.
    pub fn run(&mut self, matrices: &[OdMatrix]) -> Result<AssignResults, AssignError> {
        let mut reports = vec![];
        for (ii, matrix) in matrices.iter().enumerate() {
            log::debug!("assigning matrix {} with the {:?} model", ii, self.cfg.model);
            let pairs = matrix.resolve(&self.network)?;
            let report = match self.cfg.model {
                AssignModel::Incremental => self.incremental_assignment(matrix, &pairs)?,
                AssignModel::CLogit => self.sue_assignment(matrix, &pairs, ChoiceModel::CLogit)?,
                AssignModel::Lohse => self.sue_assignment(matrix, &pairs, ChoiceModel::Lohse)?,
            };
            log::info!("matrix {}: {:?}", ii, report);
            reports.push(report);
        }
        return Ok(AssignResults {
            vehicles: self.emitter.vehicles().clone(),
            reports,
        });
    }

    fn incremental_assignment(&mut self, matrix: &OdMatrix, pairs: &[(usize, usize, f64)])
                              -> Result<MatrixReport, AssignError> {
        let increments = self.cfg.increments.max(1);
        // pairs are in row-major order, so each origin's destinations are contiguous
        let by_origin = pairs.iter().group_by(|(origin, _, _)| *origin);
        let by_origin: Vec<(usize, Vec<(usize, f64)>)> = by_origin.into_iter()
            .map(|(origin, group)| (origin, group.map(|(_, dest, dd)| (*dest, *dd)).collect()))
            .collect();

        for step in 0..increments {
            log::debug!("incremental step {} of {}", step + 1, increments);
            for (origin, dests) in &by_origin {
                let preds = self.network.shortest_path_tree(*origin);
                for (dest, demand) in dests {
                    let flow = demand / increments as f64;
                    let route = match incremental_assign(&mut self.network, *origin, *dest,
                                                         &preds, flow)? {
                        Some(route) => route,
                        None => {
                            log::warn!("{} is unreachable from {}, skipping",
                                       self.network.vertex_label(*dest),
                                       self.network.vertex_label(*origin));
                            continue;
                        }
                    };
                    let od_pair = (*origin, *dest);
                    self.emitter.add_trip_flow(od_pair, flow)?;
                    self.emitter.emit_vehicles(od_pair, &route, matrix.begin_s, matrix.end_s);
                    if self.cfg.verbose {
                        self.tracer.trace("path_flow", &[
                            ("origin", &self.network.vertex_label(*origin)),
                            ("destination", &self.network.vertex_label(*dest)),
                            ("flow", &flow),
                            ("edges", &self.network.edge_labels(&route).join(" ")),
                        ]);
                    }
                }
            }
            for edge in self.network.edges_mut() {
                self.link_perf.update_edge(edge, false);
            }
        }

        return Ok(MatrixReport {
            iterations: increments,
            converged: true,
            used_paths: 0,
        });
    }

    fn sue_assignment(&mut self, matrix: &OdMatrix, pairs: &[(usize, usize, f64)],
                      model: ChoiceModel) -> Result<MatrixReport, AssignError> {
        let pairs: Vec<(usize, usize, f64)> = pairs.iter().cloned().filter(|(oo, dd, _)| {
            if self.network.paths(*oo, *dd).is_some() {
                return true;
            }
            log::warn!("no candidate paths from {} to {}, skipping",
                       self.network.vertex_label(*oo), self.network.vertex_label(*dd));
            return false;
        }).collect();

        log::debug!("computing path overlaps");
        for (origin, dest, _) in &pairs {
            if let Some(path_set) = self.network.paths(*origin, *dest) {
                self.overlaps.populate(path_set, self.network.edges());
            }
        }

        let mut iteration = 1;
        let status = loop {
            let status = self.sue_iteration(iteration, &pairs, model)?;
            if status.is_stable() {
                break status;
            }
            iteration += 1;
        };
        let converged = status == Convergence::Stable;
        if !converged {
            log::warn!("no convergence after {} iterations; stopping anyway", iteration);
        }

        log::debug!("emitting vehicles");
        let used_paths = self.sue_emit_vehicles(matrix, &pairs, model)?;
        self.used_paths += used_paths;
        return Ok(MatrixReport {
            iterations: iteration,
            converged,
            used_paths,
        });
    }

    /// One fixed-point iteration: choice and target flows per OD pair, then the blend of
    /// edge flows and the travel time update.
    fn sue_iteration(&mut self, iteration: usize, pairs: &[(usize, usize, f64)],
                     model: ChoiceModel) -> Result<Convergence, AssignError> {
        let demands: HashMap<(usize, usize), f64> = pairs.iter()
            .map(|(oo, dd, demand)| ((*oo, *dd), *demand))
            .collect();
        let alpha = self.cfg.alpha;
        let gamma = self.cfg.gamma;
        let overlaps = &self.overlaps;

        // each OD pair's path set is independent once the overlaps are cached
        let (edges, od_paths) = self.network.split_paths_mut();
        let outcomes: Vec<((usize, usize), Result<Option<f64>, AssignError>)> = od_paths
            .par_iter_mut()
            .filter_map(|(od_pair, path_set)| {
                let demand = *demands.get(od_pair)?;
                for path in path_set.iter_mut() {
                    path.update_times(edges);
                }
                commonality_and_choice(path_set, overlaps, alpha, gamma, model);
                Some((*od_pair, distribute_demand(path_set, demand)))
            })
            .collect();
        for ((origin, dest), outcome) in outcomes {
            let residual = match outcome? {
                Some(residual) => residual,
                None => continue,
            };
            log::warn!("negative residual flow {} on the last path from {} to {}, clipped",
                       residual, self.network.vertex_label(origin),
                       self.network.vertex_label(dest));
        }

        let (edges, od_paths) = self.network.split_edges_mut();
        for (origin, dest, _) in pairs {
            if let Some(path_set) = od_paths.get(&(*origin, *dest)) {
                accumulate_help_flow(path_set, edges);
            }
        }
        if self.cfg.verbose {
            for (origin, dest, _) in pairs {
                if let Some(path_set) = self.network.paths(*origin, *dest) {
                    self.trace_path_set(iteration, path_set, |path| path.help_flow);
                }
            }
        }

        let previous_flows = blend_edge_flows(self.network.edges_mut(), iteration);
        check_edge_flows(self.network.edges())?;
        let lohse = model == ChoiceModel::Lohse;
        for edge in self.network.edges_mut() {
            self.link_perf.update_edge(edge, lohse);
        }

        let num_edges = self.network.edge_count();
        let status = match model {
            ChoiceModel::CLogit => {
                let num_unstable = count_unstable_edges(self.network.edges(), &previous_flows,
                                                        self.cfg.sue_tolerance);
                log::debug!("iteration {}: {} of {} edges unstable", iteration, num_unstable,
                            num_edges);
                self.checker.check_clogit(iteration, num_unstable, num_edges)
            }
            ChoiceModel::Lohse => {
                let num_stable = count_stable_edges(self.network.edges(), &*self.link_perf);
                log::debug!("iteration {}: {} of {} edges stable", iteration, num_stable,
                            num_edges);
                self.checker.check_lohse(iteration, num_stable, num_edges)
            }
        };
        if self.cfg.verbose {
            self.tracer.trace("iteration", &[("iteration", &iteration),
                                             ("status", &format!("{:?}", status))]);
        }
        return Ok(status);
    }

    /// Splits each OD pair's demand over its paths at the final travel times and emits
    /// vehicles along every path.  Returns the number of paths considered.
    fn sue_emit_vehicles(&mut self, matrix: &OdMatrix, pairs: &[(usize, usize, f64)],
                         model: ChoiceModel) -> Result<usize, AssignError> {
        let mut used_paths = 0;
        let (edges, od_paths) = self.network.split_paths_mut();
        for (origin, dest, demand) in pairs {
            let od_pair = (*origin, *dest);
            let path_set = match od_paths.get_mut(&od_pair) {
                Some(path_set) => path_set,
                None => continue,
            };
            used_paths += path_set.len();
            for path in path_set.iter_mut() {
                path.update_times(edges);
                if model == ChoiceModel::Lohse {
                    path.help_time = path.act_time;
                }
            }
            commonality_and_choice(path_set, &self.overlaps, self.cfg.alpha, self.cfg.gamma,
                                   model);
            if let Some(residual) = distribute_demand(path_set, *demand)? {
                log::warn!("negative residual flow {} on path {}, clipped", residual,
                           path_set[path_set.len() - 1].label);
            }
            for path in path_set.iter_mut() {
                path.flow = path.help_flow;
                self.emitter.add_trip_flow(od_pair, path.flow)?;
                self.emitter.emit_vehicles(od_pair, &path.edges, matrix.begin_s,
                                           matrix.end_s);
            }
        }

        if self.cfg.verbose {
            for (origin, dest, _) in pairs {
                if let Some(path_set) = self.network.paths(*origin, *dest) {
                    self.trace_path_set(0, path_set, |path| path.flow);
                }
            }
        }
        log::info!("used {} paths for this matrix", used_paths);
        return Ok(used_paths);
    }

    fn trace_path_set<F>(&self, iteration: usize, path_set: &[Path], flow: F)
        where F: Fn(&Path) -> f64
    {
        for path in path_set {
            self.tracer.trace("path_flow", &[
                ("iteration", &iteration),
                ("origin", &self.network.vertex_label(path.origin)),
                ("destination", &self.network.vertex_label(path.destination)),
                ("path", &path.label),
                ("act_time", &path.act_time),
                ("commfactor", &path.commfactor),
                ("prob", &path.choice_prob),
                ("flow", &flow(path)),
            ]);
        }
    }
}
