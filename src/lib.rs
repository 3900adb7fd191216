// imports of other modules from this crate
mod error;
pub use error::AssignError;

mod config_utils;

mod config;
pub use config::{AssignConfig, AssignModel, MatrixSpec};

mod dijkstra;

mod network;
pub use network::{Edge, EdgeId, EdgeKind, Network, Path, PathId};

mod od_matrix;
pub use od_matrix::OdMatrix;

mod link_performance;
pub use link_performance::{BprLinkPerformance, LinkPerformance, LohseParams};

mod commonality;
pub use commonality::{commonality_and_choice, compute_commonality_and_choice, OverlapCache};

mod choice;
pub use choice::{choice_probabilities, clogit_theta, ChoiceModel};

mod flow_update;
pub use flow_update::{accumulate_help_flow, blend_edge_flows, check_edge_flows,
                      distribute_demand, incremental_assign};

mod convergence;
pub use convergence::{Convergence, ConvergenceChecker};

mod vehicles;
pub use vehicles::{write_routes_xml, Vehicle, VehicleEmitter};

mod trace;
pub use trace::{LogTracer, RecordingTracer, Tracer};

mod assignment;
pub use assignment::{AssignResults, MatrixReport, TrafficAssigner};
