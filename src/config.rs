use std::error::Error;
use std::path::{Path, PathBuf};

use yaml_rust::Yaml;
use yaml_rust::YamlLoader;

use super::config_utils;
use super::link_performance::LohseParams;
use super::AssignError;


static DEFAULT_SEED: u64 = 100;

/// Which assignment model to run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssignModel {
    Incremental,
    CLogit,
    Lohse,
}

impl AssignModel {
    pub fn from_name(name: &str) -> Result<AssignModel, AssignError> {
        match name.to_lowercase().as_str() {
            "incremental" => Ok(AssignModel::Incremental),
            "clogit" => Ok(AssignModel::CLogit),
            "lohse" => Ok(AssignModel::Lohse),
            _ => Err(AssignError::Config(format!("unknown assignment model '{}'", name))),
        }
    }
}

/// An OD matrix file and the departure window its trips fall in.
#[derive(Clone, PartialEq, Debug)]
pub struct MatrixSpec {
    pub path: PathBuf,
    pub begin_s: f64,
    pub end_s: f64,
}

#[derive(Clone, PartialEq, Debug)]
pub struct AssignConfig {
    pub model: AssignModel,
    pub verbose: bool,
    // commonality factor parameters
    pub alpha: f64,
    pub gamma: f64,
    pub sue_tolerance: f64,
    pub max_iterations: usize,
    // number of steps the incremental model loads demand in
    pub increments: usize,
    pub bpr_alpha: f64,
    pub bpr_beta: f64,
    pub lohse: LohseParams,
    pub seed: u64,
    pub network_path: PathBuf,
    pub paths_path: PathBuf,
    pub matrices: Vec<MatrixSpec>,
    pub output_path: Option<PathBuf>,
}

impl Default for AssignConfig {
    fn default() -> AssignConfig {
        return AssignConfig {
            model: AssignModel::CLogit,
            verbose: false,
            alpha: 0.15,
            gamma: 1.,
            sue_tolerance: 0.001,
            max_iterations: 20,
            increments: 1,
            bpr_alpha: 0.15,
            bpr_beta: 4.,
            lohse: LohseParams::default(),
            seed: DEFAULT_SEED,
            network_path: PathBuf::new(),
            paths_path: PathBuf::new(),
            matrices: vec![],
            output_path: None,
        };
    }
}

impl AssignConfig {
    pub fn from_file(config_path: &Path) -> Result<AssignConfig, Box<dyn Error>> {
        let file_contents = std::fs::read_to_string(config_path)?;
        let yaml_cfgs = YamlLoader::load_from_str(&file_contents)?;
        let yaml_cfg = match yaml_cfgs.get(0) {
            Some(yaml_cfg) => yaml_cfg,
            None => return Err(Box::new(AssignError::Config(
                format!("config file {} is empty", config_path.display())))),
        };
        // relative paths in the config are relative to the config's own directory
        let base_dir = match config_path.parent() {
            Some(dir) => dir,
            None => Path::new("."),
        };
        let cfg = AssignConfig::from_yaml(yaml_cfg, base_dir)?;
        log::debug!("read config {}: {:?}", config_path.display(), cfg);
        Ok(cfg)
    }

    pub fn from_yaml(yaml_cfg: &Yaml, base_dir: &Path) -> Result<AssignConfig, AssignError> {
        let defaults = AssignConfig::default();
        let model = match &yaml_cfg["model"] {
            Yaml::BadValue | Yaml::Null => defaults.model,
            Yaml::String(name) => AssignModel::from_name(name)?,
            _ => return Err(AssignError::Config(String::from("'model' must be a string"))),
        };

        let lohse_cfg = &yaml_cfg["lohse"];
        let lohse = LohseParams {
            under: config_utils::yaml_f64(lohse_cfg, "under", defaults.lohse.under)?,
            upper: config_utils::yaml_f64(lohse_cfg, "upper", defaults.lohse.upper)?,
            v1: config_utils::yaml_f64(lohse_cfg, "v1", defaults.lohse.v1)?,
            v2: config_utils::yaml_f64(lohse_cfg, "v2", defaults.lohse.v2)?,
            stop_tolerance: config_utils::yaml_f64(lohse_cfg, "stop_tolerance",
                                                   defaults.lohse.stop_tolerance)?,
        };

        let increments = config_utils::yaml_usize(yaml_cfg, "increments", defaults.increments)?;
        if increments == 0 {
            return Err(AssignError::Config(String::from("'increments' must be at least 1")));
        }
        let max_iterations = config_utils::yaml_usize(yaml_cfg, "max_iterations",
                                                      defaults.max_iterations)?;
        if max_iterations == 0 {
            return Err(AssignError::Config(String::from("'max_iterations' must be at least 1")));
        }

        let network_path = require_path(yaml_cfg, "network_path", base_dir)?;
        let paths_path = require_path(yaml_cfg, "paths_path", base_dir)?;
        let output_path = match yaml_cfg["output_path"].as_str() {
            Some(path_str) => Some(config_utils::str_to_absolute_path(path_str, base_dir)),
            None => None,
        };

        let matrices = match yaml_cfg["matrices"].as_vec() {
            Some(matrix_cfgs) => {
                let mut matrices = vec![];
                for matrix_cfg in matrix_cfgs {
                    let path = require_path(matrix_cfg, "path", base_dir)?;
                    let begin_s = config_utils::yaml_f64(matrix_cfg, "begin_s", 0.)?;
                    let end_s = config_utils::yaml_f64(matrix_cfg, "end_s", begin_s)?;
                    if end_s < begin_s {
                        return Err(AssignError::Config(
                            format!("matrix {} ends before it begins", path.display())));
                    }
                    matrices.push(MatrixSpec{path, begin_s, end_s});
                }
                matrices
            }
            None => return Err(AssignError::Config(String::from("no 'matrices' listed"))),
        };

        let seed = config_utils::yaml_usize(yaml_cfg, "seed", defaults.seed as usize)? as u64;

        return Ok(AssignConfig {
            model,
            verbose: config_utils::yaml_bool(yaml_cfg, "verbose", defaults.verbose)?,
            alpha: config_utils::yaml_f64(yaml_cfg, "alpha", defaults.alpha)?,
            gamma: config_utils::yaml_f64(yaml_cfg, "gamma", defaults.gamma)?,
            sue_tolerance: config_utils::yaml_f64(yaml_cfg, "sue_tolerance",
                                                  defaults.sue_tolerance)?,
            max_iterations,
            increments,
            bpr_alpha: config_utils::yaml_f64(yaml_cfg, "bpr_alpha", defaults.bpr_alpha)?,
            bpr_beta: config_utils::yaml_f64(yaml_cfg, "bpr_beta", defaults.bpr_beta)?,
            lohse,
            seed,
            network_path,
            paths_path,
            matrices,
            output_path,
        });
    }
}

fn require_path(yaml: &Yaml, key: &str, base_dir: &Path) -> Result<PathBuf, AssignError> {
    match yaml[key].as_str() {
        Some(path_str) => Ok(config_utils::str_to_absolute_path(path_str, base_dir)),
        None => Err(AssignError::Config(format!("'{}' is required", key))),
    }
}
