use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glob::glob;
use tempfile::tempdir;
use xml::reader::{EventReader, XmlEvent};

use rust_traffic_assignment::AssignConfig;
use rust_traffic_assignment::AssignModel;
use rust_traffic_assignment::OdMatrix;
use rust_traffic_assignment::TrafficAssigner;
use rust_traffic_assignment::write_routes_xml;


/// Every config under tests/envs should run end to end and emit one vehicle per unit of
/// demand, accumulated over its matrices.
#[test]
fn test_assign_all_envs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut num_configs = 0;
    for entry in glob("tests/envs/*/config_*.yaml").expect("bad glob pattern") {
        let cfg_path = entry.unwrap();
        println!("Testing {:?}", cfg_path);
        test_assign_on_config(&cfg_path);
        num_configs += 1;
    }
    assert!(num_configs >= 3);
}

fn test_assign_on_config(cfg_path: &Path) {
    let (mut assigner, matrices) = TrafficAssigner::from_cfg(cfg_path).unwrap();
    let results = assigner.run(&matrices).unwrap();
    assert_eq!(results.reports.len(), matrices.len());

    // rounding happens on the flow accumulated over all matrices
    let mut od_demands: HashMap<(String, String), f64> = HashMap::new();
    for matrix in &matrices {
        for (oi, origin) in matrix.origins().iter().enumerate() {
            for (di, dest) in matrix.destinations().iter().enumerate() {
                if origin != dest {
                    *od_demands.entry((origin.clone(), dest.clone())).or_insert(0.) +=
                        matrix.get(oi, di);
                }
            }
        }
    }
    let expected: f64 = od_demands.values().map(|demand| demand.round()).sum();
    assert_eq!(results.vehicles.len(), expected as usize);

    let begin_s = matrices.iter().map(|mm| mm.begin_s).fold(f64::INFINITY, f64::min);
    let end_s = matrices.iter().map(|mm| mm.end_s).fold(f64::NEG_INFINITY, f64::max);
    for vehicle in &results.vehicles {
        assert!(vehicle.depart >= begin_s && vehicle.depart < end_s);
        assert!(!vehicle.route.is_empty());
    }

    if assigner.config().model != AssignModel::Incremental {
        for report in &results.reports {
            assert!(report.iterations <= assigner.config().max_iterations);
            assert!(report.used_paths > 0);
        }
    }

    // write the routes out and read them back
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("routes.xml");
    write_routes_xml(&results.vehicles, assigner.network(), &out_path).unwrap();
    let contents = fs::read_to_string(&out_path).unwrap();
    let parser = EventReader::new(contents.as_bytes());
    let mut departs = vec![];
    let mut num_routes = 0;
    for ee in parser {
        if let XmlEvent::StartElement{name, attributes, ..} = ee.unwrap() {
            for attr in attributes {
                match (name.local_name.as_str(), attr.name.local_name.as_str()) {
                    ("vehicle", "depart") => departs.push(attr.value.parse::<f64>().unwrap()),
                    ("route", "edges") => {
                        num_routes += 1;
                        // connectors are never written
                        for label in attr.value.split_whitespace() {
                            let ei = assigner.network().edge_idx(label).unwrap();
                            assert!(assigner.network().edges()[ei].is_real());
                        }
                    }
                    _ => (),
                }
            }
        }
    }
    assert_eq!(departs.len(), results.vehicles.len());
    assert_eq!(num_routes, results.vehicles.len());
    assert!(departs.windows(2).all(|pair| pair[0] <= pair[1]));
}

/// The same config and seed give the same vehicles.
#[test]
fn test_runs_are_reproducible() {
    let cfg_path = Path::new("tests/envs/two-routes/config_clogit.yaml");
    let (mut first, matrices) = TrafficAssigner::from_cfg(cfg_path).unwrap();
    let (mut second, _) = TrafficAssigner::from_cfg(cfg_path).unwrap();
    let first_results = first.run(&matrices).unwrap();
    let second_results = second.run(&matrices).unwrap();
    assert_eq!(first_results.vehicles, second_results.vehicles);
    assert_eq!(first_results.reports, second_results.reports);
}

/// Lowering the iteration cap stops the run early without failing it.
#[test]
fn test_iteration_cap_from_config() {
    let cfg_path = Path::new("tests/envs/two-routes/config_clogit.yaml");
    let mut cfg = AssignConfig::from_file(cfg_path).unwrap();
    cfg.max_iterations = 2;
    let mut network = rust_traffic_assignment::Network::from_xml(&cfg.network_path).unwrap();
    network.load_paths_xml(&cfg.paths_path).unwrap();
    let matrix = OdMatrix::from_csv(&cfg.matrices[0].path, 0., 3600.).unwrap();

    let mut assigner = TrafficAssigner::new(network, cfg);
    let results = assigner.run(&[matrix]).unwrap();
    assert_eq!(results.reports[0].iterations, 2);
    assert!(!results.reports[0].converged);
    // 700 trips from o and 250.4 from p
    assert_eq!(results.vehicles.len(), 950);
}
