use std::error::Error;
use std::path::Path;

use rust_traffic_assignment::{write_routes_xml, TrafficAssigner};


fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: rust_traffic_assignment <config.yaml>");
            std::process::exit(2);
        }
    };

    let (mut assigner, matrices) = TrafficAssigner::from_cfg(Path::new(&config_path))?;
    let results = assigner.run(&matrices)?;
    for (ii, report) in results.reports.iter().enumerate() {
        println!("matrix {}: {} iterations, converged: {}, used paths: {}", ii,
                 report.iterations, report.converged, report.used_paths);
    }
    println!("emitted {} vehicles", results.vehicles.len());

    if let Some(output_path) = &assigner.config().output_path {
        write_routes_xml(&results.vehicles, assigner.network(), output_path)?;
    }
    Ok(())
}
