use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use xml::writer::{EmitterConfig, XmlEvent};

use super::network::{EdgeId, Network};
use super::AssignError;


#[derive(Clone, PartialEq, Debug)]
pub struct Vehicle {
    pub id: String,
    pub depart: f64,
    pub route: Vec<EdgeId>,
}

/// Turns continuous assigned flow into whole vehicles.  For each OD pair it tracks the
/// cumulative assigned flow and the number of vehicles created so far, and creates a
/// vehicle whenever the rounded flow runs ahead of the vehicle count.  Vehicles are never
/// removed, so both tallies only grow.
pub struct VehicleEmitter {
    assigned_trips: HashMap<(usize, usize), f64>,
    assigned_vehs: HashMap<(usize, usize), u64>,
    vehicles: Vec<Vehicle>,
    last_veh_id: u64,
    rng: Isaac64Rng,
}

impl VehicleEmitter {
    pub fn new(seed: u64) -> VehicleEmitter {
        return VehicleEmitter {
            assigned_trips: HashMap::new(),
            assigned_vehs: HashMap::new(),
            vehicles: vec![],
            last_veh_id: 0,
            rng: Isaac64Rng::seed_from_u64(seed),
        };
    }

    /// Adds `flow` to the OD pair's assigned trips.  NaN or infinite flow is refused.
    pub fn add_trip_flow(&mut self, od_pair: (usize, usize), flow: f64)
                         -> Result<(), AssignError> {
        if !flow.is_finite() {
            return Err(AssignError::NonFiniteFlow(
                format!("trips from vertex {} to vertex {}", od_pair.0, od_pair.1)));
        }
        *self.assigned_trips.entry(od_pair).or_insert(0.) += flow;
        return Ok(());
    }

    /// Creates vehicles on `route` until the OD pair's vehicle count catches up with its
    /// rounded assigned flow.  Departure times are drawn uniformly from `[begin_s, end_s)`.
    /// Returns the number of vehicles created.
    pub fn emit_vehicles(&mut self, od_pair: (usize, usize), route: &[EdgeId], begin_s: f64,
                         end_s: f64) -> usize {
        let target = self.assigned_trip(od_pair).round();
        if !target.is_finite() {
            log::warn!("assigned trips for {:?} overflowed, no vehicles emitted", od_pair);
            return 0;
        }
        let mut created = 0;
        loop {
            let count = self.assigned_vehs.entry(od_pair).or_insert(0);
            if (*count as f64) >= target {
                break;
            }
            *count += 1;
            self.last_veh_id += 1;
            let depart = if end_s > begin_s {
                self.rng.gen_range(begin_s..end_s)
            } else {
                begin_s
            };
            self.vehicles.push(Vehicle {
                id: self.last_veh_id.to_string(),
                depart,
                route: route.to_vec(),
            });
            created += 1;
        }
        return created;
    }

    pub fn assigned_trip(&self, od_pair: (usize, usize)) -> f64 {
        return *self.assigned_trips.get(&od_pair).unwrap_or(&0.);
    }

    pub fn assigned_veh(&self, od_pair: (usize, usize)) -> u64 {
        return *self.assigned_vehs.get(&od_pair).unwrap_or(&0);
    }

    pub fn vehicles(&self) -> &Vec<Vehicle> {
        return &self.vehicles;
    }
}

/// Writes the vehicles as a route file, ordered by departure time.  Routes list the labels
/// of their real edges; zone connectors are left out.
pub fn write_routes_xml(vehicles: &[Vehicle], network: &Network, path: &Path)
                        -> Result<(), Box<dyn Error>> {
    let file = BufWriter::new(File::create(path)?);
    let mut writer = EmitterConfig::new().perform_indent(true).create_writer(file);

    let mut sorted: Vec<&Vehicle> = vehicles.iter().collect();
    sorted.sort_by(|aa, bb| aa.depart.partial_cmp(&bb.depart)
                   .unwrap_or(std::cmp::Ordering::Equal));

    writer.write(XmlEvent::start_element("routes"))?;
    for vehicle in sorted {
        let depart = format!("{:.2}", vehicle.depart);
        let edges: Vec<&str> = vehicle.route.iter()
            .map(|ei| &network.edges()[*ei])
            .filter(|edge| edge.is_real())
            .map(|edge| edge.label.as_str())
            .collect();
        let edges = edges.join(" ");
        writer.write(XmlEvent::start_element("vehicle")
                     .attr("id", &vehicle.id)
                     .attr("depart", &depart))?;
        writer.write(XmlEvent::start_element("route").attr("edges", &edges))?;
        writer.write(XmlEvent::end_element())?;
        writer.write(XmlEvent::end_element())?;
    }
    writer.write(XmlEvent::end_element())?;
    log::info!("wrote {} vehicles to {}", vehicles.len(), path.display());
    Ok(())
}
